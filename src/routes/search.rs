//! Search routes: typeahead suggestions (merged product/category/brand
//! lookups, ranked in `domain::search`) and simple recommendations.
//!
//! A failed lookup degrades to the canned suggestion list instead of an
//! error.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::domain::search::{
    self, lookup_budgets, needs_fallback, Suggestion, SuggestionKind, MAX_SUGGESTIONS,
    MIN_QUERY_LEN,
};
use crate::error::ApiError;
use crate::models::Product;
use crate::response::ApiResponse;
use crate::state::AppState;

const DEFAULT_SUGGESTION_LIMIT: u32 = 10;
const DEFAULT_RECOMMENDATION_LIMIT: u32 = 12;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search/suggestions", get(suggestions))
        .route("/search/recommendations", get(recommendations))
}

#[derive(Debug, Deserialize)]
struct SuggestionParams {
    #[serde(default)]
    q: String,
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsData {
    suggestions: Vec<Suggestion>,
    query_too_short: bool,
}

async fn suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<ApiResponse<SuggestionsData>>, ApiError> {
    let query = params.q.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Ok(ApiResponse::ok(SuggestionsData {
            suggestions: vec![],
            query_too_short: true,
        }));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .clamp(1, MAX_SUGGESTIONS as u32) as usize;

    let suggestions = match lookup(&state.db, query, limit).await {
        Ok(candidates) => search::rank(query, candidates, limit),
        Err(err) => {
            tracing::warn!(error = ?err, "suggestion lookup failed, serving canned list");
            search::canned(query)
        }
    };
    Ok(ApiResponse::ok(SuggestionsData {
        suggestions,
        query_too_short: false,
    }))
}

/// Up to four lookups: titles, categories, brands, and (only when the
/// primaries come up short) a description/tag fallback that excludes
/// already-matched titles.
async fn lookup(db: &PgPool, query: &str, limit: usize) -> anyhow::Result<Vec<Suggestion>> {
    let pattern = format!("%{query}%");
    let (product_budget, category_budget, brand_budget) = lookup_budgets(limit);

    let titles: Vec<(String, i64)> = sqlx::query_as(
        "SELECT title, COUNT(*) FROM products \
         WHERE status = 'ACTIVE' AND title ILIKE $1 \
         GROUP BY title ORDER BY COUNT(*) DESC, title LIMIT $2",
    )
    .bind(&pattern)
    .bind(product_budget as i64)
    .fetch_all(db)
    .await?;

    let categories: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) FROM products \
         WHERE status = 'ACTIVE' AND category ILIKE $1 \
         GROUP BY category ORDER BY COUNT(*) DESC, category LIMIT $2",
    )
    .bind(&pattern)
    .bind(category_budget as i64)
    .fetch_all(db)
    .await?;

    let brands: Vec<(String, i64)> = sqlx::query_as(
        "SELECT brand, COUNT(*) FROM products \
         WHERE status = 'ACTIVE' AND brand IS NOT NULL AND brand ILIKE $1 \
         GROUP BY brand ORDER BY COUNT(*) DESC, brand LIMIT $2",
    )
    .bind(&pattern)
    .bind(brand_budget as i64)
    .fetch_all(db)
    .await?;

    let mut candidates: Vec<Suggestion> = Vec::new();
    let matched_titles: Vec<String> = titles.iter().map(|(t, _)| t.clone()).collect();
    candidates.extend(titles.into_iter().map(|(text, count)| Suggestion {
        text,
        kind: SuggestionKind::Product,
        count,
    }));
    candidates.extend(categories.into_iter().map(|(text, count)| Suggestion {
        text,
        kind: SuggestionKind::Category,
        count,
    }));
    candidates.extend(brands.into_iter().map(|(text, count)| Suggestion {
        text,
        kind: SuggestionKind::Brand,
        count,
    }));

    if needs_fallback(candidates.len(), limit) {
        let remaining = (limit - candidates.len()).max(1);
        let extra: Vec<(String, i64)> = sqlx::query_as(
            "SELECT title, COUNT(*) FROM products \
             WHERE status = 'ACTIVE' \
               AND (description ILIKE $1 OR array_to_string(tags, ' ') ILIKE $1) \
               AND NOT (title = ANY($2)) \
             GROUP BY title ORDER BY COUNT(*) DESC, title LIMIT $3",
        )
        .bind(&pattern)
        .bind(&matched_titles)
        .bind(remaining as i64)
        .fetch_all(db)
        .await?;
        candidates.extend(extra.into_iter().map(|(text, count)| Suggestion {
            text,
            kind: SuggestionKind::Product,
            count,
        }));
    }

    Ok(candidates)
}

#[derive(Debug, Deserialize)]
struct RecommendationParams {
    limit: Option<u32>,
}

async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECOMMENDATION_LIMIT)
        .clamp(1, 50);
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'ACTIVE' AND inventory > 0 \
         ORDER BY rating DESC, review_count DESC, created_at DESC LIMIT $1",
    )
    .bind(i64::from(limit))
    .fetch_all(&state.db)
    .await?;
    Ok(ApiResponse::ok(products))
}
