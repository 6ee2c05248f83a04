//! Review routes. One review per (product, user); creating one recomputes
//! the product's aggregate rating and review count in full, inside the same
//! transaction as the insert.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{is_unique_violation, ApiError};
use crate::identity::AuthUser;
use crate::models::Review;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/products/:id/reviews",
        get(list_reviews).post(create_review),
    )
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct ReviewWithAuthor {
    id: Uuid,
    rating: i32,
    comment: Option<String>,
    author: String,
    created_at: DateTime<Utc>,
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ReviewWithAuthor>>>, ApiError> {
    ensure_product_exists(&state, product_id).await?;
    let reviews = sqlx::query_as::<_, ReviewWithAuthor>(
        "SELECT r.id, r.rating, r.comment, u.name AS author, r.created_at \
         FROM reviews r JOIN users u ON u.id = r.user_id \
         WHERE r.product_id = $1 \
         ORDER BY r.created_at DESC",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?;
    Ok(ApiResponse::ok(reviews))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    rating: i32,
    #[validate(length(max = 2000))]
    comment: Option<String>,
}

async fn create_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Review>>), ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    ensure_product_exists(&state, product_id).await?;

    let mut tx = state.db.begin().await?;
    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (id, product_id, user_id, rating, comment) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(user.id)
    .bind(req.rating)
    .bind(&req.comment)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Validation("you have already reviewed this product".into())
        } else {
            e.into()
        }
    })?;

    // Full recomputation, not incremental.
    sqlx::query(
        "UPDATE products SET \
         rating = COALESCE((SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1), 0), \
         review_count = (SELECT COUNT(*) FROM reviews WHERE product_id = $1), \
         updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(product_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(review)))
}

async fn ensure_product_exists(state: &AppState, product_id: Uuid) -> Result<(), ApiError> {
    let exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND status = 'ACTIVE'")
            .bind(product_id)
            .fetch_optional(&state.db)
            .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("product"));
    }
    Ok(())
}
