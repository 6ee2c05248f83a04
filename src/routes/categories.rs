//! Category routes. Category detail carries the filter-options facet block
//! for its slice of the catalog.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::catalog::{self, FilterOptions};
use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::models::{Category, UserRole};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", get(get_category))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&state.db)
            .await?;
    Ok(ApiResponse::ok(categories))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryDetail {
    category: Category,
    filters: FilterOptions,
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryDetail>>, ApiError> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("category"))?;
    let filters = catalog::filter_options(&state.db, Some(&category.name)).await?;
    Ok(ApiResponse::ok(CategoryDetail { category, filters }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    description: Option<String>,
    image_url: Option<String>,
}

async fn create_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>), ApiError> {
    if user.role != UserRole::Seller {
        return Err(ApiError::Forbidden("seller account required".into()));
    }
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let slug = req.name.trim().to_lowercase().replace(' ', "-");
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, name, slug, description, image_url) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(req.name.trim())
    .bind(&slug)
    .bind(&req.description)
    .bind(&req.image_url)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if crate::error::is_unique_violation(&e) {
            ApiError::Validation("category already exists".into())
        } else {
            e.into()
        }
    })?;
    Ok((StatusCode::CREATED, ApiResponse::ok(category)))
}
