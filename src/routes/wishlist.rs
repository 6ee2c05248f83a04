//! Wishlist routes: one row per (user, product), create and delete only.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError};
use crate::identity::AuthUser;
use crate::models::{Product, WishlistItem};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(get_wishlist).post(add_to_wishlist))
        .route("/wishlist/:product_id", axum::routing::delete(remove_from_wishlist))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WishlistLine {
    item: WishlistItem,
    product: Option<Product>,
}

async fn get_wishlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<WishlistLine>>>, ApiError> {
    let items = sqlx::query_as::<_, WishlistItem>(
        "SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&state.db)
        .await?;
    let mut by_id: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();

    let lines = items
        .into_iter()
        .map(|item| {
            let product = by_id.remove(&item.product_id);
            WishlistLine { item, product }
        })
        .collect();
    Ok(ApiResponse::ok(lines))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddToWishlistRequest {
    product_id: Uuid,
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<AddToWishlistRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WishlistItem>>), ApiError> {
    let exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND status = 'ACTIVE'")
            .bind(req.product_id)
            .fetch_optional(&state.db)
            .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound("product"));
    }

    let item = sqlx::query_as::<_, WishlistItem>(
        "INSERT INTO wishlist_items (id, user_id, product_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(req.product_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Validation("product already in wishlist".into())
        } else {
            e.into()
        }
    })?;
    Ok((StatusCode::CREATED, ApiResponse::ok(item)))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted =
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.id)
            .bind(product_id)
            .execute(&state.db)
            .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("wishlist item"));
    }
    Ok(StatusCode::NO_CONTENT)
}
