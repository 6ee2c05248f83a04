//! Shopping cart routes. The cart is a per-user mutable collection with a
//! price snapshot per line; totals are recalculated client-side and the cart
//! only becomes an order at checkout.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::models::{CartItem, Product};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/cart/:product_id", patch(update_quantity).delete(remove_item))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartLine {
    item: CartItem,
    product: Option<Product>,
}

async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<CartLine>>>, ApiError> {
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&state.db)
        .await?;
    let mut by_id: HashMap<Uuid, Product> =
        products.into_iter().map(|p| (p.id, p)).collect();

    let lines = items
        .into_iter()
        .map(|item| {
            let product = by_id.remove(&item.product_id);
            CartLine { item, product }
        })
        .collect();
    Ok(ApiResponse::ok(lines))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    product_id: Uuid,
    quantity: i32,
}

async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartItem>>), ApiError> {
    if req.quantity < 1 {
        return Err(ApiError::Validation("quantity must be at least 1".into()));
    }
    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status = 'ACTIVE'")
            .bind(req.product_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(ApiError::NotFound("product"))?;

    let item = sqlx::query_as::<_, CartItem>(
        "INSERT INTO cart_items (id, user_id, product_id, quantity, unit_price) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id, product_id) DO UPDATE \
         SET quantity = cart_items.quantity + EXCLUDED.quantity, \
             unit_price = EXCLUDED.unit_price, updated_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(product.id)
    .bind(req.quantity)
    .bind(product.price)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(item)))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

async fn update_quantity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<StatusCode, ApiError> {
    if req.quantity < 0 {
        return Err(ApiError::Validation("quantity must not be negative".into()));
    }
    if req.quantity == 0 {
        return remove_row(&state, user.id, product_id).await;
    }
    let updated = sqlx::query(
        "UPDATE cart_items SET quantity = $3, updated_at = NOW() \
         WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user.id)
    .bind(product_id)
    .bind(req.quantity)
    .execute(&state.db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove_row(&state, user.id, product_id).await
}

async fn clear_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_row(state: &AppState, user_id: Uuid, product_id: Uuid) -> Result<StatusCode, ApiError> {
    let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(StatusCode::NO_CONTENT)
}
