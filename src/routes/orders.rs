//! Order routes. Checkout converts an item list into a priced order inside
//! one transaction: header, line items, inventory reservation, and cart
//! cleanup all commit or all roll back.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::order::{OrderNumber, PricingBreakdown};
use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::models::{Order, OrderItem, Product, User};
use crate::payments::reconcile::release_reserved_inventory;
use crate::response::{ApiResponse, PageMeta, PageParams};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_my_orders).post(create_order))
        .route("/orders/:id", get(get_order).delete(cancel_order))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    items: Vec<OrderLineRequest>,
    #[serde(default)]
    discount: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineRequest {
    product_id: Uuid,
    quantity: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyerSummary {
    id: Uuid,
    name: String,
    email: String,
}

impl From<&User> for BuyerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderDetail {
    order: Order,
    items: Vec<OrderItem>,
    buyer: BuyerSummary,
}

async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    for line in &req.items {
        if line.quantity < 1 {
            return Err(ApiError::Validation(format!(
                "invalid quantity for product {}",
                line.product_id
            )));
        }
    }

    let mut tx = state.db.begin().await?;

    // Price from the products' current state, all-or-nothing.
    let mut subtotal = 0i64;
    let mut lines: Vec<(Product, i32)> = Vec::with_capacity(req.items.len());
    for line in &req.items {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(line.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::Validation(format!("product {} not found", line.product_id)))?;
        if line.quantity > product.inventory {
            return Err(ApiError::Validation(format!(
                "insufficient inventory for {}",
                product.title
            )));
        }
        subtotal += product.price * i64::from(line.quantity);
        lines.push((product, line.quantity));
    }

    let pricing = PricingBreakdown::compute(subtotal, req.discount);
    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders \
         (id, order_number, buyer_id, subtotal, discount, tax, shipping, total) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(OrderNumber::generate().as_str())
    .bind(user.id)
    .bind(pricing.subtotal)
    .bind(pricing.discount)
    .bind(pricing.tax)
    .bind(pricing.shipping)
    .bind(pricing.total)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (product, quantity) in &lines {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items \
             (id, order_id, product_id, title, quantity, unit_price, line_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(order.id)
        .bind(product.id)
        .bind(&product.title)
        .bind(*quantity)
        .bind(product.price)
        .bind(product.price * i64::from(*quantity))
        .fetch_one(&mut *tx)
        .await?;

        // Reservation: the guard catches a concurrent checkout that drained
        // stock between the read above and here.
        let reserved = sqlx::query(
            "UPDATE products SET inventory = inventory - $2, updated_at = NOW() \
             WHERE id = $1 AND inventory >= $2",
        )
        .bind(product.id)
        .bind(*quantity)
        .execute(&mut *tx)
        .await?;
        if reserved.rows_affected() == 0 {
            return Err(ApiError::Validation(format!(
                "insufficient inventory for {}",
                product.title
            )));
        }
        items.push(item);
    }

    let ordered_ids: Vec<Uuid> = lines.iter().map(|(p, _)| p.id).collect();
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
        .bind(user.id)
        .bind(&ordered_ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(order_number = %order.order_number, total = order.total, "order created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(OrderDetail {
            order,
            items,
            buyer: BuyerSummary::from(&user),
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderWithItems {
    order: Order,
    items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrdersPage {
    orders: Vec<OrderWithItems>,
    pagination: PageMeta,
}

async fn list_my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<OrdersPage>>, ApiError> {
    let (page, limit) = params.normalized();
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE buyer_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(i64::from(limit))
    .bind(params.offset())
    .fetch_all(&state.db)
    .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = ANY($1)",
    )
    .bind(&order_ids)
    .fetch_all(&state.db)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    let orders = orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect();

    Ok(ApiResponse::ok(OrdersPage {
        orders,
        pagination: PageMeta::new(page, limit, total),
    }))
}

async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 AND buyer_id = $2",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("order"))?;
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&state.db)
    .await?;
    Ok(ApiResponse::ok(OrderDetail {
        order,
        items,
        buyer: BuyerSummary::from(&user),
    }))
}

/// Explicit cancellation of a still-pending order; releases the inventory
/// reserved at creation.
async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let mut tx = state.db.begin().await?;
    let cancelled = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'CANCELLED', updated_at = NOW() \
         WHERE id = $1 AND buyer_id = $2 AND status = 'PENDING' \
         RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::NotFound("order"))?;
    release_reserved_inventory(&mut tx, cancelled.id).await?;
    tx.commit().await?;
    tracing::info!(order_number = %cancelled.order_number, "order cancelled");
    Ok(ApiResponse::ok(cancelled))
}
