//! Payment routes: intent creation against the gateway, the synchronous
//! verification callback, and the gateway's asynchronous webhook. Both
//! confirmation paths settle through `payments::apply_payment_result`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::AuthUser;
use crate::models::Order;
use crate::payments::{
    self, apply_payment_result, reconcile::PaymentOutcome, verify_checkout_signature,
    verify_webhook_signature,
};
use crate::response::ApiResponse;
use crate::state::AppState;

const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/create", post(create_payment))
        .route("/payments/verify", post(verify_payment))
        .route("/payments/webhook", post(webhook))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest {
    order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentData {
    gateway_order_id: String,
    amount: i64,
    currency: String,
    key_id: String,
}

async fn create_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<CreatePaymentData>>, ApiError> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 AND buyer_id = $2",
    )
    .bind(req.order_id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("order"))?;
    if order.status.is_settled() {
        return Err(ApiError::Validation("order is not awaiting payment".into()));
    }

    let cfg = &state.config.payment;
    let gateway_order = payments::create_gateway_order(
        &state.http,
        cfg,
        order.total,
        &order.order_number,
        order.id,
    )
    .await?;

    sqlx::query("UPDATE orders SET gateway_order_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(order.id)
        .bind(&gateway_order.id)
        .execute(&state.db)
        .await?;

    Ok(ApiResponse::ok(CreatePaymentData {
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        key_id: cfg.key_id.clone(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentRequest {
    gateway_order_id: String,
    payment_id: String,
    signature: String,
}

async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    verify_checkout_signature(
        &state.config.payment.key_secret,
        &req.gateway_order_id,
        &req.payment_id,
        &req.signature,
    )
    .map_err(|_| ApiError::SignatureMismatch)?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE gateway_order_id = $1 AND buyer_id = $2",
    )
    .bind(&req.gateway_order_id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("order"))?;

    let order =
        apply_payment_result(&state.db, order.id, &req.payment_id, PaymentOutcome::Captured)
            .await?;
    Ok(ApiResponse::ok(order))
}

/// Gateway callbacks carry their own HMAC over the raw body. Failures are
/// answered with an error status; the gateway retries on its own schedule.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::SignatureMismatch)?;
    verify_webhook_signature(&state.config.payment.webhook_secret, &body, signature)
        .map_err(|_| ApiError::SignatureMismatch)?;

    let event: payments::WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation("malformed webhook payload".into()))?;

    let Some(outcome) = event.outcome() else {
        tracing::debug!(event = %event.event, "ignoring webhook event");
        return Ok(ApiResponse::ok(json!({ "received": true })));
    };
    let entity = event
        .entity()
        .ok_or_else(|| ApiError::Validation("webhook payload missing entity".into()))?;
    let order_id = entity
        .notes
        .order_id
        .ok_or_else(|| ApiError::Validation("webhook entity missing orderId note".into()))?;

    let order = apply_payment_result(&state.db, order_id, &entity.id, outcome).await?;
    tracing::info!(
        event = %event.event,
        order_number = %order.order_number,
        "webhook applied"
    );
    Ok(ApiResponse::ok(json!({ "received": true })))
}
