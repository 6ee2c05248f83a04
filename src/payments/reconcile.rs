//! Settlement of gateway payment results against orders.
//!
//! Both confirmation triggers (the synchronous verify route and the
//! asynchronous webhook) funnel into [`apply_payment_result`], keyed by
//! (order id, gateway payment id). Replays of an already-applied payment id
//! are no-ops. Inventory was reserved when the order was created, so a
//! captured payment only flips status fields; a failed payment releases the
//! reservation.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Captured,
    Failed,
}

/// Applies one payment result atomically. Returns the settled order.
pub async fn apply_payment_result(
    db: &PgPool,
    order_id: Uuid,
    payment_id: &str,
    outcome: PaymentOutcome,
) -> Result<Order, ApiError> {
    let mut tx = db.begin().await?;

    let updated = match outcome {
        PaymentOutcome::Captured => {
            sqlx::query_as::<_, Order>(
                "UPDATE orders \
                 SET status = 'CONFIRMED', payment_status = 'COMPLETED', \
                     payment_id = $2, updated_at = NOW() \
                 WHERE id = $1 AND status = 'PENDING' \
                 RETURNING *",
            )
            .bind(order_id)
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
        }
        PaymentOutcome::Failed => {
            let cancelled = sqlx::query_as::<_, Order>(
                "UPDATE orders \
                 SET status = 'CANCELLED', payment_status = 'FAILED', \
                     payment_id = $2, updated_at = NOW() \
                 WHERE id = $1 AND status = 'PENDING' \
                 RETURNING *",
            )
            .bind(order_id)
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
            if cancelled.is_some() {
                release_reserved_inventory(&mut tx, order_id).await?;
            }
            cancelled
        }
    };

    let order = match updated {
        Some(order) => order,
        // The guarded update matched nothing: either the order is unknown,
        // or it already settled. A replay of the same payment id succeeds
        // as a no-op; anything else is rejected.
        None => {
            let existing = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(ApiError::NotFound("order"))?;
            if existing.payment_id.as_deref() == Some(payment_id) {
                tracing::info!(%order_id, payment_id, "payment result replayed, ignoring");
                existing
            } else {
                return Err(ApiError::Validation(
                    "order is not awaiting payment".into(),
                ));
            }
        }
    };

    tx.commit().await?;
    Ok(order)
}

/// Puts back the quantities the order reserved at creation. Also used by
/// explicit order cancellation.
pub(crate) async fn release_reserved_inventory(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products p \
         SET inventory = p.inventory + oi.quantity, updated_at = NOW() \
         FROM order_items oi \
         WHERE oi.order_id = $1 AND oi.product_id = p.id",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Webhook envelope posted by the gateway. The interesting entity sits at
/// `payload.payment.entity` for payment events and `payload.order.entity`
/// for order events.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookEntity>,
    #[serde(default)]
    pub order: Option<WebhookEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntity {
    pub entity: GatewayEntity,
}

#[derive(Debug, Deserialize)]
pub struct GatewayEntity {
    pub id: String,
    #[serde(default)]
    pub notes: GatewayNotes,
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewayNotes {
    #[serde(rename = "orderId")]
    pub order_id: Option<Uuid>,
}

impl WebhookEvent {
    /// Event-name dispatch; unknown events are acknowledged upstream
    /// without an outcome.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self.event.as_str() {
            "payment.captured" | "order.paid" => Some(PaymentOutcome::Captured),
            "payment.failed" => Some(PaymentOutcome::Failed),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&GatewayEntity> {
        self.payload
            .payment
            .as_ref()
            .or(self.payload.order.as_ref())
            .map(|e| &e.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_captured() {
        let body = r#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_123",
                        "notes": { "orderId": "0190b5a4-0000-7000-8000-000000000000" }
                    }
                }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.outcome(), Some(PaymentOutcome::Captured));
        let entity = event.entity().unwrap();
        assert_eq!(entity.id, "pay_123");
        assert!(entity.notes.order_id.is_some());
    }

    #[test]
    fn test_parse_payment_failed() {
        let body = r#"{
            "event": "payment.failed",
            "payload": {
                "payment": { "entity": { "id": "pay_9", "notes": {} } }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.outcome(), Some(PaymentOutcome::Failed));
        assert!(event.entity().unwrap().notes.order_id.is_none());
    }

    #[test]
    fn test_parse_order_paid_uses_order_entity() {
        let body = r#"{
            "event": "order.paid",
            "payload": {
                "order": {
                    "entity": {
                        "id": "order_G8",
                        "notes": { "orderId": "0190b5a4-0000-7000-8000-000000000001" }
                    }
                }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.outcome(), Some(PaymentOutcome::Captured));
        assert_eq!(event.entity().unwrap().id, "order_G8");
    }

    #[test]
    fn test_unknown_event_has_no_outcome() {
        let body = r#"{ "event": "refund.created", "payload": {} }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.outcome(), None);
        assert!(event.entity().is_none());
    }

    #[test]
    fn test_payment_entity_preferred_over_order() {
        let body = r#"{
            "event": "payment.captured",
            "payload": {
                "payment": { "entity": { "id": "pay_1", "notes": {} } },
                "order": { "entity": { "id": "order_1", "notes": {} } }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.entity().unwrap().id, "pay_1");
    }
}
