//! Outbound calls to the payment gateway.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::PaymentConfig;

/// Gateway-side order (payment intent) as returned by the create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Creates a gateway order for `amount` minor units. The local order id
/// rides along in `notes` so webhook events can be keyed back to it.
pub async fn create_gateway_order(
    http: &reqwest::Client,
    cfg: &PaymentConfig,
    amount: i64,
    receipt: &str,
    local_order_id: Uuid,
) -> anyhow::Result<GatewayOrder> {
    let url = format!("{}/v1/orders", cfg.api_url);
    let body = json!({
        "amount": amount,
        "currency": "INR",
        "receipt": receipt,
        "notes": { "orderId": local_order_id },
    });
    let order = http
        .post(&url)
        .basic_auth(&cfg.key_id, Some(&cfg.key_secret))
        .json(&body)
        .send()
        .await
        .context("payment gateway unreachable")?
        .error_for_status()
        .context("payment gateway rejected order creation")?
        .json::<GatewayOrder>()
        .await
        .context("malformed payment gateway response")?;
    Ok(order)
}
