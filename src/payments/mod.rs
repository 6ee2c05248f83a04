//! Payment capture via the third-party gateway: intent creation, signature
//! verification, and the single idempotent settlement path shared by the
//! synchronous verify route and the asynchronous webhook.

pub mod gateway;
pub mod reconcile;
pub mod signature;

pub use gateway::{create_gateway_order, GatewayOrder};
pub use reconcile::{apply_payment_result, PaymentOutcome, WebhookEvent};
pub use signature::{verify_checkout_signature, verify_webhook_signature};
