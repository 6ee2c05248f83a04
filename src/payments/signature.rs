//! HMAC-SHA256 signature checks for both gateway contracts: the checkout
//! callback signature over `orderId|paymentId`, and the webhook signature
//! over the raw request body. Signatures arrive hex-encoded; comparison is
//! constant-time via `Mac::verify_slice`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature encoding")]
    Encoding,
    #[error("signature mismatch")]
    Mismatch,
}

/// Hex HMAC of `message`, as the gateway computes it. Exposed for tests
/// and for signing fixtures.
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn verify(secret: &[u8], message: &[u8], signature_hex: &str) -> Result<(), SignatureError> {
    let signature = hex::decode(signature_hex).map_err(|_| SignatureError::Encoding)?;
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(message);
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Checkout callback: `HMAC(key_secret, "{gateway_order_id}|{payment_id}")`.
pub fn verify_checkout_signature(
    key_secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let message = format!("{gateway_order_id}|{payment_id}");
    verify(key_secret.as_bytes(), message.as_bytes(), signature_hex)
}

/// Webhook: `HMAC(webhook_secret, raw_body)`.
pub fn verify_webhook_signature(
    webhook_secret: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), SignatureError> {
    verify(webhook_secret.as_bytes(), body, signature_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_signature_roundtrip() {
        let sig = sign(b"secret", b"order_abc|pay_def");
        assert_eq!(
            verify_checkout_signature("secret", "order_abc", "pay_def", &sig),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let mut sig = sign(b"secret", b"order_abc|pay_def");
        // Flip a nibble.
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        assert_eq!(
            verify_checkout_signature("secret", "order_abc", "pay_def", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_signature_bound_to_payment_id() {
        let sig = sign(b"secret", b"order_abc|pay_def");
        assert_eq!(
            verify_checkout_signature("secret", "order_abc", "pay_OTHER", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let sig = sign(b"secret", b"order_abc|pay_def");
        assert_eq!(
            verify_checkout_signature("other", "order_abc", "pay_def", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_non_hex_signature_is_encoding_error() {
        assert_eq!(
            verify_checkout_signature("secret", "o", "p", "not-hex!!"),
            Err(SignatureError::Encoding)
        );
    }

    #[test]
    fn test_webhook_body_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign(b"whsec", body);
        assert_eq!(verify_webhook_signature("whsec", body, &sig), Ok(()));
        assert_eq!(
            verify_webhook_signature("whsec", br#"{"event":"tampered"}"#, &sig),
            Err(SignatureError::Mismatch)
        );
    }
}
