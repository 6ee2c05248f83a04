//! Order domain: status machines, order numbers, pricing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat GST applied to the discounted subtotal.
pub const TAX_RATE_PERCENT: i64 = 18;
/// Shipping is waived when the subtotal exceeds this (minor units, ₹500).
pub const FREE_SHIPPING_THRESHOLD: i64 = 500_00;
/// Flat shipping fee below the threshold (minor units, ₹50).
pub const FLAT_SHIPPING_FEE: i64 = 50_00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// The only transitions exposed are PENDING → CONFIRMED and
    /// PENDING → CANCELLED; settled orders never move again.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub fn is_settled(self) -> bool {
        self != OrderStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Human-readable order number: time component plus random suffix. No
/// collision detection; the unique index on the column backstops the
/// astronomically unlikely clash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u16 = rand::random::<u16>() % 10_000;
        Self(format!("ORD-{millis}-{suffix:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived charges for an order, computed once at creation and persisted;
/// never recomputed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
}

impl PricingBreakdown {
    /// `total = subtotal - discount + tax + shipping`, with
    /// `tax = round(18% of (subtotal - discount))` half-up on minor units.
    /// The discount is caller-supplied and applied verbatim, clamped to
    /// `0..=subtotal` so a crafted value cannot drive the total negative.
    pub fn compute(subtotal: i64, discount: i64) -> Self {
        let discount = discount.clamp(0, subtotal);
        let taxable = subtotal - discount;
        let tax = (taxable * TAX_RATE_PERCENT + 50) / 100;
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            0
        } else {
            FLAT_SHIPPING_FEE
        };
        Self {
            subtotal,
            discount,
            tax,
            shipping,
            total: taxable + tax + shipping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_worked_example() {
        // Two units at ₹500: subtotal ₹1000 clears the free-shipping bar.
        let p = PricingBreakdown::compute(2 * 500_00, 0);
        assert_eq!(p.subtotal, 1000_00);
        assert_eq!(p.tax, 180_00);
        assert_eq!(p.shipping, 0);
        assert_eq!(p.total, 1180_00);
        assert_eq!(p.total, p.subtotal - p.discount + p.tax + p.shipping);
    }

    #[test]
    fn test_flat_shipping_below_threshold() {
        let p = PricingBreakdown::compute(400_00, 0);
        assert_eq!(p.shipping, FLAT_SHIPPING_FEE);
        assert_eq!(p.total, 400_00 + 72_00 + 50_00);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly ₹500 still pays shipping; the rule is subtotal > threshold.
        let p = PricingBreakdown::compute(500_00, 0);
        assert_eq!(p.shipping, FLAT_SHIPPING_FEE);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 18% of 333 paise = 59.94 → 60.
        let p = PricingBreakdown::compute(333, 0);
        assert_eq!(p.tax, 60);
        // 18% of 325 = 58.5 → 59.
        let p = PricingBreakdown::compute(325, 0);
        assert_eq!(p.tax, 59);
    }

    #[test]
    fn test_discount_reduces_taxable_amount() {
        let p = PricingBreakdown::compute(1000_00, 200_00);
        assert_eq!(p.tax, 144_00);
        assert_eq!(p.total, 800_00 + 144_00);
    }

    #[test]
    fn test_discount_clamped() {
        let p = PricingBreakdown::compute(100_00, 500_00);
        assert_eq!(p.discount, 100_00);
        assert!(p.total >= 0);
        let p = PricingBreakdown::compute(100_00, -50_00);
        assert_eq!(p.discount, 0);
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Pending));
        assert!(OrderStatus::Confirmed.is_settled());
        assert!(!OrderStatus::Pending.is_settled());
    }

    #[test]
    fn test_order_number_shape() {
        let n = OrderNumber::generate();
        let parts: Vec<&str> = n.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
    }
}
