use rust_decimal::Decimal;

use crate::payloads::DeliveryMethod;

/// Shipping-cost rules for checkout.
///
/// Deliberately a plain value handed in at construction time rather than
/// module-level state: the rules come from [`crate::AppConfig`] and every
/// caller computes against the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingRules {
    /// Flat rate charged for home delivery below the free threshold.
    pub flat_rate: Decimal,
    /// Cart totals at or above this amount ship free.
    pub free_threshold: Decimal,
}

impl ShippingRules {
    /// Cost of delivering a cart with the given products total.
    ///
    /// Pickup is always free; home delivery is free at or above the
    /// configured threshold, otherwise the flat rate applies.
    #[must_use]
    pub fn cost(&self, products_total: Decimal, method: DeliveryMethod) -> Decimal {
        match method {
            DeliveryMethod::Pickup => Decimal::ZERO,
            DeliveryMethod::Shipping => {
                if products_total >= self.free_threshold {
                    Decimal::ZERO
                } else {
                    self.flat_rate
                }
            }
        }
    }

    /// Human-readable description of the quoted cost, mirrored in the
    /// storefront's shipping-quote response.
    #[must_use]
    pub fn describe(&self, cost: Decimal, method: DeliveryMethod) -> &'static str {
        match method {
            DeliveryMethod::Pickup => "Retiro en local (gratis)",
            DeliveryMethod::Shipping if cost.is_zero() => "Envío gratis",
            DeliveryMethod::Shipping => "Envío fijo",
        }
    }
}
