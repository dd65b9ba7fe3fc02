use rust_decimal::Decimal;

/// Resolves the price a storefront visitor actually sees.
///
/// An explicit admin override wins outright; otherwise a discount
/// percentage (clamped to 0..=100) is applied to the base price. The
/// stored base `price` is never mutated by either layer.
#[must_use]
pub fn effective_price(
    price: Decimal,
    price_override: Option<Decimal>,
    discount_percentage: i32,
) -> Decimal {
    if let Some(p) = price_override {
        return p;
    }
    let discount = discount_percentage.clamp(0, 100);
    if discount > 0 {
        let factor = Decimal::from(100 - i64::from(discount)) / Decimal::from(100);
        return price * factor;
    }
    price
}
