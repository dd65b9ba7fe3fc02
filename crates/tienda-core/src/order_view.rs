use rust_decimal::Decimal;

/// A cart line as seen by notification formatting.
///
/// Lines that survived persistence carry the catalog product (and variant
/// descriptor, if any); synthetic lines such as the shipping charge only
/// have a display name. Formatters match on the variant instead of probing
/// for field presence.
#[derive(Debug, Clone)]
pub enum OrderLineView {
    Persisted {
        sku: String,
        product_name: String,
        variant: Option<String>,
        quantity: i32,
        unit_price: Decimal,
    },
    Ephemeral {
        name: String,
        quantity: i32,
        unit_price: Decimal,
    },
}

impl OrderLineView {
    /// Display label: "name (variant)" for persisted lines with a variant.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            OrderLineView::Persisted {
                product_name,
                variant: Some(v),
                ..
            } => format!("{product_name} ({v})"),
            OrderLineView::Persisted { product_name, .. } => product_name.clone(),
            OrderLineView::Ephemeral { name, .. } => name.clone(),
        }
    }

    /// Correlation key sent to the management platform: the SKU when the
    /// line is catalog-backed, a name fallback otherwise.
    #[must_use]
    pub fn correlation_sku(&self) -> String {
        match self {
            OrderLineView::Persisted { sku, .. } => sku.clone(),
            OrderLineView::Ephemeral { name, .. } => format!("ITEM-{name}"),
        }
    }

    #[must_use]
    pub fn quantity(&self) -> i32 {
        match self {
            OrderLineView::Persisted { quantity, .. } | OrderLineView::Ephemeral { quantity, .. } => {
                *quantity
            }
        }
    }

    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        match self {
            OrderLineView::Persisted { unit_price, .. }
            | OrderLineView::Ephemeral { unit_price, .. } => *unit_price,
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity()) * self.unit_price()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_label_includes_variant() {
        let line = OrderLineView::Persisted {
            sku: "MATE-M-ROJO".to_string(),
            product_name: "Mate Imperial".to_string(),
            variant: Some("M / rojo".to_string()),
            quantity: 2,
            unit_price: "1500.00".parse().unwrap(),
        };
        assert_eq!(line.label(), "Mate Imperial (M / rojo)");
        assert_eq!(line.correlation_sku(), "MATE-M-ROJO");
        assert_eq!(line.line_total(), "3000.00".parse().unwrap());
    }

    #[test]
    fn ephemeral_label_uses_name() {
        let line = OrderLineView::Ephemeral {
            name: "Costo de envío".to_string(),
            quantity: 1,
            unit_price: "10000".parse().unwrap(),
        };
        assert_eq!(line.label(), "Costo de envío");
        assert_eq!(line.correlation_sku(), "ITEM-Costo de envío");
    }
}
