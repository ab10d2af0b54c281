//! Cart line model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use opaline_core::ProductId;

/// One product entry in a cart.
///
/// The price is snapshotted when the line is created; later catalog changes do
/// not touch lines already in a cart. Line identity is a string: guest lines
/// get a client-side style `guest-…` identifier, persisted lines carry their
/// database row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// Total for this line (`unit_price × quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The product fields captured into a cart line at add time.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let line = CartLine {
            id: "guest-1".to_owned(),
            product_id: ProductId::from("P1"),
            product_name: "Opal pendant".to_owned(),
            product_image: None,
            unit_price: Decimal::new(50000, 2),
            quantity: 3,
        };
        assert_eq!(line.line_total(), Decimal::new(150_000, 2));
    }
}
