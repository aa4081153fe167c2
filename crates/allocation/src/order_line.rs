use serde::{Deserialize, Serialize};

use stockalloc_core::{DomainError, DomainResult, OrderId, Sku, ValueObject};

/// A request to obtain `qty` units of `sku` for `orderid`.
///
/// Equality, ordering and hashing cover all three fields, so two lines with
/// the same attributes are the same line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    orderid: OrderId,
    sku: Sku,
    qty: u64,
}

impl ValueObject for OrderLine {}

impl OrderLine {
    /// Build a line from caller input, rejecting non-positive quantities.
    pub fn new(orderid: OrderId, sku: Sku, qty: i64) -> DomainResult<Self> {
        if qty <= 0 {
            return Err(DomainError::InvalidQuantity(qty));
        }
        Ok(Self {
            orderid,
            sku,
            qty: qty.unsigned_abs(),
        })
    }

    pub fn orderid(&self) -> &OrderId {
        &self.orderid
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn qty(&self) -> u64 {
        self.qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64) -> DomainResult<OrderLine> {
        OrderLine::new(
            OrderId::new("order-1").unwrap(),
            Sku::new("SMALL-TABLE").unwrap(),
            qty,
        )
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        assert_eq!(line(0).unwrap_err(), DomainError::InvalidQuantity(0));
        assert_eq!(line(-5).unwrap_err(), DomainError::InvalidQuantity(-5));
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(line(2).unwrap(), line(2).unwrap());
        assert_ne!(line(2).unwrap(), line(3).unwrap());
    }
}
