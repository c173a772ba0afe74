use rust_decimal::Decimal;

use crate::domain::enums::Side;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Trade,
    Snapshot,
    New,
    Update,
    Delete,
    Reset,
}

/// One market-data entry. A `Vec<MarketDataUpdate>` published on the bus is
/// one logical refresh and is applied to the book atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketDataUpdate {
    pub price: Decimal,
    pub size: Decimal,
    pub kind: UpdateKind,
    pub side: Side,
}

impl MarketDataUpdate {
    pub fn new(price: Decimal, size: Decimal, kind: UpdateKind, side: Side) -> Self {
        Self {
            price,
            size,
            kind,
            side,
        }
    }
}
