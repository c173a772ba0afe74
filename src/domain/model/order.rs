use std::fmt;

use rust_decimal::Decimal;

use crate::domain::enums::Side;
use crate::domain::model::brick::Brick;
use crate::domain::model::symbol::Symbol;

/// A strategy-owned limit order. `create_time`/`execute_time` stay zero
/// until the matching execution report arrives. `linked_entry_brick` is the
/// brick that opened the order; `linked_exit_brick` is set once a brick's
/// close makes the resting order eligible to be considered closed.
#[derive(Clone, Debug)]
pub struct StrategyOrder {
    pub symbol: Symbol,
    pub cl_ord_id: String,
    pub exchange_order_id: Option<String>,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub create_time: i64,
    pub execute_time: i64,
    pub linked_entry_brick: Option<Brick>,
    pub linked_exit_brick: Option<Brick>,
}

impl StrategyOrder {
    pub fn new(
        symbol: Symbol,
        cl_ord_id: impl Into<String>,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            symbol,
            cl_ord_id: cl_ord_id.into(),
            exchange_order_id: None,
            side,
            price,
            size,
            create_time: 0,
            execute_time: 0,
            linked_entry_brick: None,
            linked_exit_brick: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.execute_time != 0
    }

    /// Short label for the presentation boundary, e.g. `B Lim (0.0100) @ 120.00`.
    pub fn display_text(&self) -> String {
        let label = match (self.side, self.is_filled()) {
            (Side::Buy, false) => "B Lim",
            (Side::Buy, true) => "Buy",
            (Side::Sell, false) => "S Lim",
            (Side::Sell, true) => "Sell",
        };
        format!("{} ({}) @ {}", label, self.size, self.price)
    }
}

impl fmt::Display for StrategyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order{{symbol={}, clOrdId={}, side={:?}, price={}, size={}}}",
            self.symbol, self.cl_ord_id, self.side, self.price, self.size
        )
    }
}
