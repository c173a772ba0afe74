use rust_decimal::Decimal;

use crate::domain::enums::{OrderOperation, SessionStatus};
use crate::domain::model::brick::Brick;
use crate::domain::model::execution_report::ExecutionReport;
use crate::domain::model::market_data::MarketDataUpdate;
use crate::domain::model::order::StrategyOrder;
use crate::domain::model::symbol::Symbol;

/// Everything that crosses the dispatcher, as one closed sum type. Dispatch
/// goes by [`EventKind`], so adding a variant forces every match to be
/// revisited at compile time.
#[derive(Clone, Debug)]
pub enum Event {
    /// One logical order-book refresh, applied atomically.
    MarketData(Vec<MarketDataUpdate>),
    /// Trade prints from an incremental refresh.
    Trades(Vec<MarketDataUpdate>),
    /// Deduplicated top-of-book (or trade) price signal.
    Price(Decimal),
    Brick(Brick),
    /// OMS towards the execution venue.
    OrderCommand(OrderCommand),
    /// OMS towards the presentation boundary.
    OrderNotification(OrderNotification),
    ExecutionReport(ExecutionReport),
    /// Full instrument list, sorted by name.
    SecurityList(Vec<Symbol>),
    SecurityListRequest,
    Subscribe(Symbol),
    Session(SessionStatus),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    MarketData,
    Trades,
    Price,
    Brick,
    OrderCommand,
    OrderNotification,
    ExecutionReport,
    SecurityList,
    SecurityListRequest,
    Subscribe,
    Session,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MarketData(_) => EventKind::MarketData,
            Event::Trades(_) => EventKind::Trades,
            Event::Price(_) => EventKind::Price,
            Event::Brick(_) => EventKind::Brick,
            Event::OrderCommand(_) => EventKind::OrderCommand,
            Event::OrderNotification(_) => EventKind::OrderNotification,
            Event::ExecutionReport(_) => EventKind::ExecutionReport,
            Event::SecurityList(_) => EventKind::SecurityList,
            Event::SecurityListRequest => EventKind::SecurityListRequest,
            Event::Subscribe(_) => EventKind::Subscribe,
            Event::Session(_) => EventKind::Session,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderCommand {
    pub operation: OrderOperation,
    pub order: StrategyOrder,
}

impl OrderCommand {
    pub fn new(operation: OrderOperation, order: StrategyOrder) -> Self {
        Self { operation, order }
    }
}

#[derive(Clone, Debug)]
pub struct OrderNotification {
    pub operation: OrderOperation,
    pub order: StrategyOrder,
}

impl OrderNotification {
    pub fn new(operation: OrderOperation, order: StrategyOrder) -> Self {
        Self { operation, order }
    }
}
