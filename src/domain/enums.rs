use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Operation carried by order commands (towards the exchange) and order
/// notifications (towards the presentation boundary).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderOperation {
    Add,
    Delete,
    Fill,
}

/// Status of the market-data session only; the order-entry session is not
/// surfaced as a strategy signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Connected,
    Disconnected,
}

/// Where the price signal that feeds the renko engine comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Trades,
    BestBid,
    BestAsk,
    Mid,
}
