use std::fmt;

use rust_decimal::Decimal;

/// A renko brick: emitted only when price has moved a full brick-size
/// increment, immutable once emitted. `time` is strictly increasing across
/// bricks.
#[derive(Clone, Debug, PartialEq)]
pub struct Brick {
    pub time: i64,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl Brick {
    pub fn new(time: i64, open: Decimal, close: Decimal) -> Self {
        Self {
            time,
            open,
            close,
            high: open.max(close),
            low: open.min(close),
        }
    }

    pub fn is_rising(&self) -> bool {
        self.open < self.close
    }
}

impl fmt::Display for Brick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Brick{{time={}, open={}, close={}}}",
            self.time, self.open, self.close
        )
    }
}
