//! Renko-brick scalping strategy: order book and trade prints in, bricks
//! out, limit orders around every brick.

pub mod book;
pub mod oms;
pub mod renko;
pub mod scalper;

pub use scalper::{RenkoScalper, ScalperConfig};
