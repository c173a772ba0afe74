pub mod config_loader;
pub mod domain;
pub mod infrastructure;
pub mod strategies;

pub use domain::constants::*;
pub use domain::enums::*;
pub use domain::events::*;
pub use domain::model::brick::*;
pub use domain::model::execution_report::*;
pub use domain::model::market_data::*;
pub use domain::model::order::*;
pub use domain::model::symbol::*;
pub use infrastructure::bus::EventBus;
pub use infrastructure::fix::*;
pub use strategies::renko_scalper::*;
