pub mod brick;
pub mod execution_report;
pub mod market_data;
pub mod order;
pub mod symbol;
