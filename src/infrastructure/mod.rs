pub mod bus;
pub mod fix;
