pub mod constants;
pub mod enums;
pub mod events;
pub mod model;
