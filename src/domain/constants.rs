// Vendor-specific FIX tags carried on SecurityList entries and trade prints.
pub const TAG_PRICE_PRECISION: u32 = 5001;
pub const TAG_SIZE_PRECISION: u32 = 5002;
pub const TAG_AGGRESSOR_SIDE: u32 = 2446;

/// Session qualifier that marks the order-entry session; the market-data
/// session carries no qualifier.
pub const TRADE_SESSION_QUALIFIER: &str = "TRADE";

pub const EXCHANGE: &str = "BINANCE";
pub const SECURITY_TYPE_CRYPTOSPOT: &str = "CRYPTOSPOT";

pub const INVALID_OR_UNSUPPORTED_REQUEST: &str = "Invalid or unsupported request";
pub const NO_INSTRUMENTS_FOUND: &str = "No instruments found that match selection criteria";
pub const NOT_AUTHORIZED: &str = "Not authorized to retrieve instrument data";
