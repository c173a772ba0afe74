//! Outbound message construction. One function per message the engine
//! sends, mirroring the venue's FIX 4.4 dialect.

use chrono::Utc;

use crate::domain::constants::SECURITY_TYPE_CRYPTOSPOT;
use crate::domain::enums::Side;
use crate::domain::model::order::StrategyOrder;
use crate::infrastructure::fix::codec::{msg_type, tags, FixMessage};

const ORD_TYPE_LIMIT: char = '2';
const TIME_IN_FORCE_GTC: char = '1';
const SUBSCRIBE_SNAPSHOT_UPDATES: char = '1';
const UNSUBSCRIBE: char = '2';
const SECURITY_LIST_ALL: char = '4';
const MD_ENTRY_BID: char = '0';
const MD_ENTRY_OFFER: char = '1';
const MD_ENTRY_TRADE: char = '2';

pub fn transact_time_now() -> String {
    Utc::now().format("%Y%m%d-%H:%M:%S%.3f").to_string()
}

fn side_to_fix(side: Side) -> char {
    match side {
        Side::Buy => '1',
        Side::Sell => '2',
    }
}

pub fn logon(heart_bt_int: u64, username: &str, password: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::LOGON);
    message
        .set(tags::ENCRYPT_METHOD, 0)
        .set(tags::HEART_BT_INT, heart_bt_int)
        // No persisted message store, so both sides start from 1.
        .set(tags::RESET_SEQ_NUM_FLAG, 'Y')
        .set(tags::USERNAME, username)
        .set(tags::PASSWORD, password);
    message
}

pub fn logout() -> FixMessage {
    FixMessage::new(msg_type::LOGOUT)
}

pub fn heartbeat(test_req_id: Option<&str>) -> FixMessage {
    let mut message = FixMessage::new(msg_type::HEARTBEAT);
    if let Some(id) = test_req_id {
        message.set(tags::TEST_REQ_ID, id);
    }
    message
}

pub fn test_request(id: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::TEST_REQUEST);
    message.set(tags::TEST_REQ_ID, id);
    message
}

pub fn security_list_request(exchange: &str, req_id: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::SECURITY_LIST_REQUEST);
    message
        .set(tags::SECURITY_LIST_REQUEST_TYPE, SECURITY_LIST_ALL)
        .set(tags::SECURITY_REQ_ID, req_id)
        .set(tags::SECURITY_EXCHANGE, exchange);
    message
}

pub fn new_order_single(account: &str, exchange: &str, order: &StrategyOrder) -> FixMessage {
    let mut message = FixMessage::new(msg_type::NEW_ORDER_SINGLE);
    message
        .set(tags::CL_ORD_ID, &order.cl_ord_id)
        .set(tags::SIDE, side_to_fix(order.side))
        .set(tags::TRANSACT_TIME, transact_time_now())
        .set(tags::ORD_TYPE, ORD_TYPE_LIMIT)
        .set(tags::ACCOUNT, account)
        .set(tags::ORDER_QTY, order.size)
        .set(tags::PRICE, order.price)
        .set(tags::SYMBOL, &order.symbol.name)
        .set(tags::TIME_IN_FORCE, TIME_IN_FORCE_GTC)
        .set(tags::EX_DESTINATION, exchange)
        .set(tags::SECURITY_TYPE, SECURITY_TYPE_CRYPTOSPOT);
    message
}

/// Cancel by original client order id; the cancel itself gets a derived id.
pub fn order_cancel_request(account: &str, order: &StrategyOrder) -> FixMessage {
    let mut message = FixMessage::new(msg_type::ORDER_CANCEL_REQUEST);
    message
        .set(tags::ORIG_CL_ORD_ID, &order.cl_ord_id)
        .set(tags::CL_ORD_ID, format!("D{}", order.cl_ord_id))
        .set(tags::SIDE, side_to_fix(order.side))
        .set(tags::TRANSACT_TIME, transact_time_now())
        .set(tags::ACCOUNT, account)
        .set(
            tags::ORDER_ID,
            order.exchange_order_id.as_deref().unwrap_or_default(),
        )
        .set(tags::SYMBOL, &order.symbol.name);
    message
}

pub fn market_data_subscribe(symbol: &str, exchange: &str, req_id: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::MARKET_DATA_REQUEST);
    message
        .set(tags::MD_REQ_ID, req_id)
        .set(tags::SUBSCRIPTION_REQUEST_TYPE, SUBSCRIBE_SNAPSHOT_UPDATES)
        .set(tags::MARKET_DEPTH, 0)
        .set(tags::NO_MD_ENTRY_TYPES, 3)
        .set(tags::MD_ENTRY_TYPE, MD_ENTRY_BID)
        .set(tags::MD_ENTRY_TYPE, MD_ENTRY_OFFER)
        .set(tags::MD_ENTRY_TYPE, MD_ENTRY_TRADE)
        .set(tags::NO_RELATED_SYM, 1)
        .set(tags::SYMBOL, symbol)
        .set(tags::SECURITY_EXCHANGE, exchange);
    message
}

pub fn market_data_unsubscribe(symbol: &str, exchange: &str, req_id: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::MARKET_DATA_REQUEST);
    message
        .set(tags::MD_REQ_ID, req_id)
        .set(tags::MARKET_DEPTH, 0)
        .set(tags::SUBSCRIPTION_REQUEST_TYPE, UNSUBSCRIBE)
        .set(tags::NO_RELATED_SYM, 1)
        .set(tags::SYMBOL, symbol)
        .set(tags::SECURITY_EXCHANGE, exchange);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::symbol::Symbol;
    use crate::infrastructure::fix::codec::FieldMap;
    use rust_decimal_macros::dec;

    fn order() -> StrategyOrder {
        let mut order = StrategyOrder::new(
            Symbol::new("BTC/USDT", 2, 4),
            "7",
            Side::Buy,
            dec!(110.00),
            dec!(0.01),
        );
        order.exchange_order_id = Some("X7".to_string());
        order
    }

    #[test]
    fn new_order_single_carries_the_full_order() {
        let message = new_order_single("ACC-1", "BINANCE", &order());
        assert_eq!(message.msg_type(), msg_type::NEW_ORDER_SINGLE);
        assert_eq!(message.get(tags::CL_ORD_ID), Some("7"));
        assert_eq!(message.get(tags::SIDE), Some("1"));
        assert_eq!(message.get(tags::ORD_TYPE), Some("2"));
        assert_eq!(message.get(tags::ORDER_QTY), Some("0.01"));
        assert_eq!(message.get(tags::PRICE), Some("110.00"));
        assert_eq!(message.get(tags::TIME_IN_FORCE), Some("1"));
        assert_eq!(message.get(tags::SECURITY_TYPE), Some("CRYPTOSPOT"));
        assert_eq!(message.get(tags::EX_DESTINATION), Some("BINANCE"));
    }

    #[test]
    fn cancel_request_derives_its_own_id() {
        let message = order_cancel_request("ACC-1", &order());
        assert_eq!(message.get(tags::ORIG_CL_ORD_ID), Some("7"));
        assert_eq!(message.get(tags::CL_ORD_ID), Some("D7"));
        assert_eq!(message.get(tags::ORDER_ID), Some("X7"));
        assert_eq!(message.get(tags::SIDE), Some("1"));
    }

    #[test]
    fn subscribe_requests_bids_offers_and_trades() {
        let message = market_data_subscribe("BTC/USDT", "BINANCE", "3");
        assert_eq!(message.get(tags::SUBSCRIPTION_REQUEST_TYPE), Some("1"));
        let entry_types: Vec<&str> = message
            .fields()
            .iter()
            .filter(|(t, _)| *t == tags::MD_ENTRY_TYPE)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(entry_types, vec!["0", "1", "2"]);
        assert_eq!(message.get(tags::SYMBOL), Some("BTC/USDT"));
    }

    #[test]
    fn unsubscribe_disables_the_previous_request() {
        let message = market_data_unsubscribe("BTC/USDT", "BINANCE", "4");
        assert_eq!(message.get(tags::SUBSCRIPTION_REQUEST_TYPE), Some("2"));
    }

    #[test]
    fn logon_resets_sequence_numbers_and_authenticates() {
        let message = logon(20, "user", "secret");
        assert_eq!(message.get(tags::RESET_SEQ_NUM_FLAG), Some("Y"));
        assert_eq!(message.get(tags::USERNAME), Some("user"));
        assert_eq!(message.get(tags::PASSWORD), Some("secret"));
        assert_eq!(message.get(tags::HEART_BT_INT), Some("20"));
    }
}
