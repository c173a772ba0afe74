//! Translation between the venue's FIX dialect and bus events, plus the
//! outbound routing: market-data traffic on the unqualified session, order
//! entry on the `TRADE` session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use log::{debug, error, warn};
use rust_decimal::Decimal;

use crate::domain::constants::{
    EXCHANGE, INVALID_OR_UNSUPPORTED_REQUEST, NOT_AUTHORIZED, NO_INSTRUMENTS_FOUND,
    TAG_AGGRESSOR_SIDE, TAG_PRICE_PRECISION, TAG_SIZE_PRECISION,
};
use crate::domain::enums::{OrderOperation, SessionStatus, Side};
use crate::domain::events::{Event, EventKind};
use crate::domain::model::execution_report::{ExecStatus, ExecutionReport};
use crate::domain::model::market_data::{MarketDataUpdate, UpdateKind};
use crate::domain::model::symbol::Symbol;
use crate::infrastructure::bus::EventBus;
use crate::infrastructure::fix::codec::{msg_type, tags, FieldMap, FixError, FixMessage};
use crate::infrastructure::fix::messages;
use crate::infrastructure::fix::session::{FixHandler, SessionHandle};
use crate::infrastructure::fix::settings::SessionConfig;

const SECURITY_REQUEST_VALID: i64 = 0;
const SECURITY_REQUEST_INVALID: i64 = 1;
const SECURITY_REQUEST_NO_INSTRUMENTS: i64 = 2;
const SECURITY_REQUEST_NOT_AUTHORIZED: i64 = 3;

pub struct FixApplication {
    bus: EventBus,
    account: String,
    request_id: AtomicU64,
    sessions: RwLock<Vec<Arc<dyn SessionHandle>>>,
    /// Accumulates security-list fragments until the last one arrives.
    security_list: Mutex<Vec<Symbol>>,
    subscribed_symbol: Mutex<Option<Symbol>>,
}

impl FixApplication {
    pub fn new(account: impl Into<String>, bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            bus,
            account: account.into(),
            request_id: AtomicU64::new(1),
            sessions: RwLock::new(Vec::new()),
            security_list: Mutex::new(Vec::new()),
            subscribed_symbol: Mutex::new(None),
        })
    }

    pub fn register_sessions(&self, sessions: Vec<Arc<dyn SessionHandle>>) {
        match self.sessions.write() {
            Ok(mut slot) => *slot = sessions,
            Err(_) => error!("Session registry poisoned"),
        }
    }

    /// Wire the outbound side onto the bus. With `use_sandbox` the order
    /// commands are left to the sandbox executor and only market-data
    /// traffic goes to the venue.
    pub fn install(self: &Arc<Self>, bus: &EventBus, use_sandbox: bool) {
        if !use_sandbox {
            let app = self.clone();
            bus.subscribe(EventKind::OrderCommand, move |event| {
                if let Event::OrderCommand(command) = event {
                    match command.operation {
                        OrderOperation::Add => app.new_order(&command.order),
                        OrderOperation::Delete => app.cancel_order(&command.order),
                        OrderOperation::Fill => {}
                    }
                }
            });
        }
        let app = self.clone();
        bus.subscribe(EventKind::SecurityListRequest, move |_| {
            app.request_security_list();
        });
        let app = self.clone();
        bus.subscribe(EventKind::Subscribe, move |event| {
            if let Event::Subscribe(symbol) = event {
                app.subscribe(symbol);
            }
        });
    }

    fn next_request_id(&self) -> String {
        self.request_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn send_to(&self, trade_session: bool, build: impl Fn() -> FixMessage) {
        let sessions = match self.sessions.read() {
            Ok(sessions) => sessions.clone(),
            Err(_) => {
                error!("Session registry poisoned");
                return;
            }
        };
        for session in sessions {
            if session.is_trade() != trade_session {
                continue;
            }
            if let Err(error) = session.send(build()) {
                error!("Failed to send to session: {error:#}");
            }
        }
    }

    fn request_security_list(&self) {
        if let Ok(mut list) = self.security_list.lock() {
            list.clear();
        }
        let req_id = self.next_request_id();
        self.send_to(false, || messages::security_list_request(EXCHANGE, &req_id));
    }

    fn subscribe(&self, symbol: &Symbol) {
        if let Ok(mut slot) = self.subscribed_symbol.lock() {
            *slot = Some(symbol.clone());
        }
        let req_id = self.next_request_id();
        self.send_to(false, || {
            messages::market_data_subscribe(&symbol.name, EXCHANGE, &req_id)
        });
    }

    fn new_order(&self, order: &crate::domain::model::order::StrategyOrder) {
        self.send_to(true, || messages::new_order_single(&self.account, EXCHANGE, order));
    }

    fn cancel_order(&self, order: &crate::domain::model::order::StrategyOrder) {
        self.send_to(true, || messages::order_cancel_request(&self.account, order));
    }

    fn subscribed(&self) -> Option<Symbol> {
        self.subscribed_symbol.lock().ok().and_then(|slot| slot.clone())
    }

    fn process(&self, message: &FixMessage) -> Result<(), FixError> {
        match message.msg_type() {
            msg_type::SECURITY_LIST => self.process_security_list(message),
            msg_type::MARKET_DATA_SNAPSHOT => self.process_snapshot(message),
            msg_type::MARKET_DATA_INCREMENTAL => self.process_incremental(message),
            msg_type::EXECUTION_REPORT => self.process_execution_report(message),
            msg_type::ORDER_CANCEL_REJECT => {
                // Received but deliberately unhandled; the resting order
                // stays until a terminal execution report arrives.
                debug!("Order cancel reject: {:?}", message);
                Ok(())
            }
            other => {
                debug!("Unhandled application message type {other}");
                Ok(())
            }
        }
    }

    fn process_security_list(&self, message: &FixMessage) -> Result<(), FixError> {
        match message.req_int(tags::SECURITY_REQUEST_RESULT)? {
            SECURITY_REQUEST_VALID => {}
            SECURITY_REQUEST_INVALID => {
                warn!("Security list request failed: {}", INVALID_OR_UNSUPPORTED_REQUEST);
                return Ok(());
            }
            SECURITY_REQUEST_NO_INSTRUMENTS => {
                warn!("Security list request failed: {}", NO_INSTRUMENTS_FOUND);
                return Ok(());
            }
            SECURITY_REQUEST_NOT_AUTHORIZED => {
                warn!("Security list request failed: {}", NOT_AUTHORIZED);
                return Ok(());
            }
            other => {
                warn!("Security list request returned unknown result {other}");
                return Ok(());
            }
        }
        let rows = message.groups(
            tags::NO_RELATED_SYM,
            tags::SYMBOL,
            &[
                tags::SECURITY_EXCHANGE,
                tags::SECURITY_TYPE,
                TAG_PRICE_PRECISION,
                TAG_SIZE_PRECISION,
            ],
        )?;
        let mut list = self
            .security_list
            .lock()
            .map_err(|_| FixError::Malformed("security list state poisoned".to_string()))?;
        for row in rows {
            list.push(Symbol::new(
                row.req(tags::SYMBOL)?,
                row.req_int(TAG_PRICE_PRECISION)? as u32,
                row.req_int(TAG_SIZE_PRECISION)? as u32,
            ));
        }
        if message.get(tags::LAST_FRAGMENT) == Some("Y") {
            list.sort();
            self.bus.publish(Event::SecurityList(list.clone()));
        }
        Ok(())
    }

    fn process_snapshot(&self, message: &FixMessage) -> Result<(), FixError> {
        let Some(symbol) = self.subscribed() else {
            warn!("Market data before any subscription, dropped");
            return Ok(());
        };
        let rows = message.groups(
            tags::NO_MD_ENTRIES,
            tags::MD_ENTRY_TYPE,
            &[tags::MD_ENTRY_PX, tags::MD_ENTRY_SIZE],
        )?;
        let mut book_updates = Vec::new();
        for row in rows {
            let side = match row.req_char(tags::MD_ENTRY_TYPE)? {
                '0' => Side::Buy,
                '1' => Side::Sell,
                _ => continue,
            };
            book_updates.push(MarketDataUpdate::new(
                scaled(row.req_decimal(tags::MD_ENTRY_PX)?, symbol.price_scale),
                scaled(row.req_decimal(tags::MD_ENTRY_SIZE)?, symbol.size_scale),
                UpdateKind::Snapshot,
                side,
            ));
        }
        if !book_updates.is_empty() {
            self.bus.publish(Event::MarketData(book_updates));
        }
        Ok(())
    }

    fn process_incremental(&self, message: &FixMessage) -> Result<(), FixError> {
        let Some(symbol) = self.subscribed() else {
            warn!("Market data before any subscription, dropped");
            return Ok(());
        };
        let rows = message.groups(
            tags::NO_MD_ENTRIES,
            tags::MD_ENTRY_TYPE,
            &[
                tags::MD_UPDATE_ACTION,
                tags::MD_ENTRY_PX,
                tags::MD_ENTRY_SIZE,
                tags::SYMBOL,
                TAG_AGGRESSOR_SIDE,
            ],
        )?;
        let mut trades = Vec::new();
        let mut book_updates = Vec::new();
        for row in rows {
            let kind = match row.req_char(tags::MD_UPDATE_ACTION)? {
                '1' => UpdateKind::Update,
                '2' => UpdateKind::Delete,
                '3' => UpdateKind::Reset,
                _ => UpdateKind::New,
            };
            let price = scaled(row.req_decimal(tags::MD_ENTRY_PX)?, symbol.price_scale);
            let size = if matches!(kind, UpdateKind::Delete | UpdateKind::Reset) {
                scaled(Decimal::ZERO, symbol.size_scale)
            } else {
                scaled(row.req_decimal(tags::MD_ENTRY_SIZE)?, symbol.size_scale)
            };
            match row.req_char(tags::MD_ENTRY_TYPE)? {
                '0' => book_updates.push(MarketDataUpdate::new(price, size, kind, Side::Buy)),
                '1' => book_updates.push(MarketDataUpdate::new(price, size, kind, Side::Sell)),
                '2' => {
                    let side = if row.req_int(TAG_AGGRESSOR_SIDE)? == 1 {
                        Side::Sell
                    } else {
                        Side::Buy
                    };
                    trades.push(MarketDataUpdate::new(price, size, UpdateKind::Trade, side));
                }
                _ => {}
            }
        }
        // Trades first; a print and the book change it caused arrive in one
        // message and the strategy sees the print before the book moves.
        if !trades.is_empty() {
            self.bus.publish(Event::Trades(trades));
        }
        if !book_updates.is_empty() {
            self.bus.publish(Event::MarketData(book_updates));
        }
        Ok(())
    }

    fn process_execution_report(&self, message: &FixMessage) -> Result<(), FixError> {
        let transaction_time = parse_transact_time(message.req(tags::TRANSACT_TIME)?)?;
        let report = ExecutionReport {
            exchange_order_id: message.req(tags::ORDER_ID)?.to_string(),
            cl_ord_id: message.req(tags::CL_ORD_ID)?.to_string(),
            orig_cl_ord_id: message.get(tags::ORIG_CL_ORD_ID).map(str::to_string),
            status: ExecStatus::from_fix(message.req_char(tags::ORD_STATUS)?),
            last_qty: match message.get(tags::LAST_QTY) {
                Some(_) => message.req_decimal(tags::LAST_QTY)?,
                None => Decimal::ZERO,
            },
            cum_qty: message.req_decimal(tags::CUM_QTY)?,
            leaves_qty: message.req_decimal(tags::LEAVES_QTY)?,
            transaction_time,
            reject_reason: message.get(tags::ORD_REJ_REASON).map(str::to_string),
            text: message.get(tags::TEXT).map(str::to_string),
        };
        self.bus.publish(Event::ExecutionReport(report));
        Ok(())
    }
}

fn scaled(value: Decimal, scale: u32) -> Decimal {
    let mut value = value;
    value.rescale(scale);
    value
}

fn parse_transact_time(raw: &str) -> Result<i64, FixError> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%d-%H:%M:%S%.3f")
        .map(|dt| dt.and_utc().timestamp_millis())
        .map_err(|_| FixError::Malformed(format!("bad TransactTime: {raw}")))
}

impl FixHandler for FixApplication {
    fn on_logon(&self, session: &SessionConfig) {
        // Only the market-data session doubles as the connectivity signal.
        if !session.is_trade_session() {
            self.bus.publish(Event::Session(SessionStatus::Connected));
        }
    }

    fn on_logout(&self, session: &SessionConfig) {
        if !session.is_trade_session() {
            self.bus.publish(Event::Session(SessionStatus::Disconnected));
        }
    }

    fn on_message(&self, session: &SessionConfig, message: FixMessage) {
        debug!(
            "Session {}{} message {}",
            session.target_comp_id,
            session.qualifier.as_deref().unwrap_or(""),
            message.msg_type()
        );
        if let Err(error) = self.process(&message) {
            error!("Failed to process {} message: {error}", message.msg_type());
        }
    }
}
