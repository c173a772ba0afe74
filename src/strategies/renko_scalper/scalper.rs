use log::{info, warn};
use rust_decimal::Decimal;

use crate::domain::enums::{PriceSource, SessionStatus};
use crate::domain::events::{Event, EventKind};
use crate::domain::model::symbol::Symbol;
use crate::infrastructure::bus::EventBus;
use crate::strategies::renko_scalper::book::OrderBook;
use crate::strategies::renko_scalper::oms::Oms;
use crate::strategies::renko_scalper::renko::RenkoEngine;

#[derive(Clone, Debug)]
pub struct ScalperConfig {
    pub symbol: String,
    pub brick_size: Decimal,
    pub order_size: Decimal,
    pub max_position_held: u32,
    pub price_source: PriceSource,
}

/// Brings the strategy up once the venue is reachable.
///
/// On the first market-data logon it requests the instrument list; when the
/// list arrives it resolves the configured instrument, wires the price
/// pipeline (trade prints, or an order book for the top-of-book sources),
/// the renko engine and the OMS, and subscribes to market data. Later
/// logons are reconnections and only renew the subscription.
pub struct RenkoScalper;

impl RenkoScalper {
    pub fn install(config: ScalperConfig, bus: &EventBus) {
        install_presenter(bus);
        let strategy_bus = bus.clone();
        let mut subscribed: Option<Symbol> = None;
        bus.subscribe_many(&[EventKind::Session, EventKind::SecurityList], move |event| {
            match event {
                Event::Session(status) => {
                    info!("Market data session {:?}", status);
                    if *status != SessionStatus::Connected {
                        return;
                    }
                    match &subscribed {
                        None => strategy_bus.publish(Event::SecurityListRequest),
                        Some(symbol) => {
                            // Reconnection; the subscription does not survive
                            // the FIX session, renew it.
                            strategy_bus.publish(Event::Subscribe(symbol.clone()))
                        }
                    }
                }
                Event::SecurityList(symbols) => {
                    if subscribed.is_some() {
                        return;
                    }
                    let Some(symbol) = symbols.iter().find(|s| s.name == config.symbol) else {
                        warn!(
                            "Configured symbol {} not in the {} instruments offered",
                            config.symbol,
                            symbols.len()
                        );
                        return;
                    };
                    info!(
                        "Starting renko scalper on {} (brick {}, clip {})",
                        symbol, config.brick_size, config.order_size
                    );
                    install_price_pipeline(&config, symbol, &strategy_bus);
                    Oms::new(
                        symbol.clone(),
                        config.brick_size,
                        config.order_size,
                        config.max_position_held,
                        strategy_bus.clone(),
                    )
                    .install(&strategy_bus);
                    strategy_bus.publish(Event::Subscribe(symbol.clone()));
                    subscribed = Some(symbol.clone());
                }
                _ => {}
            }
        });
    }
}

fn install_price_pipeline(config: &ScalperConfig, symbol: &Symbol, bus: &EventBus) {
    if config.price_source == PriceSource::Trades {
        let price_bus = bus.clone();
        bus.subscribe(EventKind::Trades, move |event| {
            if let Event::Trades(trades) = event {
                for trade in trades {
                    price_bus.publish(Event::Price(trade.price));
                }
            }
        });
    } else {
        OrderBook::new(config.price_source, symbol.price_scale, bus.clone()).install(bus);
    }
    RenkoEngine::new(config.brick_size, bus.clone()).install(bus);
}

/// Headless stand-in for the chart: bricks and order lifecycle go to the log.
fn install_presenter(bus: &EventBus) {
    bus.subscribe_many(
        &[EventKind::Brick, EventKind::OrderNotification],
        |event| match event {
            Event::Brick(brick) => info!("{}", brick),
            Event::OrderNotification(notification) => info!(
                "Order {:?}: {}",
                notification.operation,
                notification.order.display_text()
            ),
            _ => {}
        },
    );
}
