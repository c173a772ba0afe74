use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::enums::{PriceSource, Side};
use crate::domain::events::{Event, EventKind};
use crate::domain::model::market_data::{MarketDataUpdate, UpdateKind};
use crate::infrastructure::bus::EventBus;

/// Aggregated order book feeding the price signal. Consumes market-data
/// batches and re-publishes the configured top-of-book price whenever it
/// changes; consecutive identical prices are suppressed.
pub struct OrderBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    source: PriceSource,
    price_scale: u32,
    last_sent_price: Option<Decimal>,
    bus: EventBus,
}

impl OrderBook {
    pub fn new(source: PriceSource, price_scale: u32, bus: EventBus) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            source,
            price_scale,
            last_sent_price: None,
            bus,
        }
    }

    /// Register onto the bus; the book owns itself inside the closure from
    /// here on.
    pub fn install(mut self, bus: &EventBus) {
        bus.subscribe(EventKind::MarketData, move |event| {
            if let Event::MarketData(updates) = event {
                self.apply(updates);
            }
        });
    }

    /// Apply one logical refresh atomically, then evaluate top-of-book once.
    pub fn apply(&mut self, updates: &[MarketDataUpdate]) {
        let Some(first) = updates.first() else {
            return;
        };
        match first.kind {
            UpdateKind::Snapshot => {
                self.bids.clear();
                self.asks.clear();
                for update in updates {
                    self.side_mut(update.side).insert(update.price, update.size);
                }
            }
            UpdateKind::Reset => {
                self.bids.clear();
                self.asks.clear();
            }
            _ => {
                for update in updates {
                    match update.kind {
                        UpdateKind::New | UpdateKind::Update => {
                            self.side_mut(update.side).insert(update.price, update.size);
                        }
                        UpdateKind::Delete => {
                            self.side_mut(update.side).remove(&update.price);
                        }
                        _ => {}
                    }
                }
            }
        }
        self.publish_top_of_book();
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    fn top_of_book(&self) -> Option<Decimal> {
        match self.source {
            PriceSource::BestBid => self.best_bid(),
            PriceSource::BestAsk => self.best_ask(),
            _ => {
                // Mid needs both sides; truncated so it stays on the
                // instrument's price grid.
                let (bid, ask) = (self.best_bid()?, self.best_ask()?);
                Some(((bid + ask) / Decimal::TWO).trunc_with_scale(self.price_scale))
            }
        }
    }

    fn publish_top_of_book(&mut self) {
        if let Some(price) = self.top_of_book() {
            if self.last_sent_price != Some(price) {
                self.last_sent_price = Some(price);
                self.bus.publish(Event::Price(price));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn prices(bus: &EventBus) -> Arc<Mutex<Vec<Decimal>>> {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let out = sink.clone();
        bus.subscribe(EventKind::Price, move |event| {
            if let Event::Price(price) = event {
                out.lock().unwrap().push(*price);
            }
        });
        sink
    }

    fn update(price: Decimal, size: Decimal, kind: UpdateKind, side: Side) -> MarketDataUpdate {
        MarketDataUpdate::new(price, size, kind, side)
    }

    fn run(source: PriceSource, batches: Vec<Vec<MarketDataUpdate>>) -> Vec<Decimal> {
        let bus = EventBus::new();
        let sink = prices(&bus);
        OrderBook::new(source, 2, bus.clone()).install(&bus);
        bus.start();
        for batch in batches {
            bus.publish(Event::MarketData(batch));
        }
        bus.stop();
        let prices = sink.lock().unwrap().clone();
        prices
    }

    #[test]
    fn snapshot_replaces_both_sides() {
        let prices = run(
            PriceSource::BestBid,
            vec![
                vec![
                    update(dec!(100), dec!(1), UpdateKind::Snapshot, Side::Buy),
                    update(dec!(101), dec!(1), UpdateKind::Snapshot, Side::Sell),
                ],
                vec![
                    update(dec!(90), dec!(1), UpdateKind::Snapshot, Side::Buy),
                    update(dec!(91), dec!(1), UpdateKind::Snapshot, Side::Sell),
                ],
            ],
        );
        assert_eq!(prices, vec![dec!(100), dec!(90)]);
    }

    #[test]
    fn mid_price_is_truncated_to_price_scale() {
        let prices = run(
            PriceSource::Mid,
            vec![vec![
                update(dec!(100.01), dec!(1), UpdateKind::Snapshot, Side::Buy),
                update(dec!(100.02), dec!(1), UpdateKind::Snapshot, Side::Sell),
            ]],
        );
        // (100.01 + 100.02) / 2 = 100.015, truncated to two places.
        assert_eq!(prices, vec![dec!(100.01)]);
    }

    #[test]
    fn mid_requires_both_sides() {
        let prices = run(
            PriceSource::Mid,
            vec![vec![update(dec!(100), dec!(1), UpdateKind::Snapshot, Side::Buy)]],
        );
        assert!(prices.is_empty());
    }

    #[test]
    fn unchanged_top_of_book_is_not_republished() {
        let prices = run(
            PriceSource::BestAsk,
            vec![
                vec![update(dec!(101), dec!(1), UpdateKind::New, Side::Sell)],
                vec![update(dec!(102), dec!(1), UpdateKind::New, Side::Sell)],
                vec![update(dec!(102), dec!(2), UpdateKind::Update, Side::Sell)],
            ],
        );
        // Deeper inserts and size-only changes leave the best ask at 101.
        assert_eq!(prices, vec![dec!(101)]);
    }

    #[test]
    fn delete_of_best_level_moves_top_of_book() {
        let prices = run(
            PriceSource::BestBid,
            vec![
                vec![
                    update(dec!(100), dec!(1), UpdateKind::New, Side::Buy),
                    update(dec!(99), dec!(1), UpdateKind::New, Side::Buy),
                ],
                vec![update(dec!(100), dec!(0), UpdateKind::Delete, Side::Buy)],
            ],
        );
        assert_eq!(prices, vec![dec!(100), dec!(99)]);
    }

    #[test]
    fn reset_clears_the_book_and_emits_nothing() {
        let prices = run(
            PriceSource::BestBid,
            vec![
                vec![update(dec!(100), dec!(1), UpdateKind::New, Side::Buy)],
                vec![update(Decimal::ZERO, Decimal::ZERO, UpdateKind::Reset, Side::Buy)],
            ],
        );
        assert_eq!(prices, vec![dec!(100)]);
    }
}
