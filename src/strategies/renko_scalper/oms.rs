use std::collections::HashMap;

use log::{debug, info};
use rust_decimal::Decimal;

use crate::domain::enums::{OrderOperation, Side};
use crate::domain::events::{Event, EventKind, OrderCommand, OrderNotification};
use crate::domain::model::brick::Brick;
use crate::domain::model::execution_report::{ExecStatus, ExecutionReport};
use crate::domain::model::order::StrategyOrder;
use crate::domain::model::symbol::Symbol;
use crate::infrastructure::bus::EventBus;

/// Order management for the scalping strategy.
///
/// A rising brick cancels resting sells and stacks one buy limit a brick
/// above the close, capped at `max_position_held` consecutive rising bricks.
/// A falling brick cancels resting buys, places a sell limit a brick below
/// the close, and closes out every held position a brick above the close.
/// Orders stay in the resting map until the venue confirms cancellation; an
/// order leaves for the executed list only once it is both filled and linked
/// to an exit brick, in whichever order those two happen.
pub struct Oms {
    symbol: Symbol,
    brick_size: Decimal,
    order_size: Decimal,
    max_position_held: u32,
    next_order_id: u64,
    position_held_counter: u32,
    limit_orders: HashMap<String, StrategyOrder>,
    executed_orders: Vec<StrategyOrder>,
    position_held_orders: Vec<StrategyOrder>,
    cumulative_size: Decimal,
    last_limit_price: Option<Decimal>,
    bus: EventBus,
}

impl Oms {
    pub fn new(
        symbol: Symbol,
        brick_size: Decimal,
        order_size: Decimal,
        max_position_held: u32,
        bus: EventBus,
    ) -> Self {
        Self {
            symbol,
            brick_size,
            order_size,
            max_position_held,
            next_order_id: 1,
            position_held_counter: 0,
            limit_orders: HashMap::new(),
            executed_orders: Vec::new(),
            position_held_orders: Vec::new(),
            cumulative_size: Decimal::ZERO,
            last_limit_price: None,
            bus,
        }
    }

    pub fn install(mut self, bus: &EventBus) {
        bus.subscribe_many(&[EventKind::Brick, EventKind::ExecutionReport], move |event| {
            match event {
                Event::Brick(brick) => self.on_brick(brick),
                Event::ExecutionReport(report) => self.on_execution_report(report),
                _ => {}
            }
        });
    }

    pub fn on_brick(&mut self, brick: &Brick) {
        if brick.is_rising() {
            self.on_rising_brick(brick);
        } else {
            self.on_falling_brick(brick);
        }
    }

    fn on_rising_brick(&mut self, brick: &Brick) {
        self.position_held_counter += 1;
        if self.position_held_counter > self.max_position_held {
            info!("Position cap reached, rising brick ignored: {}", brick);
            return;
        }
        self.cancel_resting(Side::Sell);
        self.link_exits(Side::Buy, brick);
        if self.entry_clear(Side::Buy) {
            // A short position from the falling side is flattened instead of
            // stacking the configured clip on top of it.
            let size = if self.cumulative_size < Decimal::ZERO {
                -self.cumulative_size
            } else {
                self.order_size
            };
            let order = self.submit(Side::Buy, brick.close + self.brick_size, size, brick);
            self.last_limit_price = Some(order.price);
        }
    }

    fn on_falling_brick(&mut self, brick: &Brick) {
        self.cancel_resting(Side::Buy);
        self.link_exits(Side::Sell, brick);
        if self.entry_clear(Side::Sell) {
            let size = if self.cumulative_size > Decimal::ZERO {
                self.cumulative_size
            } else {
                self.order_size
            };
            let order = self.submit(Side::Sell, brick.close - self.brick_size, size, brick);
            self.last_limit_price = Some(order.price);
        }
        if !self.position_held_orders.is_empty() {
            // One close-out sell per held position, at a brick above the
            // close. These do not move the entry-price watermark.
            let held = std::mem::take(&mut self.position_held_orders);
            for held_order in held {
                self.submit(Side::Sell, brick.close + self.brick_size, held_order.size, brick);
            }
            self.position_held_counter = 0;
        }
    }

    pub fn on_execution_report(&mut self, report: &ExecutionReport) {
        let id = report.correlation_id().to_string();
        let Some(order) = self.limit_orders.get_mut(&id) else {
            debug!("Execution report for unknown order {} ignored", id);
            return;
        };
        if !report.exchange_order_id.is_empty() {
            order.exchange_order_id = Some(report.exchange_order_id.clone());
        }
        match report.status {
            ExecStatus::New => {
                order.create_time = report.transaction_time;
                let order = order.clone();
                self.notify(OrderOperation::Add, order);
            }
            ExecStatus::Filled => {
                order.execute_time = report.transaction_time;
                let filled = order.clone();
                if filled.linked_exit_brick.is_some() {
                    self.limit_orders.remove(&id);
                    self.executed_orders.push(filled.clone());
                }
                match filled.side {
                    Side::Sell => self.cumulative_size -= filled.size,
                    Side::Buy => {
                        self.position_held_orders.push(filled.clone());
                        self.cumulative_size += filled.size;
                    }
                }
                self.notify(OrderOperation::Fill, filled);
            }
            ExecStatus::Canceled => {
                let order = order.clone();
                self.limit_orders.remove(&id);
                self.notify(OrderOperation::Delete, order);
            }
            ExecStatus::Rejected => {
                self.limit_orders.remove(&id);
            }
            _ => {}
        }
    }

    /// A new entry goes out only if nothing on `side` rests beyond the last
    /// entry price: a buy still resting above it (or a sell below it) means
    /// the previous entry has not cleared yet.
    fn entry_clear(&self, side: Side) -> bool {
        let Some(last_price) = self.last_limit_price else {
            return true;
        };
        !self.limit_orders.values().any(|order| {
            order.side == side
                && match side {
                    Side::Buy => order.price > last_price,
                    Side::Sell => order.price < last_price,
                }
        })
    }

    /// Request cancellation of every resting order on `side`. The orders stay
    /// in the map until the venue reports them canceled.
    fn cancel_resting(&mut self, side: Side) {
        let doomed: Vec<StrategyOrder> = self
            .limit_orders
            .values()
            .filter(|order| order.side == side)
            .cloned()
            .collect();
        for order in doomed {
            info!("Cancelling resting order {}", order);
            self.bus
                .publish(Event::OrderCommand(OrderCommand::new(OrderOperation::Delete, order)));
        }
    }

    /// Attach `brick` as the exit brick of every eligible resting order on
    /// `side`. An order that is already filled is complete at this point and
    /// moves to the executed list.
    fn link_exits(&mut self, side: Side, brick: &Brick) {
        let eligible = |order: &StrategyOrder| match side {
            Side::Buy => order.price >= brick.close,
            Side::Sell => order.price <= brick.close,
        };
        let ids: Vec<String> = self
            .limit_orders
            .values()
            .filter(|order| {
                order.side == side && order.linked_exit_brick.is_none() && eligible(order)
            })
            .map(|order| order.cl_ord_id.clone())
            .collect();
        for id in ids {
            let Some(order) = self.limit_orders.get_mut(&id) else {
                continue;
            };
            order.linked_exit_brick = Some(brick.clone());
            if order.is_filled() {
                let done = order.clone();
                self.limit_orders.remove(&id);
                self.executed_orders.push(done.clone());
                self.notify(OrderOperation::Fill, done);
            }
        }
    }

    fn submit(&mut self, side: Side, price: Decimal, size: Decimal, brick: &Brick) -> StrategyOrder {
        let mut order =
            StrategyOrder::new(self.symbol.clone(), self.next_cl_ord_id(), side, price, size);
        order.linked_entry_brick = Some(brick.clone());
        self.limit_orders.insert(order.cl_ord_id.clone(), order.clone());
        self.bus
            .publish(Event::OrderCommand(OrderCommand::new(OrderOperation::Add, order.clone())));
        order
    }

    fn notify(&self, operation: OrderOperation, order: StrategyOrder) {
        self.bus
            .publish(Event::OrderNotification(OrderNotification::new(operation, order)));
    }

    fn next_cl_ord_id(&mut self) -> String {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id.to_string()
    }

    #[cfg(test)]
    fn resting(&self) -> &HashMap<String, StrategyOrder> {
        &self.limit_orders
    }

    #[cfg(test)]
    fn executed(&self) -> &[StrategyOrder] {
        &self.executed_orders
    }

    #[cfg(test)]
    fn net_position(&self) -> Decimal {
        self.cumulative_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn symbol() -> Symbol {
        Symbol::new("BTC/USDT", 2, 4)
    }

    fn oms(max_position_held: u32) -> (Oms, EventBus) {
        let bus = EventBus::new();
        let oms = Oms::new(symbol(), dec!(5), dec!(0.01), max_position_held, bus.clone());
        (oms, bus)
    }

    fn rising(time: i64, open: Decimal) -> Brick {
        Brick::new(time, open, open + dec!(5))
    }

    fn falling(time: i64, open: Decimal) -> Brick {
        Brick::new(time, open, open - dec!(5))
    }

    fn report(id: &str, status: ExecStatus, size: Decimal, time: i64) -> ExecutionReport {
        ExecutionReport {
            exchange_order_id: format!("X{id}"),
            cl_ord_id: id.to_string(),
            orig_cl_ord_id: None,
            status,
            last_qty: size,
            cum_qty: size,
            leaves_qty: Decimal::ZERO,
            transaction_time: time,
            reject_reason: None,
            text: None,
        }
    }

    fn commands(bus: &EventBus) -> std::sync::Arc<std::sync::Mutex<Vec<OrderCommand>>> {
        let sink = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let out = sink.clone();
        bus.subscribe(EventKind::OrderCommand, move |event| {
            if let Event::OrderCommand(command) = event {
                out.lock().unwrap().push(command.clone());
            }
        });
        sink
    }

    fn notifications(bus: &EventBus) -> std::sync::Arc<std::sync::Mutex<Vec<OrderNotification>>> {
        let sink = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let out = sink.clone();
        bus.subscribe(EventKind::OrderNotification, move |event| {
            if let Event::OrderNotification(notification) = event {
                out.lock().unwrap().push(notification.clone());
            }
        });
        sink
    }

    #[test]
    fn rising_brick_places_buy_one_brick_above_close() {
        let (mut oms, bus) = oms(1);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        bus.stop();
        let commands = sink.lock().unwrap();
        assert_eq!(commands.len(), 1);
        let order = &commands[0].order;
        assert_eq!(commands[0].operation, OrderOperation::Add);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, dec!(110));
        assert_eq!(order.size, dec!(0.01));
        assert_eq!(oms.resting().len(), 1);
    }

    #[test]
    fn position_cap_suppresses_further_rising_bricks() {
        let (mut oms, bus) = oms(2);
        let sink = commands(&bus);
        bus.start();
        // Three consecutive rising bricks; only the cap suppresses the third
        // entry.
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_brick(&rising(2, dec!(105)));
        oms.on_brick(&rising(3, dec!(110)));
        bus.stop();
        let commands = sink.lock().unwrap();
        let adds = commands
            .iter()
            .filter(|command| command.operation == OrderOperation::Add)
            .count();
        assert_eq!(adds, 2);
        assert_eq!(oms.resting().len(), 2);
    }

    #[test]
    fn resting_buy_above_the_last_entry_suppresses_a_new_buy() {
        let (mut oms, bus) = oms(3);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_brick(&falling(2, dec!(105)));
        // The buy at 110 is cancel-requested but still rests above the sell
        // entry at 95, so this rising brick places nothing.
        oms.on_brick(&rising(3, dec!(100)));
        bus.stop();
        let commands = sink.lock().unwrap();
        let adds = commands
            .iter()
            .filter(|command| command.operation == OrderOperation::Add)
            .count();
        assert_eq!(adds, 2);
        // The rising brick still cancels the resting sell entry.
        assert_eq!(commands.last().unwrap().operation, OrderOperation::Delete);
    }

    #[test]
    fn falling_brick_cancels_buys_and_places_sell() {
        let (mut oms, bus) = oms(1);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_brick(&falling(2, dec!(105)));
        bus.stop();
        let commands = sink.lock().unwrap();
        // Add buy @110, delete it, add sell @95.
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[1].operation, OrderOperation::Delete);
        assert_eq!(commands[1].order.cl_ord_id, commands[0].order.cl_ord_id);
        assert_eq!(commands[2].operation, OrderOperation::Add);
        assert_eq!(commands[2].order.side, Side::Sell);
        assert_eq!(commands[2].order.price, dec!(95));
        // The cancel is only a request; the buy rests until confirmed.
        assert_eq!(oms.resting().len(), 2);
    }

    #[test]
    fn canceled_report_removes_order_and_notifies_delete() {
        let (mut oms, bus) = oms(1);
        let sink = notifications(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Canceled, dec!(0.01), 50));
        bus.stop();
        let notes = sink.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].operation, OrderOperation::Delete);
        assert!(oms.resting().is_empty());
    }

    #[test]
    fn rejected_report_removes_order_silently() {
        let (mut oms, bus) = oms(1);
        let sink = notifications(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Rejected, dec!(0.01), 50));
        bus.stop();
        assert!(sink.lock().unwrap().is_empty());
        assert!(oms.resting().is_empty());
    }

    #[test]
    fn new_report_stamps_create_time_and_notifies_add() {
        let (mut oms, bus) = oms(1);
        let sink = notifications(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::New, dec!(0.01), 42));
        bus.stop();
        let notes = sink.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].operation, OrderOperation::Add);
        assert_eq!(notes[0].order.create_time, 42);
    }

    #[test]
    fn buy_fill_updates_position_and_defers_retirement_until_exit_link() {
        let (mut oms, bus) = oms(1);
        let sink = notifications(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        bus.stop();
        assert_eq!(oms.net_position(), dec!(0.01));
        // Filled but not yet exit-linked, so it keeps resting.
        assert_eq!(oms.resting().len(), 1);
        assert!(oms.executed().is_empty());
        let notes = sink.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].operation, OrderOperation::Fill);
    }

    #[test]
    fn exit_link_after_fill_retires_the_order() {
        let (mut oms, bus) = oms(2);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        // A rising brick whose close is at or below the buy's 110 price
        // links the exit.
        oms.on_brick(&rising(2, dec!(105)));
        bus.stop();
        assert!(oms.resting().get("1").is_none());
        assert_eq!(oms.executed().len(), 1);
        assert!(oms.executed()[0].linked_exit_brick.is_some());
    }

    #[test]
    fn fill_after_exit_link_retires_the_order() {
        let (mut oms, bus) = oms(2);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        // Second rising brick exit-links the unfilled buy (110 >= 110).
        oms.on_brick(&rising(2, dec!(105)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        bus.stop();
        assert!(oms.resting().get("1").is_none());
        assert_eq!(oms.executed().len(), 1);
        assert!(oms.executed()[0].is_filled());
    }

    #[test]
    fn falling_brick_closes_out_held_positions() {
        let (mut oms, bus) = oms(1);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        oms.on_brick(&falling(2, dec!(105)));
        bus.stop();
        let commands = sink.lock().unwrap();
        // Add buy, cancel buy, add entry sell, add close-out sell.
        assert_eq!(commands.len(), 4);
        let close_out = &commands[3];
        assert_eq!(close_out.operation, OrderOperation::Add);
        assert_eq!(close_out.order.side, Side::Sell);
        assert_eq!(close_out.order.price, dec!(105));
        assert_eq!(close_out.order.size, dec!(0.01));
        // Close-out rests under its own id, distinct from the entry sell.
        assert_ne!(close_out.order.cl_ord_id, commands[2].order.cl_ord_id);
        assert!(oms.resting().contains_key(&close_out.order.cl_ord_id));
    }

    #[test]
    fn close_out_resets_the_position_cap() {
        let (mut oms, bus) = oms(1);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        oms.on_brick(&falling(2, dec!(105)));
        // Cap was consumed by brick 1 and released by the close-out, so this
        // rising brick trades again.
        oms.on_brick(&rising(3, dec!(105)));
        bus.stop();
        let commands = sink.lock().unwrap();
        let last = commands.last().unwrap();
        assert_eq!(last.operation, OrderOperation::Add);
        assert_eq!(last.order.side, Side::Buy);
        assert_eq!(last.order.price, dec!(115));
    }

    #[test]
    fn sell_entry_size_flattens_a_long_position() {
        let (mut oms, bus) = oms(2);
        let sink = commands(&bus);
        bus.start();
        // Two stacked buys fill, so the long is twice the clip.
        oms.on_brick(&rising(1, dec!(100)));
        oms.on_brick(&rising(2, dec!(106)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        oms.on_execution_report(&report("2", ExecStatus::Filled, dec!(0.01), 61));
        assert_eq!(oms.net_position(), dec!(0.02));
        oms.on_brick(&falling(3, dec!(111)));
        bus.stop();
        let commands = sink.lock().unwrap();
        let entry_sell = commands
            .iter()
            .find(|command| {
                command.operation == OrderOperation::Add && command.order.side == Side::Sell
            })
            .unwrap();
        // The entry sell carries the whole long, not the configured clip.
        assert_eq!(entry_sell.order.size, dec!(0.02));
    }

    #[test]
    fn buy_entry_size_flattens_a_short_position() {
        let (mut oms, bus) = oms(1);
        let sink = commands(&bus);
        bus.start();
        oms.on_brick(&falling(1, dec!(105)));
        oms.on_execution_report(&report("1", ExecStatus::Filled, dec!(0.01), 60));
        assert_eq!(oms.net_position(), dec!(-0.01));
        // No buy rests above the last entry, so a buy goes out sized to
        // the short.
        oms.on_brick(&rising(2, dec!(101)));
        bus.stop();
        let commands = sink.lock().unwrap();
        let buy = commands
            .iter()
            .rev()
            .find(|command| command.operation == OrderOperation::Add)
            .unwrap();
        assert_eq!(buy.order.side, Side::Buy);
        assert_eq!(buy.order.price, dec!(111));
        assert_eq!(buy.order.size, dec!(0.01));
    }

    #[test]
    fn report_with_orig_cl_ord_id_resolves_the_original_order() {
        let (mut oms, bus) = oms(1);
        bus.start();
        oms.on_brick(&rising(1, dec!(100)));
        let mut cancel_ack = report("D1", ExecStatus::Canceled, dec!(0.01), 70);
        cancel_ack.orig_cl_ord_id = Some("1".to_string());
        oms.on_execution_report(&cancel_ack);
        bus.stop();
        assert!(oms.resting().is_empty());
    }

    #[test]
    fn unmatched_report_is_ignored() {
        let (mut oms, bus) = oms(1);
        bus.start();
        oms.on_execution_report(&report("99", ExecStatus::Filled, dec!(1), 10));
        bus.stop();
        assert_eq!(oms.net_position(), Decimal::ZERO);
        assert!(oms.resting().is_empty());
    }
}
