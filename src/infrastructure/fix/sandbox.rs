//! Paper-trading stand-in for the order-entry session. Fills are
//! all-or-nothing against the strategy's own price signal.

use std::collections::HashMap;

use log::info;
use rust_decimal::Decimal;

use crate::domain::enums::{OrderOperation, Side};
use crate::domain::events::{Event, EventKind};
use crate::domain::model::execution_report::{ExecStatus, ExecutionReport};
use crate::domain::model::order::StrategyOrder;
use crate::infrastructure::bus::EventBus;

pub struct SandboxExecutor {
    orders: HashMap<String, StrategyOrder>,
    bus: EventBus,
}

impl SandboxExecutor {
    pub fn new(bus: EventBus) -> Self {
        Self {
            orders: HashMap::new(),
            bus,
        }
    }

    pub fn install(mut self, bus: &EventBus) {
        info!("Sandbox order executor active, orders will not reach the venue");
        bus.subscribe_many(&[EventKind::Price, EventKind::OrderCommand], move |event| {
            match event {
                Event::Price(price) => self.on_price(*price),
                Event::OrderCommand(command) => match command.operation {
                    OrderOperation::Add => self.new_order(&command.order),
                    OrderOperation::Delete => self.cancel_order(&command.order),
                    OrderOperation::Fill => {}
                },
                _ => {}
            }
        });
    }

    fn on_price(&mut self, price: Decimal) {
        let crossed: Vec<String> = self
            .orders
            .values()
            .filter(|order| match order.side {
                Side::Buy => order.price >= price,
                Side::Sell => order.price <= price,
            })
            .map(|order| order.cl_ord_id.clone())
            .collect();
        for id in crossed {
            if let Some(order) = self.orders.remove(&id) {
                self.report(&order, ExecStatus::Filled, order.size, order.size, Decimal::ZERO);
            }
        }
    }

    fn new_order(&mut self, order: &StrategyOrder) {
        self.orders.insert(order.cl_ord_id.clone(), order.clone());
        self.report(order, ExecStatus::New, Decimal::ZERO, Decimal::ZERO, order.size);
    }

    fn cancel_order(&mut self, order: &StrategyOrder) {
        let status = if self.orders.remove(&order.cl_ord_id).is_some() {
            ExecStatus::Canceled
        } else {
            ExecStatus::Rejected
        };
        self.report(order, status, Decimal::ZERO, Decimal::ZERO, order.size);
    }

    fn report(
        &self,
        order: &StrategyOrder,
        status: ExecStatus,
        last_qty: Decimal,
        cum_qty: Decimal,
        leaves_qty: Decimal,
    ) {
        self.bus.publish(Event::ExecutionReport(ExecutionReport {
            exchange_order_id: order.cl_ord_id.clone(),
            cl_ord_id: order.cl_ord_id.clone(),
            orig_cl_ord_id: None,
            status,
            last_qty,
            cum_qty,
            leaves_qty,
            transaction_time: chrono::Utc::now().timestamp_millis(),
            reject_reason: None,
            text: None,
        }));
    }
}
