use log::debug;
use rust_decimal::Decimal;

use crate::domain::events::{Event, EventKind};
use crate::domain::model::brick::Brick;
use crate::infrastructure::bus::EventBus;

/// Turns the raw price signal into renko bricks. The first price only seeds
/// the anchor; from then on every full `brick_size` excursion from the last
/// brick close emits one brick, and a large move emits as many bricks as it
/// spans, in order.
pub struct RenkoEngine {
    brick_size: Decimal,
    anchor: Option<Decimal>,
    last_brick_time: i64,
    bus: EventBus,
}

impl RenkoEngine {
    pub fn new(brick_size: Decimal, bus: EventBus) -> Self {
        Self {
            brick_size,
            anchor: None,
            last_brick_time: 0,
            bus,
        }
    }

    pub fn install(mut self, bus: &EventBus) {
        bus.subscribe(EventKind::Price, move |event| {
            if let Event::Price(price) = event {
                self.on_price(*price);
            }
        });
    }

    pub fn on_price(&mut self, price: Decimal) {
        debug!("New price received {}", price);
        let Some(mut anchor) = self.anchor else {
            self.anchor = Some(price);
            return;
        };
        loop {
            if price >= anchor + self.brick_size {
                self.emit(anchor, anchor + self.brick_size);
                anchor += self.brick_size;
            } else if price <= anchor - self.brick_size {
                self.emit(anchor, anchor - self.brick_size);
                anchor -= self.brick_size;
            } else {
                break;
            }
        }
        self.anchor = Some(anchor);
    }

    fn emit(&mut self, open: Decimal, close: Decimal) {
        let mut time = chrono::Utc::now().timestamp_millis();
        // Brick times must be strictly increasing even when several bricks
        // come out of one price tick.
        if time <= self.last_brick_time {
            time = self.last_brick_time + 1;
        }
        self.last_brick_time = time;
        let brick = Brick::new(time, open, close);
        debug!("Created new renko brick: {}", brick);
        self.bus.publish(Event::Brick(brick));
    }
}
