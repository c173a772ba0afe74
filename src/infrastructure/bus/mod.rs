//! Ordered, single-worker event dispatcher.
//!
//! `publish` is a non-blocking enqueue and may be called from any thread
//! (session I/O tasks, timers, the presentation thread). Exactly one worker
//! thread drains the queue in arrival order and runs every handler for an
//! event before moving to the next one, so the components behind it mutate
//! their state without locks. Registrations travel through the same queue,
//! which keeps the registry owned by the worker and makes subscribing from
//! inside a handler safe.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::domain::events::{Event, EventKind};

const STOP_GRACE: Duration = Duration::from_secs(5);

pub type Handler = Box<dyn FnMut(&Event) + Send + 'static>;

struct Registration {
    kinds: Vec<EventKind>,
    handler: Handler,
}

enum Intake {
    Event(Event),
    Register(Registration),
    Shutdown,
}

struct Shared {
    intake: Mutex<Option<Receiver<Intake>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    done: Mutex<Option<Receiver<()>>>,
}

/// Cheap to clone; every clone talks to the same queue and worker.
#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Intake>,
    shared: Arc<Shared>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            shared: Arc::new(Shared {
                intake: Mutex::new(Some(rx)),
                worker: Mutex::new(None),
                done: Mutex::new(None),
            }),
        }
    }

    /// Enqueue an event; never blocks. Events published before `start` are
    /// held in the queue until the worker comes up.
    pub fn publish(&self, event: Event) {
        if self.tx.send(Intake::Event(event)).is_err() {
            warn!("Event bus is stopped, event dropped");
        }
    }

    /// Register one more handler for `kind`. Handlers for the same kind are
    /// chained in registration order, never replaced.
    pub fn subscribe(&self, kind: EventKind, handler: impl FnMut(&Event) + Send + 'static) {
        self.subscribe_many(&[kind], handler);
    }

    /// Register a single handler for several event kinds at once. Useful for
    /// components that keep one state across kinds (e.g. the OMS consumes
    /// both bricks and execution reports).
    pub fn subscribe_many(&self, kinds: &[EventKind], handler: impl FnMut(&Event) + Send + 'static) {
        let registration = Registration {
            kinds: kinds.to_vec(),
            handler: Box::new(handler),
        };
        if self.tx.send(Intake::Register(registration)).is_err() {
            warn!("Event bus is stopped, subscription dropped");
        }
    }

    /// Spawn the worker thread. Idempotent.
    pub fn start(&self) {
        let rx = match self.shared.intake.lock().expect_poisoned().take() {
            Some(rx) => rx,
            None => {
                warn!("Event dispatcher already started");
                return;
            }
        };
        let (done_tx, done_rx) = mpsc::channel();
        *self.shared.done.lock().expect_poisoned() = Some(done_rx);
        let handle = thread::Builder::new()
            .name("event-dispatcher".into())
            .spawn(move || {
                run_dispatcher(rx);
                let _ = done_tx.send(());
            })
            .expect("failed to spawn event dispatcher thread");
        *self.shared.worker.lock().expect_poisoned() = Some(handle);
    }

    /// Signal the worker to exit and join it with a bounded grace period.
    /// Events still queued behind the shutdown signal are discarded.
    /// Idempotent.
    pub fn stop(&self) {
        let handle = match self.shared.worker.lock().expect_poisoned().take() {
            Some(handle) => handle,
            None => {
                warn!("Event dispatcher already stopped");
                return;
            }
        };
        let _ = self.tx.send(Intake::Shutdown);
        let done = self.shared.done.lock().expect_poisoned().take();
        match done {
            Some(done_rx) => match done_rx.recv_timeout(STOP_GRACE) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = handle.join();
                    info!("Event dispatcher stopped");
                }
                Err(RecvTimeoutError::Timeout) => {
                    // A stuck handler; the thread is left to die with the process.
                    warn!("Event dispatcher did not stop within {:?}", STOP_GRACE);
                }
            },
            None => {
                let _ = handle.join();
            }
        }
    }
}

fn run_dispatcher(rx: Receiver<Intake>) {
    let mut registry: Vec<Registration> = Vec::new();
    while let Ok(intake) = rx.recv() {
        match intake {
            Intake::Event(event) => dispatch(&mut registry, &event),
            Intake::Register(registration) => registry.push(registration),
            Intake::Shutdown => {
                debug!("Event dispatcher received shutdown signal");
                break;
            }
        }
    }
}

fn dispatch(registry: &mut [Registration], event: &Event) {
    let kind = event.kind();
    for registration in registry.iter_mut() {
        if !registration.kinds.contains(&kind) {
            continue;
        }
        let handler = &mut registration.handler;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
            error!("Handler for {:?} panicked: {:?}", kind, panic_message(&panic));
        }
    }
    // Price and market-data events are too chatty to log.
    if !matches!(
        kind,
        EventKind::MarketData | EventKind::Trades | EventKind::Price
    ) {
        debug!("Event {:?} processed: {:?}", kind, event);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

trait ExpectPoisoned<T> {
    fn expect_poisoned(self) -> T;
}

impl<'a, T> ExpectPoisoned<std::sync::MutexGuard<'a, T>>
    for Result<std::sync::MutexGuard<'a, T>, std::sync::PoisonError<std::sync::MutexGuard<'a, T>>>
{
    // The bus mutexes only guard handle ownership; poisoning there is fatal.
    fn expect_poisoned(self) -> std::sync::MutexGuard<'a, T> {
        self.unwrap_or_else(|e| e.into_inner())
    }
}
