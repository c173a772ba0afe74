//! FIX initiator session layer over tokio TCP.
//!
//! Each configured session runs in its own task: connect, logon with
//! sequence reset, pump inbound frames and outbound messages, answer test
//! requests, and reconnect after a delay when the transport drops. The rest
//! of the engine only sees [`SessionHandle`] and [`FixHandler`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

use crate::infrastructure::fix::codec::{extract_frame, msg_type, tags, FieldMap, FixMessage};
use crate::infrastructure::fix::messages;
use crate::infrastructure::fix::settings::{SessionConfig, SessionSettings};

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Outbound face of one session, usable from any thread.
#[cfg_attr(test, mockall::automock)]
pub trait SessionHandle: Send + Sync {
    fn is_trade(&self) -> bool;
    fn is_logged_on(&self) -> bool;
    fn send(&self, message: FixMessage) -> Result<()>;
    fn logout(&self);
}

/// Callbacks into the application; invoked from the session tasks.
pub trait FixHandler: Send + Sync {
    fn on_logon(&self, session: &SessionConfig);
    fn on_logout(&self, session: &SessionConfig);
    fn on_message(&self, session: &SessionConfig, message: FixMessage);
}

enum Outbound {
    App(FixMessage),
    Logout,
}

pub struct Session {
    config: SessionConfig,
    credentials: Credentials,
    outbound: mpsc::UnboundedSender<Outbound>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    logged_on: AtomicBool,
}

impl SessionHandle for Session {
    fn is_trade(&self) -> bool {
        self.config.is_trade_session()
    }

    fn is_logged_on(&self) -> bool {
        self.logged_on.load(Ordering::Acquire)
    }

    fn send(&self, message: FixMessage) -> Result<()> {
        self.outbound
            .send(Outbound::App(message))
            .map_err(|_| anyhow!("session {} task is gone", self.config.target_comp_id))
    }

    fn logout(&self) {
        let _ = self.outbound.send(Outbound::Logout);
    }
}

/// Owns every session task. `start` spawns them on the current tokio
/// runtime; `stop` logs the sessions out and waits for the tasks.
pub struct Initiator {
    sessions: Vec<Arc<Session>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Initiator {
    pub fn new(settings: SessionSettings, credentials: Credentials) -> Self {
        let sessions = settings
            .sessions
            .into_iter()
            .map(|config| {
                let (tx, rx) = mpsc::unbounded_channel();
                Arc::new(Session {
                    config,
                    credentials: credentials.clone(),
                    outbound: tx,
                    inbox: Mutex::new(Some(rx)),
                    logged_on: AtomicBool::new(false),
                })
            })
            .collect();
        let (shutdown, _) = watch::channel(false);
        Self {
            sessions,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions(&self) -> Vec<Arc<dyn SessionHandle>> {
        self.sessions
            .iter()
            .map(|s| s.clone() as Arc<dyn SessionHandle>)
            .collect()
    }

    pub fn start(&self, handler: Arc<dyn FixHandler>) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| anyhow!("initiator state poisoned"))?;
        for session in &self.sessions {
            let rx = session
                .inbox
                .lock()
                .map_err(|_| anyhow!("initiator state poisoned"))?
                .take()
                .ok_or_else(|| anyhow!("initiator already started"))?;
            let session = session.clone();
            let handler = handler.clone();
            let shutdown = self.shutdown.subscribe();
            tasks.push(tokio::spawn(run_session(session, rx, handler, shutdown)));
        }
        Ok(())
    }

    /// Logout every connected session, then stop the tasks.
    pub async fn stop(&self) {
        for session in &self.sessions {
            if session.is_logged_on() {
                session.logout();
            }
        }
        // Give the logouts a moment on the wire before tearing down.
        sleep(Duration::from_millis(500)).await;
        let _ = self.shutdown.send(true);
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}

async fn run_session(
    session: Arc<Session>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    handler: Arc<dyn FixHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let config = session.config.clone();
    loop {
        match TcpStream::connect((config.host.as_str(), config.port)).await {
            Ok(stream) => {
                info!(
                    "Session {}{} connected to {}:{}",
                    config.target_comp_id,
                    config.qualifier.as_deref().unwrap_or(""),
                    config.host,
                    config.port
                );
                if let Err(error) =
                    run_connection(&session, stream, &mut rx, &handler, &mut shutdown).await
                {
                    warn!("Session {} dropped: {error:#}", config.target_comp_id);
                }
            }
            Err(error) => {
                warn!(
                    "Session {} connect to {}:{} failed: {error}",
                    config.target_comp_id, config.host, config.port
                );
            }
        }
        if session.logged_on.swap(false, Ordering::AcqRel) {
            handler.on_logout(&config);
        }
        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            _ = sleep(Duration::from_secs(config.reconnect_interval)) => {}
            _ = shutdown.changed() => return,
        }
    }
}

async fn run_connection(
    session: &Arc<Session>,
    stream: TcpStream,
    rx: &mut mpsc::UnboundedReceiver<Outbound>,
    handler: &Arc<dyn FixHandler>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let config = &session.config;
    let (mut reader, mut writer) = stream.into_split();
    // ResetSeqNumFlag=Y on every logon, so each connection starts at 1.
    let mut seq_num: u64 = 1;
    send_message(
        &mut writer,
        &mut seq_num,
        config,
        messages::logon(
            config.heart_bt_int,
            &session.credentials.username,
            &session.credentials.password,
        ),
    )
    .await?;

    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut heartbeat = interval(Duration::from_secs(config.heart_bt_int.max(1)));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.reset();
    let mut last_inbound = Instant::now();
    let stale_after = Duration::from_secs(config.heart_bt_int.max(1) * 2 + 1);

    loop {
        while let Some(frame) = extract_frame(&mut buf) {
            last_inbound = Instant::now();
            let message = FixMessage::decode(&frame).context("decoding inbound frame")?;
            match message.msg_type() {
                msg_type::LOGON => {
                    session.logged_on.store(true, Ordering::Release);
                    info!("Session {} logged on", config.target_comp_id);
                    handler.on_logon(config);
                }
                msg_type::TEST_REQUEST => {
                    let reply = messages::heartbeat(message.get(tags::TEST_REQ_ID));
                    send_message(&mut writer, &mut seq_num, config, reply).await?;
                }
                msg_type::HEARTBEAT => {}
                msg_type::LOGOUT => {
                    info!("Session {} received logout", config.target_comp_id);
                    return Ok(());
                }
                msg_type::RESEND_REQUEST | msg_type::SEQUENCE_RESET | msg_type::REJECT => {
                    debug!(
                        "Session {} admin message {}: {:?}",
                        config.target_comp_id,
                        message.msg_type(),
                        message
                    );
                }
                _ => handler.on_message(config, message),
            }
        }
        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                if read.context("reading session socket")? == 0 {
                    bail!("peer closed the connection");
                }
            }
            outbound = rx.recv() => match outbound {
                Some(Outbound::App(message)) => {
                    send_message(&mut writer, &mut seq_num, config, message).await?;
                }
                Some(Outbound::Logout) => {
                    send_message(&mut writer, &mut seq_num, config, messages::logout()).await?;
                }
                None => bail!("session handle dropped"),
            },
            _ = heartbeat.tick() => {
                if last_inbound.elapsed() > stale_after {
                    bail!("no inbound traffic for {:?}", stale_after);
                }
                send_message(&mut writer, &mut seq_num, config, messages::heartbeat(None)).await?;
            }
            _ = shutdown.changed() => {
                send_message(&mut writer, &mut seq_num, config, messages::logout()).await?;
                return Ok(());
            }
        }
    }
}

async fn send_message(
    writer: &mut OwnedWriteHalf,
    seq_num: &mut u64,
    config: &SessionConfig,
    message: FixMessage,
) -> Result<()> {
    let wire = message.encode(
        *seq_num,
        &config.sender_comp_id,
        &config.target_comp_id,
        &messages::transact_time_now(),
    );
    *seq_num += 1;
    debug!(
        "Session {} sent {}",
        config.target_comp_id,
        message.msg_type()
    );
    writer.write_all(&wire).await.context("writing to session socket")?;
    Ok(())
}
