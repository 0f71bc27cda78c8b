//! Sync session: fetch, upgrade to push, fall back to polling
//!
//! A [`SyncSession`] owns one driver task. Every event the session reacts to
//! (poll tick, fetch completion, push open, push frame, purchase command,
//! cancellation) is handled inside that task's single `select!` loop, so the
//! snapshot, history and state machine are never touched concurrently.

use crate::push::{PushChannel, PushConnector, WebSocketConnector};
use crate::source::{HttpSnapshotSource, SnapshotSource};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use ticketsync_core::{
    ChannelMode, Error, EventBus, HistoryBuffer, HistoryPoint, PurchaseSimulator, PushMessage,
    Result, Snapshot, SyncConfig, SyncState, SyncStateMachine, SyncStatus, SyncUpdate,
    UpdateOrigin,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const COMMAND_CAPACITY: usize = 32;
const UPDATE_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type FetchFuture = BoxFuture<'static, Result<Snapshot>>;
type OpenFuture = BoxFuture<'static, Result<Box<dyn PushChannel>>>;

/// A running (or runnable) synchronization session for one event
pub struct SyncSession {
    bus: Arc<EventBus<SyncUpdate>>,
    status: watch::Receiver<SyncStatus>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Ready(Box<Driver>),
    Running(JoinHandle<()>),
    Finished,
}

enum Command {
    Purchase {
        quantity: u32,
        reply: oneshot::Sender<Result<u64>>,
    },
}

impl SyncSession {
    /// Create a session using the HTTP snapshot endpoint and WebSocket push
    pub fn new(config: SyncConfig) -> Result<Self> {
        let url = config.snapshot_url()?;
        let source = HttpSnapshotSource::new(url, config.fields.clone());
        Self::with_transports(config, Arc::new(source), Arc::new(WebSocketConnector::new()))
    }

    /// Create a session with explicit transports
    pub fn with_transports(
        config: SyncConfig,
        source: Arc<dyn SnapshotSource>,
        connector: Arc<dyn PushConnector>,
    ) -> Result<Self> {
        config.validate()?;

        let (status_tx, status_rx) = watch::channel(SyncStatus::default());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let bus = Arc::new(EventBus::new(UPDATE_CAPACITY));
        let cancel = CancellationToken::new();

        let driver = Driver {
            history: HistoryBuffer::new(config.history_capacity),
            machine: SyncStateMachine::new(),
            snapshot: None,
            config,
            source,
            connector,
            bus: bus.clone(),
            status: status_tx,
            commands: command_rx,
            cancel: cancel.clone(),
        };

        Ok(Self {
            bus,
            status: status_rx,
            commands: command_tx,
            cancel,
            lifecycle: Mutex::new(Lifecycle::Ready(Box::new(driver))),
        })
    }

    /// Spawn the driver. Starting a running session is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Finished) {
            Lifecycle::Ready(driver) => {
                *lifecycle = Lifecycle::Running(tokio::spawn((*driver).run()));
                Ok(())
            }
            running @ Lifecycle::Running(_) => {
                debug!("Sync session already running");
                *lifecycle = running;
                Ok(())
            }
            Lifecycle::Finished => Err(Error::SessionClosed),
        }
    }

    /// Stop the session and wait for the driver to exit.
    ///
    /// Cancels the polling interval, closes any push channel and discards
    /// in-flight fetches and opens. Safe to call repeatedly; once it returns
    /// no further update is published.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Finished) {
            Lifecycle::Ready(mut driver) => {
                driver.machine.stop();
                driver.publish_status();
            }
            Lifecycle::Running(handle) => {
                if let Err(e) = handle.await {
                    warn!("Sync driver task failed: {}", e);
                }
            }
            Lifecycle::Finished => {}
        }
    }

    /// Apply a local, optimistic purchase of `quantity` tickets
    pub async fn simulate_purchase(&self, quantity: u32) -> Result<u64> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity(quantity));
        }

        // Nothing has been fetched before the driver runs.
        match &*self.lifecycle.lock().await {
            Lifecycle::Ready(_) => return Err(Error::UnknownRemaining),
            Lifecycle::Finished => return Err(Error::SessionClosed),
            Lifecycle::Running(_) => {}
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Purchase { quantity, reply })
            .await
            .map_err(|_| Error::SessionClosed)?;

        response.await.map_err(|_| Error::SessionClosed)?
    }

    /// Subscribe to updates
    pub fn subscribe(&self) -> broadcast::Receiver<SyncUpdate> {
        self.bus.subscribe()
    }

    /// Current status copy
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> SyncState {
        self.status.borrow().state
    }

    pub fn mode(&self) -> ChannelMode {
        self.status.borrow().mode
    }

    pub fn remaining(&self) -> Option<u64> {
        self.status.borrow().remaining()
    }

    pub fn history(&self) -> Vec<HistoryPoint> {
        self.status.borrow().history.clone()
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Transport resources owned by the driver loop
#[derive(Default)]
struct Transport {
    opening: Option<OpenFuture>,
    channel: Option<Box<dyn PushChannel>>,
    ticker: Option<Interval>,
    fetches: FuturesUnordered<FetchFuture>,
}

struct Driver {
    config: SyncConfig,
    source: Arc<dyn SnapshotSource>,
    connector: Arc<dyn PushConnector>,
    machine: SyncStateMachine,
    snapshot: Option<Snapshot>,
    history: HistoryBuffer,
    bus: Arc<EventBus<SyncUpdate>>,
    status: watch::Sender<SyncStatus>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut transport = Transport::default();

        let initial = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.source.fetch_snapshot() => Some(result),
        };

        if let Some(result) = initial {
            self.apply_fetch(result, UpdateOrigin::InitialFetch);
            self.choose_transport(&mut transport);
            self.event_loop(&mut transport).await;
        }

        self.teardown(transport).await;
    }

    async fn event_loop(&mut self, transport: &mut Transport) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                opened = wait_open(&mut transport.opening) => {
                    transport.opening = None;
                    self.handle_open(transport, opened);
                }
                frame = recv_push(&mut transport.channel) => {
                    self.handle_push(transport, frame);
                }
                _ = tick(&mut transport.ticker) => {
                    let source = self.source.clone();
                    transport
                        .fetches
                        .push(async move { source.fetch_snapshot().await }.boxed());
                }
                Some(result) = transport.fetches.next(), if !transport.fetches.is_empty() => {
                    self.apply_fetch(result, UpdateOrigin::Poll);
                }
            }
        }
    }

    /// Push when configured and an identifier is known, otherwise poll
    fn choose_transport(&mut self, transport: &mut Transport) {
        let identifier = self
            .snapshot
            .as_ref()
            .and_then(|s| s.push_identifier())
            .map(str::to_owned);

        let push_url = match identifier {
            Some(id) => self.config.push_url(&id).unwrap_or_else(|e| {
                warn!("Cannot build push address: {}", e);
                None
            }),
            None => {
                if self.config.push_address.is_some() {
                    info!("No event identifier available, push channel skipped");
                }
                None
            }
        };

        match push_url {
            Some(url) => self.begin_push(transport, url),
            None => self.start_polling(transport),
        }
    }

    fn begin_push(&mut self, transport: &mut Transport, url: Url) {
        if let Err(e) = self.machine.begin_push() {
            warn!("Refusing to open push channel: {}", e);
            return;
        }

        info!("Opening push channel {}", url);
        let connector = self.connector.clone();
        transport.opening = Some(async move { connector.connect(&url).await }.boxed());
        self.emit(UpdateOrigin::ModeChange);
    }

    fn start_polling(&mut self, transport: &mut Transport) {
        match self.machine.enter_polling() {
            Ok(true) => {
                let period = self.config.polling_interval();
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                transport.ticker = Some(ticker);

                info!("Polling snapshot every {:?}", period);
                self.emit(UpdateOrigin::ModeChange);
            }
            Ok(false) => debug!("Already polling"),
            Err(e) => warn!("Cannot start polling: {}", e),
        }
    }

    fn handle_open(&mut self, transport: &mut Transport, opened: Result<Box<dyn PushChannel>>) {
        match opened {
            Ok(channel) => match self.machine.push_opened() {
                Ok(()) => {
                    info!("Push channel open");
                    transport.channel = Some(channel);
                    self.emit(UpdateOrigin::ModeChange);
                }
                Err(e) => warn!("Discarding push channel: {}", e),
            },
            Err(e) => {
                warn!("Push channel failed to open, falling back to polling: {}", e);
                metrics::counter!("ticketsync_push_fallbacks_total", "reason" => "init")
                    .increment(1);
                self.start_polling(transport);
            }
        }
    }

    fn handle_push(&mut self, transport: &mut Transport, frame: Option<Result<String>>) {
        match frame {
            Some(Ok(text)) => match PushMessage::parse_remaining(&text) {
                Ok(Some(remaining)) => self.accept(remaining, UpdateOrigin::Push),
                Ok(None) => debug!("Ignoring push message without a remaining count"),
                Err(e) => debug!("Dropping push message: {}", e),
            },
            Some(Err(e)) => self.push_dropped(transport, e),
            None => self.push_dropped(transport, Error::channel_dropped("closed by peer")),
        }
    }

    fn push_dropped(&mut self, transport: &mut Transport, error: Error) {
        transport.channel = None;
        warn!("{}, falling back to polling", error);
        metrics::counter!("ticketsync_push_fallbacks_total", "reason" => "dropped").increment(1);
        self.start_polling(transport);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Purchase { quantity, reply } => {
                let result =
                    PurchaseSimulator::apply(self.snapshot.as_mut(), &mut self.history, quantity);
                if let Ok(remaining) = result {
                    debug!("Simulated purchase of {} ticket(s), {} left", quantity, remaining);
                    self.record(UpdateOrigin::Purchase);
                }
                let _ = reply.send(result);
            }
        }
    }

    fn apply_fetch(&mut self, result: Result<Snapshot>, origin: UpdateOrigin) {
        let fresh = match result {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Snapshot fetch failed: {}", e);
                metrics::counter!("ticketsync_fetch_failures_total", "kind" => e.kind())
                    .increment(1);
                return;
            }
        };

        let remaining = fresh.remaining;
        match self.snapshot.as_mut() {
            Some(current) => current.merge(fresh),
            None => self.snapshot = Some(fresh),
        }

        match remaining {
            Some(remaining) => {
                self.history.append(Some(remaining));
                self.record(origin);
            }
            None => {
                debug!("Snapshot carried no numeric remaining count");
                self.publish_status();
            }
        }
    }

    fn accept(&mut self, remaining: u64, origin: UpdateOrigin) {
        let snapshot = self.snapshot.get_or_insert_with(|| Snapshot {
            id: None,
            remaining: None,
            metadata: Value::Null,
        });
        snapshot.remaining = Some(remaining);
        self.history.append(Some(remaining));
        self.record(origin);
    }

    fn record(&self, origin: UpdateOrigin) {
        metrics::counter!("ticketsync_updates_total", "origin" => origin.as_str()).increment(1);
        self.emit(origin);
    }

    fn emit(&self, origin: UpdateOrigin) {
        let update = SyncUpdate {
            mode: self.machine.mode(),
            state: self.machine.state(),
            remaining: self.snapshot.as_ref().and_then(|s| s.remaining),
            origin,
            at: Utc::now(),
        };
        self.publish_status();
        self.bus.publish(update);
    }

    fn publish_status(&self) {
        self.status.send_replace(SyncStatus {
            state: self.machine.state(),
            mode: self.machine.mode(),
            snapshot: self.snapshot.clone(),
            history: self.history.values(),
        });
    }

    async fn teardown(mut self, mut transport: Transport) {
        transport.ticker = None;
        transport.opening = None;
        transport.fetches.clear();

        if let Some(mut channel) = transport.channel.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, channel.close())
                .await
                .is_err()
            {
                debug!("Timed out closing push channel");
            }
        }

        if self.machine.stop() {
            info!("Sync session stopped");
            self.emit(UpdateOrigin::ModeChange);
        }
    }
}

async fn wait_open(opening: &mut Option<OpenFuture>) -> Result<Box<dyn PushChannel>> {
    match opening.as_mut() {
        Some(open) => open.await,
        None => std::future::pending().await,
    }
}

async fn recv_push(channel: &mut Option<Box<dyn PushChannel>>) -> Option<Result<String>> {
    match channel.as_mut() {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
