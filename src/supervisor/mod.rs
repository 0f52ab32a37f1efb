//! Connection supervisor
//!
//! Owns the device link for its whole life: the first connect, liveness
//! checking, automatic reconnection and teardown. All mutable link state sits
//! behind one mutex and is only changed here; other components read it
//! through [`ConnectionSupervisor::state`], [`ConnectionSupervisor::is_connected`]
//! and [`ConnectionSupervisor::device`].
//!
//! # Threads
//!
//! - the caller's thread runs [`ConnectionSupervisor::connect`]
//! - one supervision thread runs [`ConnectionSupervisor::supervise_reconnect`]
//! - one [`LinkWatchdog`] thread per transport generation
//!
//! Every transport that gets published bumps a generation counter. Watchdogs
//! and reconnect signals carry the generation they were issued for, so
//! anything that refers to a replaced transport is ignored.

pub mod retry;
pub mod watchdog;

pub use retry::RetryPolicy;
pub use watchdog::{LinkProbe, LinkWatchdog, ProbeOutcome};

use crate::cancel::CancelToken;
use crate::config::AppConfig;
use crate::device::{DeviceRpc, DeviceSource, RpcConnector, ScreenCallback};
use crate::error::{LinkError, Result, ResultExt};
use crate::serial::{
    EndpointIdentity, EndpointLocator, PortOpener, SerialPortOpener, SessionOpener, Transport,
};
use crate::types::ConnectionState;
use crossbeam_channel::{after, bounded, select, Receiver, Sender, TrySendError};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default interval between liveness probes
pub const DEFAULT_WATCHDOG_INTERVAL: Duration =
    Duration::from_millis(crate::config::DEFAULT_WATCHDOG_INTERVAL_MS);

/// Default timeout for establishing the RPC session
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(crate::config::DEFAULT_RPC_TIMEOUT_MS);

// Probe handle; the RPC session owns the stream it was given. Only the
// watchdog of the matching generation writes through it, never under `slot`.
type ProbeTransport = Arc<Mutex<Box<dyn Transport>>>;

struct LinkSlot {
    transport: Option<ProbeTransport>,
    device: Option<Arc<dyn DeviceRpc>>,
    state: ConnectionState,
    generation: u64,
    reconnecting: bool,
    closing: bool,
}

impl LinkSlot {
    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if self.state.can_transition_to(next) {
            tracing::debug!("Connection state {} -> {}", self.state, next);
            self.state = next;
        } else {
            tracing::debug!("Ignoring connection state change {} -> {}", self.state, next);
        }
    }

    fn clear(&mut self) {
        self.transport = None;
        self.device = None;
        self.generation += 1;
    }
}

/// Builder for [`ConnectionSupervisor`]
pub struct SupervisorBuilder {
    connector: Arc<dyn RpcConnector>,
    locator: Option<EndpointLocator>,
    opener: Option<Arc<dyn PortOpener>>,
    port: Option<String>,
    screen: Option<ScreenCallback>,
    watchdog_interval: Duration,
    rpc_timeout: Duration,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl SupervisorBuilder {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            connector,
            locator: None,
            opener: None,
            port: None,
            screen: None,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Seed every setting from the loaded configuration
    pub fn from_config(config: &AppConfig, connector: Arc<dyn RpcConnector>) -> Self {
        let device = &config.device;
        let connection = &config.connection;
        Self::new(connector)
            .locator(EndpointLocator::system(device.identity()).with_policy(device.multiple_match))
            .opener(Arc::new(SerialPortOpener::new(
                device.baud_rate,
                connection.read_timeout(),
            )))
            .port(device.port.clone())
            .watchdog_interval(connection.watchdog_interval())
            .rpc_timeout(connection.rpc_timeout())
            .retry_policy(RetryPolicy::fixed(connection.reconnect_delay()))
    }

    pub fn locator(mut self, locator: EndpointLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn opener(mut self, opener: Arc<dyn PortOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Pin an endpoint; `None` means autodetect on every attempt
    pub fn port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    /// Receiver of pushed screen frames; required
    pub fn screen_callback(mut self, callback: ScreenCallback) -> Self {
        self.screen = Some(callback);
        self
    }

    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<Arc<ConnectionSupervisor>> {
        let screen = self.screen.ok_or(LinkError::NoCallbackConfigured)?;
        let locator = self.locator.unwrap_or_else(|| {
            EndpointLocator::system(EndpointIdentity::new(
                crate::config::DEFAULT_VENDOR_ID,
                crate::config::DEFAULT_PRODUCT_ID,
            ))
        });
        let opener: Arc<dyn PortOpener> = match self.opener {
            Some(opener) => opener,
            None => Arc::new(SerialPortOpener::new(
                crate::config::DEFAULT_BAUD_RATE,
                Duration::from_millis(crate::config::DEFAULT_READ_TIMEOUT_MS),
            )),
        };
        let (reconnect_tx, reconnect_rx) = bounded(1);

        Ok(Arc::new(ConnectionSupervisor {
            locator,
            sessions: SessionOpener::new(opener, self.cancel.clone()),
            connector: self.connector,
            port: self.port,
            screen,
            watchdog_interval: self.watchdog_interval,
            rpc_timeout: self.rpc_timeout,
            retry: self.retry,
            cancel: self.cancel,
            slot: Mutex::new(LinkSlot {
                transport: None,
                device: None,
                state: ConnectionState::Disconnected,
                generation: 0,
                reconnecting: false,
                closing: false,
            }),
            attempt: Mutex::new(()),
            reconnect_tx,
            reconnect_rx,
        }))
    }
}

/// Keeps one device link alive
///
/// Background threads hold a reference until [`shutdown`](Self::shutdown)
/// cancels them.
pub struct ConnectionSupervisor {
    locator: EndpointLocator,
    sessions: SessionOpener,
    connector: Arc<dyn RpcConnector>,
    port: Option<String>,
    screen: ScreenCallback,
    watchdog_interval: Duration,
    rpc_timeout: Duration,
    retry: RetryPolicy,
    cancel: CancelToken,
    slot: Mutex<LinkSlot>,
    // Serialises connect attempts; never taken while `slot` is held
    attempt: Mutex<()>,
    reconnect_tx: Sender<u64>,
    reconnect_rx: Receiver<u64>,
}

impl ConnectionSupervisor {
    pub fn builder(connector: Arc<dyn RpcConnector>) -> SupervisorBuilder {
        SupervisorBuilder::new(connector)
    }

    fn slot(&self) -> MutexGuard<'_, LinkSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Connect, then supervise reconnection on a background thread
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        self.connect()?;
        Ok(self.spawn_supervision())
    }

    /// Run [`supervise_reconnect`](Self::supervise_reconnect) on its own thread
    pub fn spawn_supervision(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        std::thread::spawn(move || this.supervise_reconnect())
    }

    /// One full connection attempt
    ///
    /// On success the probe transport and device handle are published
    /// together and a watchdog is started for the new generation. On failure
    /// nothing is published.
    pub fn connect(self: &Arc<Self>) -> Result<()> {
        let _attempt = match self.attempt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        {
            let mut slot = self.slot();
            if slot.closing {
                return Err(LinkError::Closed);
            }
            if slot.transport.is_some() {
                tracing::debug!("Dropping previous transport before connecting");
                slot.clear();
            }
            slot.transition(ConnectionState::Connecting);
        }

        match self.establish() {
            Ok((transport, device)) => self.publish(transport, device),
            Err(e) => {
                let mut slot = self.slot();
                if !slot.closing {
                    let next = if slot.reconnecting {
                        ConnectionState::Reconnecting
                    } else {
                        ConnectionState::Disconnected
                    };
                    slot.transition(next);
                }
                Err(e)
            }
        }
    }

    fn establish(&self) -> Result<(Box<dyn Transport>, Arc<dyn DeviceRpc>)> {
        let endpoint = match &self.port {
            Some(port) => port.clone(),
            None => self.locator.locate()?,
        };
        let transport = self
            .sessions
            .open(&endpoint)
            .with_context(|| format!("could not open serial connection on {}", endpoint))?;
        let probe = transport.try_clone_transport()?;
        let device = self
            .connector
            .connect(transport, self.rpc_timeout)
            .context("could not connect to device")?;
        device
            .start_screen_stream(Arc::clone(&self.screen))
            .context("could not start screen stream")?;
        Ok((probe, device))
    }

    fn publish(self: &Arc<Self>, transport: Box<dyn Transport>, device: Arc<dyn DeviceRpc>) -> Result<()> {
        let mut slot = self.slot();
        if slot.closing {
            return Err(LinkError::Closed);
        }
        let name = transport.name().to_string();
        slot.generation += 1;
        slot.transport = Some(Arc::new(Mutex::new(transport)));
        slot.device = Some(device);
        slot.transition(ConnectionState::Connected);

        let probe: Arc<dyn LinkProbe> = Arc::clone(self) as Arc<dyn LinkProbe>;
        LinkWatchdog::new(self.watchdog_interval, slot.generation, self.cancel.clone()).spawn(probe);
        tracing::info!("Connected to device on {}", name);
        Ok(())
    }

    /// Wait for reconnect signals and restore the link after each one
    ///
    /// Returns when the supervisor is shut down.
    pub fn supervise_reconnect(self: &Arc<Self>) {
        loop {
            let generation = select! {
                recv(self.cancel.done()) -> _ => return,
                recv(self.reconnect_rx) -> msg => match msg {
                    Ok(generation) => generation,
                    Err(_) => return,
                },
            };

            {
                let mut slot = self.slot();
                if slot.closing {
                    return;
                }
                if slot.reconnecting || slot.device.is_none() || slot.generation != generation {
                    tracing::debug!("Ignoring reconnect signal for generation {}", generation);
                    continue;
                }
                slot.reconnecting = true;
                slot.clear();
                slot.transition(ConnectionState::Reconnecting);
            }

            tracing::info!("Connection lost, reconnecting");
            let restored = self.reconnect_until_connected();
            // Signals queued meanwhile are judged by their generation on the next pass
            self.slot().reconnecting = false;
            if !restored {
                return;
            }
        }
    }

    fn reconnect_until_connected(self: &Arc<Self>) -> bool {
        let mut attempt = 0u32;
        loop {
            if self.is_connected() {
                return true;
            }
            attempt += 1;
            match self.connect() {
                Ok(()) => {
                    tracing::info!("Reconnected after {} attempt(s)", attempt);
                    return true;
                }
                Err(e) if matches!(e.root(), LinkError::Closed | LinkError::Cancelled) => return false,
                Err(e) => tracing::warn!("Could not reconnect: {}", e),
            }

            select! {
                recv(self.cancel.done()) -> _ => return false,
                recv(after(self.retry.delay_for(attempt))) -> _ => {}
            }
        }
    }

    /// Ask the supervision thread to rebuild the current link
    ///
    /// Returns `false` if a signal was already pending or the supervisor is closed.
    pub fn signal_reconnect(&self) -> bool {
        let generation = {
            let slot = self.slot();
            if slot.closing {
                return false;
            }
            slot.generation
        };
        self.send_signal(generation)
    }

    fn send_signal(&self, generation: u64) -> bool {
        match self.reconnect_tx.try_send(generation) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Reconnect already pending, signal absorbed");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot().state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.slot().state
    }

    /// Generation of the most recently published or cleared transport
    pub fn generation(&self) -> u64 {
        self.slot().generation
    }

    /// Current device handle
    ///
    /// Fails with [`LinkError::Unavailable`] unless connected and with
    /// [`LinkError::Closed`] after shutdown.
    pub fn device(&self) -> Result<Arc<dyn DeviceRpc>> {
        let slot = self.slot();
        if slot.closing {
            return Err(LinkError::Closed);
        }
        match (&slot.device, slot.state) {
            (Some(device), ConnectionState::Connected) => Ok(Arc::clone(device)),
            _ => Err(LinkError::Unavailable),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Tear everything down
    ///
    /// Safe to call from any thread and any number of times; only the call
    /// that performed the teardown returns `true`.
    pub fn shutdown(&self) -> bool {
        let (transport, device) = {
            let mut slot = self.slot();
            if slot.closing {
                return false;
            }
            slot.closing = true;
            slot.transition(ConnectionState::Closed);
            let released = (slot.transport.take(), slot.device.take());
            slot.generation += 1;
            released
        };
        self.cancel.cancel();
        drop(transport);
        drop(device);
        tracing::info!("Connection supervisor shut down");
        true
    }
}

impl LinkProbe for ConnectionSupervisor {
    fn probe(&self, generation: u64) -> ProbeOutcome {
        let transport = {
            let slot = self.slot();
            if slot.closing || slot.generation != generation {
                return ProbeOutcome::Stale;
            }
            if slot.state != ConnectionState::Connected {
                return ProbeOutcome::Idle;
            }
            match &slot.transport {
                Some(transport) => Arc::clone(transport),
                None => return ProbeOutcome::Stale,
            }
        };

        let written = {
            let mut transport = match transport.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            transport.write(&[])
        };

        let slot = self.slot();
        if slot.closing || slot.generation != generation {
            return ProbeOutcome::Stale;
        }
        match written {
            Ok(_) => ProbeOutcome::Healthy,
            Err(e) => ProbeOutcome::Failed(LinkError::Transport(e)),
        }
    }

    fn is_closing(&self) -> bool {
        self.slot().closing
    }

    fn link_lost(&self, generation: u64, error: LinkError) {
        {
            let mut slot = self.slot();
            if slot.closing || slot.generation != generation {
                return;
            }
            tracing::warn!("Lost connection to device: {}", error);
            slot.transition(ConnectionState::Reconnecting);
        }
        self.send_signal(generation);
    }
}

impl DeviceSource for ConnectionSupervisor {
    fn device(&self) -> Result<Arc<dyn DeviceRpc>> {
        ConnectionSupervisor::device(self)
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot();
        f.debug_struct("ConnectionSupervisor")
            .field("port", &self.port)
            .field("state", &slot.state)
            .field("generation", &slot.generation)
            .finish_non_exhaustive()
    }
}
