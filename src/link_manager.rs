//! Device link manager.
//!
//! Owns the single link to the cane: manual connect, obstacle
//! notifications, and the fixed-interval reconnect loop that starts when
//! the link drops. All state lives behind one cloneable handle so the
//! assistant and the transport callbacks share it.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::ble::connection::{LinkEvent, LinkState};
use crate::ble::transport::{ChannelEvent, LinkTransport, NotificationChannel};
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::protocol::ObstacleReport;
use crate::speech::Speaker;

/// Spoken after a manual connect succeeds.
pub const CONNECTED_MESSAGE: &str = "Connection to Smart Cane established successfully.";
/// Spoken after a manual connect fails.
pub const CONNECT_FAILED_MESSAGE: &str = "Connection failed, please try again.";
/// Spoken when the link drops.
pub const DISCONNECTED_MESSAGE: &str = "Smart Cane disconnected. Attempting to reconnect.";
/// Spoken when the reconnect loop succeeds.
pub const RECONNECTED_MESSAGE: &str = "Reconnected to Smart Cane successfully.";
/// Spoken when a manual connect is requested while already connected.
pub const ALREADY_CONNECTED_MESSAGE: &str = "Smart Cane is already connected.";
/// Spoken when a manual connect is requested while another attempt runs.
pub const IN_PROGRESS_MESSAGE: &str = "Smart Cane connection is already in progress.";

/// Floor for the reconnect period; a zero period would spin.
const MIN_RECONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

struct Shared<T: LinkTransport> {
    transport: T,
    speaker: Arc<dyn Speaker>,
    config: LinkConfig,
    state: RwLock<LinkState>,
    /// Last selected device. Kept across disconnects for the reconnect loop.
    device: RwLock<Option<T::Device>>,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    session: Mutex<Option<JoinHandle<()>>>,
    reconnect_attempts: AtomicU64,
    event_tx: broadcast::Sender<LinkEvent>,
    callback_counter: AtomicU64,
}

/// Manages the link to the cane.
pub struct LinkManager<T: LinkTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: LinkTransport> Clone for LinkManager<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: LinkTransport> LinkManager<T> {
    /// Create a manager in the `Idle` state.
    pub fn new(transport: T, speaker: Arc<dyn Speaker>, config: LinkConfig) -> Self {
        let (event_tx, _) = broadcast::channel(32);

        Self {
            shared: Arc::new(Shared {
                transport,
                speaker,
                config,
                state: RwLock::new(LinkState::Idle),
                device: RwLock::new(None),
                reconnect_timer: Mutex::new(None),
                session: Mutex::new(None),
                reconnect_attempts: AtomicU64::new(0),
                event_tx,
                callback_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Get the current link state.
    pub fn state(&self) -> LinkState {
        *self.shared.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Check if the reconnect timer is running.
    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnect_timer.lock().is_some()
    }

    /// Reconnect polls made since the last drop.
    pub fn reconnect_attempts(&self) -> u64 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Subscribe to link events.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Register a callback for announced obstacles.
    pub fn on_obstacle<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let callback_id = self.shared.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.shared.event_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(LinkEvent::Obstacle(text)) => callback(&text),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Obstacle callback lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Select the cane, open its notification channel, and announce the result.
    ///
    /// Only allowed from `Idle` or `Disconnected`. A failed attempt returns
    /// the link to `Idle`; nothing is retried.
    pub async fn connect(&self) -> Result<()> {
        self.shared.connect().await
    }

    /// React to the transport reporting a dropped link.
    pub fn handle_disconnect(&self) {
        self.shared.handle_disconnect();
    }

    /// Decode and announce a notification payload.
    ///
    /// Returns the announced text, if any.
    pub fn handle_notification(&self, payload: &[u8]) -> Option<String> {
        self.shared.handle_notification(payload)
    }

    /// Stop the reconnect loop and the notification pump, release the
    /// device, and go `Idle`.
    ///
    /// A device that fails to close is logged and forgotten.
    pub async fn shutdown(&self) {
        info!("Shutting down link manager");
        self.shared.cancel_reconnect_timer(true);
        let session = self.shared.session.lock().take();
        if let Some(handle) = session {
            handle.abort();
        }
        self.shared.set_state(LinkState::Idle);

        let device = self.shared.device.write().take();
        if let Some(device) = device {
            let ids = self.shared.config.channel_ids();
            if let Err(e) = self.shared.transport.close(&device, &ids).await {
                warn!("Failed to close {}: {}", self.shared.config.device_name, e);
            }
        }
    }
}

impl<T: LinkTransport> Shared<T> {
    async fn connect(self: &Arc<Self>) -> Result<()> {
        if let Err(current) =
            self.compare_and_set(LinkState::accepts_manual_connect, LinkState::Connecting)
        {
            return Err(self.reject_connect(current));
        }

        info!("Connecting to {}", self.config.device_name);

        match self.open_link().await {
            Ok(channel) => {
                if let Err(current) =
                    self.compare_and_set(|s| *s == LinkState::Connecting, LinkState::Connected)
                {
                    debug!("Link state moved to {} during connect", current);
                    return Err(Error::ConnectionFailed {
                        reason: format!("link became {current} while connecting"),
                    });
                }
                self.cancel_reconnect_timer(true);
                self.start_session(channel);
                info!("Connected to {}", self.config.device_name);
                self.speaker.speak(CONNECTED_MESSAGE);
                Ok(())
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                let _ = self.compare_and_set(|s| *s == LinkState::Connecting, LinkState::Idle);
                self.speaker.speak(CONNECT_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    fn reject_connect(&self, current: LinkState) -> Error {
        if current.is_transitioning() {
            debug!("Connect rejected while {}", current);
            self.speaker.speak(IN_PROGRESS_MESSAGE);
            Error::ConnectionInProgress
        } else {
            debug!("Already connected");
            self.speaker.speak(ALREADY_CONNECTED_MESSAGE);
            Error::AlreadyConnected
        }
    }

    /// Full manual sequence: select, remember, open.
    async fn open_link(&self) -> Result<NotificationChannel> {
        let device = self
            .transport
            .request_device(&self.config.device_filter())
            .await?;
        *self.device.write() = Some(device.clone());
        self.open_channel(&device).await
    }

    async fn open_channel(&self, device: &T::Device) -> Result<NotificationChannel> {
        let ids = self.config.channel_ids();
        tokio::time::timeout(
            self.config.link_timeout(),
            self.transport.open_channel(device, &ids),
        )
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Spawn the task that feeds channel events back into the manager.
    fn start_session(self: &Arc<Self>, mut channel: NotificationChannel) {
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            debug!("Notification pump started");
            loop {
                let event = channel.recv().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match event {
                    Some(ChannelEvent::Payload(payload)) => {
                        shared.handle_notification(&payload);
                    }
                    Some(ChannelEvent::Disconnected) | None => {
                        shared.handle_disconnect();
                        break;
                    }
                }
            }
            debug!("Notification pump stopped");
        });

        if let Some(old) = self.session.lock().replace(handle) {
            old.abort();
        }
    }

    fn handle_notification(&self, payload: &[u8]) -> Option<String> {
        let report = ObstacleReport::decode(payload);
        debug!("Obstacle: {:?}", report);

        let text = report.announcement()?.to_string();
        info!("Obstacle: {}", text);
        self.speaker.speak(&text);
        let _ = self.event_tx.send(LinkEvent::Obstacle(text.clone()));
        Some(text)
    }

    fn handle_disconnect(self: &Arc<Self>) {
        if let Err(current) =
            self.compare_and_set(|s| *s == LinkState::Connected, LinkState::Disconnected)
        {
            debug!("Ignoring disconnect while {}", current);
            return;
        }

        warn!("{} disconnected", self.config.device_name);
        self.speaker.speak(DISCONNECTED_MESSAGE);
        self.start_reconnect_timer();
    }

    fn start_reconnect_timer(self: &Arc<Self>) {
        if self
            .compare_and_set(|s| *s == LinkState::Disconnected, LinkState::Reconnecting)
            .is_err()
        {
            return;
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let period = self.config.reconnect_interval().max(MIN_RECONNECT_INTERVAL);
        let weak: Weak<Self> = Arc::downgrade(self);

        debug!("Starting reconnect timer every {:?}", period);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if shared.reconnect_tick().await {
                    break;
                }
            }
            debug!("Reconnect timer ended");
        });

        if let Some(old) = self.reconnect_timer.lock().replace(handle) {
            old.abort();
        }
    }

    /// One reconnect poll. Returns `true` when the loop should stop.
    async fn reconnect_tick(self: &Arc<Self>) -> bool {
        if *self.state.read() != LinkState::Reconnecting {
            return true;
        }

        let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let device = self.device.read().clone();
        let Some(device) = device else {
            debug!("No device to reconnect to");
            return false;
        };

        match self.open_channel(&device).await {
            Ok(channel) => {
                if self
                    .compare_and_set(|s| *s == LinkState::Reconnecting, LinkState::Connected)
                    .is_err()
                {
                    return true;
                }
                // The timer task is the caller; detach rather than abort it.
                self.cancel_reconnect_timer(false);
                self.start_session(channel);
                info!("Reconnected after {} attempts", attempt);
                self.speaker.speak(RECONNECTED_MESSAGE);
                true
            }
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempt, e);
                let _ = self.event_tx.send(LinkEvent::ReconnectAttemptFailed {
                    attempt,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    fn cancel_reconnect_timer(&self, abort: bool) {
        let handle = self.reconnect_timer.lock().take();
        if let Some(handle) = handle {
            if abort {
                handle.abort();
            }
            let attempts = self.reconnect_attempts.load(Ordering::SeqCst);
            debug!("Reconnect timer cancelled after {} attempts", attempts);
            let _ = self
                .event_tx
                .send(LinkEvent::ReconnectCancelled { attempts });
        }
    }

    /// Move to `new_state` if the current state passes `allowed`.
    ///
    /// Returns the previous state, or the current state on refusal.
    fn compare_and_set(
        &self,
        allowed: impl Fn(&LinkState) -> bool,
        new_state: LinkState,
    ) -> std::result::Result<LinkState, LinkState> {
        let old_state = {
            let mut state = self.state.write();
            if !allowed(&*state) {
                return Err(*state);
            }
            let old = *state;
            *state = new_state;
            old
        };
        self.emit_state_change(old_state, new_state);
        Ok(old_state)
    }

    fn set_state(&self, new_state: LinkState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);
        self.emit_state_change(old_state, new_state);
    }

    fn emit_state_change(&self, from: LinkState, to: LinkState) {
        if from != to {
            debug!("Link state changed: {} -> {}", from, to);
            let _ = self.event_tx.send(LinkEvent::StateChanged { from, to });
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::ble::transport::{
        ChannelEvent, ChannelIds, DeviceFilter, LinkTransport, NotificationChannel,
    };
    use crate::error::{Error, Result};

    #[derive(Default)]
    pub struct FakeState {
        pub requests: usize,
        pub opens: usize,
        pub no_device: bool,
        pub scan_delay: Option<Duration>,
        pub closes: usize,
        pub open_results: VecDeque<Result<()>>,
        pub senders: Vec<mpsc::Sender<ChannelEvent>>,
    }

    /// In-memory transport whose open results are scripted by the test.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeTransport {
        pub fn script_opens(&self, results: impl IntoIterator<Item = Result<()>>) {
            self.state.lock().open_results.extend(results);
        }

        pub fn sender(&self, index: usize) -> mpsc::Sender<ChannelEvent> {
            self.state.lock().senders[index].clone()
        }

        pub fn opens(&self) -> usize {
            self.state.lock().opens
        }

        pub fn requests(&self) -> usize {
            self.state.lock().requests
        }

        pub fn closes(&self) -> usize {
            self.state.lock().closes
        }
    }

    #[async_trait]
    impl LinkTransport for FakeTransport {
        type Device = u32;

        async fn request_device(&self, filter: &DeviceFilter) -> Result<u32> {
            let delay = {
                let mut state = self.state.lock();
                state.requests += 1;
                state.scan_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let state = self.state.lock();
            if state.no_device {
                return Err(Error::DeviceNotFound {
                    name: filter.name.clone(),
                });
            }
            Ok(7)
        }

        async fn open_channel(&self, _device: &u32, _ids: &ChannelIds) -> Result<NotificationChannel> {
            let mut state = self.state.lock();
            state.opens += 1;
            state.open_results.pop_front().unwrap_or(Ok(()))?;
            let (tx, channel) = NotificationChannel::new(8);
            state.senders.push(tx);
            Ok(channel)
        }

        async fn close(&self, _device: &u32, _ids: &ChannelIds) -> Result<()> {
            self.state.lock().closes += 1;
            Ok(())
        }
    }
}
