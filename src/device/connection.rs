use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use futures::channel::mpsc::UnboundedReceiver;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::{sleep, Duration};

use crate::device::constants::{CONNECT_DEADLINE, READ_DEADLINE, SCAN_INTERVAL};
use crate::device::link::LinkLayer;
use crate::device::scheduler::SamplingScheduler;
use crate::device::state::{transition, Effect, LinkEvent};
use crate::device::types::{ConnectionState, Device, SignalSample};
use crate::error::LinkError;
use crate::signal::filter::smooth;
use crate::signal::observable::ObservableSignal;
use crate::signal::SignalReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub interval: Duration,
    pub connect_deadline: Duration,
    pub read_deadline: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            interval: Duration::from_millis(SCAN_INTERVAL),
            connect_deadline: Duration::from_millis(CONNECT_DEADLINE),
            read_deadline: Duration::from_millis(READ_DEADLINE),
        }
    }
}

struct ConnectionInner {
    state: ConnectionState,
    smoothed: Option<i32>,
    scheduler: SamplingScheduler,
    // generation of connect/disconnect requests, replies to older requests are dropped
    attempt: u64,
    // a disconnect request is outstanding
    closing: bool,
    // connect() arrived while closing, issued once the disconnect reply is in
    connect_pending: bool,
}

struct Shared<L: LinkLayer> {
    device: Device,
    link: Arc<L>,
    connect_deadline: Duration,
    read_deadline: Duration,
    inner: Mutex<ConnectionInner>,
    signal: ObservableSignal<SignalReading>,
    state_signal: ObservableSignal<ConnectionState>,
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, LinkError>
where
    F: Future<Output = Result<T, LinkError>>,
{
    tokio::select! {
        _ = sleep(deadline) => Err(LinkError::Timeout),
        result = fut => result,
    }
}

impl<L: LinkLayer> Shared<L> {
    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().expect("Failed to lock DeviceConnection inner")
    }

    fn apply(self: &Arc<Self>, inner: &mut ConnectionInner, event: LinkEvent) {
        let (state, effects) = transition(inner.state, event);

        if state != inner.state {
            info!("{}: {} -> {}", self.device, inner.state, state);
            inner.state = state;
            self.state_signal.publish(state);
        }

        for effect in effects {
            match effect {
                Effect::RequestConnect => {
                    inner.attempt = inner.attempt.wrapping_add(1);
                    self.request_connect(inner.attempt);
                },
                Effect::RequestDisconnect => {
                    inner.attempt = inner.attempt.wrapping_add(1);
                    self.request_disconnect(inner.attempt);
                },
                Effect::StartSampling => {
                    let generation = inner.scheduler.start();
                    self.issue_read(inner, generation);
                },
                Effect::StopSampling => inner.scheduler.stop(),
                Effect::ClearSignal => {
                    inner.smoothed = None;
                    self.signal.clear();
                },
            }
        }
    }

    fn request_connect(self: &Arc<Self>, attempt: u64) {
        let shared = self.clone();

        spawn(async move {
            let result = with_deadline(
                shared.connect_deadline,
                shared.link.connect(shared.device.address()),
            ).await;
            shared.on_connect_reply(attempt, result);
        });
    }

    fn on_connect_reply(self: &Arc<Self>, attempt: u64, result: Result<(), LinkError>) {
        let mut inner = self.lock();

        if inner.attempt != attempt {
            debug!("{}: Discarding stale connect reply", self.device);
            return;
        }

        match result {
            Ok(()) => self.apply(&mut inner, LinkEvent::Connected),
            Err(err) => {
                warn!("{}: Connecting failed: {}", self.device, err);
                self.apply(&mut inner, LinkEvent::ConnectFailed);
            },
        }
    }

    fn request_disconnect(self: &Arc<Self>, attempt: u64) {
        let shared = self.clone();

        spawn(async move {
            let result = with_deadline(
                shared.connect_deadline,
                shared.link.disconnect(shared.device.address()),
            ).await;
            shared.on_disconnect_reply(attempt, result);
        });
    }

    fn on_disconnect_reply(self: &Arc<Self>, attempt: u64, result: Result<(), LinkError>) {
        let mut inner = self.lock();

        if inner.attempt != attempt {
            debug!("{}: Discarding stale disconnect reply", self.device);
            return;
        }

        if let Err(err) = result {
            warn!("{}: Disconnect request failed: {}", self.device, err);
        }
        inner.closing = false;
        self.apply(&mut inner, LinkEvent::Disconnected);

        if std::mem::take(&mut inner.connect_pending) {
            info!("{}: Issuing connect requested while closing", self.device);
            self.apply(&mut inner, LinkEvent::ConnectRequested);
        }
    }

    // Must be called with the lock held: no read may be issued once close() has returned.
    fn issue_read(self: &Arc<Self>, inner: &ConnectionInner, generation: u64) {
        if !inner.scheduler.is_current(generation) {
            return;
        }

        let shared = self.clone();
        spawn(async move {
            let result = with_deadline(
                shared.read_deadline,
                shared.link.read_signal_strength(shared.device.address()),
            ).await;
            shared.on_signal_reply(generation, result);
        });
    }

    fn on_signal_reply(self: &Arc<Self>, generation: u64, result: Result<i32, LinkError>) {
        let mut inner = self.lock();

        if !inner.scheduler.is_current(generation) {
            debug!("{}: Discarding stale signal reading", self.device);
            return;
        }

        let sample = match result {
            Ok(value) => SignalSample::success(value),
            Err(LinkError::NotConnected) => {
                warn!("{}: Connection lost", self.device);
                self.apply(&mut inner, LinkEvent::Disconnected);
                return;
            },
            Err(err) => {
                warn!("{}: Failed to read signal strength: {}", self.device, err);
                SignalSample::error()
            },
        };

        if sample.is_success() {
            let smoothed = smooth(inner.smoothed, sample.value);
            inner.smoothed = Some(smoothed);

            let reading = SignalReading::from_smoothed(smoothed);
            debug!("{}: raw {} smoothed {} ({})", self.device, sample.value, reading.value, reading.tier);
            self.signal.publish(reading);
        }

        let shared = self.clone();
        inner.scheduler.arm(generation, move |generation| shared.on_tick(generation));
    }

    fn on_tick(self: &Arc<Self>, generation: u64) {
        let inner = self.lock();
        self.issue_read(&inner, generation);
    }
}

/// The link to one peer device.
///
/// Owns the connection state, the smoothed signal and the sampling schedule of the device. All of
/// them change only under the connection's lock, either from a caller request or from a link layer
/// reply. Must be used from within a tokio runtime.
pub struct DeviceConnection<L: LinkLayer> {
    shared: Arc<Shared<L>>,
}

impl<L: LinkLayer> Clone for DeviceConnection<L> {
    fn clone(&self) -> Self {
        DeviceConnection { shared: self.shared.clone() }
    }
}

impl<L: LinkLayer> DeviceConnection<L> {
    pub fn new(device: Device, link: Arc<L>, settings: ConnectionSettings) -> Self {
        let state_signal = ObservableSignal::new();
        state_signal.publish(ConnectionState::Disconnected);

        let inner = ConnectionInner {
            state: ConnectionState::Disconnected,
            smoothed: None,
            scheduler: SamplingScheduler::new(settings.interval),
            attempt: 0,
            closing: false,
            connect_pending: false,
        };

        DeviceConnection {
            shared: Arc::new(Shared {
                device,
                link,
                connect_deadline: settings.connect_deadline,
                read_deadline: settings.read_deadline,
                inner: Mutex::new(inner),
                signal: ObservableSignal::new(),
                state_signal,
            }),
        }
    }

    pub fn device(&self) -> &Device {
        &self.shared.device
    }

    /// Asks the link layer to connect. Ignored while connecting or connected. While a close is still
    /// waiting for its disconnect reply, the connect is held back and issued once that reply arrives.
    pub fn connect(&self) {
        let mut inner = self.shared.lock();

        if inner.closing {
            info!("{}: Connect requested while closing, deferred", self.shared.device);
            inner.connect_pending = true;
            return;
        }

        info!("{}: Connect requested", self.shared.device);
        self.shared.apply(&mut inner, LinkEvent::ConnectRequested);
    }

    /// Stops sampling and asks the link layer to disconnect, whatever the current state. No read is
    /// issued once this returns and replies to reads that are still in flight are dropped. Cancels a
    /// connect that was deferred by an earlier close.
    pub fn close(&self) {
        let mut inner = self.shared.lock();
        info!("{}: Closing", self.shared.device);
        inner.closing = true;
        inner.connect_pending = false;
        self.shared.apply(&mut inner, LinkEvent::CloseRequested);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn smoothed(&self) -> Option<i32> {
        self.shared.lock().smoothed
    }

    pub fn reading(&self) -> Option<SignalReading> {
        self.smoothed().map(SignalReading::from_smoothed)
    }

    pub fn interval(&self) -> Duration {
        self.shared.lock().scheduler.interval()
    }

    /// Changes the sampling interval, starting with the next cycle that gets scheduled.
    pub fn set_interval(&self, interval: Duration) {
        let mut inner = self.shared.lock();
        if inner.scheduler.interval() != interval {
            debug!("{}: Sampling interval {:?}", self.shared.device, interval);
            inner.scheduler.set_interval(interval);
        }
    }

    pub fn observe_signal(&self) -> UnboundedReceiver<SignalReading> {
        self.shared.signal.observe()
    }

    pub(crate) fn signal_observer_count(&self) -> usize {
        self.shared.signal.observer_count()
    }

    pub fn observe_state(&self) -> UnboundedReceiver<ConnectionState> {
        self.shared.state_signal.observe()
    }
}
