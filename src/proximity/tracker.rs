use std::sync::{Arc, Mutex};
use futures::channel::mpsc::{Sender, UnboundedReceiver};
use futures::{SinkExt, StreamExt};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::device::connection::{ConnectionSettings, DeviceConnection};
use crate::device::constants::{CONNECT_DEADLINE, OBSERVE_INTERVAL, READ_DEADLINE, SCAN_INTERVAL};
use crate::device::link::LinkLayer;
use crate::device::types::{normalize_address, ConnectionState, Device};
use crate::error::TrackerError;
use crate::proximity::selector::{proximity_selector_task, SelectorCommand};
use crate::signal::observable::ObservableSignal;
use crate::signal::SignalReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Sampling interval of devices outside the observation set.
    pub scan_interval: Duration,
    /// Sampling interval of devices in the observation set.
    pub observe_interval: Duration,
    pub connect_deadline: Duration,
    pub read_deadline: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            scan_interval: Duration::from_millis(SCAN_INTERVAL),
            observe_interval: Duration::from_millis(OBSERVE_INTERVAL),
            connect_deadline: Duration::from_millis(CONNECT_DEADLINE),
            read_deadline: Duration::from_millis(READ_DEADLINE),
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        TrackerSettings {
            scan_interval: Duration::from_millis(config.scan_interval_ms),
            observe_interval: Duration::from_millis(config.observe_interval_ms),
            connect_deadline: Duration::from_millis(config.connect_deadline_ms),
            read_deadline: Duration::from_millis(config.read_deadline_ms),
        }
    }
}

fn forward_signal_task<L: LinkLayer>(cancel: CancellationToken, connection: DeviceConnection<L>, mut selector: Sender<SelectorCommand>) -> JoinHandle<()> {
    let mut signal = connection.observe_signal();

    return spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                reading = signal.next() => {
                    let Some(reading) = reading else {
                        break 'mainloop;
                    };

                    // the device may have gone away since this value was published
                    if !connection.is_active() {
                        continue 'mainloop;
                    }

                    let command = SelectorCommand::Signal { device: connection.device().clone(), reading };
                    if selector.send(command).await.is_err() {
                        break 'mainloop;
                    }
                },
            }
        }
    });
}

/// Tracks a set of devices and decides which of the observed ones is closest.
///
/// Devices have to be added before they can be connected or observed; finding them is up to the
/// caller. Must be created and used from within a tokio runtime.
pub struct ProximityTracker<L: LinkLayer> {
    link: Arc<L>,
    settings: TrackerSettings,
    connections: Mutex<IndexMap<String, DeviceConnection<L>>>,
    observation_set: Mutex<IndexSet<Device>>,
    selector: Sender<SelectorCommand>,
    selector_handle: Mutex<Option<JoinHandle<()>>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
    closest: ObservableSignal<Device>,
    cancel: CancellationToken,
}

impl<L: LinkLayer> ProximityTracker<L> {
    pub fn new(link: Arc<L>, settings: TrackerSettings) -> Self {
        let cancel = CancellationToken::new();
        let closest = ObservableSignal::new();
        let (selector, selector_handle) = proximity_selector_task(cancel.clone(), closest.clone());

        ProximityTracker {
            link,
            settings,
            connections: Mutex::new(IndexMap::new()),
            observation_set: Mutex::new(IndexSet::new()),
            selector,
            selector_handle: Mutex::new(Some(selector_handle)),
            forwarders: Mutex::new(Vec::new()),
            closest,
            cancel,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    fn connection(&self, address: &str) -> Result<DeviceConnection<L>, TrackerError> {
        let connections = self.connections.lock().expect("Failed to lock ProximityTracker connections");
        connections
            .get(&normalize_address(address))
            .cloned()
            .ok_or_else(|| TrackerError::UnknownDevice { address: address.to_string() })
    }

    fn all_connections(&self) -> Vec<DeviceConnection<L>> {
        let connections = self.connections.lock().expect("Failed to lock ProximityTracker connections");
        connections.values().cloned().collect()
    }

    /// Registers a device. It starts out disconnected and sampled at the scan interval once connected.
    pub fn add_device(&self, device: Device) -> Result<(), TrackerError> {
        let mut connections = self.connections.lock().expect("Failed to lock ProximityTracker connections");

        if connections.contains_key(device.address()) {
            return Err(TrackerError::DuplicateDevice { address: device.address().to_string() });
        }

        let settings = ConnectionSettings {
            interval: self.settings.scan_interval,
            connect_deadline: self.settings.connect_deadline,
            read_deadline: self.settings.read_deadline,
        };
        let connection = DeviceConnection::new(device.clone(), self.link.clone(), settings);
        let forwarder = forward_signal_task(self.cancel.child_token(), connection.clone(), self.selector.clone());
        self.forwarders.lock().expect("Failed to lock ProximityTracker forwarders").push(forwarder);

        info!("Added device {}", device);
        connections.insert(device.address().to_string(), connection);
        Ok(())
    }

    pub fn devices(&self) -> Vec<Device> {
        let connections = self.connections.lock().expect("Failed to lock ProximityTracker connections");
        connections.values().map(|connection| connection.device().clone()).collect()
    }

    pub fn connect(&self, address: &str) -> Result<(), TrackerError> {
        self.connection(address)?.connect();
        Ok(())
    }

    pub fn is_active(&self, address: &str) -> Result<bool, TrackerError> {
        Ok(self.connection(address)?.is_active())
    }

    pub fn state(&self, address: &str) -> Result<ConnectionState, TrackerError> {
        Ok(self.connection(address)?.state())
    }

    pub fn reading(&self, address: &str) -> Result<Option<SignalReading>, TrackerError> {
        Ok(self.connection(address)?.reading())
    }

    /// Smoothed value and tier of a device, only sent when either of them changes.
    pub fn observe_signal(&self, address: &str) -> Result<UnboundedReceiver<SignalReading>, TrackerError> {
        Ok(self.connection(address)?.observe_signal())
    }

    pub fn observe_state(&self, address: &str) -> Result<UnboundedReceiver<ConnectionState>, TrackerError> {
        Ok(self.connection(address)?.observe_state())
    }

    /// The closest device, sent whenever a different device takes over.
    pub fn observe_closest(&self) -> UnboundedReceiver<Device> {
        self.closest.observe()
    }

    pub fn closest(&self) -> Option<Device> {
        self.closest.current()
    }

    pub fn sampling_interval(&self, address: &str) -> Result<Duration, TrackerError> {
        Ok(self.connection(address)?.interval())
    }

    pub fn set_sampling_interval(&self, address: &str, interval: Duration) -> Result<(), TrackerError> {
        self.connection(address)?.set_interval(interval);
        Ok(())
    }

    pub fn observation_set(&self) -> Vec<Device> {
        let observation_set = self.observation_set.lock().expect("Failed to lock ProximityTracker observation set");
        observation_set.iter().cloned().collect()
    }

    /// Replaces the set of devices compared for proximity. Members are sampled at the observe interval,
    /// devices that leave the set go back to the scan interval. Nothing is connected or disconnected.
    ///
    /// Either all addresses are known and the set is replaced, or nothing changes.
    pub async fn set_observation_set<I, S>(&self, addresses: I) -> Result<(), TrackerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut members: Vec<DeviceConnection<L>> = Vec::new();
        for address in addresses {
            let connection = self.connection(address.as_ref())?;
            if !members.iter().any(|member| member.device() == connection.device()) {
                members.push(connection);
            }
        }

        let devices: IndexSet<Device> = members.iter().map(|member| member.device().clone()).collect();
        let previous = {
            let mut observation_set = self.observation_set.lock().expect("Failed to lock ProximityTracker observation set");
            std::mem::replace(&mut *observation_set, devices.clone())
        };

        for connection in self.all_connections() {
            if devices.contains(connection.device()) {
                connection.set_interval(self.settings.observe_interval);
            } else if previous.contains(connection.device()) {
                connection.set_interval(self.settings.scan_interval);
            }
        }

        info!("Observing {} device(s) for proximity", devices.len());
        let mut selector = self.selector.clone();
        selector.send(SelectorCommand::SetObservationSet(devices))
            .await
            .map_err(|_| TrackerError::SelectorStopped)?;

        // members only report changed values, so hand the selector what they have right now
        for member in members {
            if !member.is_active() {
                continue;
            }
            if let Some(reading) = member.reading() {
                debug!("Seeding selector with {} at {} dBm", member.device(), reading.value);
                selector.send(SelectorCommand::Signal { device: member.device().clone(), reading })
                    .await
                    .map_err(|_| TrackerError::SelectorStopped)?;
            }
        }

        Ok(())
    }

    pub fn close(&self, address: &str) -> Result<(), TrackerError> {
        self.connection(address)?.close();
        Ok(())
    }

    pub fn close_all(&self) {
        for connection in self.all_connections() {
            connection.close();
        }
    }

    /// Closes every device and stops the background tasks.
    pub async fn shutdown(&self) {
        self.close_all();
        self.cancel.cancel();

        let forwarders: Vec<JoinHandle<()>> = {
            let mut forwarders = self.forwarders.lock().expect("Failed to lock ProximityTracker forwarders");
            forwarders.drain(..).collect()
        };
        debug!("Waiting for {} signal forwarding task(s) to stop", forwarders.len());
        for forwarder in forwarders {
            if let Err(err) = forwarder.await {
                warn!("Signal forwarding task failed: {:?}", err);
            }
        }

        let handle = self.selector_handle.lock().expect("Failed to lock ProximityTracker selector handle").take();
        if let Some(handle) = handle {
            info!("Waiting for proximity selector task to stop");
            if let Err(err) = handle.await {
                warn!("Proximity selector task failed: {:?}", err);
            }
        }
    }
}

impl<L: LinkLayer> Drop for ProximityTracker<L> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
