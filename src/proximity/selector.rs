use indexmap::IndexSet;
use log::{debug, info};
use tokio::spawn;
use tokio::task::JoinHandle;
use futures::channel::mpsc::{channel, Sender};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::device::types::Device;
use crate::signal::observable::ObservableSignal;
use crate::signal::SignalReading;

/// A device took over as the closest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchDecision {
    pub device: Device,
    pub value: i32,
}

/// Picks the closest device among the observed ones.
///
/// The selector keeps the strongest value it has seen so far and only switches when a device beats
/// it strictly. The tracked best is never recomputed: it does not drop when the closest device gets
/// weaker, disconnects or leaves the observation set.
#[derive(Debug)]
pub struct ProximitySelector {
    observed: IndexSet<Device>,
    closest: Option<Device>,
    best: i32,
}

impl ProximitySelector {
    pub fn new() -> Self {
        ProximitySelector {
            observed: IndexSet::new(),
            closest: None,
            best: i32::MIN,
        }
    }

    pub fn set_observation_set(&mut self, devices: IndexSet<Device>) {
        self.observed = devices;
    }

    pub fn observation_set(&self) -> &IndexSet<Device> {
        &self.observed
    }

    pub fn is_observed(&self, device: &Device) -> bool {
        self.observed.contains(device)
    }

    pub fn closest(&self) -> Option<&Device> {
        self.closest.as_ref()
    }

    /// The value the next switch has to beat, `None` until the first switch.
    pub fn best(&self) -> Option<i32> {
        self.closest.as_ref().map(|_| self.best)
    }

    pub fn on_signal(&mut self, device: &Device, value: i32) -> Option<SwitchDecision> {
        if !self.is_observed(device) {
            return None;
        }

        if value <= self.best {
            return None;
        }

        // use the observation set's copy so the decision carries the name the caller selected
        let device = self.observed.get(device).cloned().unwrap_or_else(|| device.clone());
        self.best = value;
        self.closest = Some(device.clone());

        Some(SwitchDecision { device, value })
    }
}

impl Default for ProximitySelector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum SelectorCommand {
    Signal { device: Device, reading: SignalReading },
    SetObservationSet(IndexSet<Device>),
}

/// Runs a [`ProximitySelector`] until `cancel` is cancelled. Every switch decision is published to
/// `closest`.
pub fn proximity_selector_task(cancel: CancellationToken, closest: ObservableSignal<Device>) -> (Sender<SelectorCommand>, JoinHandle<()>) {
    let (tx, mut rx) = channel::<SelectorCommand>(128);

    let handle = spawn(async move {
        let mut selector = ProximitySelector::new();

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                command = rx.next() => {
                    match command {
                        None => break 'mainloop,
                        Some(SelectorCommand::Signal { device, reading }) => {
                            if let Some(decision) = selector.on_signal(&device, reading.value) {
                                info!("Closest device is now {} at {} dBm", decision.device, decision.value);
                                closest.publish(decision.device);
                            }
                        },
                        Some(SelectorCommand::SetObservationSet(devices)) => {
                            debug!("Observing {} device(s)", devices.len());
                            selector.set_observation_set(devices);
                        },
                    }
                },
            }
        }
    });

    return (tx, handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;

    fn device(address: &str) -> Device {
        Device::new(address, address)
    }

    fn observing(devices: &[&Device]) -> ProximitySelector {
        let mut selector = ProximitySelector::new();
        selector.set_observation_set(devices.iter().map(|d| (*d).clone()).collect());
        selector
    }

    #[test]
    fn test_first_reading_selects() {
        let a = device("A");
        let mut selector = observing(&[&a]);

        assert_eq!(selector.best(), None);
        let decision = selector.on_signal(&a, -90).expect("first reading must select");
        assert_eq!(decision, SwitchDecision { device: a.clone(), value: -90 });
        assert_eq!(selector.closest(), Some(&a));
        assert_eq!(selector.best(), Some(-90));
    }

    #[test]
    fn test_ratchet_scenario() {
        let a = device("A");
        let b = device("B");
        let mut selector = observing(&[&a, &b]);

        assert_eq!(selector.on_signal(&a, -20).map(|d| d.device), Some(a.clone()));
        assert_eq!(selector.on_signal(&b, -50), None);
        assert_eq!(selector.on_signal(&b, -10).map(|d| d.device), Some(b.clone()));

        // weaker than B's best but still stronger than A; the ratchet keeps B at -10
        assert_eq!(selector.on_signal(&b, -15), None);
        assert_eq!(selector.closest(), Some(&b));
        assert_eq!(selector.best(), Some(-10));

        assert_eq!(selector.on_signal(&a, -15), None);
    }

    #[test]
    fn test_ties_and_decreases_never_switch() {
        let a = device("A");
        let b = device("B");
        let mut selector = observing(&[&a, &b]);

        selector.on_signal(&a, -30);
        assert_eq!(selector.on_signal(&b, -30), None);
        assert_eq!(selector.on_signal(&b, -31), None);
        assert_eq!(selector.on_signal(&a, -30), None);
        assert_eq!(selector.closest(), Some(&a));
    }

    #[test]
    fn test_unobserved_devices_are_ignored() {
        let a = device("A");
        let b = device("B");
        let mut selector = observing(&[&a]);

        assert_eq!(selector.on_signal(&b, 0), None);
        assert_eq!(selector.closest(), None);
    }

    #[test]
    fn test_removed_device_is_ignored_until_added_again() {
        let a = device("A");
        let b = device("B");
        let mut selector = observing(&[&a, &b]);

        selector.on_signal(&a, -40);
        selector.set_observation_set([a.clone()].into_iter().collect());
        assert_eq!(selector.on_signal(&b, -10), None);
        assert_eq!(selector.closest(), Some(&a));

        selector.set_observation_set([a.clone(), b.clone()].into_iter().collect());
        assert_eq!(selector.on_signal(&b, -10).map(|d| d.device), Some(b.clone()));
    }

    #[test]
    fn test_removing_the_closest_device_keeps_the_best() {
        let a = device("A");
        let b = device("B");
        let mut selector = observing(&[&a, &b]);

        selector.on_signal(&a, -20);
        selector.set_observation_set([b.clone()].into_iter().collect());

        assert_eq!(selector.on_signal(&b, -25), None);
        assert_eq!(selector.best(), Some(-20));
        assert_eq!(selector.on_signal(&b, -19).map(|d| d.device), Some(b));
    }

    #[tokio::test]
    async fn test_task_publishes_switches() {
        let a = device("A");
        let b = device("B");
        let cancel = CancellationToken::new();
        let closest = ObservableSignal::new();
        let mut closest_rx = closest.observe();
        let (mut tx, handle) = proximity_selector_task(cancel.clone(), closest.clone());

        tx.send(SelectorCommand::SetObservationSet([a.clone(), b.clone()].into_iter().collect())).await.unwrap();
        tx.send(SelectorCommand::Signal { device: a.clone(), reading: SignalReading::from_smoothed(-20) }).await.unwrap();
        tx.send(SelectorCommand::Signal { device: b.clone(), reading: SignalReading::from_smoothed(-50) }).await.unwrap();
        tx.send(SelectorCommand::Signal { device: b.clone(), reading: SignalReading::from_smoothed(-10) }).await.unwrap();

        assert_eq!(closest_rx.next().await, Some(a));
        assert_eq!(closest_rx.next().await, Some(b.clone()));

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(closest.current(), Some(b));
    }
}
