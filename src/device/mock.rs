//! In-memory link layer for tests and demos without a radio.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::sleep;

use crate::device::link::LinkLayer;
use crate::error::LinkError;

#[derive(Default)]
struct MockPeer {
    refuse_connect: bool,
    connected: bool,
    connect_delay: Duration,
    read_delay: Duration,
    readings: VecDeque<Result<i32, LinkError>>,
    connects: usize,
    disconnects: usize,
    reads: usize,
}

/// A scriptable [`LinkLayer`].
///
/// Signal reads pop from a per-device queue of scripted results; once the queue is empty every read
/// fails with `LinkError::NoSignal`. Delays can be injected to keep requests in flight, which is how
/// late (stale) callbacks are simulated.
#[derive(Default)]
pub struct MockLink {
    peers: Mutex<HashMap<String, MockPeer>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_peer<R>(&self, address: &str, f: impl FnOnce(&mut MockPeer) -> R) -> R {
        let mut peers = self.peers.lock().expect("Failed to lock MockLink peers");
        f(peers.entry(address.to_string()).or_default())
    }

    /// Queues raw signal values to be returned by successive reads.
    pub fn push_readings(&self, address: &str, values: &[i32]) {
        self.with_peer(address, |peer| peer.readings.extend(values.iter().map(|&value| Ok(value))));
    }

    pub fn push_read_error(&self, address: &str, error: LinkError) {
        self.with_peer(address, |peer| peer.readings.push_back(Err(error)));
    }

    pub fn refuse_connect(&self, address: &str, refuse: bool) {
        self.with_peer(address, |peer| peer.refuse_connect = refuse);
    }

    pub fn set_connect_delay(&self, address: &str, delay: Duration) {
        self.with_peer(address, |peer| peer.connect_delay = delay);
    }

    pub fn set_read_delay(&self, address: &str, delay: Duration) {
        self.with_peer(address, |peer| peer.read_delay = delay);
    }

    /// Simulates link loss: subsequent reads report `NotConnected`.
    pub fn drop_link(&self, address: &str) {
        self.with_peer(address, |peer| peer.connected = false);
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.with_peer(address, |peer| peer.connected)
    }

    pub fn connects(&self, address: &str) -> usize {
        self.with_peer(address, |peer| peer.connects)
    }

    pub fn disconnects(&self, address: &str) -> usize {
        self.with_peer(address, |peer| peer.disconnects)
    }

    /// Number of read requests issued so far, including ones still in flight.
    pub fn reads(&self, address: &str) -> usize {
        self.with_peer(address, |peer| peer.reads)
    }
}

#[async_trait]
impl LinkLayer for MockLink {
    async fn connect(&self, address: &str) -> Result<(), LinkError> {
        let delay = self.with_peer(address, |peer| {
            peer.connects += 1;
            peer.connect_delay
        });
        if !delay.is_zero() {
            sleep(delay).await;
        }

        self.with_peer(address, |peer| {
            if peer.refuse_connect {
                return Err(LinkError::Other(format!("{} refused the connection", address)));
            }
            peer.connected = true;
            Ok(())
        })
    }

    async fn disconnect(&self, address: &str) -> Result<(), LinkError> {
        self.with_peer(address, |peer| {
            peer.disconnects += 1;
            peer.connected = false;
        });
        Ok(())
    }

    async fn read_signal_strength(&self, address: &str) -> Result<i32, LinkError> {
        let delay = self.with_peer(address, |peer| {
            peer.reads += 1;
            peer.read_delay
        });
        if !delay.is_zero() {
            sleep(delay).await;
        }

        self.with_peer(address, |peer| {
            if !peer.connected {
                return Err(LinkError::NotConnected);
            }
            peer.readings.pop_front().unwrap_or(Err(LinkError::NoSignal))
        })
    }
}
