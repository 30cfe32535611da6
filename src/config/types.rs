use serde::{Deserialize, Serialize};

use crate::device::constants::{CONNECT_DEADLINE, OBSERVE_INTERVAL, READ_DEADLINE, SCAN_INTERVAL};
use crate::device::types::{normalize_address, Device};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default)]
    pub name: String,
    /// Whether the device takes part in the closest device decision.
    #[serde(default)]
    pub observe: bool,
}

impl DeviceConfig {
    pub fn device(&self) -> Device {
        let name = if self.name.is_empty() { &self.address } else { &self.name };
        Device::new(self.address.clone(), name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub scan_interval_ms: u64,
    pub observe_interval_ms: u64,
    pub connect_deadline_ms: u64,
    pub read_deadline_ms: u64,
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Removes devices listed more than once, the first entry wins.
    pub fn dedup_devices(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.devices.retain(|device| seen.insert(normalize_address(&device.address)));
    }

    pub fn observed_addresses(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|device| device.observe)
            .map(|device| device.address.clone())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_interval_ms: SCAN_INTERVAL,
            observe_interval_ms: OBSERVE_INTERVAL,
            connect_deadline_ms: CONNECT_DEADLINE,
            read_deadline_ms: READ_DEADLINE,
            devices: vec![],
        }
    }
}
