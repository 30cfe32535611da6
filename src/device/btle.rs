use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use tokio::time::{sleep, Duration};

use crate::device::constants::DISCOVERY_DELAY;
use crate::device::link::LinkLayer;
use crate::device::types::normalize_address;
use crate::error::LinkError;

/// [`LinkLayer`] backed by the platform bluetooth stack.
///
/// Devices are addressed by their bluetooth address (`AA:BB:CC:DD:EE:FF`, case insensitive). The
/// adapters keep scanning for as long as this link exists so that signal strength stays fresh.
pub struct BtleLink {
    _manager: Manager,
    adapters: Vec<Adapter>,
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BtleLink {
    pub async fn new() -> Result<Self, LinkError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        for adapter in &adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            adapter.start_scan(ScanFilter::default()).await?;
        }

        Ok(BtleLink {
            _manager: manager,
            adapters,
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    async fn search_adapters(&self, address: &str) -> Option<Peripheral> {
        for adapter in &self.adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                if normalize_address(&peripheral.address().to_string()) == address {
                    return Some(peripheral);
                }
            }
        }

        None
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral, LinkError> {
        let address = normalize_address(address);

        {
            let peripherals = self.peripherals.lock().expect("Failed to lock BtleLink peripherals");
            if let Some(peripheral) = peripherals.get(&address) {
                return Ok(peripheral.clone());
            }
        }

        let mut found = self.search_adapters(&address).await;
        if found.is_none() {
            debug!("Peripheral {} not seen yet, waiting for the scan", address);
            sleep(Duration::from_millis(DISCOVERY_DELAY)).await;
            found = self.search_adapters(&address).await;
        }

        match found {
            Some(peripheral) => {
                let mut peripherals = self.peripherals.lock().expect("Failed to lock BtleLink peripherals");
                peripherals.insert(address, peripheral.clone());
                Ok(peripheral)
            },
            None => Err(LinkError::NotFound { address }),
        }
    }

    fn forget(&self, address: &str) {
        let mut peripherals = self.peripherals.lock().expect("Failed to lock BtleLink peripherals");
        peripherals.remove(&normalize_address(address));
    }
}

#[async_trait]
impl LinkLayer for BtleLink {
    async fn connect(&self, address: &str) -> Result<(), LinkError> {
        let peripheral = self.peripheral(address).await?;

        if let Err(err) = peripheral.connect().await {
            // a failed peripheral handle may be unusable afterwards, look it up again next time
            self.forget(address);
            return Err(err.into());
        }

        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), LinkError> {
        let peripheral = self.peripheral(address).await?;

        if peripheral.is_connected().await? {
            peripheral.disconnect().await?;
        }

        Ok(())
    }

    async fn read_signal_strength(&self, address: &str) -> Result<i32, LinkError> {
        let peripheral = self.peripheral(address).await?;

        if !peripheral.is_connected().await? {
            return Err(LinkError::NotConnected);
        }

        match peripheral.properties().await? {
            Some(properties) => properties.rssi.map(i32::from).ok_or(LinkError::NoSignal),
            None => Err(LinkError::NoSignal),
        }
    }
}
