//! BLE scanning functionality.
//!
//! Finds the cane by its advertised local name.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// BLE scanner used for device selection.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self { adapter })
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Scan until a peripheral advertising exactly `name` shows up.
    ///
    /// Peripherals the adapter already knows about are checked first. The
    /// scan is stopped before returning, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if nothing matches within `timeout`.
    pub async fn find_by_name(&self, name: &str, timeout: Duration) -> Result<Peripheral> {
        if let Some(peripheral) = self.known_peripheral(name).await? {
            debug!("{} already known to adapter", name);
            return Ok(peripheral);
        }

        info!("Scanning for {} ({}s)", name, timeout.as_secs());

        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let search = async {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                trace!("Device seen: {:?}", id);
                if let Some(peripheral) = self.matching_peripheral(&id, name).await {
                    return Some(peripheral);
                }
            }
            None
        };

        let found = tokio::time::timeout(timeout, search).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        match found {
            Ok(Some(peripheral)) => {
                info!("Found {}", name);
                Ok(peripheral)
            }
            Ok(None) | Err(_) => Err(Error::DeviceNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Look through peripherals the adapter has already cached.
    async fn known_peripheral(&self, name: &str) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;

        for peripheral in peripherals {
            if Self::has_name(&peripheral, name).await {
                return Ok(Some(peripheral));
            }
        }

        Ok(None)
    }

    async fn matching_peripheral(&self, id: &PeripheralId, name: &str) -> Option<Peripheral> {
        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        Self::has_name(&peripheral, name)
            .await
            .then_some(peripheral)
    }

    async fn has_name(peripheral: &Peripheral, name: &str) -> bool {
        match peripheral.properties().await {
            Ok(Some(properties)) => properties.local_name.as_deref() == Some(name),
            _ => false,
        }
    }
}
