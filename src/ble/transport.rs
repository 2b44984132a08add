//! Transport seam between the link manager and the wireless stack.
//!
//! [`LinkTransport`] is everything the link manager needs from a radio:
//! pick a device by name, and open a notification channel on it. The
//! btleplug-backed [`BleTransport`] is the production implementation.

use async_trait::async_trait;
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::scanner::BleScanner;
use crate::ble::uuids::{
    OBSTACLE_CHARACTERISTIC_UUID, OBSTACLE_SERVICE_UUID, SMARTCANE_DEVICE_NAME,
};
use crate::error::Result;

/// Device selection filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Exact advertised local name.
    pub name: String,
    /// How long to scan before giving up.
    pub scan_timeout: Duration,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            name: SMARTCANE_DEVICE_NAME.to_string(),
            scan_timeout: Duration::from_secs(15),
        }
    }
}

/// Service and characteristic that carry obstacle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelIds {
    /// Primary service UUID.
    pub service: Uuid,
    /// Notifying characteristic UUID.
    pub characteristic: Uuid,
}

impl Default for ChannelIds {
    fn default() -> Self {
        Self {
            service: OBSTACLE_SERVICE_UUID,
            characteristic: OBSTACLE_CHARACTERISTIC_UUID,
        }
    }
}

/// Something that happened on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The characteristic value changed.
    Payload(Bytes),
    /// The link dropped.
    Disconnected,
}

/// A subscribed notification channel.
///
/// Dropping the sending half is treated the same as a disconnect.
#[derive(Debug)]
pub struct NotificationChannel {
    events: mpsc::Receiver<ChannelEvent>,
}

impl NotificationChannel {
    /// Create a channel and the sender a transport feeds it through.
    pub fn new(capacity: usize) -> (mpsc::Sender<ChannelEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { events: rx })
    }

    /// Wait for the next event. `None` means the transport went away.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

/// A wireless stack able to pair with the cane.
#[async_trait]
pub trait LinkTransport: Send + Sync + 'static {
    /// Opaque handle to a selected device.
    type Device: Clone + Send + Sync + 'static;

    /// Select a device matching `filter`.
    async fn request_device(&self, filter: &DeviceFilter) -> Result<Self::Device>;

    /// Establish the link, discover `ids`, and subscribe to notifications.
    async fn open_channel(
        &self,
        device: &Self::Device,
        ids: &ChannelIds,
    ) -> Result<NotificationChannel>;

    /// Unsubscribe from `ids` and drop the link to `device`.
    async fn close(&self, device: &Self::Device, ids: &ChannelIds) -> Result<()>;
}

/// btleplug-backed transport using the first system adapter.
pub struct BleTransport {
    scanner: BleScanner,
}

impl BleTransport {
    /// Create a transport on the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Ok(Self {
            scanner: BleScanner::new().await?,
        })
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            scanner: BleScanner::with_adapter(adapter),
        }
    }
}

#[async_trait]
impl LinkTransport for BleTransport {
    type Device = Peripheral;

    async fn request_device(&self, filter: &DeviceFilter) -> Result<Peripheral> {
        self.scanner
            .find_by_name(&filter.name, filter.scan_timeout)
            .await
    }

    async fn open_channel(
        &self,
        device: &Peripheral,
        ids: &ChannelIds,
    ) -> Result<NotificationChannel> {
        let handler = CharacteristicHandler::new(self.scanner.adapter().clone(), device.clone());
        handler.establish(ids).await
    }

    async fn close(&self, device: &Peripheral, ids: &ChannelIds) -> Result<()> {
        let handler = CharacteristicHandler::new(self.scanner.adapter().clone(), device.clone());
        handler.release(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let filter = DeviceFilter::default();
        assert_eq!(filter.name, "SmartCane");

        let ids = ChannelIds::default();
        assert_eq!(ids.service, OBSTACLE_SERVICE_UUID);
        assert_eq!(ids.characteristic, OBSTACLE_CHARACTERISTIC_UUID);
    }

    #[tokio::test]
    async fn test_channel_closes_when_sender_dropped() {
        let (tx, mut channel) = NotificationChannel::new(4);
        tx.send(ChannelEvent::Payload(Bytes::from_static(b"STEP")))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(
            channel.recv().await,
            Some(ChannelEvent::Payload(Bytes::from_static(b"STEP")))
        );
        assert_eq!(channel.recv().await, None);
    }
}
