//! GATT characteristic handling.
//!
//! Connects a peripheral, locates the obstacle characteristic and forwards
//! its notifications, together with disconnect events, into a
//! [`NotificationChannel`].

use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use futures::stream::StreamExt;
use tracing::{debug, trace, warn};

use crate::ble::transport::{ChannelEvent, ChannelIds, NotificationChannel};
use crate::error::{Error, Result};

/// Buffered notifications per channel.
const CHANNEL_CAPACITY: usize = 64;

/// Handler for the obstacle characteristic on one peripheral.
pub struct CharacteristicHandler {
    /// Adapter the peripheral belongs to, used for disconnect events.
    adapter: Adapter,
    /// The peripheral to communicate with.
    peripheral: Peripheral,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a peripheral.
    pub fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        Self {
            adapter,
            peripheral,
        }
    }

    /// Connect, discover `ids`, subscribe, and start forwarding events.
    pub async fn establish(&self, ids: &ChannelIds) -> Result<NotificationChannel> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.connect().await.map_err(Error::Bluetooth)?;
        }
        debug!("Link established, discovering services");

        self.peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        let characteristic = self.find_characteristic(ids)?;

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;
        debug!("Subscribed to notifications from {}", characteristic.uuid);

        self.start_forwarding(characteristic).await
    }

    /// Find the notifying characteristic inside its service.
    /// Unsubscribe from the characteristic and disconnect.
    ///
    /// Disconnecting also ends the forwarder task, which sees the
    /// adapter's disconnect event.
    pub async fn release(&self, ids: &ChannelIds) -> Result<()> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            debug!("Peripheral already disconnected");
            return Ok(());
        }

        match self.find_characteristic(ids) {
            Ok(characteristic) => {
                if let Err(e) = self.peripheral.unsubscribe(&characteristic).await {
                    warn!("Failed to unsubscribe from {}: {}", characteristic.uuid, e);
                }
            }
            Err(e) => debug!("Nothing to unsubscribe: {}", e),
        }

        self.peripheral.disconnect().await.map_err(Error::Bluetooth)?;
        debug!("Peripheral disconnected");
        Ok(())
    }

    fn find_characteristic(&self, ids: &ChannelIds) -> Result<Characteristic> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == ids.service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: ids.service.to_string(),
            })?;

        service
            .characteristics
            .into_iter()
            .find(|c| c.uuid == ids.characteristic)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: ids.characteristic.to_string(),
            })
    }

    /// Spawn the task that feeds the channel.
    async fn start_forwarding(&self, characteristic: Characteristic) -> Result<NotificationChannel> {
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;
        let mut central_events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        let (tx, channel) = NotificationChannel::new(CHANNEL_CAPACITY);
        let peripheral_id = self.peripheral.id();
        let uuid = characteristic.uuid;

        tokio::spawn(async move {
            debug!("Notification forwarder started");
            loop {
                tokio::select! {
                    notification = notifications.next() => {
                        let Some(notification) = notification else {
                            let _ = tx.send(ChannelEvent::Disconnected).await;
                            break;
                        };
                        if notification.uuid != uuid {
                            continue;
                        }
                        trace!("Notification: {} bytes", notification.value.len());
                        if tx.send(ChannelEvent::Payload(Bytes::from(notification.value))).await.is_err() {
                            break;
                        }
                    }
                    Some(event) = central_events.next() => {
                        if let CentralEvent::DeviceDisconnected(id) = event {
                            if id == peripheral_id {
                                let _ = tx.send(ChannelEvent::Disconnected).await;
                                break;
                            }
                        }
                    }
                }
            }
            debug!("Notification forwarder stopped");
        });

        Ok(channel)
    }
}
