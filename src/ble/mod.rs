//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy plumbing for selecting
//! the cane and receiving its obstacle notifications.

pub mod characteristics;
pub mod connection;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::{LinkEvent, LinkState};
pub use scanner::BleScanner;
pub use transport::{
    BleTransport, ChannelEvent, ChannelIds, DeviceFilter, LinkTransport, NotificationChannel,
};
pub use uuids::*;
