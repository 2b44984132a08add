//! BLE Service and Characteristic UUIDs.
//!
//! Contains the fixed identifiers the SmartCane firmware advertises.

use uuid::Uuid;

/// Advertised local name used as the pairing filter.
pub const SMARTCANE_DEVICE_NAME: &str = "SmartCane";

// Obstacle Service (SmartCane Custom)
/// SmartCane obstacle service UUID.
pub const OBSTACLE_SERVICE_UUID: Uuid = Uuid::from_u128(0x1234_5678_1234_5678_1234_56789abcdef0);
/// Obstacle characteristic UUID (Notify, UTF-8 text payloads).
pub const OBSTACLE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xabcd_efab_1234_5678_1234_56789abcdef0);
