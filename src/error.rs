//! Error types for the smartcane-assistant crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No device matching the pairing filter was found.
    #[error("Device not found: {name}")]
    DeviceNotFound {
        /// The advertised name that was searched for.
        name: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Failed to establish a connection to the device.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A connect or reconnect sequence is already running.
    #[error("Connection already in progress")]
    ConnectionInProgress,

    /// The link is already established.
    #[error("Already connected")]
    AlreadyConnected,

    /// Link establishment or a location request timed out.
    #[error("Operation timed out")]
    Timeout,

    /// No geolocation provider is configured.
    #[error("Geolocation not available")]
    GeolocationUnavailable,

    /// The geolocation provider could not produce a position.
    #[error("Geolocation failed: {reason}")]
    Geolocation {
        /// Description of why the position is unavailable.
        reason: String,
    },

    /// HTTP error from the geocoder or asset fetcher.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The configuration could not be loaded.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of the problem.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An asset is neither cached nor reachable.
    #[error("Asset not found: {path}")]
    AssetNotFound {
        /// The requested asset path.
        path: String,
    },

    /// A URL or intent could not be handed to the platform.
    #[error("Failed to open {target}: {reason}")]
    Launch {
        /// The URL that was being opened.
        target: String,
        /// Description of the failure.
        reason: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DeviceNotFound {
            name: "SmartCane".to_string(),
        };
        assert_eq!(err.to_string(), "Device not found: SmartCane");

        let err = Error::Launch {
            target: "tel:1".to_string(),
            reason: "no opener".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to open tel:1: no opener");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
