// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # smartcane-assistant
//!
//! A voice assistant for visually impaired users, paired with a Bluetooth
//! Low Energy smart cane that reports obstacles.
//!
//! ## Features
//!
//! - **Cane Link**: Select the cane by name, subscribe to its obstacle
//!   characteristic, and announce every report aloud
//! - **Automatic Reconnection**: A periodic reconnect loop starts when the
//!   cane drops and stops on the first successful reconnect
//! - **Voice Commands**: Ordered keyword rules map transcripts to replies
//!   or actions, with a web search as the fallback
//! - **Location**: Spoken reverse-geocoded address, directions home, or a
//!   nearby hospital map depending on the assistant variant
//! - **Offline Assets**: Cache-first serving of the interface assets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartcane_assistant::{BleTransport, Config, LinkManager, LogSpeaker, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     let transport = BleTransport::new().await?;
//!     let link = LinkManager::new(transport, Arc::new(LogSpeaker), config.link.clone());
//!
//!     let _handle = link.on_obstacle(|message| println!("Obstacle: {message}"));
//!     link.connect().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     link.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group. Speech
//! defaults to `espeak` and URLs open with `xdg-open`; both are
//! configurable.
//!
//! ### macOS
//! Requires Bluetooth permission. Set `voice.program = "say"` and
//! `assistant.opener = "open"` in the configuration file.

// Public modules
pub mod assistant;
pub mod ble;
pub mod commands;
pub mod config;
pub mod error;
pub mod launcher;
pub mod link_manager;
pub mod location;
pub mod offline;
pub mod protocol;
pub mod speech;

// Re-exports for convenience
pub use assistant::{Assistant, AssistantParts};
pub use ble::{BleTransport, LinkEvent, LinkState, LinkTransport};
pub use commands::{CommandRouter, Intent, Rule};
pub use config::{Config, LinkConfig, Variant};
pub use error::{Error, Result};
pub use launcher::{CommandLauncher, Launcher};
pub use link_manager::{CallbackHandle, LinkManager};
pub use location::{
    Coordinates, FixedGeolocator, Geolocator, NominatimClient, PositionOptions, ReverseGeocoder,
};
pub use offline::{AssetCache, AssetFetcher, HttpAssetFetcher};
pub use protocol::ObstacleReport;
pub use speech::{CommandSpeaker, LogSpeaker, Speaker, VoiceProfile};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<LinkManager<BleTransport>>();
        let _ = std::any::TypeId::of::<Assistant<BleTransport>>();
        let _ = std::any::TypeId::of::<CommandRouter>();
        let _ = std::any::TypeId::of::<Config>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<ObstacleReport>();
        let _ = std::any::TypeId::of::<AssetCache<HttpAssetFetcher>>();
    }
}
