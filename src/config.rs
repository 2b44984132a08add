//! Configuration for the assistant.
//!
//! Settings come from an optional TOML file, fall back to the preset for
//! the selected [`Variant`], and are finally overridden by `SMARTCANE_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ble::transport::{ChannelIds, DeviceFilter};
use crate::ble::uuids::{
    OBSTACLE_CHARACTERISTIC_UUID, OBSTACLE_SERVICE_UUID, SMARTCANE_DEVICE_NAME,
};
use crate::error::{Error, Result};
use crate::location::Coordinates;
use crate::speech::VoiceProfile;

/// Assistant preset.
///
/// The two presets differ in voice pitch, in what the location command
/// does, and in whether the "home" command exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Deep voice, spoken street address, directions home.
    #[default]
    Navigator,
    /// Neutral voice, nearby-hospitals map search, no "home" command.
    HospitalFinder,
}

impl Variant {
    /// Whether the router includes the "home" rule.
    pub fn has_home_command(&self) -> bool {
        matches!(self, Self::Navigator)
    }

    /// Voice used by this preset.
    pub fn voice_profile(&self) -> VoiceProfile {
        match self {
            Self::Navigator => VoiceProfile::deep(),
            Self::HospitalFinder => VoiceProfile::default(),
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigator" => Ok(Self::Navigator),
            "hospital-finder" | "hospital_finder" | "hospitals" => Ok(Self::HospitalFinder),
            other => Err(Error::Config {
                reason: format!("unknown variant '{other}'"),
            }),
        }
    }
}

/// Wireless link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Advertised name used as the pairing filter.
    pub device_name: String,
    /// Obstacle service UUID.
    pub service_uuid: Uuid,
    /// Obstacle characteristic UUID.
    pub characteristic_uuid: Uuid,
    /// Seconds between reconnect polls.
    pub reconnect_interval_secs: u64,
    /// Seconds allowed for link establishment and discovery.
    pub link_timeout_secs: u64,
    /// Seconds to scan for the device.
    pub scan_timeout_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: SMARTCANE_DEVICE_NAME.to_string(),
            service_uuid: OBSTACLE_SERVICE_UUID,
            characteristic_uuid: OBSTACLE_CHARACTERISTIC_UUID,
            reconnect_interval_secs: 5,
            link_timeout_secs: 20,
            scan_timeout_secs: 15,
        }
    }
}

impl LinkConfig {
    /// Reconnect poll period.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    /// Link establishment timeout.
    pub fn link_timeout(&self) -> Duration {
        Duration::from_secs(self.link_timeout_secs)
    }

    /// Device selection filter.
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            name: self.device_name.clone(),
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
        }
    }

    /// Service and characteristic identifiers.
    pub fn channel_ids(&self) -> ChannelIds {
        ChannelIds {
            service: self.service_uuid,
            characteristic: self.characteristic_uuid,
        }
    }
}

/// Speech output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// espeak-compatible synthesizer program.
    pub program: String,
    /// Voice language.
    pub language: String,
    /// Rate, pitch and volume. `None` uses the variant preset.
    pub profile: Option<VoiceProfile>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            program: "espeak".to_string(),
            language: "en".to_string(),
            profile: None,
        }
    }
}

/// Action settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Number dialled by the emergency command.
    pub caretaker_number: String,
    /// Destination of the "home" command.
    pub home: Coordinates,
    /// Web search endpoint; the transcript goes in the `q` parameter.
    pub search_url: String,
    /// Reverse geocoding endpoint.
    pub geocoder_url: String,
    /// User-Agent sent to the geocoder.
    pub user_agent: String,
    /// Seconds to wait for a position fix.
    pub position_timeout_secs: u64,
    /// Seconds to wait for a reverse geocoding answer.
    pub geocoder_timeout_secs: u64,
    /// Position reported by the fixed geolocator, if any.
    pub fixed_position: Option<Coordinates>,
    /// Program used to open URLs and dial numbers.
    pub opener: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            caretaker_number: "584782659".to_string(),
            home: Coordinates::new(24.663583, 46.7065),
            search_url: "https://www.google.com/search".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("smartcane-assistant/", env!("CARGO_PKG_VERSION")).to_string(),
            position_timeout_secs: 7,
            geocoder_timeout_secs: 10,
            fixed_position: None,
            opener: "xdg-open".to_string(),
        }
    }
}

impl AssistantConfig {
    /// Position fix timeout.
    pub fn position_timeout(&self) -> Duration {
        Duration::from_secs(self.position_timeout_secs)
    }

    /// Reverse geocoding timeout.
    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }
}

/// Offline asset cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Cache name.
    pub cache_name: String,
    /// Origin the manifest paths are resolved against.
    pub base_url: String,
    /// Assets fetched at install time.
    pub manifest: Vec<String>,
    /// Seconds to wait for one asset download.
    pub fetch_timeout_secs: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_name: "iris-cache".to_string(),
            base_url: "http://localhost:8080/".to_string(),
            manifest: [
                "./",
                "./index.html",
                "./style.css",
                "./script.js",
                "./Avatar.png",
                "./mic.svg",
                "./voice.gif",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fetch_timeout_secs: 30,
        }
    }
}

impl OfflineConfig {
    /// Asset download timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Complete assistant configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assistant preset.
    pub variant: Variant,
    /// Wireless link settings.
    pub link: LinkConfig,
    /// Speech output settings.
    pub voice: VoiceConfig,
    /// Action settings.
    pub assistant: AssistantConfig,
    /// Offline cache settings.
    pub offline: OfflineConfig,
}

impl Config {
    /// Preset for a variant.
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override has an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            reason: e.to_string(),
        })
    }

    /// Apply `SMARTCANE_*` overrides from a lookup function.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(variant) = lookup("SMARTCANE_VARIANT") {
            self.variant = variant.parse()?;
            debug!("Variant overridden: {:?}", self.variant);
        }
        if let Some(name) = lookup("SMARTCANE_DEVICE_NAME") {
            self.link.device_name = name;
        }
        if let Some(number) = lookup("SMARTCANE_CARETAKER") {
            self.assistant.caretaker_number = number;
        }
        if let Some(program) = lookup("SMARTCANE_TTS_PROGRAM") {
            self.voice.program = program;
        }
        Ok(())
    }

    /// Voice to speak with: explicit profile, else the variant preset.
    pub fn voice_profile(&self) -> VoiceProfile {
        self.voice
            .profile
            .unwrap_or_else(|| self.variant.voice_profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.variant, Variant::Navigator);
        assert_eq!(config.link.device_name, "SmartCane");
        assert_eq!(config.link.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.assistant.caretaker_number, "584782659");
        assert_eq!(config.assistant.position_timeout(), Duration::from_secs(7));
        assert_eq!(config.offline.manifest.len(), 7);
    }

    #[test]
    fn test_variant_voice() {
        assert_eq!(Config::for_variant(Variant::Navigator).voice_profile().pitch, 0.8);
        assert_eq!(
            Config::for_variant(Variant::HospitalFinder).voice_profile().pitch,
            1.0
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            variant = "hospital-finder"

            [link]
            reconnect_interval_secs = 2

            [voice.profile]
            pitch = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.variant, Variant::HospitalFinder);
        assert_eq!(config.link.reconnect_interval_secs, 2);
        assert_eq!(config.link.device_name, "SmartCane");
        assert_eq!(config.voice_profile().pitch, 0.5);
        assert_eq!(config.voice_profile().rate, 1.0);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("variant = \"submarine\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[assistant]\ncaretaker_number = \"112\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.assistant.caretaker_number, "112");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SMARTCANE_VARIANT", "hospitals"),
            ("SMARTCANE_DEVICE_NAME", "TestCane"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.variant, Variant::HospitalFinder);
        assert_eq!(config.link.device_filter().name, "TestCane");
    }

    #[test]
    fn test_bad_variant_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "SMARTCANE_VARIANT").then(|| "tank".to_string())
        });
        assert!(result.is_err());
    }
}
