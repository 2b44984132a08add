//! Position and address lookup.

pub mod geocode;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

pub use geocode::{describe_address, Address, NominatimClient, ReverseGeocoder};

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl Coordinates {
    /// Create coordinates.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Spoken fallback when no address is available.
    pub fn spoken(&self) -> String {
        format!(
            "Your coordinates are latitude {:.3}, longitude {:.3}",
            self.lat, self.lon
        )
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Options for a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Prefer the most accurate source available.
    pub high_accuracy: bool,
    /// Give up after this long.
    pub timeout: Duration,
    /// Oldest cached fix that may be returned. Zero forces a fresh fix.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(7),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Source of the user's current position.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Get the current position.
    async fn current_position(&self, options: &PositionOptions) -> Result<Coordinates>;
}

/// Geolocator that always reports a configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    position: Coordinates,
}

impl FixedGeolocator {
    /// Create a geolocator pinned to `position`.
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Coordinates> {
        if !(-90.0..=90.0).contains(&self.position.lat)
            || !(-180.0..=180.0).contains(&self.position.lon)
        {
            return Err(Error::Geolocation {
                reason: format!("position {} out of range", self.position),
            });
        }
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spoken_rounds_to_three_decimals() {
        let c = Coordinates::new(24.663583, 46.7065);
        assert_eq!(
            c.spoken(),
            "Your coordinates are latitude 24.664, longitude 46.706"
        );
    }

    #[test]
    fn test_position_options_default() {
        let options = PositionOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_secs(7));
        assert_eq!(options.maximum_age, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fixed_geolocator() {
        let locator = FixedGeolocator::new(Coordinates::new(1.5, 2.5));
        let position = locator
            .current_position(&PositionOptions::default())
            .await
            .unwrap();
        assert_eq!(position, Coordinates::new(1.5, 2.5));

        let bad = FixedGeolocator::new(Coordinates::new(91.0, 0.0));
        tokio_test::assert_err!(bad.current_position(&PositionOptions::default()).await);
    }
}
