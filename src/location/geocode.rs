//! Reverse geocoding.
//!
//! Turns a position into a short spoken description of the surrounding
//! area using a Nominatim-compatible `/reverse` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::location::Coordinates;

/// Address parts returned by the geocoder. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Address {
    pub road: Option<String>,
    pub pedestrian: Option<String>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub building: Option<String>,
    pub house: Option<String>,
    pub neighbourhood: Option<String>,
}

impl Address {
    /// Street name, preferring roads over pedestrian ways.
    pub fn street(&self) -> Option<&str> {
        first_present(&[&self.road, &self.pedestrian])
    }

    /// Settlement name: city, town or village.
    pub fn locality(&self) -> Option<&str> {
        first_present(&[&self.city, &self.town, &self.village])
    }

    /// Nearby landmark: building, house or neighbourhood.
    pub fn landmark(&self) -> Option<&str> {
        first_present(&[&self.building, &self.house, &self.neighbourhood])
    }
}

fn first_present<'a>(fields: &[&'a Option<String>]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| f.as_deref())
        .find(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

/// Spoken description of an address.
pub fn describe_address(address: &Address) -> String {
    let mut spoken = String::from("You are currently in ");
    if let Some(suburb) = address.suburb.as_deref().filter(|s| !s.is_empty()) {
        spoken.push_str(suburb);
        spoken.push_str(", ");
    }
    spoken.push_str(address.locality().unwrap_or_default());

    if let Some(nearest) = address.street().or_else(|| address.landmark()) {
        spoken.push_str(". Closest street or landmark is ");
        spoken.push_str(nearest);
    }
    spoken
}

/// Position-to-address lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up the address at `position`.
    async fn reverse(&self, position: Coordinates) -> Result<Address>;
}

/// HTTP client for a Nominatim `/reverse` endpoint.
pub struct NominatimClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a client for `endpoint`. Requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP
    /// client cannot be built.
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            client,
        })
    }

    fn request_url(&self, position: Coordinates) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("lat", &position.lat.to_string())
            .append_pair("lon", &position.lon.to_string())
            .append_pair("format", "json");
        url
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, position: Coordinates) -> Result<Address> {
        let url = self.request_url(position);
        debug!("Reverse geocoding {}", url);

        let response: ReverseResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.address.unwrap_or_default())
    }
}
