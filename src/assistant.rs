//! Voice assistant.
//!
//! Routes transcripts through the [`CommandRouter`] and carries out the
//! resulting intent: replies, cane connection, emergency call, location,
//! directions home, or a web search. Every failure ends in a spoken
//! apology or a log line; nothing here is fatal.

use chrono::Timelike;
use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

use crate::ble::transport::LinkTransport;
use crate::commands::{CommandRouter, Intent};
use crate::config::{Config, Variant};
use crate::error::{Error, Result};
use crate::launcher::{directions_url, hospitals_url, tel_uri, web_search_url, Launcher};
use crate::link_manager::LinkManager;
use crate::location::{describe_address, Coordinates, Geolocator, PositionOptions, ReverseGeocoder};
use crate::speech::{greeting_for_hour, Speaker};

/// Spoken before a manual cane connect.
pub const CONNECTING_MESSAGE: &str = "Connecting to your smart cane now.";
/// Spoken before dialling the caretaker.
pub const EMERGENCY_MESSAGE: &str = "Calling your caretaker.";
/// Spoken before opening directions home.
pub const HOME_MESSAGE: &str = "Location set to home.";
/// Spoken before opening a web search.
pub const SEARCH_MESSAGE: &str = "Here is what I found on the web regarding your query.";
/// Spoken before opening the hospital map.
pub const HOSPITALS_MESSAGE: &str = "Showing hospitals near you.";
/// Spoken when no geolocator is configured.
pub const NO_GEOLOCATION_MESSAGE: &str = "Geolocation is not supported on this device.";
/// Spoken when a position fix fails.
pub const LOCATION_FAILED_MESSAGE: &str = "Sorry, I couldn't get your location.";
/// Spoken when a URL could not be opened.
pub const LAUNCH_FAILED_MESSAGE: &str = "Sorry, I couldn't open that.";

/// Builder-supplied collaborators.
pub struct AssistantParts<T: LinkTransport> {
    /// Cane link.
    pub link: LinkManager<T>,
    /// Speech output.
    pub speaker: Arc<dyn Speaker>,
    /// URL and phone launcher.
    pub launcher: Arc<dyn Launcher>,
    /// Position source, if the platform has one.
    pub geolocator: Option<Arc<dyn Geolocator>>,
    /// Address lookup.
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

/// The voice assistant.
pub struct Assistant<T: LinkTransport> {
    router: CommandRouter,
    config: Config,
    link: LinkManager<T>,
    speaker: Arc<dyn Speaker>,
    launcher: Arc<dyn Launcher>,
    geolocator: Option<Arc<dyn Geolocator>>,
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl<T: LinkTransport> Assistant<T> {
    /// Create an assistant for `config`.
    pub fn new(config: Config, parts: AssistantParts<T>) -> Self {
        Self {
            router: CommandRouter::for_variant(config.variant),
            config,
            link: parts.link,
            speaker: parts.speaker,
            launcher: parts.launcher,
            geolocator: parts.geolocator,
            geocoder: parts.geocoder,
        }
    }

    /// Get the link manager.
    pub fn link(&self) -> &LinkManager<T> {
        &self.link
    }

    /// Get the router.
    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Greet the user according to the local time of day.
    pub fn greet(&self) {
        self.greet_at_hour(chrono::Local::now().hour());
    }

    /// Greet the user for a given hour (0-23).
    pub fn greet_at_hour(&self, hour: u32) {
        self.speaker.speak(greeting_for_hour(hour));
    }

    /// Handle one recognized transcript. Exactly one action fires.
    pub async fn handle_transcript(&self, transcript: &str) -> Intent {
        let message = transcript.to_lowercase();
        let intent = self.router.route(&message);
        debug!("Transcript {:?} routed to {:?}", message, intent);

        if let Some(reply) = intent.reply() {
            self.speaker.speak(reply);
            return intent;
        }

        match intent {
            Intent::ConnectCane => self.connect_cane(),
            Intent::Emergency => self.call_emergency(),
            Intent::Location => self.tell_location().await,
            Intent::Home => self.go_home(),
            Intent::WebSearch => self.search(&message),
            Intent::Greeting | Intent::Identity | Intent::Status | Intent::Name | Intent::Farewell => {}
        }

        intent
    }

    /// Start connecting to the cane in the background.
    ///
    /// Returns at once; the link manager announces the outcome.
    pub fn connect_cane(&self) {
        self.speaker.speak(CONNECTING_MESSAGE);
        let link = self.link.clone();
        tokio::spawn(async move {
            if let Err(e) = link.connect().await {
                debug!("Cane connect ended: {}", e);
            }
        });
    }

    /// Dial the caretaker.
    pub fn call_emergency(&self) {
        self.speaker.speak(EMERGENCY_MESSAGE);
        let result = tel_uri(&self.config.assistant.caretaker_number)
            .and_then(|uri| self.launcher.dial(&uri));
        self.report_launch(result);
    }

    /// Announce where the user is, or show nearby hospitals.
    pub async fn tell_location(&self) {
        let position = match self.current_position().await {
            Ok(position) => position,
            Err(Error::GeolocationUnavailable) => {
                self.speaker.speak(NO_GEOLOCATION_MESSAGE);
                return;
            }
            Err(e) => {
                error!("Geolocation failed: {}", e);
                self.speaker.speak(LOCATION_FAILED_MESSAGE);
                return;
            }
        };

        match self.config.variant {
            Variant::Navigator => {
                let lookup = tokio::time::timeout(
                    self.config.assistant.geocoder_timeout(),
                    self.geocoder.reverse(position),
                );
                let spoken = match lookup.await.map_err(|_| Error::Timeout) {
                    Ok(Ok(address)) => describe_address(&address),
                    Ok(Err(e)) | Err(e) => {
                        error!("Reverse geocoding failed: {}", e);
                        position.spoken()
                    }
                };
                self.speaker.speak(&spoken);
            }
            Variant::HospitalFinder => {
                self.speaker.speak(HOSPITALS_MESSAGE);
                self.open(hospitals_url(position));
            }
        }
    }

    /// Open directions to the configured home.
    pub fn go_home(&self) {
        self.speaker.speak(HOME_MESSAGE);
        self.open(directions_url(self.config.assistant.home));
    }

    /// Open a web search for `query`.
    pub fn search(&self, query: &str) {
        self.speaker.speak(SEARCH_MESSAGE);
        self.open(web_search_url(&self.config.assistant.search_url, query));
    }

    async fn current_position(&self) -> Result<Coordinates> {
        let geolocator = self
            .geolocator
            .as_ref()
            .ok_or(Error::GeolocationUnavailable)?;

        let options = PositionOptions {
            timeout: self.config.assistant.position_timeout(),
            ..PositionOptions::default()
        };

        tokio::time::timeout(options.timeout, geolocator.current_position(&options))
            .await
            .map_err(|_| Error::Timeout)?
    }

    fn open(&self, url: Result<Url>) {
        let result = url.and_then(|url| {
            info!("Opening {}", url);
            self.launcher.open_url(&url)
        });
        self.report_launch(result);
    }

    fn report_launch(&self, result: Result<()>) {
        if let Err(e) = result {
            error!("{}", e);
            self.speaker.speak(LAUNCH_FAILED_MESSAGE);
        }
    }
}
