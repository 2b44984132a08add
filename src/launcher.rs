//! Opening maps, searches and phone calls.

use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::location::Coordinates;

/// Hand URLs to the platform.
#[cfg_attr(test, mockall::automock)]
pub trait Launcher: Send + Sync {
    /// Open a web page or map in a new view.
    fn open_url(&self, url: &Url) -> Result<()>;

    /// Start a phone call for a `tel:` URI.
    fn dial(&self, uri: &Url) -> Result<()>;
}

/// Launcher that runs an opener program such as `xdg-open` or `open`.
///
/// Must be used inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
}

impl CommandLauncher {
    /// Create a launcher using `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, target: &Url) -> Result<()> {
        debug!("Opening {} with {}", target, self.program);
        Command::new(&self.program)
            .arg(target.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|mut child| {
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        warn!("Opener exited abnormally: {}", e);
                    }
                });
            })
            .map_err(|e| Error::Launch {
                target: target.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Launcher for CommandLauncher {
    fn open_url(&self, url: &Url) -> Result<()> {
        self.run(url)
    }

    fn dial(&self, uri: &Url) -> Result<()> {
        info!("Dialling {}", uri);
        self.run(uri)
    }
}

/// Web search for a transcript.
pub fn web_search_url(base: &str, query: &str) -> Result<Url> {
    Ok(Url::parse_with_params(base, &[("q", query)])?)
}

/// Directions from the current position to `destination`.
pub fn directions_url(destination: Coordinates) -> Result<Url> {
    Ok(Url::parse(&format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        destination.lat, destination.lon
    ))?)
}

/// Map search for hospitals around `position`.
pub fn hospitals_url(position: Coordinates) -> Result<Url> {
    Ok(Url::parse(&format!(
        "https://www.google.com/maps/search/hospitals/@{},{},15z",
        position.lat, position.lon
    ))?)
}

/// `tel:` URI for a phone number.
pub fn tel_uri(number: &str) -> Result<Url> {
    let digits: String = number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if digits.is_empty() {
        return Err(Error::Launch {
            target: format!("tel:{number}"),
            reason: "no digits in phone number".to_string(),
        });
    }
    Ok(Url::parse(&format!("tel:{digits}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_web_search_url_encodes_query() {
        let url = web_search_url("https://www.google.com/search", "weather in riyadh").unwrap();
        assert_eq!(url.as_str(), "https://www.google.com/search?q=weather+in+riyadh");
    }

    #[test]
    fn test_directions_url() {
        let url = directions_url(Coordinates::new(24.663583, 46.7065)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.google.com/maps/dir/?api=1&destination=24.663583,46.7065"
        );
        let destination = url
            .query_pairs()
            .find(|(k, _)| k == "destination")
            .map(|(_, v)| v.into_owned());
        assert_eq!(destination.as_deref(), Some("24.663583,46.7065"));
    }

    #[test]
    fn test_hospitals_url() {
        let url = hospitals_url(Coordinates::new(24.7, 46.6)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.google.com/maps/search/hospitals/@24.7,46.6,15z"
        );
    }

    #[test]
    fn test_tel_uri() {
        assert_eq!(tel_uri("584782659").unwrap().as_str(), "tel:584782659");
        assert_eq!(tel_uri("+966 58-478").unwrap().as_str(), "tel:+96658478");
        assert!(tel_uri("none").is_err());
    }

    #[tokio::test]
    async fn test_missing_opener_is_an_error() {
        let launcher = CommandLauncher::new("definitely-not-an-opener");
        let url = tel_uri("112").unwrap();
        assert!(matches!(launcher.dial(&url), Err(Error::Launch { .. })));
    }
}
