//! Offline asset cache.
//!
//! At install time every asset in the manifest is fetched and stored under
//! the cache name. Later requests are answered from the cache first and
//! fall back to the network, without caching the fallback response.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OfflineConfig;
use crate::error::{Error, Result};

/// Source of asset bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the asset at `path`.
    async fn fetch(&self, path: &str) -> Result<Bytes>;
}

/// Fetches assets over HTTP relative to a base URL.
pub struct HttpAssetFetcher {
    base: Url,
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    /// Create a fetcher rooted at `base_url`. Downloads give up after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base_url)?,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Create a fetcher from the offline settings.
    pub fn from_config(config: &OfflineConfig) -> Result<Self> {
        Self::new(&config.base_url, config.fetch_timeout())
    }

    /// Absolute URL for a manifest path.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let url = self.resolve(path)?;
        debug!("Fetching {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(body)
    }
}

/// A named, in-memory asset cache.
pub struct AssetCache<F: AssetFetcher> {
    name: String,
    manifest: Vec<String>,
    fetcher: F,
    entries: RwLock<HashMap<String, Bytes>>,
}

impl<F: AssetFetcher> AssetCache<F> {
    /// Create an empty cache.
    pub fn new(config: &OfflineConfig, fetcher: F) -> Self {
        Self {
            name: config.cache_name.clone(),
            manifest: config.manifest.clone(),
            fetcher,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Paths fetched at install time.
    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Check whether `path` is cached.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Number of cached assets.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Fetch and store every manifest asset.
    ///
    /// Installation is all-or-nothing: if any asset fails, nothing is
    /// stored and the error is returned.
    pub async fn install(&self) -> Result<()> {
        let mut fetched = HashMap::with_capacity(self.manifest.len());
        for path in &self.manifest {
            let body = self.fetcher.fetch(path).await.map_err(|e| {
                warn!("Install of {} failed at {}: {}", self.name, path, e);
                e
            })?;
            fetched.insert(path.clone(), body);
        }

        self.entries.write().extend(fetched);
        info!("Installed {} assets into {}", self.manifest.len(), self.name);
        Ok(())
    }

    /// Answer a request: cached copy first, network otherwise.
    pub async fn respond(&self, path: &str) -> Result<Bytes> {
        if let Some(body) = self.entries.read().get(path).cloned() {
            return Ok(body);
        }

        debug!("{} not cached, going to network", path);
        self.fetcher.fetch(path).await.map_err(|e| {
            debug!("Network fetch of {} failed: {}", path, e);
            Error::AssetNotFound {
                path: path.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    fn config(manifest: &[&str]) -> OfflineConfig {
        OfflineConfig {
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            ..OfflineConfig::default()
        }
    }

    #[test]
    fn test_default_manifest() {
        let cache = AssetCache::new(&OfflineConfig::default(), MockAssetFetcher::new());
        assert_eq!(cache.name(), "iris-cache");
        assert_eq!(cache.manifest().len(), 7);
        assert!(cache.manifest().contains(&"./index.html".to_string()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_resolve() {
        let fetcher = HttpAssetFetcher::new("http://localhost:8080/app/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            fetcher.resolve("./style.css").unwrap().as_str(),
            "http://localhost:8080/app/style.css"
        );
        assert_eq!(
            fetcher.resolve("./").unwrap().as_str(),
            "http://localhost:8080/app/"
        );

        let fetcher = HttpAssetFetcher::from_config(&OfflineConfig::default()).unwrap();
        assert_eq!(
            fetcher.resolve("./index.html").unwrap().as_str(),
            "http://localhost:8080/index.html"
        );
    }

    #[tokio::test]
    async fn test_install_then_serve_from_cache() {
        let mut fetcher = MockAssetFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|path| Ok(Bytes::from(format!("body of {path}"))));

        let cache = AssetCache::new(&config(&["./index.html", "./mic.svg"]), fetcher);
        cache.install().await.unwrap();
        assert_eq!(cache.len(), 2);

        // served without touching the fetcher again
        let body = cache.respond("./mic.svg").await.unwrap();
        assert_eq!(body, Bytes::from("body of ./mic.svg"));
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let mut fetcher = MockAssetFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq("./index.html"))
            .returning(|_| Ok(Bytes::from_static(b"<html>")));
        fetcher
            .expect_fetch()
            .with(eq("./voice.gif"))
            .returning(|_| Err(Error::Timeout));

        let cache = AssetCache::new(&config(&["./index.html", "./voice.gif"]), fetcher);
        assert!(cache.install().await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_network_fallback_is_not_cached() {
        let mut fetcher = MockAssetFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq("./extra.json"))
            .times(2)
            .returning(|_| Ok(Bytes::from_static(b"{}")));

        let cache = AssetCache::new(&config(&[]), fetcher);
        assert_eq!(cache.respond("./extra.json").await.unwrap(), Bytes::from_static(b"{}"));
        assert!(!cache.contains("./extra.json"));
        cache.respond("./extra.json").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_asset() {
        let mut fetcher = MockAssetFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Err(Error::Timeout));

        let cache = AssetCache::new(&config(&[]), fetcher);
        let err = cache.respond("./gone.png").await.unwrap_err();
        assert!(matches!(err, Error::AssetNotFound { path } if path == "./gone.png"));
    }
}
