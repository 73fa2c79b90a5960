use std::sync::Arc;

use dashmap::DashMap;
use reqwest::{Method, StatusCode, Url, redirect};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{Error, Result, StoreFlavor};

/// Default cap on the number of requests in flight across all destinations.
const DEFAULT_MAX_CONNECTIONS: usize = 2000;
/// Default cap on the number of requests in flight to a single destination.
const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 100;

/// Builder for a [`Client`].
///
/// The builder is configured with the base URL of the store and the [`StoreFlavor`] it speaks,
/// and allows tuning the shared connection pool before [`build`](Self::build)ing the client.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    flavor: StoreFlavor,
    max_connections: usize,
    max_connections_per_host: usize,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] targeting the store at `base_url`.
    pub fn new(base_url: impl Into<String>, flavor: StoreFlavor) -> Self {
        Self {
            base_url: base_url.into(),
            flavor,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
        }
    }

    /// Limits the total number of concurrent requests issued through this client and its clones.
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Limits the number of concurrent requests to a single destination.
    ///
    /// A destination is the scheme, host and port of the request URL. Locators that point to
    /// another host than the base URL are limited separately.
    pub fn max_connections_per_host(mut self, max_connections_per_host: usize) -> Self {
        self.max_connections_per_host = max_connections_per_host.max(1);
        self
    }

    /// Creates the [`Client`].
    pub fn build(self) -> Result<Client> {
        let base_url = self.base_url.trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidUrl {
                url: self.base_url.clone(),
            });
        }

        let http = reqwest::Client::builder()
            // stores neither compress payloads, nor use cookies or redirects:
            .no_brotli()
            .no_deflate()
            .no_gzip()
            .no_zstd()
            .redirect(redirect::Policy::none())
            .user_agent(self.flavor.user_agent())
            .pool_max_idle_per_host(self.max_connections_per_host)
            .build()?;

        Ok(Client {
            http,
            base_url: base_url.into(),
            flavor: self.flavor,
            limiter: Arc::new(Semaphore::new(self.max_connections)),
            hosts: Arc::new(HostLimiter {
                per_host: self.max_connections_per_host,
                semaphores: DashMap::new(),
            }),
        })
    }
}

/// A client for a single blob store.
///
/// The client is cheap to clone. All clones share the same connection pool and the same limits
/// on concurrent requests.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Arc<str>,
    pub(crate) flavor: StoreFlavor,
    limiter: Arc<Semaphore>,
    hosts: Arc<HostLimiter>,
}

impl Client {
    /// Returns the base URL of the store.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the flavor of the store.
    pub fn flavor(&self) -> StoreFlavor {
        self.flavor
    }

    /// Resolves a store-assigned locator into a full URL.
    ///
    /// Locators are usually paths relative to the base URL, but stores may also hand out
    /// absolute URLs.
    pub fn locator_url(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_owned();
        }

        match locator.strip_prefix('/') {
            Some(path) => format!("{}/{path}", self.base_url),
            None => format!("{}/{locator}", self.base_url),
        }
    }

    /// Waits for a free slot at the destination of `url` and in the total connection limit.
    pub(crate) async fn permit(&self, url: &str) -> Result<Permit> {
        let host = self
            .hosts
            .semaphore(url)
            .acquire_owned()
            .await
            .map_err(|_| Error::Closed)?;
        let total = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| Error::Closed)?;

        Ok(Permit {
            _host: host,
            _total: total,
        })
    }

    pub(crate) fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Probes the store for liveness.
    ///
    /// The store must answer `200 OK`. A body that differs from the one the flavor documents is
    /// tolerated, but logged.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}{}", self.base_url, self.flavor.health_path());
        let _permit = self.permit(&url).await?;

        tracing::debug!("sending healthcheck request to {}", url);
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Unhealthy { status });
        }

        let body = response.text().await?;
        if body.trim() != self.flavor.health_body() {
            tracing::warn!(
                flavor = %self.flavor,
                body,
                "unexpected healthcheck response body"
            );
        }

        Ok(())
    }

    /// Stops accepting new requests.
    ///
    /// Requests already in flight are not affected. All subsequent requests, through this client
    /// and all of its clones, fail with [`Error::Closed`].
    pub fn close(&self) {
        self.limiter.close();
    }
}

/// Slots held by a single request, released on drop.
#[derive(Debug)]
pub(crate) struct Permit {
    _host: OwnedSemaphorePermit,
    _total: OwnedSemaphorePermit,
}

/// One semaphore per destination, created on first use.
#[derive(Debug)]
struct HostLimiter {
    per_host: usize,
    semaphores: DashMap<String, Arc<Semaphore>>,
}

impl HostLimiter {
    fn semaphore(&self, url: &str) -> Arc<Semaphore> {
        let destination = Url::parse(url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|_| url.to_owned());

        let semaphore = self
            .semaphores
            .entry(destination)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)));
        Arc::clone(semaphore.value())
    }
}
