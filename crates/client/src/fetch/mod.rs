//! HTTP transport and the bounded fetch pool.
//!
//! [`HttpFetcher`] performs the actual network call with a fixed timeout and
//! a browser-like header set. [`ProbePool`] wraps any [`Fetch`] with the
//! global rate gate and a counting semaphore so at most `concurrency`
//! requests are ever in flight to the target. The pool performs no caching:
//! that stays with the caller, so the pool is reusable for one-off debug
//! checks that must not touch the cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::Semaphore;

use idsweep_core::config::MAX_TARGET_CONCURRENCY;
use idsweep_core::{Error, ListingId, ScanResult};

use crate::classify::Classify;
use crate::gate::RateGate;

/// Transport configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Target base URL; listing ids are appended as path segments.
    pub base_url: String,
    /// User-Agent string.
    pub user_agent: String,
    /// Fixed request timeout.
    pub timeout: Duration,
}

/// Raw outcome of fetching one listing page.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub http_status: u16,
    pub final_url: String,
    pub body: String,
    pub fetch_ms: u64,
}

/// Transport seam: one listing id in, one raw response out.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, id: &ListingId) -> Result<Fetched, Error>;
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch(&self, id: &ListingId) -> Result<Fetched, Error> {
        (**self).fetch(id).await
    }
}

/// reqwest-backed fetcher for the target site.
#[derive(Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    base: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("lt-LT,lt;q=0.9,en;q=0.8"));
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, id: &ListingId) -> Result<Fetched, Error> {
        let start = Instant::now();
        let url = format!("{}/{}/", self.base, id);

        let response = self.http.get(&url).send().await.map_err(transport_error)?;

        // non-2xx is data for the classifier (404 means NOT_FOUND), not a
        // transport failure
        let http_status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(transport_error)?;
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(%id, http_status, fetch_ms, bytes = body.len(), "fetched listing");

        Ok(Fetched { http_status, final_url, body, fetch_ms })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::FetchTimeout(e.to_string())
    } else {
        Error::HttpError(format!("network error: {e}"))
    }
}

/// Bounded probe pool: permit, then rate gate, then fetch, then classify.
pub struct ProbePool<F> {
    gate: Arc<RateGate>,
    permits: Arc<Semaphore>,
    concurrency: usize,
    fetcher: F,
    classifier: Arc<dyn Classify>,
}

impl<F: Clone> Clone for ProbePool<F> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            permits: self.permits.clone(),
            concurrency: self.concurrency,
            fetcher: self.fetcher.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

impl<F: Fetch> ProbePool<F> {
    /// The requested concurrency is clamped to the safety ceiling no matter
    /// what the configuration says.
    pub fn new(fetcher: F, gate: Arc<RateGate>, classifier: Arc<dyn Classify>, concurrency: usize) -> Self {
        let concurrency = concurrency.clamp(1, MAX_TARGET_CONCURRENCY);
        Self { gate, permits: Arc::new(Semaphore::new(concurrency)), concurrency, fetcher, classifier }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn classifier(&self) -> Arc<dyn Classify> {
        self.classifier.clone()
    }

    /// Fetch and classify one listing. No caching here.
    pub async fn probe(&self, id: &ListingId) -> Result<(ScanResult, String), Error> {
        let _permit =
            self.permits.acquire().await.map_err(|_| Error::HttpError("fetch pool closed".to_string()))?;
        self.gate.acquire_slot().await;

        let fetched = self.fetcher.fetch(id).await?;
        let classification =
            self.classifier.classify(&fetched.body, Some(&fetched.final_url), Some(fetched.http_status));
        let result = classification.into_result(id.clone(), Some(fetched.http_status));
        Ok((result, fetched.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MarkerClassifier;
    use idsweep_core::ScanStatus;

    #[derive(Clone)]
    struct FixedFetcher {
        body: String,
        http_status: u16,
    }

    #[async_trait]
    impl Fetch for FixedFetcher {
        async fn fetch(&self, id: &ListingId) -> Result<Fetched, Error> {
            Ok(Fetched {
                http_status: self.http_status,
                final_url: format!("https://www.example.test/{id}/"),
                body: self.body.clone(),
                fetch_ms: 1,
            })
        }
    }

    fn pool(fetcher: FixedFetcher, concurrency: usize) -> ProbePool<FixedFetcher> {
        let gate = Arc::new(RateGate::new(0.0));
        let classifier: Arc<dyn Classify> = Arc::new(MarkerClassifier::new("sugiharos"));
        ProbePool::new(fetcher, gate, classifier, concurrency)
    }

    #[test]
    fn test_concurrency_clamped_to_ceiling() {
        let fetcher = FixedFetcher { body: String::new(), http_status: 200 };
        assert_eq!(pool(fetcher.clone(), 50).concurrency(), MAX_TARGET_CONCURRENCY);
        assert_eq!(pool(fetcher, 0).concurrency(), 1);
    }

    #[tokio::test]
    async fn test_probe_classifies_and_returns_raw_body() {
        let fetcher = FixedFetcher { body: "<html><h1>Vilnius, Senamiestis</h1></html>".into(), http_status: 200 };
        let (result, raw) = pool(fetcher, 2).probe(&ListingId::from_number(3000001)).await.unwrap();
        assert_eq!(result.status, ScanStatus::Found);
        assert_eq!(result.http_status, Some(200));
        assert_eq!(result.city.as_deref(), Some("Vilnius"));
        assert!(raw.contains("<h1>"));
    }

    #[tokio::test]
    async fn test_probe_passes_404_to_classifier() {
        let fetcher = FixedFetcher { body: "gone".into(), http_status: 404 };
        let (result, _) = pool(fetcher, 2).probe(&ListingId::from_number(3000001)).await.unwrap();
        assert_eq!(result.status, ScanStatus::NotFound);
        assert_eq!(result.http_status, Some(404));
    }

    #[test]
    fn test_fetch_config_shape() {
        let config = FetchConfig {
            base_url: "https://www.aruodas.lt/".into(),
            user_agent: "test".into(),
            timeout: Duration::from_secs(25),
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.base, "https://www.aruodas.lt");
    }
}
