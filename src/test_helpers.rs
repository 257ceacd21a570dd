//! Shared test helpers: a scripted fetcher and throwaway configurations.

use crate::config::{Config, RetryConfig};
use crate::error::FetchError;
use crate::fetcher::{ByteStream, PageFetcher};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const ORIGIN: &str = "https://archive.test";

#[derive(Clone)]
enum Body {
    Complete(Bytes),
    Fails(FetchError),
    /// Delivers a prefix, then errors
    Truncated(Bytes, FetchError),
    /// Delivers a prefix, then never yields again
    Stalls(Bytes),
}

#[derive(Clone)]
struct Route {
    body: Body,
    delay: Duration,
}

/// In-memory [`PageFetcher`] with per-URL responses and call accounting
///
/// Unknown URLs answer 404. In-flight tracking spans from the call until the
/// returned body (or stream) is dropped.
#[derive(Default)]
pub(crate) struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(self, url: impl Into<String>, body: Body, delay: Duration) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.into(), Route { body, delay });
        self
    }

    pub(crate) fn page(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.route(url, Body::Complete(body.into()), Duration::ZERO)
    }

    pub(crate) fn page_after(
        self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
        delay: Duration,
    ) -> Self {
        self.route(url, Body::Complete(body.into()), delay)
    }

    pub(crate) fn failing(self, url: impl Into<String>, error: FetchError) -> Self {
        self.route(url, Body::Fails(error), Duration::ZERO)
    }

    pub(crate) fn failing_after(
        self,
        url: impl Into<String>,
        error: FetchError,
        delay: Duration,
    ) -> Self {
        self.route(url, Body::Fails(error), delay)
    }

    pub(crate) fn truncated(
        self,
        url: impl Into<String>,
        prefix: impl Into<Bytes>,
        error: FetchError,
    ) -> Self {
        self.route(url, Body::Truncated(prefix.into(), error), Duration::ZERO)
    }

    pub(crate) fn stalling(self, url: impl Into<String>, prefix: impl Into<Bytes>) -> Self {
        self.route(url, Body::Stalls(prefix.into()), Duration::ZERO)
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, url: &str) -> (Route, InFlight) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight {
            counter: self.in_flight.clone(),
        };

        let route = self.routes.lock().unwrap().get(url).cloned();
        let route = route.unwrap_or_else(|| Route {
            body: Body::Fails(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
            delay: Duration::ZERO,
        });
        (route, guard)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Bytes, FetchError> {
        let (route, _guard) = self.enter(url);
        tokio::time::sleep(route.delay).await;
        match route.body {
            Body::Complete(bytes) => Ok(bytes),
            Body::Fails(e) | Body::Truncated(_, e) => Err(e),
            Body::Stalls(_) => std::future::pending().await,
        }
    }

    async fn fetch_stream(&self, url: &str, _timeout: Duration) -> Result<ByteStream, FetchError> {
        let (route, guard) = self.enter(url);
        tokio::time::sleep(route.delay).await;

        let items: Vec<Result<Bytes, FetchError>> = match route.body {
            Body::Complete(bytes) => halves(bytes).into_iter().map(Ok).collect(),
            Body::Fails(e) => return Err(e),
            Body::Truncated(prefix, e) => vec![Ok(prefix), Err(e)],
            Body::Stalls(prefix) => {
                let head = futures::stream::iter(vec![Ok(prefix)]);
                let stalled = head.chain(futures::stream::pending());
                return Ok(hold(guard, stalled));
            }
        };
        Ok(hold(guard, futures::stream::iter(items)))
    }
}

/// Keep `guard` alive for as long as the stream is
fn hold<S>(guard: InFlight, stream: S) -> ByteStream
where
    S: futures::Stream<Item = Result<Bytes, FetchError>> + Send + Unpin + 'static,
{
    Box::pin(futures::stream::unfold(
        (guard, stream),
        |(guard, mut stream)| async move {
            let item = stream.next().await?;
            Some((item, (guard, stream)))
        },
    ))
}

/// Split a body in two so multi-chunk writes are exercised
fn halves(bytes: Bytes) -> Vec<Bytes> {
    if bytes.len() < 2 {
        return vec![bytes];
    }
    let mid = bytes.len() / 2;
    vec![bytes.slice(..mid), bytes.slice(mid..)]
}

/// Listing URL for `year` under [`ORIGIN`]
pub(crate) fn listing_url(year: u16) -> String {
    format!("{ORIGIN}/paper_files/paper/{year}")
}

/// Minimal listing page with one anchor per `(href, title)`
pub(crate) fn listing_page(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(href, title)| format!("<li><a href=\"{href}\">{title}</a></li>\n"))
        .collect();
    format!("<html><body><a href=\"/\">Home</a><ul>\n{items}</ul></body></html>")
}

/// Configuration rooted in `dir`, crawling [`ORIGIN`] with no retries
pub(crate) fn test_config(dir: &Path, start_year: u16, end_year: u16) -> Config {
    let mut config = Config::default();
    config.crawl.base_url = ORIGIN.to_string();
    config.crawl.start_year = start_year;
    config.crawl.end_year = end_year;
    config.output.download_dir = dir.join("downloads");
    config.output.csv_path = dir.join("output.csv");
    config.output.json_path = dir.join("output.json");
    config.http.listing_timeout = Duration::from_secs(5);
    config.http.download_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    };
    config
}
