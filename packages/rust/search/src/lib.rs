//! Rate-limited search provider client and profile URL extraction.
//!
//! [`SearchClient`] issues web searches against a RapidAPI-style Google
//! search endpoint. Every physical call passes a counting admission gate,
//! transient failures are retried a bounded number of times with a fixed
//! backoff, and an explicit rate-limit response (HTTP 429) is reported as
//! [`SearchOutcome::Blocked`] without retrying.

mod extract;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use leadscout_shared::{ApiKey, EnrichSettings, LeadScoutError, Result, SearchConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

pub use extract::{canonical_profile_url, extract_profile_url, profile_handle};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("LeadScout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single web result, in provider order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "description")]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Outcome of one logical search (all attempts included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The provider answered; the list may be empty.
    Results(Vec<SearchResult>),
    /// The provider signalled a rate limit. Callers must not try further queries.
    Blocked,
    /// Retries exhausted or the response was unusable. Callers may try the next query.
    Failed,
}

/// Snapshot of the client's request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Physical calls made, one per attempt.
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub rate_limited: u64,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection and retry settings for a [`SearchClient`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Endpoint URL queried with `?query=..&limit=..`.
    pub endpoint: String,
    /// Value of the `x-rapidapi-host` header.
    pub host: String,
    /// Results requested per query.
    pub result_limit: u32,
    /// Maximum in-flight calls.
    pub max_concurrent: usize,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl SearchOptions {
    /// Merge provider config with run settings; the batch size is the concurrency ceiling.
    pub fn new(config: &SearchConfig, settings: &EnrichSettings) -> Self {
        Self {
            endpoint: config.endpoint_url(),
            host: config.host.clone(),
            result_limit: config.result_limit,
            max_concurrent: settings.batch_size.max(1),
            max_retries: settings.max_retries,
            timeout: settings.request_timeout,
            retry_backoff: settings.retry_backoff,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    total_requests: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    rate_limited: AtomicU64,
}

/// Result of a single physical call.
enum Attempt {
    Success(Vec<SearchResult>),
    RateLimited,
    Transient(String),
    Fatal(String),
}

/// Search client bounded by an admission gate, with bounded retries.
///
/// Counters live as long as the client; create one client per run.
pub struct SearchClient {
    client: Client,
    api_key: ApiKey,
    options: SearchOptions,
    gate: Semaphore,
    counters: Counters,
}

impl SearchClient {
    /// Create a new client. The key is sent as a header and never logged.
    pub fn new(api_key: ApiKey, options: SearchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|e| LeadScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        let gate = Semaphore::new(options.max_concurrent.max(1));

        Ok(Self {
            client,
            api_key,
            options,
            gate,
            counters: Counters::default(),
        })
    }

    /// Run one logical search, retrying transient failures.
    #[instrument(skip_all)]
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let mut retries = 0;

        loop {
            match self.attempt(query).await {
                Attempt::Success(results) => {
                    self.counters.successful.fetch_add(1, Ordering::Relaxed);
                    debug!(query, results = results.len(), "search succeeded");
                    return SearchOutcome::Results(results);
                }
                Attempt::RateLimited => {
                    self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        total_requests = self.counters.total_requests.load(Ordering::Relaxed),
                        "search provider rate limit hit"
                    );
                    return SearchOutcome::Blocked;
                }
                Attempt::Transient(reason) if retries < self.options.max_retries => {
                    retries += 1;
                    debug!(query, retries, %reason, "transient search failure, retrying");
                    tokio::time::sleep(self.options.retry_backoff).await;
                }
                Attempt::Transient(reason) | Attempt::Fatal(reason) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(query, retries, %reason, "search failed");
                    return SearchOutcome::Failed;
                }
            }
        }
    }

    /// Current counter values.
    pub fn stats(&self) -> SearchStats {
        SearchStats {
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            successful: self.counters.successful.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
        }
    }

    /// One physical call through the admission gate.
    async fn attempt(&self, query: &str) -> Attempt {
        let Ok(_permit) = self.gate.acquire().await else {
            return Attempt::Fatal("admission gate closed".into());
        };

        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        let limit = self.options.result_limit.to_string();
        let sent = self
            .client
            .get(&self.options.endpoint)
            .header("x-rapidapi-host", &self.options.host)
            .header("x-rapidapi-key", self.api_key.expose())
            .query(&[("query", query), ("limit", limit.as_str())])
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited;
        }
        if !status.is_success() {
            return Attempt::Transient(format!("HTTP {status}"));
        }

        match response.json::<SearchResponse>().await {
            Ok(body) => Attempt::Success(body.results),
            Err(e) if e.is_timeout() => Attempt::Transient(e.to_string()),
            Err(e) => Attempt::Fatal(format!("unreadable response: {e}")),
        }
    }
}
