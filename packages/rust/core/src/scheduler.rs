//! Batch scheduling of per-row lookups.
//!
//! Eligible rows are processed in batches of `batch_size`. Within a batch
//! every row's lookup runs concurrently (bounded by the search client's
//! admission gate); results are merged back into the dataset in row order
//! once the whole batch has settled, so all mutation of the dataset happens
//! on the scheduler's own task.

use futures::future::join_all;
use leadscout_dataset::{Dataset, LeadRow};
use leadscout_profile::ProfileScraper;
use leadscout_search::{SearchClient, SearchOutcome, extract_profile_url};
use leadscout_shared::{EnrichSettings, ProfileDetails, Result};
use tracing::{debug, info, instrument, warn};

use crate::query::build_queries;
use crate::tracker::ProgressTracker;

/// Status reason recorded for rows with neither name nor email.
pub const UNSEARCHABLE_REASON: &str = "no name/email";

/// Result of looking up one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// A profile URL was extracted.
    Found {
        profile_url: String,
        details: Option<ProfileDetails>,
        /// Deep enrichment was requested but produced nothing.
        enrich_failed: bool,
    },
    /// Every query ran (or failed) without a match.
    NotFound,
    /// The provider rate-limited a query. The row stays unresolved.
    Blocked,
    /// The row has neither name nor email; no request was made.
    Unsearchable,
}

impl RowOutcome {
    /// Write the outcome into the row. `Blocked` leaves it untouched.
    pub fn apply(self, row: &mut LeadRow) {
        match self {
            Self::Found {
                profile_url,
                details,
                ..
            } => {
                row.mark_found(profile_url);
                if let Some(details) = details {
                    row.set_details(details);
                }
            }
            Self::NotFound => row.mark_not_found(None),
            Self::Unsearchable => row.mark_not_found(Some(UNSEARCHABLE_REASON)),
            Self::Blocked => {}
        }
    }
}

/// Runs lookups for eligible rows in paced batches.
pub struct BatchScheduler<'a> {
    search: &'a SearchClient,
    scraper: Option<&'a ProfileScraper>,
    settings: &'a EnrichSettings,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(search: &'a SearchClient, settings: &'a EnrichSettings) -> Self {
        Self {
            search,
            scraper: None,
            settings,
        }
    }

    /// Scrape profile details for every found row.
    pub fn with_scraper(mut self, scraper: &'a ProfileScraper) -> Self {
        self.scraper = Some(scraper);
        self
    }

    /// Process `eligible` rows of `dataset`, checkpointing through `tracker`.
    ///
    /// Returns early (without error) after a batch containing a rate-limited
    /// row when `halt_on_rate_limit` is set. Storage errors abort the run.
    #[instrument(skip_all, fields(rows = eligible.len(), batch_size = self.settings.batch_size))]
    pub async fn run(
        &self,
        dataset: &mut Dataset,
        eligible: &[usize],
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = eligible.len().div_ceil(batch_size);

        for (batch_no, batch) in eligible.chunks(batch_size).enumerate() {
            info!(batch = batch_no + 1, of = batch_count, rows = batch.len(), "processing batch");

            let outcomes = {
                let lookups = batch.iter().map(|&idx| {
                    let row = &dataset.rows[idx];
                    self.lookup(&row.name, &row.email)
                });
                join_all(lookups).await
            };

            let mut blocked = false;
            for (&idx, outcome) in batch.iter().zip(outcomes) {
                blocked |= outcome == RowOutcome::Blocked;
                tracker.record(&outcome);
                outcome.apply(&mut dataset.rows[idx]);
            }
            tracker.batch_merged(dataset, self.search.stats().total_requests)?;

            if blocked && self.settings.halt_on_rate_limit {
                warn!(
                    batch = batch_no + 1,
                    remaining = batch_count - batch_no - 1,
                    "rate limited, halting run"
                );
                break;
            }

            if batch_no + 1 < batch_count && !self.settings.delay.is_zero() {
                debug!(delay_ms = self.settings.delay.as_millis(), "pausing between batches");
                tokio::time::sleep(self.settings.delay).await;
            }
        }

        Ok(())
    }

    /// Look up one lead: try each query in order, stop at the first match.
    ///
    /// A failed query falls through to the next one; a rate-limited query
    /// ends the lookup immediately.
    pub async fn lookup(&self, name: &str, email: &str) -> RowOutcome {
        if name.trim().is_empty() && email.trim().is_empty() {
            debug!("row has no name or email, skipping search");
            return RowOutcome::Unsearchable;
        }

        let queries = build_queries(name, email, self.settings.query_template.as_deref());

        for (i, query) in queries.iter().enumerate() {
            if i > 0 && !self.settings.query_pause.is_zero() {
                tokio::time::sleep(self.settings.query_pause).await;
            }

            match self.search.search(query).await {
                SearchOutcome::Blocked => return RowOutcome::Blocked,
                SearchOutcome::Failed => continue,
                SearchOutcome::Results(results) => {
                    if let Some(profile_url) = extract_profile_url(&results) {
                        debug!(query_index = i, %profile_url, "profile found");
                        return self.deep_enrich(profile_url).await;
                    }
                }
            }
        }

        RowOutcome::NotFound
    }

    async fn deep_enrich(&self, profile_url: String) -> RowOutcome {
        let Some(scraper) = self.scraper else {
            return RowOutcome::Found {
                profile_url,
                details: None,
                enrich_failed: false,
            };
        };

        let (details, enrich_failed) = match scraper.scrape_profile(&profile_url).await {
            Ok(Some(details)) => (Some(details), false),
            Ok(None) => {
                warn!(%profile_url, "scraper returned no profile");
                (None, true)
            }
            Err(e) => {
                warn!(%profile_url, error = %e, "profile scrape failed");
                (None, true)
            }
        };

        RowOutcome::Found {
            profile_url,
            details,
            enrich_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::resume::plan;
    use leadscout_dataset::DatasetStore;
    use leadscout_search::SearchOptions;
    use leadscout_shared::{ApiKey, LeadStatus, ScraperConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullStore;

    impl DatasetStore for NullStore {
        fn save(&self, _dataset: &Dataset) -> Result<()> {
            Ok(())
        }
    }

    fn fast_settings() -> EnrichSettings {
        EnrichSettings {
            batch_size: 2,
            delay: Duration::ZERO,
            max_retries: 0,
            request_timeout: Duration::from_secs(5),
            retry_backoff: Duration::ZERO,
            query_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    fn client(server: &MockServer, settings: &EnrichSettings) -> SearchClient {
        let options = SearchOptions {
            endpoint: server.uri(),
            host: "search.test".into(),
            result_limit: 10,
            max_concurrent: settings.batch_size,
            max_retries: settings.max_retries,
            timeout: settings.request_timeout,
            retry_backoff: settings.retry_backoff,
        };
        SearchClient::new(ApiKey::new("test-key"), options).unwrap()
    }

    fn hit(handle: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "url": "https://example.com/about", "title": "About" },
                { "url": format!("https://www.instagram.com/{handle}/"), "title": handle }
            ]
        }))
    }

    fn miss() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] }))
    }

    async fn mount_fallback_miss(server: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(miss())
            .with_priority(10)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn email_query_wins_first() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"jane@x.com\" instagram"))
            .respond_with(hit("janedoe"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(query_param("query", "\"Jane Doe\" instagram"))
            .respond_with(hit("wrong"))
            .expect(0)
            .mount(&server)
            .await;

        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let outcome = scheduler.lookup("Jane Doe", "jane@x.com").await;
        assert_eq!(
            outcome,
            RowOutcome::Found {
                profile_url: "https://www.instagram.com/janedoe/".into(),
                details: None,
                enrich_failed: false,
            }
        );
    }

    #[tokio::test]
    async fn falls_back_to_name_query() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"Jane Doe\" instagram"))
            .respond_with(hit("janedoe"))
            .mount(&server)
            .await;
        mount_fallback_miss(&server).await;

        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let outcome = scheduler.lookup("Jane Doe", "jane@x.com").await;
        assert!(matches!(outcome, RowOutcome::Found { .. }));
        assert_eq!(search.stats().total_requests, 2);
    }

    #[tokio::test]
    async fn failed_query_falls_through() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"jane@x.com\" instagram"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(query_param("query", "\"Jane Doe\" instagram"))
            .respond_with(hit("janedoe"))
            .expect(1)
            .mount(&server)
            .await;

        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let outcome = scheduler.lookup("Jane Doe", "jane@x.com").await;
        assert!(matches!(outcome, RowOutcome::Found { .. }));
    }

    #[tokio::test]
    async fn rate_limit_stops_the_lookup() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"jane@x.com\" instagram"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(query_param("query", "\"Jane Doe\" instagram"))
            .respond_with(hit("janedoe"))
            .expect(0)
            .mount(&server)
            .await;

        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        assert_eq!(
            scheduler.lookup("Jane Doe", "jane@x.com").await,
            RowOutcome::Blocked
        );
        assert_eq!(search.stats().total_requests, 1);
    }

    #[tokio::test]
    async fn malformed_row_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(miss())
            .expect(0)
            .mount(&server)
            .await;

        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        assert_eq!(scheduler.lookup("  ", "").await, RowOutcome::Unsearchable);
        assert_eq!(search.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn template_issues_single_query() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"jane@x.com\" site:instagram.com"))
            .respond_with(miss())
            .expect(1)
            .mount(&server)
            .await;

        let settings = EnrichSettings {
            query_template: Some("\"{email}\" site:instagram.com".into()),
            ..fast_settings()
        };
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        assert_eq!(
            scheduler.lookup("Jane Doe", "jane@x.com").await,
            RowOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn run_merges_outcomes_in_row_order() {
        let server = MockServer::start().await;
        Mock::given(query_param("query", "\"a@x.com\" instagram"))
            .respond_with(hit("alpha"))
            .mount(&server)
            .await;
        Mock::given(query_param("query", "\"c@x.com\" instagram"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        mount_fallback_miss(&server).await;

        let mut dataset = Dataset::from_rows(vec![
            LeadRow::new("Alpha", "a@x.com"),
            LeadRow::new("Bravo", "b@x.com"),
            LeadRow::new("Charlie", "c@x.com"),
            LeadRow::new("", ""),
        ]);
        let settings = fast_settings();
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let plan = plan(&dataset, None, false);
        let mut tracker = ProgressTracker::new(&plan, 10, &NullStore, &SilentProgress);
        scheduler.run(&mut dataset, &plan.eligible, &mut tracker).await.unwrap();

        let rows = &dataset.rows;
        assert_eq!(rows[0].profile_url(), Some("https://www.instagram.com/alpha/"));
        assert_eq!(rows[0].status(), LeadStatus::Found);
        assert_eq!(rows[1].status(), LeadStatus::NotFound);
        assert_eq!(rows[2].status(), LeadStatus::Unset);
        assert_eq!(rows[3].status_cell(), "Not Found - no name/email");

        let stats = tracker.stats();
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.not_found, 2);
        assert_eq!(stats.blocked, 1);
        // alpha 1, bravo 2, charlie 1 (blocked), empty 0
        assert_eq!(stats.api_requests, 4);
    }

    #[tokio::test]
    async fn batches_are_paced_by_delay() {
        let server = MockServer::start().await;
        mount_fallback_miss(&server).await;

        let mut dataset = Dataset::from_rows(
            (0..3)
                .map(|i| LeadRow::new(format!("Lead {i}"), format!("l{i}@x.com")))
                .collect(),
        );
        let settings = EnrichSettings {
            batch_size: 1,
            delay: Duration::from_millis(100),
            query_template: Some("{email}".into()),
            ..fast_settings()
        };
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let plan = plan(&dataset, None, false);
        let mut tracker = ProgressTracker::new(&plan, 10, &NullStore, &SilentProgress);
        let start = std::time::Instant::now();
        scheduler.run(&mut dataset, &plan.eligible, &mut tracker).await.unwrap();
        let elapsed = start.elapsed();

        // Three batches, two gaps; nothing after the last batch.
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");
        assert_eq!(tracker.stats().processed, 3);
    }

    #[tokio::test]
    async fn queries_for_one_lead_are_spaced() {
        let server = MockServer::start().await;
        mount_fallback_miss(&server).await;

        let settings = EnrichSettings {
            query_pause: Duration::from_millis(100),
            ..fast_settings()
        };
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let start = std::time::Instant::now();
        let outcome = scheduler.lookup("Jane Doe", "jane@x.com").await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, RowOutcome::NotFound);
        assert_eq!(search.stats().total_requests, 2);
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn single_query_lead_has_no_pause() {
        let server = MockServer::start().await;
        mount_fallback_miss(&server).await;

        let settings = EnrichSettings {
            query_pause: Duration::from_millis(300),
            ..fast_settings()
        };
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let start = std::time::Instant::now();
        scheduler.lookup("", "jane@x.com").await;

        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn halts_after_rate_limited_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let mut dataset = Dataset::from_rows(
            (0..3)
                .map(|i| LeadRow::new(format!("Lead {i}"), format!("l{i}@x.com")))
                .collect(),
        );
        let settings = EnrichSettings {
            batch_size: 1,
            halt_on_rate_limit: true,
            ..fast_settings()
        };
        let search = client(&server, &settings);
        let scheduler = BatchScheduler::new(&search, &settings);

        let plan = plan(&dataset, None, false);
        let mut tracker = ProgressTracker::new(&plan, 10, &NullStore, &SilentProgress);
        scheduler.run(&mut dataset, &plan.eligible, &mut tracker).await.unwrap();

        assert_eq!(tracker.stats().processed, 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(dataset.rows.iter().all(|r| r.status() == LeadStatus::Unset));
    }

    #[tokio::test]
    async fn deep_enrichment_attaches_details() {
        let search_server = MockServer::start().await;
        mount_fallback_miss(&search_server).await;
        Mock::given(query_param("query", "\"jane@x.com\" instagram"))
            .respond_with(hit("janedoe"))
            .mount(&search_server)
            .await;

        let apify = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acts/apify~instagram-scraper/runs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "run1", "status": "RUNNING", "defaultDatasetId": "ds1" }
            })))
            .mount(&apify)
            .await;
        Mock::given(method("GET"))
            .and(path("/actor-runs/run1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "id": "run1", "status": "SUCCEEDED", "defaultDatasetId": "ds1" }
            })))
            .mount(&apify)
            .await;
        Mock::given(method("GET"))
            .and(path("/datasets/ds1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "username": "janedoe", "fullName": "Jane Doe", "followersCount": 1200 }
            ])))
            .mount(&apify)
            .await;

        let settings = fast_settings();
        let search = client(&search_server, &settings);
        let scraper_config = ScraperConfig {
            base_url: apify.uri(),
            ..Default::default()
        };
        let scraper =
            ProfileScraper::new(ApiKey::new("apify-token"), &scraper_config, Duration::from_secs(5))
                .unwrap();
        let scheduler = BatchScheduler::new(&search, &settings).with_scraper(&scraper);

        let RowOutcome::Found {
            details,
            enrich_failed,
            ..
        } = scheduler.lookup("Jane Doe", "jane@x.com").await
        else {
            panic!("expected a found outcome");
        };
        let details = details.expect("details scraped");
        assert!(!enrich_failed);
        assert_eq!(details.username, "janedoe");
        assert_eq!(details.followers, 1200);
    }

    #[tokio::test]
    async fn scraper_failure_keeps_row_found() {
        let search_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(hit("janedoe"))
            .mount(&search_server)
            .await;

        let apify = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&apify)
            .await;

        let settings = fast_settings();
        let search = client(&search_server, &settings);
        let scraper_config = ScraperConfig {
            base_url: apify.uri(),
            ..Default::default()
        };
        let scraper =
            ProfileScraper::new(ApiKey::new("apify-token"), &scraper_config, Duration::from_secs(5))
                .unwrap();
        let scheduler = BatchScheduler::new(&search, &settings).with_scraper(&scraper);

        let outcome = scheduler.lookup("Jane Doe", "jane@x.com").await;
        assert_eq!(
            outcome,
            RowOutcome::Found {
                profile_url: "https://www.instagram.com/janedoe/".into(),
                details: None,
                enrich_failed: true,
            }
        );
    }
}
