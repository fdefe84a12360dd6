//! Profile scraper provider client used for deep enrichment.
//!
//! Runs a scraping actor for one or more profile URLs: start the run,
//! long-poll until it finishes, then read the run's dataset.

pub mod types;

use std::time::Duration;

use leadscout_shared::{ApiKey, LeadScoutError, ProfileDetails, Result, ScraperConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

pub use types::{ApiResponse, ProfileScraperInput, RunData, ScrapedProfile};

/// Seconds the API may hold a poll request open.
const WAIT_FOR_FINISH_SECS: u64 = 60;

/// Poll requests before giving up on a run.
const MAX_POLLS: usize = 10;

/// User-Agent string for scraper requests.
const USER_AGENT: &str = concat!("LeadScout/", env!("CARGO_PKG_VERSION"));

pub struct ProfileScraper {
    client: Client,
    token: ApiKey,
    base_url: String,
    actor: String,
}

impl ProfileScraper {
    pub fn new(token: ApiKey, config: &ScraperConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LeadScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            actor: config.actor.clone(),
        })
    }

    /// Scrape a single profile. `Ok(None)` means the actor returned no item.
    #[instrument(skip_all, fields(url = %profile_url))]
    pub async fn scrape_profile(&self, profile_url: &str) -> Result<Option<ProfileDetails>> {
        let mut profiles = self.scrape_profiles(&[profile_url.to_string()]).await?;
        Ok(if profiles.is_empty() {
            None
        } else {
            Some(profiles.swap_remove(0))
        })
    }

    /// Scrape several profiles in one actor run.
    pub async fn scrape_profiles(&self, profile_urls: &[String]) -> Result<Vec<ProfileDetails>> {
        if profile_urls.is_empty() {
            return Ok(Vec::new());
        }

        let run = self
            .start_run(&ProfileScraperInput::details(profile_urls))
            .await?;
        debug!(run_id = %run.id, "scraper run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        let items: Vec<ScrapedProfile> =
            self.get_dataset_items(&completed.default_dataset_id).await?;

        info!(
            run_id = %completed.id,
            requested = profile_urls.len(),
            returned = items.len(),
            "profile scrape completed"
        );

        Ok(items.into_iter().map(ProfileDetails::from).collect())
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run(&self, input: &ProfileScraperInput) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, self.actor);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.token.expose())
            .json(input)
            .send()
            .await
            .map_err(network)?;

        let api_resp: ApiResponse<RunData> = read_json(resp).await?;
        Ok(api_resp.data)
    }

    /// Long-poll until a run reaches a terminal status.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={WAIT_FOR_FINISH_SECS}",
            self.base_url, run_id
        );

        for _ in 0..MAX_POLLS {
            let resp = self
                .client
                .get(&url)
                .bearer_auth(self.token.expose())
                .timeout(Duration::from_secs(WAIT_FOR_FINISH_SECS + 30))
                .send()
                .await
                .map_err(network)?;

            let api_resp: ApiResponse<RunData> = read_json(resp).await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(LeadScoutError::Scraper(format!(
                        "run {run_id} ended with status {}",
                        api_resp.data.status
                    )));
                }
                status => debug!(run_id, status, "run still in progress"),
            }
        }

        Err(LeadScoutError::Scraper(format!(
            "run {run_id} did not finish after {MAX_POLLS} polls"
        )))
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(network)?;

        read_json(resp).await
    }
}

fn network(e: reqwest::Error) -> LeadScoutError {
    LeadScoutError::Network(e.to_string())
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(LeadScoutError::Scraper(format!("HTTP {status}: {body}")));
    }

    resp.json()
        .await
        .map_err(|e| LeadScoutError::parse(format!("scraper response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scraper(server: &MockServer) -> ProfileScraper {
        let config = ScraperConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        ProfileScraper::new(ApiKey::new("tok"), &config, Duration::from_secs(5)).unwrap()
    }

    fn run_json(status: &str) -> serde_json::Value {
        serde_json::json!({
            "data": { "id": "run-1", "status": status, "defaultDatasetId": "ds-1" }
        })
    }

    async fn mount_run(server: &MockServer, final_status: &str) {
        Mock::given(method("POST"))
            .and(path("/acts/apify~instagram-scraper/runs"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(serde_json::json!({
                "directUrls": ["https://www.instagram.com/janedoe/"],
                "resultsType": "details"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(run_json("READY")))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/actor-runs/run-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(run_json(final_status)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn scrape_profile_end_to_end() {
        let server = MockServer::start().await;
        mount_run(&server, "SUCCEEDED").await;

        Mock::given(method("GET"))
            .and(path("/datasets/ds-1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "username": "janedoe",
                "fullName": "Jane Doe",
                "biography": "coffee + code",
                "followersCount": 1520,
                "followsCount": 310,
                "postsCount": 42,
                "verified": true,
                "isBusinessAccount": false,
                "externalUrl": "https://jane.example"
            }])))
            .mount(&server)
            .await;

        let profile = scraper(&server)
            .scrape_profile("https://www.instagram.com/janedoe/")
            .await
            .unwrap()
            .expect("profile returned");

        assert_eq!(profile.username, "janedoe");
        assert_eq!(profile.followers, 1520);
        assert_eq!(profile.following, 310);
        assert!(profile.is_verified);
        assert!(!profile.is_business);
        assert_eq!(profile.business_category, "");
    }

    #[tokio::test]
    async fn empty_dataset_is_none() {
        let server = MockServer::start().await;
        mount_run(&server, "SUCCEEDED").await;

        Mock::given(method("GET"))
            .and(path("/datasets/ds-1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let profile = scraper(&server)
            .scrape_profile("https://www.instagram.com/janedoe/")
            .await
            .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn failed_run_is_an_error() {
        let server = MockServer::start().await;
        mount_run(&server, "FAILED").await;

        let err = scraper(&server)
            .scrape_profile("https://www.instagram.com/janedoe/")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FAILED"));
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let err = scraper(&server)
            .scrape_profile("https://www.instagram.com/janedoe/")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("bad token"));
    }

    #[tokio::test]
    async fn no_urls_makes_no_calls() {
        let server = MockServer::start().await;
        let profiles = scraper(&server).scrape_profiles(&[]).await.unwrap();
        assert!(profiles.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
