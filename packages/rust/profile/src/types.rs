use leadscout_shared::ProfileDetails;
use serde::{Deserialize, Serialize};

/// Input for the profile scraper actor in "details" mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileScraperInput {
    pub direct_urls: Vec<String>,
    pub results_type: String,
    pub results_limit: u32,
    pub search_type: String,
    pub search_limit: u32,
}

impl ProfileScraperInput {
    pub fn details(urls: &[String]) -> Self {
        let limit = urls.len().max(1) as u32;
        Self {
            direct_urls: urls.to_vec(),
            results_type: "details".into(),
            results_limit: limit,
            search_type: "user".into(),
            search_limit: limit,
        }
    }
}

/// Wrapper for scraper API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Metadata for an actor run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// A profile item from the scraper dataset. Every field is optional upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProfile {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub followers_count: Option<u64>,
    pub follows_count: Option<u64>,
    pub posts_count: Option<u64>,
    pub verified: Option<bool>,
    pub is_business_account: Option<bool>,
    pub business_category_name: Option<String>,
    pub external_url: Option<String>,
}

impl From<ScrapedProfile> for ProfileDetails {
    fn from(p: ScrapedProfile) -> Self {
        Self {
            username: p.username.unwrap_or_default(),
            full_name: p.full_name.unwrap_or_default(),
            biography: p.biography.unwrap_or_default(),
            followers: p.followers_count.unwrap_or_default(),
            following: p.follows_count.unwrap_or_default(),
            posts: p.posts_count.unwrap_or_default(),
            is_verified: p.verified.unwrap_or_default(),
            is_business: p.is_business_account.unwrap_or_default(),
            business_category: p.business_category_name.unwrap_or_default(),
            external_url: p.external_url.unwrap_or_default(),
        }
    }
}
