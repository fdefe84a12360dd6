//! Application configuration for LeadScout.
//!
//! User config lives at `~/.leadscout/leadscout.toml`.
//! CLI flags override presets, which override config file values, which
//! override defaults. API keys are never stored in the file: the config only
//! names the environment variable that holds each key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LeadScoutError, Result};
use crate::types::ApiKey;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadscout";

// ---------------------------------------------------------------------------
// Config structs (matching leadscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Input column mapping.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Profile scraper provider settings.
    #[serde(default)]
    pub scraper: ScraperConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Rows per batch; also the ceiling on in-flight search calls.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds to wait between batches.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Flush the dataset every N processed rows.
    #[serde(default = "default_save_every")]
    pub save_every: usize,

    /// Extra attempts per search call on transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout for a single provider call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fixed pause between retry attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between two queries for the same lead.
    #[serde(default = "default_query_pause_ms")]
    pub query_pause_ms: u64,

    /// Stop scheduling batches once a row is rate limited.
    #[serde(default)]
    pub halt_on_rate_limit: bool,

    /// Custom query template with `{name}` / `{email}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_template: Option<String>,

    /// Directory for generated output files.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_secs: default_delay_secs(),
            save_every: default_save_every(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            query_pause_ms: default_query_pause_ms(),
            halt_on_rate_limit: false,
            query_template: None,
            results_dir: default_results_dir(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}
fn default_delay_secs() -> f64 {
    1.0
}
fn default_save_every() -> usize {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_query_pause_ms() -> u64 {
    200
}
fn default_results_dir() -> String {
    "results".into()
}

/// `[columns]` section: which input headers hold the lead's name and email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_name_column")]
    pub name: String,

    #[serde(default = "default_email_column")]
    pub email: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            name: default_name_column(),
            email: default_email_column(),
        }
    }
}

fn default_name_column() -> String {
    "Person - Name".into()
}
fn default_email_column() -> String {
    "Person - Email - Work".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Provider host, sent as the `x-rapidapi-host` header.
    #[serde(default = "default_search_host")]
    pub host: String,

    /// Endpoint URL. Defaults to `https://<host>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Results requested per query.
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
}

impl SearchConfig {
    /// Resolved endpoint URL.
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.host))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            host: default_search_host(),
            endpoint: None,
            result_limit: default_result_limit(),
        }
    }
}

fn default_search_key_env() -> String {
    "RAPIDAPI_KEY".into()
}
fn default_search_host() -> String {
    "google-search116.p.rapidapi.com".into()
}
fn default_result_limit() -> u32 {
    10
}

/// `[scraper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Name of the env var holding the scraper token.
    #[serde(default = "default_scraper_key_env")]
    pub api_key_env: String,

    /// Scraper REST API base URL.
    #[serde(default = "default_scraper_base_url")]
    pub base_url: String,

    /// Actor that scrapes profile details.
    #[serde(default = "default_scraper_actor")]
    pub actor: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_scraper_key_env(),
            base_url: default_scraper_base_url(),
            actor: default_scraper_actor(),
        }
    }
}

fn default_scraper_key_env() -> String {
    "APIFY_TOKEN".into()
}
fn default_scraper_base_url() -> String {
    "https://api.apify.com/v2".into()
}
fn default_scraper_actor() -> String {
    "apify~instagram-scraper".into()
}

// ---------------------------------------------------------------------------
// Enrich settings (runtime, merged from config + preset + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime enrichment settings.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    /// Rows per batch and maximum in-flight search calls.
    pub batch_size: usize,
    /// Pause between batches.
    pub delay: Duration,
    /// Checkpoint cadence in processed rows.
    pub save_every: usize,
    /// Retry bound per search call.
    pub max_retries: u32,
    /// Timeout for a single provider call.
    pub request_timeout: Duration,
    /// Pause between retry attempts.
    pub retry_backoff: Duration,
    /// Pause between two queries for the same lead.
    pub query_pause: Duration,
    /// Stop after the batch in which a row was rate limited.
    pub halt_on_rate_limit: bool,
    /// Leave rows already marked `Not Found` alone instead of searching again.
    pub skip_not_found: bool,
    /// Scrape profile details for found rows.
    pub deep_enrich: bool,
    /// Custom query template.
    pub query_template: Option<String>,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay: Duration::from_secs(1),
            save_every: default_save_every(),
            max_retries: default_max_retries(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            retry_backoff: Duration::from_millis(default_retry_backoff_ms()),
            query_pause: Duration::from_millis(default_query_pause_ms()),
            halt_on_rate_limit: false,
            skip_not_found: false,
            deep_enrich: false,
            query_template: None,
        }
    }
}

impl TryFrom<&AppConfig> for EnrichSettings {
    type Error = LeadScoutError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let defaults = &config.defaults;
        Ok(Self {
            batch_size: defaults.batch_size,
            delay: delay_from_secs(defaults.delay_secs)?,
            save_every: defaults.save_every,
            max_retries: defaults.max_retries,
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            retry_backoff: Duration::from_millis(defaults.retry_backoff_ms),
            query_pause: Duration::from_millis(defaults.query_pause_ms),
            halt_on_rate_limit: defaults.halt_on_rate_limit,
            skip_not_found: false,
            deep_enrich: false,
            query_template: defaults.query_template.clone(),
        })
    }
}

impl EnrichSettings {
    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LeadScoutError::config("batch_size must be at least 1"));
        }
        if self.save_every == 0 {
            return Err(LeadScoutError::config("save_every must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(LeadScoutError::config("request timeout must be non-zero"));
        }
        if let Some(template) = &self.query_template {
            if template.trim().is_empty() {
                return Err(LeadScoutError::config("query template is empty"));
            }
        }
        Ok(())
    }

    /// Overlay a preset's batch size and delay.
    pub fn apply_preset(&mut self, preset: Preset) {
        let (batch_size, delay) = preset.values();
        self.batch_size = batch_size;
        self.delay = delay;
    }
}

/// Convert a seconds value from config or CLI into a delay.
pub fn delay_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| LeadScoutError::config(format!("invalid delay {secs}s: must be finite and >= 0")))
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Named throughput presets tuned for a 1 request/second provider quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// One lead at a time, 1.0s between batches.
    Safe,
    /// Five leads per batch, 1.2s between batches.
    Balanced,
}

impl Preset {
    /// `(batch_size, delay)` for this preset.
    pub fn values(&self) -> (usize, Duration) {
        match self {
            Self::Safe => (1, Duration::from_millis(1000)),
            Self::Balanced => (5, Duration::from_millis(1200)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadscout/leadscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LeadScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named environment variable.
pub fn resolve_api_key(var_name: &str) -> Result<ApiKey> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(ApiKey::new(val.trim())),
        _ => Err(LeadScoutError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
