//! Shared types, error model, and configuration for LeadScout.
//!
//! This crate is the foundation depended on by all other LeadScout crates.
//! It provides:
//! - [`LeadScoutError`], the unified error type
//! - Domain types ([`LeadStatus`], [`ProfileDetails`], [`RunStatistics`], [`ApiKey`])
//! - Configuration ([`AppConfig`], [`EnrichSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnsConfig, DefaultsConfig, EnrichSettings, Preset, ScraperConfig, SearchConfig,
    config_dir, config_file_path, delay_from_secs, init_config, load_config, load_config_from,
    resolve_api_key,
};
pub use error::{LeadScoutError, Result};
pub use types::{
    ApiKey, LeadStatus, ProfileDetails, RunId, RunStatistics, STATUS_FOUND, STATUS_NOT_FOUND,
};
