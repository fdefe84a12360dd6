//! Enrichment orchestration for LeadScout.
//!
//! Ties the dataset, search client and optional profile scraper together:
//! plan which rows still need a lookup, run them in rate-limited batches,
//! and checkpoint the dataset as results arrive (`enrich`).

pub mod estimate;
pub mod pipeline;
pub mod query;
pub mod resume;
pub mod scheduler;
pub mod tracker;

pub use estimate::{RunEstimate, estimate};
pub use pipeline::{EnrichConfig, ProgressReporter, SilentProgress, enrich, run_enrichment};
pub use query::build_queries;
pub use resume::{ResumePlan, plan};
pub use scheduler::{BatchScheduler, RowOutcome};
pub use tracker::ProgressTracker;
