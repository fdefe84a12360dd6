//! End-to-end `enrich` pipeline: load → plan → batch lookups → checkpoint → save.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use leadscout_dataset::{CsvStore, Dataset, DatasetStore};
use leadscout_profile::ProfileScraper;
use leadscout_search::{SearchClient, SearchOptions};
use leadscout_shared::{
    ApiKey, ColumnsConfig, EnrichSettings, LeadScoutError, Result, RunId, RunStatistics,
    ScraperConfig, SearchConfig,
};

use crate::resume;
use crate::scheduler::BatchScheduler;
use crate::tracker::ProgressTracker;

/// Configuration for the `enrich` pipeline.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Lead CSV to read.
    pub input: PathBuf,
    /// Where results and checkpoints are written. May equal `input`.
    pub output: PathBuf,
    /// Only consider the first N rows.
    pub max_rows: Option<usize>,
    /// Name and email column headers.
    pub columns: ColumnsConfig,
    pub settings: EnrichSettings,
    pub search: SearchConfig,
    pub search_key: ApiKey,
    pub scraper: ScraperConfig,
    /// Required when `settings.deep_enrich` is set.
    pub scraper_key: Option<ApiKey>,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called once the plan is known.
    fn run_started(&self, pending: usize, skipped: usize);
    /// Called after each batch has been merged.
    fn batch_done(&self, processed: usize, total: usize);
    /// Called after each dataset flush.
    fn checkpoint_saved(&self, processed: usize);
    /// Called when the run completes.
    fn done(&self, stats: &RunStatistics);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn run_started(&self, _pending: usize, _skipped: usize) {}
    fn batch_done(&self, _processed: usize, _total: usize) {}
    fn checkpoint_saved(&self, _processed: usize) {}
    fn done(&self, _stats: &RunStatistics) {}
}

/// Run the full `enrich` pipeline against files on disk.
///
/// 1. Validate settings and load the input dataset
/// 2. Plan: skip rows that already carry a result
/// 3. Look up pending rows in paced batches, checkpointing to `output`
/// 4. Flush the final state
///
/// If writing `output` fails, the in-memory dataset is saved to
/// [`rescue_path`] before the `Storage` error is returned.
///
/// Rows beyond `max_rows` are carried through to the output unchanged.
#[instrument(skip_all, fields(input = %config.input.display(), output = %config.output.display()))]
pub async fn enrich(
    config: &EnrichConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunStatistics> {
    config.settings.validate()?;

    let scraper = if config.settings.deep_enrich {
        let token = config.scraper_key.clone().ok_or_else(|| {
            LeadScoutError::config("deep enrichment requires a scraper token")
        })?;
        Some(ProfileScraper::new(
            token,
            &config.scraper,
            config.settings.request_timeout,
        )?)
    } else {
        None
    };

    let search = SearchClient::new(
        config.search_key.clone(),
        SearchOptions::new(&config.search, &config.settings),
    )?;

    let mut dataset = Dataset::load(&config.input, &config.columns)?;
    let store = CsvStore::new(&config.output);

    let result = run_enrichment(
        &mut dataset,
        &store,
        &search,
        scraper.as_ref(),
        &config.settings,
        config.max_rows,
        progress,
    )
    .await;

    if let Err(LeadScoutError::Storage(reason)) = &result {
        let rescue = rescue_path(&config.input);
        match dataset.save(&rescue) {
            Ok(()) => warn!(%reason, rescue = %rescue.display(), "output not writable, progress saved to rescue file"),
            Err(e) => error!(%reason, error = %e, "output not writable and rescue save failed"),
        }
    }

    result
}

/// `<input stem>.rescue.csv` next to the input file.
pub fn rescue_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "leads".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}.rescue.csv"))
}

/// Enrich an in-memory dataset, persisting through `store`.
///
/// On a storage error the run stops and the error is returned; rows merged
/// since the last successful flush are lost, and the next run redoes them.
#[instrument(skip_all, fields(run_id = tracing::field::Empty))]
pub async fn run_enrichment(
    dataset: &mut Dataset,
    store: &dyn DatasetStore,
    search: &SearchClient,
    scraper: Option<&ProfileScraper>,
    settings: &EnrichSettings,
    max_rows: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<RunStatistics> {
    let start = Instant::now();
    let run_id = RunId::new();
    tracing::Span::current().record("run_id", tracing::field::display(&run_id));

    if scraper.is_some() {
        dataset.include_details();
    }

    let plan = resume::plan(dataset, max_rows, settings.skip_not_found);
    info!(
        total = plan.working_set,
        pending = plan.eligible.len(),
        already_found = plan.already_found,
        already_not_found = plan.already_not_found,
        "starting enrichment run"
    );
    progress.run_started(plan.eligible.len(), plan.skipped());

    let mut scheduler = BatchScheduler::new(search, settings);
    if let Some(scraper) = scraper {
        scheduler = scheduler.with_scraper(scraper);
    }

    let mut tracker = ProgressTracker::new(&plan, settings.save_every, store, progress);
    scheduler.run(dataset, &plan.eligible, &mut tracker).await?;
    let stats = tracker.finish(dataset, search.stats().total_requests)?;

    if stats.blocked > 0 {
        warn!(
            blocked = stats.blocked,
            "some rows were rate limited and remain pending"
        );
    }

    progress.done(&stats);

    info!(
        processed = stats.processed,
        found = stats.found,
        not_found = stats.not_found,
        errors = stats.errors,
        api_requests = stats.api_requests,
        success_rate = stats.success_rate(),
        elapsed_ms = start.elapsed().as_millis(),
        "enrichment run complete"
    );

    Ok(stats)
}
