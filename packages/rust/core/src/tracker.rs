//! Run statistics, progress notification and checkpoint cadence.

use leadscout_dataset::{Dataset, DatasetStore};
use leadscout_shared::{Result, RunStatistics};
use tracing::{debug, info};

use crate::pipeline::ProgressReporter;
use crate::resume::ResumePlan;
use crate::scheduler::RowOutcome;

/// Counts outcomes and flushes the dataset every `save_every` processed rows.
///
/// Checkpoints happen only at batch boundaries: a flush fires when a batch
/// pushes `processed` across a multiple of `save_every`. [`finish`] flushes
/// once more unconditionally.
///
/// [`finish`]: ProgressTracker::finish
pub struct ProgressTracker<'a> {
    stats: RunStatistics,
    pending: usize,
    save_every: usize,
    last_checkpoint: usize,
    store: &'a dyn DatasetStore,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(
        plan: &ResumePlan,
        save_every: usize,
        store: &'a dyn DatasetStore,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        let stats = RunStatistics {
            total: plan.working_set,
            skipped: plan.skipped(),
            ..Default::default()
        };
        Self {
            stats,
            pending: plan.eligible.len(),
            save_every: save_every.max(1),
            last_checkpoint: 0,
            store,
            progress,
        }
    }

    /// Count one row's outcome.
    pub fn record(&mut self, outcome: &RowOutcome) {
        self.stats.processed += 1;
        match outcome {
            RowOutcome::Found {
                details,
                enrich_failed,
                ..
            } => {
                self.stats.found += 1;
                if details.is_some() {
                    self.stats.profiles_enriched += 1;
                }
                if *enrich_failed {
                    self.stats.enrich_failures += 1;
                }
            }
            RowOutcome::NotFound => self.stats.not_found += 1,
            RowOutcome::Blocked => {
                self.stats.blocked += 1;
                self.stats.errors += 1;
            }
            RowOutcome::Unsearchable => {
                self.stats.not_found += 1;
                self.stats.errors += 1;
            }
        }
    }

    /// Close a batch: notify progress, then checkpoint if a boundary was crossed.
    pub fn batch_merged(&mut self, dataset: &Dataset, api_requests: u64) -> Result<()> {
        self.stats.api_requests = api_requests;
        self.progress.batch_done(self.stats.processed, self.pending);

        if self.stats.processed / self.save_every > self.last_checkpoint / self.save_every {
            self.checkpoint(dataset)?;
        }
        Ok(())
    }

    /// Final flush; returns the run's statistics.
    pub fn finish(mut self, dataset: &Dataset, api_requests: u64) -> Result<RunStatistics> {
        self.stats.api_requests = api_requests;
        self.checkpoint(dataset)?;
        Ok(self.stats)
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    fn checkpoint(&mut self, dataset: &Dataset) -> Result<()> {
        self.store.save(dataset)?;
        self.stats.checkpoints += 1;
        self.last_checkpoint = self.stats.processed;
        self.progress.checkpoint_saved(self.stats.processed);
        if self.stats.processed < self.pending {
            info!(processed = self.stats.processed, "checkpoint saved");
        } else {
            debug!(processed = self.stats.processed, "dataset saved");
        }
        Ok(())
    }
}
