//! Pre-run cost estimate.

use std::time::Duration;

use leadscout_shared::EnrichSettings;

use crate::query::queries_per_lead;

/// Worst-case request count and pacing time for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunEstimate {
    pub leads: usize,
    /// Upper bound; a lead stops at its first match.
    pub requests: usize,
    /// `requests` paced at the configured inter-batch delay.
    pub duration: Duration,
}

pub fn estimate(pending: usize, settings: &EnrichSettings) -> RunEstimate {
    let requests = pending * queries_per_lead(settings.query_template.as_deref());
    let duration = settings
        .delay
        .checked_mul(u32::try_from(requests).unwrap_or(u32::MAX))
        .unwrap_or(Duration::MAX);

    RunEstimate {
        leads: pending,
        requests,
        duration,
    }
}
