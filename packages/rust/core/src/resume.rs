//! Resume planning: decide which rows of a (possibly partially filled)
//! dataset still need a lookup.

use leadscout_dataset::Dataset;
use leadscout_shared::LeadStatus;

/// Rows to process in this run, in dataset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePlan {
    /// Rows considered (the `max_rows` prefix, or the whole dataset).
    pub working_set: usize,
    /// Rows already carrying a profile URL.
    pub already_found: usize,
    /// Rows already marked `Not Found` and skipped on request.
    pub already_not_found: usize,
    /// Dataset indices to look up.
    pub eligible: Vec<usize>,
}

impl ResumePlan {
    /// Rows excluded from this run.
    pub fn skipped(&self) -> usize {
        self.already_found + self.already_not_found
    }
}

/// Plan a run over the first `max_rows` rows (strictly a prefix).
///
/// A row is done iff it has a non-empty profile URL; every other row is
/// eligible. With `skip_not_found`, rows already marked `Not Found` are
/// treated as done too.
pub fn plan(dataset: &Dataset, max_rows: Option<usize>, skip_not_found: bool) -> ResumePlan {
    let working_set = max_rows.map_or(dataset.len(), |n| n.min(dataset.len()));
    let mut plan = ResumePlan {
        working_set,
        ..Default::default()
    };

    for (idx, row) in dataset.rows.iter().take(working_set).enumerate() {
        if row.has_profile_url() {
            plan.already_found += 1;
        } else if skip_not_found && row.status() == LeadStatus::NotFound {
            plan.already_not_found += 1;
        } else {
            plan.eligible.push(idx);
        }
    }

    plan
}
