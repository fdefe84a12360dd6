//! A single lead record and its mutable enrichment state.

use leadscout_shared::{LeadStatus, ProfileDetails};

/// One lead. `name`/`email` are fixed at load; the rest is enrichment state.
///
/// Invariant: a non-empty `profile_url` implies `status == Found`, and
/// `status == NotFound` implies no `profile_url`. The `mark_*` methods keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadRow {
    pub name: String,
    pub email: String,
    profile_url: Option<String>,
    status: LeadStatus,
    status_reason: Option<String>,
    details: Option<ProfileDetails>,
    /// Pass-through cells aligned with the dataset's input headers.
    pub(crate) cells: Vec<String>,
}

impl LeadRow {
    /// A fresh, unprocessed lead with no pass-through columns.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::from_parts(name.into(), email.into(), Vec::new())
    }

    pub(crate) fn from_parts(name: String, email: String, cells: Vec<String>) -> Self {
        Self {
            name,
            email,
            profile_url: None,
            status: LeadStatus::Unset,
            status_reason: None,
            details: None,
            cells,
        }
    }

    pub fn profile_url(&self) -> Option<&str> {
        self.profile_url.as_deref()
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn details(&self) -> Option<&ProfileDetails> {
        self.details.as_ref()
    }

    /// True when the row already carries a lookup result.
    pub fn has_profile_url(&self) -> bool {
        self.profile_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// True when neither name nor email can be searched for.
    pub fn is_unsearchable(&self) -> bool {
        self.name.trim().is_empty() && self.email.trim().is_empty()
    }

    pub fn mark_found(&mut self, profile_url: impl Into<String>) {
        self.profile_url = Some(profile_url.into());
        self.status = LeadStatus::Found;
        self.status_reason = None;
    }

    /// Clears any URL and details; `reason` is appended to the status label.
    pub fn mark_not_found(&mut self, reason: Option<&str>) {
        self.profile_url = None;
        self.details = None;
        self.status = LeadStatus::NotFound;
        self.status_reason = reason.map(str::to_string);
    }

    /// Attach scraped details. Ignored unless the row is `Found`.
    pub fn set_details(&mut self, details: ProfileDetails) {
        if self.status == LeadStatus::Found {
            self.details = Some(details);
        }
    }

    /// Status column value, e.g. `Found` or `Not Found - no name/email`.
    pub fn status_cell(&self) -> String {
        match (&self.status, &self.status_reason) {
            (LeadStatus::NotFound, Some(reason)) => {
                format!("{} - {reason}", LeadStatus::NotFound.label())
            }
            (status, _) => status.label().to_string(),
        }
    }

    /// Handle shown in the username column: scraped, else the URL's last segment.
    pub fn username(&self) -> Option<String> {
        if let Some(details) = &self.details {
            if !details.username.is_empty() {
                return Some(details.username.clone());
            }
        }
        self.profile_url
            .as_deref()
            .and_then(|u| u.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .map(str::to_string)
    }

    /// Restore state read from a previous run's output, repairing the invariant.
    /// Returns true when the stored status disagreed with the URL.
    pub(crate) fn restore(
        &mut self,
        profile_url: &str,
        status_cell: &str,
        details: Option<ProfileDetails>,
    ) -> bool {
        let status = LeadStatus::from_cell(status_cell);
        let profile_url = profile_url.trim();

        if !profile_url.is_empty() {
            self.mark_found(profile_url);
            if let Some(details) = details {
                self.set_details(details);
            }
            return status != LeadStatus::Found;
        }

        match status {
            LeadStatus::NotFound => {
                let reason = status_cell
                    .trim()
                    .strip_prefix(LeadStatus::NotFound.label())
                    .map(|rest| rest.trim_start_matches([' ', '-']).trim())
                    .filter(|rest| !rest.is_empty());
                self.mark_not_found(reason);
                false
            }
            // Found without a URL cannot be trusted; leave it pending.
            LeadStatus::Found => true,
            LeadStatus::Unset => false,
        }
    }
}
