//! CSV-backed lead dataset.
//!
//! The input file is both the source of leads and the destination for
//! results. Loading projects the caller's name/email headers onto canonical
//! fields and restores any results a previous run wrote; saving writes every
//! input column unchanged, in order, followed by the result columns. Row
//! identity is position: nothing here reorders or drops rows.

mod row;

use std::io::Write;
use std::path::{Path, PathBuf};

use leadscout_shared::{ColumnsConfig, LeadScoutError, LeadStatus, ProfileDetails, Result};
use tracing::{debug, info, warn};

pub use row::LeadRow;

/// Result column holding the canonical profile URL.
pub const PROFILE_URL_COLUMN: &str = "Instagram URL";

/// Result column holding the row status.
pub const STATUS_COLUMN: &str = "Status";

/// Deep-enrichment columns, written after the status column.
pub const DETAIL_COLUMNS: [&str; 10] = [
    "Instagram Username",
    "Full Name",
    "Bio",
    "Followers",
    "Following",
    "Posts",
    "Verified",
    "Business Account",
    "Business Category",
    "External URL",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Ordered lead rows plus the input headers they were read with.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Input headers other than the result columns, in file order.
    headers: Vec<String>,
    pub rows: Vec<LeadRow>,
    /// Whether the deep-enrichment columns are written.
    with_details: bool,
}

/// Counts over a dataset's row statuses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub pending: usize,
    /// Found rows carrying deep profile details.
    pub enriched: usize,
    /// Found rows as a percentage of all rows.
    pub success_rate: f64,
}

impl Dataset {
    /// Build an in-memory dataset (no pass-through columns).
    pub fn from_rows(rows: Vec<LeadRow>) -> Self {
        Self {
            headers: Vec::new(),
            rows,
            with_details: false,
        }
    }

    /// Load a CSV file. A UTF-8 BOM is tolerated.
    pub fn load(path: &Path, columns: &ColumnsConfig) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| LeadScoutError::io(path, e))?;
        let dataset = Self::from_csv_bytes(&bytes, columns)?;
        info!(
            path = %path.display(),
            rows = dataset.rows.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse CSV content. The header row is required and must contain the
    /// configured name and email columns.
    pub fn from_csv_bytes(bytes: &[u8], columns: &ColumnsConfig) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let header_record = reader
            .headers()
            .map_err(|e| LeadScoutError::parse(format!("failed to read header row: {e}")))?
            .clone();
        let all_headers: Vec<String> = header_record.iter().map(|h| h.trim().to_string()).collect();

        if all_headers.iter().all(String::is_empty) {
            return Err(LeadScoutError::validation("input file has no header row"));
        }

        let name_idx = find_column(&all_headers, &columns.name)?;
        let email_idx = find_column(&all_headers, &columns.email)?;
        let url_idx = position(&all_headers, PROFILE_URL_COLUMN);
        let status_idx = position(&all_headers, STATUS_COLUMN);
        let detail_idx: Vec<Option<usize>> = DETAIL_COLUMNS
            .iter()
            .map(|c| position(&all_headers, c))
            .collect();
        let with_details = detail_idx.iter().any(Option::is_some);

        let result_columns: Vec<usize> = [url_idx, status_idx]
            .into_iter()
            .chain(detail_idx.iter().copied())
            .flatten()
            .collect();
        let passthrough: Vec<usize> = (0..all_headers.len())
            .filter(|i| !result_columns.contains(i))
            .collect();

        let mut rows = Vec::new();
        let mut repaired = 0usize;

        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                LeadScoutError::parse(format!("invalid CSV record {}: {e}", line + 2))
            })?;
            let cell = |idx: Option<usize>| cell_at(&record, idx);

            let cells = passthrough.iter().map(|&i| cell(Some(i)).to_string()).collect();
            let mut row = LeadRow::from_parts(
                cell(Some(name_idx)).trim().to_string(),
                cell(Some(email_idx)).trim().to_string(),
                cells,
            );

            let details = parse_details(&detail_idx.iter().map(|&i| cell(i)).collect::<Vec<_>>());
            if row.restore(cell(url_idx), cell(status_idx), details) {
                repaired += 1;
            }
            rows.push(row);
        }

        if repaired > 0 {
            warn!(repaired, "status column disagreed with profile URL; rows repaired");
        }

        Ok(Self {
            headers: passthrough.iter().map(|&i| all_headers[i].clone()).collect(),
            rows,
            with_details,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the deep-enrichment columns on save.
    pub fn include_details(&mut self) {
        self.with_details = true;
    }

    /// Header row as written by [`Dataset::write_csv`].
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        headers.push(PROFILE_URL_COLUMN.to_string());
        headers.push(STATUS_COLUMN.to_string());
        if self.with_details || self.rows.iter().any(|r| r.details().is_some()) {
            headers.extend(DETAIL_COLUMNS.iter().map(|c| c.to_string()));
        }
        headers
    }

    /// Serialize to CSV bytes, BOM first.
    pub fn write_csv(&self) -> Result<Vec<u8>> {
        let headers = self.output_headers();
        let details = headers.len() > self.headers.len() + 2;

        let mut buf = UTF8_BOM.to_vec();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            writer.write_record(&headers).map_err(storage)?;

            for row in &self.rows {
                let mut record: Vec<String> = row.cells.clone();
                record.resize(self.headers.len(), String::new());
                record.push(row.profile_url().unwrap_or_default().to_string());
                record.push(row.status_cell());
                if details {
                    record.extend(detail_cells(row));
                }
                writer.write_record(&record).map_err(storage)?;
            }

            writer.flush().map_err(|e| LeadScoutError::Storage(e.to_string()))?;
        }
        Ok(buf)
    }

    /// Persist atomically: write a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.write_csv()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LeadScoutError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let tmp = temp_path(path);
        let written = std::fs::File::create(&tmp)
            .and_then(|mut f| f.write_all(&bytes).and_then(|_| f.sync_all()))
            .and_then(|_| std::fs::rename(&tmp, path));

        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(LeadScoutError::Storage(format!(
                "failed to write {}: {e}",
                path.display()
            )));
        }

        debug!(path = %path.display(), rows = self.rows.len(), "dataset saved");
        Ok(())
    }

    /// Status counts, used to inspect a previous session before resuming it.
    pub fn summary(&self) -> DatasetSummary {
        let mut summary = DatasetSummary {
            total: self.rows.len(),
            ..Default::default()
        };
        for row in &self.rows {
            match row.status() {
                LeadStatus::Found => {
                    summary.found += 1;
                    if row.details().is_some() {
                        summary.enriched += 1;
                    }
                }
                LeadStatus::NotFound => summary.not_found += 1,
                LeadStatus::Unset => summary.pending += 1,
            }
        }
        if summary.total > 0 {
            summary.success_rate = summary.found as f64 / summary.total as f64 * 100.0;
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Destination for checkpoint and final flushes.
pub trait DatasetStore: Send + Sync {
    fn save(&self, dataset: &Dataset) -> Result<()>;
}

/// Saves to a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetStore for CsvStore {
    fn save(&self, dataset: &Dataset) -> Result<()> {
        dataset.save(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage(e: csv::Error) -> LeadScoutError {
    LeadScoutError::Storage(e.to_string())
}

fn position(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(name.trim())))
}

fn cell_at(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn find_column(headers: &[String], name: &str) -> Result<usize> {
    position(headers, name).ok_or_else(|| {
        LeadScoutError::validation(format!(
            "column '{name}' not found (available: {})",
            headers.join(", ")
        ))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Details exist when any column beyond the username is filled in.
fn parse_details(cells: &[&str]) -> Option<ProfileDetails> {
    let get = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or("");
    if (1..DETAIL_COLUMNS.len()).all(|i| get(i).is_empty()) {
        return None;
    }
    let count = |i: usize| get(i).parse::<u64>().unwrap_or(0);
    let yes = |i: usize| get(i).eq_ignore_ascii_case("yes");

    Some(ProfileDetails {
        username: get(0).to_string(),
        full_name: get(1).to_string(),
        biography: get(2).to_string(),
        followers: count(3),
        following: count(4),
        posts: count(5),
        is_verified: yes(6),
        is_business: yes(7),
        business_category: get(8).to_string(),
        external_url: get(9).to_string(),
    })
}

fn detail_cells(row: &LeadRow) -> Vec<String> {
    let username = row.username().unwrap_or_default();
    let yes_no = |b: bool| if b { "Yes" } else { "No" }.to_string();

    match row.details() {
        Some(d) => vec![
            username,
            d.full_name.clone(),
            d.biography.clone(),
            d.followers.to_string(),
            d.following.to_string(),
            d.posts.to_string(),
            yes_no(d.is_verified),
            yes_no(d.is_business),
            d.business_category.clone(),
            d.external_url.clone(),
        ],
        None => {
            let mut cells = vec![String::new(); DETAIL_COLUMNS.len()];
            cells[0] = username;
            cells
        }
    }
}
