use std::path::{Path, PathBuf};
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What the organizer did with one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Copied or moved. `rule` is `None` when no rule matched and the file
    /// went to the destination root.
    Relocated {
        destination: PathBuf,
        rule: Option<String>,
    },
    /// Dry run only.
    Planned {
        destination: PathBuf,
        rule: Option<String>,
    },
    AlreadyInPlace,
    /// Skipped by the name-only duplicate check.
    Duplicate,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters for one organize run. Only ever added to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Files whose attributes were read.
    pub files: u64,
    pub bytes: u64,
    pub relocated: u64,
    pub planned: u64,
    pub already_in_place: u64,
    pub duplicates: u64,
    /// Relocated or planned into the destination root because no rule matched.
    pub unmatched: u64,
    pub failed: Vec<FailedFile>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunStats {
    pub fn add_file(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }

    pub fn record(&mut self, path: &Path, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Relocated { rule, .. } => {
                self.relocated += 1;
                if rule.is_none() {
                    self.unmatched += 1;
                }
            }
            FileOutcome::Planned { rule, .. } => {
                self.planned += 1;
                if rule.is_none() {
                    self.unmatched += 1;
                }
            }
            FileOutcome::AlreadyInPlace => self.already_in_place += 1,
            FileOutcome::Duplicate => self.duplicates += 1,
            FileOutcome::Failed { reason } => self.failed.push(FailedFile {
                path: path.to_path_buf(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
