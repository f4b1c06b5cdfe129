//! Walks the source roots and drives every file through attribute
//! extraction, the duplicate check, rule matching and relocation.
//!
//! Failures of a single file are recorded in [`RunStats`] and never stop
//! the walk. Only the setup checks in [`Organizer::prepare`] are fatal.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::attributes::FileAttributes;
use crate::error::{FileFusionError, Result};
use crate::matcher::RuleMatcher;
use crate::relocator::{Relocation, Relocator};
use crate::rules::RuleTable;
use crate::stats::{FailedFile, FileOutcome, RunStats};

/// Callback invoked after each file is handled.
pub type FileCallback<'a> = Option<&'a (dyn Fn(&Path, &FileOutcome) + Sync)>;

/// Cooperative cancellation flag, checked before each file.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Organizer {
    sources: Vec<PathBuf>,
    destination: PathBuf,
    table: RuleTable,
    relocator: Relocator,
    exclude: Vec<Pattern>,
    jobs: usize,
    cancel: CancelToken,
}

/// Per-root state shared by the workers.
struct RootContext<'a> {
    root: &'a Path,
    destination: &'a Path,
    root_names: Option<HashSet<OsString>>,
}

impl Organizer {
    pub fn new(
        sources: Vec<PathBuf>,
        destination: PathBuf,
        table: RuleTable,
        relocator: Relocator,
    ) -> Self {
        Self {
            sources,
            destination,
            table,
            relocator,
            exclude: Vec::new(),
            jobs: 1,
            cancel: CancelToken::new(),
        }
    }

    /// Skip files and directories whose name matches any of `patterns`.
    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Number of worker threads; `0` means one per CPU.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Validate the roots and create the destination. Returns the
    /// canonical source roots and destination.
    pub fn prepare(&self) -> Result<(Vec<PathBuf>, PathBuf)> {
        let mut roots = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if !source.exists() {
                return Err(FileFusionError::SourceNotFound {
                    path: source.clone(),
                });
            }
            if !source.is_dir() {
                return Err(FileFusionError::SourceNotDirectory {
                    path: source.clone(),
                });
            }
            roots.push(fs::canonicalize(source)?);
        }
        let roots = drop_nested_roots(roots);

        let unavailable = |e: std::io::Error| FileFusionError::DestinationUnavailable {
            path: self.destination.clone(),
            message: e.to_string(),
        };
        fs::create_dir_all(&self.destination).map_err(unavailable)?;
        let destination = fs::canonicalize(&self.destination).map_err(unavailable)?;

        if let Some(root) = roots.iter().find(|root| **root == destination) {
            return Err(FileFusionError::SourceIsDestination { path: root.clone() });
        }

        Ok((roots, destination))
    }

    /// Organize every file under every source root.
    pub fn run(&self, on_file: FileCallback<'_>) -> Result<RunStats> {
        let started = Instant::now();
        let (roots, destination) = self.prepare()?;
        let stats = Mutex::new(RunStats::default());
        let duplicate_check = self.table.duplicate_check();

        info!(
            sources = roots.len(),
            destination = %destination.display(),
            rules = self.table.len(),
            duplicate_check,
            mode = %self.relocator.mode(),
            dry_run = self.relocator.is_dry_run(),
            "starting walk"
        );

        for root in &roots {
            if self.cancel.is_cancelled() {
                break;
            }

            let context = RootContext {
                root,
                destination: &destination,
                root_names: duplicate_check.then(|| root_file_names(root)),
            };
            let files = self.collect_files(root, &destination, &stats);
            debug!(root = %root.display(), files = files.len(), "collected files");
            self.process_all(&context, &files, &stats, on_file);
        }

        let mut stats = stats.into_inner().unwrap_or_else(|e| e.into_inner());
        stats.cancelled = self.cancel.is_cancelled();
        stats.elapsed = started.elapsed();

        info!(
            files = stats.files,
            megabytes = stats.megabytes(),
            relocated = stats.relocated,
            failed = stats.failed_count(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            cancelled = stats.cancelled,
            "walk finished"
        );
        Ok(stats)
    }

    /// Every regular file under `root`, gathered before anything is moved so
    /// relocated files are never visited twice.
    fn collect_files(&self, root: &Path, destination: &Path, stats: &Mutex<RunStats>) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry, destination));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    warn!(path = %path.display(), error = %e, "cannot read directory entry");
                    lock(stats).failed.push(FailedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        files
    }

    fn is_pruned(&self, entry: &DirEntry, destination: &Path) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if entry.file_type().is_dir() && entry.path() == destination {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        self.exclude.iter().any(|pattern| pattern.matches(&name))
    }

    fn process_all(
        &self,
        context: &RootContext<'_>,
        files: &[PathBuf],
        stats: &Mutex<RunStats>,
        on_file: FileCallback<'_>,
    ) {
        let workers = self.jobs.min(files.len()).max(1);
        let next = AtomicUsize::new(0);

        let work = || loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let index = next.fetch_add(1, Ordering::SeqCst);
            let Some(path) = files.get(index) else {
                break;
            };
            self.process_file(context, path, stats, on_file);
        };

        if workers == 1 {
            work();
        } else {
            std::thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(work);
                }
            });
        }
    }

    fn process_file(
        &self,
        context: &RootContext<'_>,
        path: &Path,
        stats: &Mutex<RunStats>,
        on_file: FileCallback<'_>,
    ) {
        let outcome = match FileAttributes::extract(path) {
            Ok(attrs) => {
                lock(stats).add_file(attrs.bytes);
                self.place(context, path, &attrs)
            }
            Err(e) => FileOutcome::Failed {
                reason: e.to_string(),
            },
        };

        match &outcome {
            FileOutcome::Failed { reason } => {
                warn!(path = %path.display(), reason = %reason, "file failed")
            }
            other => debug!(path = %path.display(), outcome = ?other, "file handled"),
        }

        lock(stats).record(path, &outcome);
        if let Some(callback) = on_file {
            callback(path, &outcome);
        }
    }

    fn place(&self, context: &RootContext<'_>, path: &Path, attrs: &FileAttributes) -> FileOutcome {
        if let Some(names) = &context.root_names {
            if is_duplicate(context.root, names, path) {
                return FileOutcome::Duplicate;
            }
        }

        let matched = match RuleMatcher::new(&self.table).resolve(attrs, context.destination) {
            Ok(matched) => matched,
            Err(e) => {
                return FileOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        match self.relocator.relocate(path, &matched.destination) {
            Ok(Relocation::Relocated { destination, .. }) => FileOutcome::Relocated {
                destination,
                rule: matched.rule,
            },
            Ok(Relocation::Planned { destination }) => FileOutcome::Planned {
                destination,
                rule: matched.rule,
            },
            Ok(Relocation::AlreadyInPlace { .. }) => FileOutcome::AlreadyInPlace,
            Err(e) => FileOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Names of the regular files directly inside `root`, read once before any
/// file of that root is relocated.
/// Drop roots that repeat an earlier root or lie inside another root, so
/// every file is walked once. Order is kept.
fn drop_nested_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for (i, root) in roots.iter().enumerate() {
        let covered_by = roots.iter().enumerate().find(|(j, other)| {
            if root == *other {
                *j < i
            } else {
                root.starts_with(other)
            }
        });
        match covered_by {
            Some((_, other)) => warn!(
                root = %root.display(),
                covered_by = %other.display(),
                "source is already walked, skipping"
            ),
            None => kept.push(root.clone()),
        }
    }
    kept
}

fn root_file_names(root: &Path) -> HashSet<OsString> {
    match fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.file_name())
            .collect(),
        Err(e) => {
            warn!(root = %root.display(), error = %e, "cannot list source root");
            HashSet::new()
        }
    }
}

/// A file below the root is a duplicate when a file of the same name sits
/// directly in the root. Only names are compared.
fn is_duplicate(root: &Path, root_names: &HashSet<OsString>, path: &Path) -> bool {
    if path.parent() == Some(root) {
        return false;
    }
    path.file_name()
        .is_some_and(|name| root_names.contains(name))
}

fn lock(stats: &Mutex<RunStats>) -> std::sync::MutexGuard<'_, RunStats> {
    stats.lock().unwrap_or_else(|e| e.into_inner())
}
