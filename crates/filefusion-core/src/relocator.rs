//! Copies or moves a file into its destination directory.
//!
//! Permission failures are retried with a linear backoff: after failed
//! attempt `n` the relocator waits `n` backoff units. Any other I/O error
//! fails the file immediately.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FileFusionError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Copy, keeping permissions and access/modification times.
    #[default]
    Copy,
    /// Rename, or copy then delete when crossing filesystems.
    Move,
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(TransferMode::Copy),
            "move" => Ok(TransferMode::Move),
            other => Err(format!("expected 'copy' or 'move', got '{}'", other)),
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransferMode::Copy => "copy",
            TransferMode::Move => "move",
        })
    }
}

/// The filesystem operation behind a relocation.
pub trait FileTransfer: Send + Sync {
    fn transfer(&self, source: &Path, target: &Path, mode: TransferMode) -> io::Result<()>;
}

/// [`FileTransfer`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTransfer;

impl FileTransfer for FsTransfer {
    fn transfer(&self, source: &Path, target: &Path, mode: TransferMode) -> io::Result<()> {
        match mode {
            TransferMode::Copy => copy_preserving(source, target),
            TransferMode::Move => match fs::rename(source, target) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(e),
                Err(_) => {
                    copy_preserving(source, target)?;
                    fs::remove_file(source)
                }
            },
        }
    }
}

fn copy_preserving(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target)?;
    let metadata = fs::metadata(source)?;
    filetime::set_file_times(
        target,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
}

/// Called with the delay before each retry.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// What happened to a file handed to [`Relocator::relocate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Relocation {
    /// `replaced` is set when a file of the same name already sat at
    /// `destination` and was overwritten.
    Relocated {
        destination: PathBuf,
        attempts: u32,
        replaced: bool,
    },
    /// Source and destination are the same file; nothing was done.
    AlreadyInPlace { path: PathBuf },
    /// Dry run: where the file would have gone.
    Planned { destination: PathBuf },
}

pub struct Relocator {
    mode: TransferMode,
    max_attempts: u32,
    backoff: Duration,
    dry_run: bool,
    transfer: Arc<dyn FileTransfer>,
    sleeper: Sleeper,
}

impl Relocator {
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            dry_run: false,
            transfer: Arc::new(FsTransfer),
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_transfer(mut self, transfer: Arc<dyn FileTransfer>) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Place `source` inside `dest_dir`, keeping its file name.
    pub fn relocate(&self, source: &Path, dest_dir: &Path) -> Result<Relocation> {
        let file_name = source
            .file_name()
            .ok_or_else(|| FileFusionError::Relocation {
                path: source.to_path_buf(),
                attempts: 0,
                message: "path has no file name".to_string(),
            })?;
        let target = dest_dir.join(file_name);

        if same_file(source, &target) {
            debug!(path = %source.display(), "already in place");
            return Ok(Relocation::AlreadyInPlace {
                path: source.to_path_buf(),
            });
        }

        if self.dry_run {
            return Ok(Relocation::Planned {
                destination: target,
            });
        }

        let replaced = target.exists();
        if replaced {
            warn!(
                path = %source.display(),
                target = %target.display(),
                "replacing existing file"
            );
        }

        let mut attempt = 1;
        loop {
            match self.attempt(source, dest_dir, &target) {
                Ok(()) => {
                    return Ok(Relocation::Relocated {
                        destination: target,
                        attempts: attempt,
                        replaced,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied
                    && attempt < self.max_attempts =>
                {
                    let delay = self.backoff * attempt;
                    warn!(
                        path = %source.display(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "permission denied, retrying"
                    );
                    (self.sleeper)(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(FileFusionError::Relocation {
                        path: source.to_path_buf(),
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    fn attempt(&self, source: &Path, dest_dir: &Path, target: &Path) -> io::Result<()> {
        // create_dir_all tolerates the directory appearing concurrently.
        fs::create_dir_all(dest_dir)?;
        self.transfer.transfer(source, target, self.mode)
    }
}

fn same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fails with `kind` for the first `failures` calls, then copies.
    struct FlakyTransfer {
        failures: u32,
        kind: io::ErrorKind,
        calls: AtomicU32,
    }

    impl FlakyTransfer {
        fn new(failures: u32, kind: io::ErrorKind) -> Arc<Self> {
            Arc::new(Self {
                failures,
                kind,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl FileTransfer for FlakyTransfer {
        fn transfer(&self, source: &Path, target: &Path, mode: TransferMode) -> io::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(io::Error::new(self.kind, "injected failure"));
            }
            FsTransfer.transfer(source, target, mode)
        }
    }

    fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
        let waits = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&waits);
        let sleeper: Sleeper = Arc::new(move |d| recorded.lock().unwrap().push(d));
        (sleeper, waits)
    }

    fn source_file(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("report.pdf");
        fs::write(&path, b"pdf").unwrap();
        path
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let mtime = FileTime::from_unix_time(1_700_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        let dest = temp.path().join("out/Docs");
        let outcome = Relocator::new(TransferMode::Copy)
            .relocate(&source, &dest)
            .unwrap();

        let target = dest.join("report.pdf");
        assert_eq!(
            outcome,
            Relocation::Relocated {
                destination: target.clone(),
                attempts: 1,
                replaced: false,
            }
        );
        assert!(source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"pdf");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&target).unwrap());
        assert_eq!(copied.unix_seconds(), mtime.unix_seconds());
    }

    #[test]
    fn test_move_removes_source() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let dest = temp.path().join("moved");

        Relocator::new(TransferMode::Move)
            .relocate(&source, &dest)
            .unwrap();

        assert!(!source.exists());
        assert!(dest.join("report.pdf").exists());
    }

    #[test]
    fn test_move_over_existing_file_reports_replace() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let dest = temp.path().join("Docs");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("report.pdf"), b"older report").unwrap();

        let outcome = Relocator::new(TransferMode::Move)
            .relocate(&source, &dest)
            .unwrap();

        assert!(matches!(outcome, Relocation::Relocated { replaced: true, .. }));
        assert!(!source.exists());
        assert_eq!(fs::read(dest.join("report.pdf")).unwrap(), b"pdf");
    }

    #[test]
    fn test_already_in_place_does_no_io() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let transfer = FlakyTransfer::new(0, io::ErrorKind::Other);

        let outcome = Relocator::new(TransferMode::Move)
            .with_transfer(transfer.clone())
            .relocate(&source, temp.path())
            .unwrap();

        assert_eq!(outcome, Relocation::AlreadyInPlace { path: source });
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retry_succeeds_on_fifth_attempt() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let transfer = FlakyTransfer::new(4, io::ErrorKind::PermissionDenied);
        let (sleeper, waits) = recording_sleeper();

        let outcome = Relocator::new(TransferMode::Copy)
            .with_retry(5, Duration::from_millis(10))
            .with_transfer(transfer.clone())
            .with_sleeper(sleeper)
            .relocate(&source, &temp.path().join("dest"))
            .unwrap();

        assert!(matches!(outcome, Relocation::Relocated { attempts: 5, .. }));
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            *waits.lock().unwrap(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(30),
                Duration::from_millis(40),
            ]
        );
    }

    #[test]
    fn test_retry_exhausted() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let transfer = FlakyTransfer::new(5, io::ErrorKind::PermissionDenied);
        let (sleeper, waits) = recording_sleeper();

        let result = Relocator::new(TransferMode::Copy)
            .with_retry(5, Duration::from_millis(1))
            .with_transfer(transfer.clone())
            .with_sleeper(sleeper)
            .relocate(&source, &temp.path().join("dest"));

        assert!(matches!(
            result,
            Err(FileFusionError::Relocation { attempts: 5, .. })
        ));
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 5);
        assert_eq!(waits.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let transfer = FlakyTransfer::new(1, io::ErrorKind::Other);
        let (sleeper, waits) = recording_sleeper();

        let result = Relocator::new(TransferMode::Copy)
            .with_transfer(transfer.clone())
            .with_sleeper(sleeper)
            .relocate(&source, &temp.path().join("dest"));

        assert!(matches!(
            result,
            Err(FileFusionError::Relocation { attempts: 1, .. })
        ));
        assert!(waits.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let source = source_file(&temp);
        let dest = temp.path().join("planned");

        let outcome = Relocator::new(TransferMode::Move)
            .with_dry_run(true)
            .relocate(&source, &dest)
            .unwrap();

        assert_eq!(
            outcome,
            Relocation::Planned {
                destination: dest.join("report.pdf")
            }
        );
        assert!(source.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_transfer_mode_parse() {
        assert_eq!("Move".parse::<TransferMode>(), Ok(TransferMode::Move));
        assert_eq!("copy".parse::<TransferMode>(), Ok(TransferMode::Copy));
        assert!("link".parse::<TransferMode>().is_err());
    }
}
