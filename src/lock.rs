//! Locked file access - advisory whole-file locks around block and attribute I/O
//!
//! Blocks and attributes are plain files with no lock manager in front of
//! them, so every reader takes a shared lock and every writer an exclusive
//! one before touching file bytes. The locks are advisory: a process that
//! skips this module can still tear files.
//!
//! Acquisition retries on contention until it succeeds. The only ways out
//! are a deadline, a timeout or a [`CancellationFlag`] on the [`LockPolicy`];
//! they are consulted only while the file is contended.

use crate::error::{N5Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default back-off between lock attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Shared flag that aborts pending lock acquisitions when set
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
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

/// How lock acquisition waits
#[derive(Debug, Clone)]
pub struct LockPolicy {
    /// Sleep between attempts while the file is locked elsewhere
    pub retry_interval: Duration,
    /// Give up waiting once this instant has passed
    pub deadline: Option<Instant>,
    /// Give up waiting this long after each acquisition starts
    pub timeout: Option<Duration>,
    /// Give up waiting once this flag is set
    pub cancel: Option<CancellationFlag>,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            deadline: None,
            timeout: None,
            cancel: None,
        }
    }
}

impl LockPolicy {
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Latest instant an acquisition started at `started` may wait until
    fn wait_until(&self, started: Instant) -> Option<Instant> {
        let timeout = self.timeout.map(|t| started + t);
        match (self.deadline, timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn interruption(&self, wait_until: Option<Instant>) -> Option<&'static str> {
        if self.cancel.as_ref().is_some_and(CancellationFlag::is_cancelled) {
            return Some("cancelled");
        }
        if wait_until.is_some_and(|d| Instant::now() >= d) {
            return Some("deadline elapsed");
        }
        None
    }

    fn backoff(&self, wait_until: Option<Instant>) -> Duration {
        match wait_until {
            Some(until) => self
                .retry_interval
                .min(until.saturating_duration_since(Instant::now())),
            None => self.retry_interval,
        }
    }
}

/// Lock kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock, file opened read-only
    Shared,
    /// Exclusive lock, file opened read-write and created if absent
    Exclusive,
}

/// An open file holding an advisory lock over its whole byte range
///
/// The lock is released when the value is dropped, on every exit path.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockedFile {
    /// Open `path` read-only under a shared lock
    pub fn open_for_reading(path: impl AsRef<Path>, policy: &LockPolicy) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| N5Error::io_at(path, e))?;
        Self::acquire(file, path, LockMode::Shared, policy)
    }

    /// Open `path` read-write, creating it if absent, under an exclusive lock
    ///
    /// The file is not truncated; call [`LockedFile::truncate`] once the
    /// lock is held.
    pub fn open_for_writing(path: impl AsRef<Path>, policy: &LockPolicy) -> Result<Self> {
        Self::open_exclusive(path.as_ref(), policy, true)
    }

    /// Open an existing `path` read-write under an exclusive lock
    ///
    /// Fails with a `NotFound` I/O error if the file does not exist.
    pub fn open_existing_for_writing(path: impl AsRef<Path>, policy: &LockPolicy) -> Result<Self> {
        Self::open_exclusive(path.as_ref(), policy, false)
    }

    /// Exclusive lock on the file currently linked at `path`
    ///
    /// A holder may unlink the file while we wait on it. Whatever is written
    /// through the stale handle would then be lost, so the lock is dropped
    /// and the path opened again.
    fn open_exclusive(path: &Path, policy: &LockPolicy, create: bool) -> Result<Self> {
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(create)
                .truncate(false)
                .open(path)
                .map_err(|e| N5Error::io_at(path, e))?;
            let locked = Self::acquire(file, path, LockMode::Exclusive, policy)?;
            if locked.is_linked()? {
                return Ok(locked);
            }
            debug!(path = %path.display(), "locked file was unlinked while waiting, reopening");
        }
    }

    /// Whether `path` still names the open file
    fn is_linked(&self) -> Result<bool> {
        let on_disk = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(N5Error::io_at(&self.path, e)),
        };
        let open = self
            .file
            .metadata()
            .map_err(|e| N5Error::io_at(&self.path, e))?;
        Ok(same_file(&open, &on_disk))
    }

    fn acquire(file: File, path: &Path, mode: LockMode, policy: &LockPolicy) -> Result<Self> {
        let started = Instant::now();
        let wait_until = policy.wait_until(started);
        let mut attempts = 0u64;

        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            attempts += 1;

            match attempt {
                Ok(()) => {
                    if attempts > 1 {
                        debug!(
                            path = %path.display(),
                            ?mode,
                            attempts,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "lock acquired after contention"
                        );
                    }
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                        mode,
                    });
                }
                Err(e) if is_contended(&e) => {
                    if let Some(reason) = policy.interruption(wait_until) {
                        debug!(path = %path.display(), ?mode, attempts, reason, "lock acquisition interrupted");
                        return Err(N5Error::LockInterrupted {
                            path: path.to_path_buf(),
                            reason: reason.to_string(),
                        });
                    }
                    trace!(path = %path.display(), ?mode, attempts, "file locked elsewhere, backing off");
                    std::thread::sleep(policy.backoff(wait_until));
                }
                Err(e) => return Err(N5Error::io_at(path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Current length of the locked file
    pub fn len(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .map_err(|e| N5Error::io_at(&self.path, e))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop the current contents and rewind
    pub fn truncate(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)).map(|_| ()))
            .map_err(|e| N5Error::io_at(&self.path, e))
    }

    /// Read the remaining bytes of the file
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file
            .read_to_end(&mut bytes)
            .map_err(|e| N5Error::io_at(&self.path, e))?;
        Ok(bytes)
    }
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

// Windows refuses to delete a file another handle has open, so a path that
// still resolves is the same file.
#[cfg(not(unix))]
fn same_file(_a: &std::fs::Metadata, _b: &std::fs::Metadata) -> bool {
    true
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || (err.raw_os_error().is_some()
            && err.raw_os_error() == fs2::lock_contended_error().raw_os_error())
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
