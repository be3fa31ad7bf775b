//! Cross-process advisory lock guarding all store mutations.
//!
//! Every CLI invocation is its own process, so the only serialization point
//! between terminals is an exclusive lock on a file next to the database.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::DbError;

/// Delay between lock attempts while another process holds the lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Returns the lock file path for a database path: `<db>.lock`.
pub fn lock_path_for(database_path: &Path) -> PathBuf {
    let mut path = database_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

/// An exclusive lock on the store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquires the lock, polling until `timeout` elapses.
    ///
    /// Returns [`DbError::Busy`] if another process still holds it.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, DbError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| DbError::Lock {
                path: path.to_path_buf(),
                source,
            })?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), waited_ms = start.elapsed().as_millis(), "store lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.raw_os_error() == contended => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        tracing::debug!(path = %path.display(), "timed out waiting for store lock");
                        return Err(DbError::Busy {
                            detail: format!("lock not acquired within {}ms", timeout.as_millis()),
                        });
                    }
                    thread::sleep(RETRY_INTERVAL.min(timeout - elapsed));
                }
                Err(source) => {
                    return Err(DbError::Lock {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release store lock");
        }
    }
}
