use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{AppError, Result};

/// Host-wide mutual exclusion for digest runs, backed by an advisory
/// file lock. Only holdership matters; the file's content does not.
/// The lock releases when the guard drops, on every exit path.
pub struct DigestLock {
    file: File,
}

impl DigestLock {
    /// Non-blocking acquire: a held lock yields `AlreadyRunning`
    /// immediately instead of waiting.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(AppError::AlreadyRunning)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DigestLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.lock");

        let held = DigestLock::try_acquire(&path).unwrap();
        assert!(matches!(
            DigestLock::try_acquire(&path),
            Err(AppError::AlreadyRunning)
        ));

        drop(held);
        assert!(DigestLock::try_acquire(&path).is_ok());
    }
}
