//! Cross-process cancellation signal
//!
//! The flag is a marker file shared by supervisor and worker. It is set at
//! most once and never cleared; the worker observes it cooperatively at loop
//! boundaries and inside its sleep/poll loops.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info};

use crate::error::Result;

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    set: AtomicBool,
}

/// Boolean flag shared by both processes
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    /// Create the signal for a new session, clearing any stale marker
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed stale cancel marker {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::open(path))
    }

    /// Attach to a signal created by another process
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: Some(path.into()),
                set: AtomicBool::new(false),
            }),
        }
    }

    /// Signal confined to this process (headless runs and tests)
    pub fn local() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                set: AtomicBool::new(false),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) -> Result<()> {
        if self.inner.set.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(path) = &self.inner.path {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => info!("Cancellation requested"),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.set.load(Ordering::SeqCst) {
            return true;
        }

        let observed = self.inner.path.as_ref().is_some_and(|p| p.exists());
        if observed {
            self.inner.set.store(true, Ordering::SeqCst);
        }
        observed
    }

    /// Sleep for `total` in `step` increments. Returns true if cancelled.
    pub async fn sleep(&self, total: Duration, step: Duration) -> bool {
        let step = if step.is_zero() { total } else { step };
        let mut elapsed = Duration::ZERO;

        while elapsed < total {
            if self.is_cancelled() {
                return true;
            }
            let chunk = step.min(total - elapsed);
            tokio::time::sleep(chunk).await;
            elapsed += chunk;
        }

        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cancel_is_visible_across_handles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cancel");

        let supervisor = CancellationSignal::create(&path).unwrap();
        let worker = CancellationSignal::open(&path);
        assert!(!worker.is_cancelled());

        supervisor.cancel().unwrap();
        assert!(path.exists());
        assert!(worker.is_cancelled());
        // Idempotent
        supervisor.cancel().unwrap();
    }

    #[test]
    fn test_create_clears_stale_marker() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cancel");
        std::fs::write(&path, "").unwrap();

        let signal = CancellationSignal::create(&path).unwrap();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_never_cleared_once_observed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cancel");
        let signal = CancellationSignal::create(&path).unwrap();
        signal.cancel().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_local_signal() {
        let signal = CancellationSignal::local();
        let clone = signal.clone();
        assert!(signal.path().is_none());
        clone.cancel().unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_sleep_interrupted() {
        let signal = CancellationSignal::local();
        signal.cancel().unwrap();
        let start = std::time::Instant::now();
        assert!(signal.sleep(Duration::from_secs(10), Duration::from_millis(10)).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sleep_completes() {
        let signal = CancellationSignal::local();
        assert!(!signal.sleep(Duration::from_millis(20), Duration::from_millis(5)).await);
    }
}
