//! Pacing between file uploads.
//!
//! The loading system's file endpoint is sensitive to back-to-back
//! uploads, so transfers observe an interval between files. The interval
//! is configurable and adapts: upload failures back it off exponentially,
//! sustained success decays it back toward the baseline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Slowest the pacer will ever go, regardless of failures.
const MAX_INTERVAL_MS: u64 = 60_000;

/// Interval-based pacer for per-language transfers.
pub struct TransferPacer {
    base_interval_ms: u64,
    current_interval_ms: AtomicU64,
    last_send: Mutex<Option<Instant>>,
}

impl TransferPacer {
    pub fn new(base_interval_ms: u64) -> Self {
        Self {
            base_interval_ms,
            current_interval_ms: AtomicU64::new(base_interval_ms),
            last_send: Mutex::new(None),
        }
    }

    /// Wait until the next upload is allowed.
    ///
    /// The first call in a run never waits.
    pub async fn wait(&self) {
        let mut last = self.last_send.lock().await;
        if let Some(previous) = *last {
            let interval = Duration::from_millis(self.current_interval_ms.load(Ordering::Relaxed));
            let elapsed = previous.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                debug!(wait_ms = wait.as_millis(), "Pacing before next upload");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Decay the interval back toward the baseline after a good upload.
    pub fn report_success(&self) {
        let current = self.current_interval_ms.load(Ordering::Relaxed);
        if current > self.base_interval_ms {
            let new = (current * 3 / 4).max(self.base_interval_ms);
            self.current_interval_ms.store(new, Ordering::Relaxed);
            debug!(old_ms = current, new_ms = new, "Pacer recovering");
        }
    }

    /// Double the interval after a failed upload, capped.
    pub fn report_failure(&self) {
        let current = self.current_interval_ms.load(Ordering::Relaxed);
        let new = (current.max(1) * 2).min(MAX_INTERVAL_MS);
        self.current_interval_ms.store(new, Ordering::Relaxed);
        warn!(old_ms = current, new_ms = new, "Pacer backing off after upload failure");
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.current_interval_ms.load(Ordering::Relaxed))
    }
}
