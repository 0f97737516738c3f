//! Activity recording for analytics.
//!
//! Reconciliation and transfer runs record who did what to which symbol.
//! The store behind this is external; failures to record are logged and
//! swallowed - analytics must never break a loading run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::OdsError;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub date: DateTime<Utc>,
    pub user: String,
    pub action: String,
    pub docsymbol: String,
}

/// Write-side seam for the analytics store.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, user: &str, action: &str, docsymbol: &str) -> Result<(), OdsError>;
}

/// Record an action, downgrading failures to a warning.
pub async fn record_best_effort(log: &dyn ActivityLog, user: &str, action: &str, docsymbol: &str) {
    if let Err(e) = log.record(user, action, docsymbol).await {
        warn!(action = %action, docsymbol = %docsymbol, error = %e, "Failed to record activity");
    }
}

/// An activity log bound to the user driving the run.
#[derive(Clone)]
pub struct Actor {
    log: std::sync::Arc<dyn ActivityLog>,
    user: String,
}

impl Actor {
    pub fn new(log: std::sync::Arc<dyn ActivityLog>, user: impl Into<String>) -> Self {
        Self {
            log,
            user: user.into(),
        }
    }

    /// Best-effort record; failures are warned about and dropped.
    pub async fn record(&self, action: &str, docsymbol: &str) {
        record_best_effort(self.log.as_ref(), &self.user, action, docsymbol).await;
    }
}

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor").field("user", &self.user).finish()
    }
}

/// In-memory activity log.
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<ActivityRecord>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn record(&self, user: &str, action: &str, docsymbol: &str) -> Result<(), OdsError> {
        self.records.lock().await.push(ActivityRecord {
            date: Utc::now(),
            user: user.to_string(),
            action: action.to_string(),
            docsymbol: docsymbol.to_string(),
        });
        Ok(())
    }
}
