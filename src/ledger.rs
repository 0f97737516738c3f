//! Job-number ledger storage.
//!
//! The ledger is append-only in spirit: records are inserted by the
//! allocator, re-registered (upsert on `jobnumber_value`) when the loading
//! system is the source of a number, and removed only by the release path.
//! The "last record" query is answered by true insertion order, never by
//! value sort - value ordering would interleave site prefixes and corrupt
//! the sequence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::OdsError;
use crate::language::Language;
use crate::model::JobNumberRecord;

/// Persistence seam for the job-number ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a new record.
    async fn insert(&self, record: JobNumberRecord) -> Result<(), OdsError>;

    /// Most recently inserted record whose value carries `prefix`.
    async fn last_for_prefix(&self, prefix: &str) -> Result<Option<JobNumberRecord>, OdsError>;

    /// Record held for a symbol/language pair, if any.
    async fn find_for_symbol(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<JobNumberRecord>, OdsError>;

    /// Insert or replace the record with the same `jobnumber_value`.
    async fn upsert(&self, record: JobNumberRecord) -> Result<(), OdsError>;

    /// Delete by value. Returns whether a record was removed.
    async fn remove(&self, jobnumber_value: &str) -> Result<bool, OdsError>;

    /// Whether a record with this value exists.
    async fn contains(&self, jobnumber_value: &str) -> Result<bool, OdsError>;

    /// All records in insertion order.
    async fn all(&self) -> Result<Vec<JobNumberRecord>, OdsError>;
}

/// In-memory ledger. Insertion order is the vector order.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<JobNumberRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn insert(&self, record: JobNumberRecord) -> Result<(), OdsError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn last_for_prefix(&self, prefix: &str) -> Result<Option<JobNumberRecord>, OdsError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.jobnumber_value.starts_with(prefix))
            .cloned())
    }

    async fn find_for_symbol(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<JobNumberRecord>, OdsError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.docsymbol == docsymbol && r.language == language)
            .cloned())
    }

    async fn upsert(&self, record: JobNumberRecord) -> Result<(), OdsError> {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| r.jobnumber_value == record.jobnumber_value)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn remove(&self, jobnumber_value: &str) -> Result<bool, OdsError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.jobnumber_value != jobnumber_value);
        Ok(records.len() < before)
    }

    async fn contains(&self, jobnumber_value: &str) -> Result<bool, OdsError> {
        let records = self.records.read().await;
        Ok(records.iter().any(|r| r.jobnumber_value == jobnumber_value))
    }

    async fn all(&self) -> Result<Vec<JobNumberRecord>, OdsError> {
        Ok(self.records.read().await.clone())
    }
}

/// JSON-lines ledger file. One record per line, in insertion order.
///
/// Inserts append to the file; upserts and removals rewrite it. All
/// mutation happens under one lock, so the file and the in-memory view
/// cannot diverge.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    records: Mutex<Vec<JobNumberRecord>>,
}

impl FileLedger {
    /// Open a ledger file, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, OdsError> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| persistence(&path, "read", e))?;
            let mut records = Vec::new();
            let total = raw.lines().count();
            for (number, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JobNumberRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        // A truncated trailing line is recoverable; bail on
                        // anything earlier so corruption is not silently
                        // compounded.
                        if number + 1 == total {
                            warn!(path = %path.display(), line = number + 1, error = %e,
                                "Dropping unparsable trailing ledger line");
                        } else {
                            return Err(OdsError::PersistenceError(format!(
                                "corrupt ledger line {} in {}: {}",
                                number + 1,
                                path.display(),
                                e
                            )));
                        }
                    }
                }
            }
            records
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| persistence(&path, "create parent for", e))?;
            }
            tokio::fs::File::create(&path)
                .await
                .map_err(|e| persistence(&path, "create", e))?;
            Vec::new()
        };

        debug!(path = %path.display(), records = records.len(), "Ledger opened");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn append_line(&self, record: &JobNumberRecord) -> Result<(), OdsError> {
        let line = serde_json::to_string(record)
            .map_err(|e| OdsError::PersistenceError(format!("unserializable record: {}", e)))?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| persistence(&self.path, "open", e))?;
        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| persistence(&self.path, "append to", e))?;
        Ok(())
    }

    async fn rewrite(&self, records: &[JobNumberRecord]) -> Result<(), OdsError> {
        let mut contents = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| OdsError::PersistenceError(format!("unserializable record: {}", e)))?;
            contents.push_str(&line);
            contents.push('\n');
        }
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| persistence(&self.path, "rewrite", e))
    }
}

fn persistence(path: &Path, verb: &str, e: std::io::Error) -> OdsError {
    OdsError::PersistenceError(format!("failed to {} {}: {}", verb, path.display(), e))
}

#[async_trait]
impl LedgerStore for FileLedger {
    async fn insert(&self, record: JobNumberRecord) -> Result<(), OdsError> {
        let mut records = self.records.lock().await;
        self.append_line(&record).await?;
        records.push(record);
        Ok(())
    }

    async fn last_for_prefix(&self, prefix: &str) -> Result<Option<JobNumberRecord>, OdsError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.jobnumber_value.starts_with(prefix))
            .cloned())
    }

    async fn find_for_symbol(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<JobNumberRecord>, OdsError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.docsymbol == docsymbol && r.language == language)
            .cloned())
    }

    async fn upsert(&self, record: JobNumberRecord) -> Result<(), OdsError> {
        let mut records = self.records.lock().await;
        match records
            .iter_mut()
            .find(|r| r.jobnumber_value == record.jobnumber_value)
        {
            Some(existing) => {
                *existing = record;
                let snapshot = records.clone();
                self.rewrite(&snapshot).await?;
            }
            None => {
                self.append_line(&record).await?;
                records.push(record);
            }
        }
        Ok(())
    }

    async fn remove(&self, jobnumber_value: &str) -> Result<bool, OdsError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.jobnumber_value != jobnumber_value);
        if records.len() == before {
            return Ok(false);
        }
        let snapshot = records.clone();
        self.rewrite(&snapshot).await?;
        Ok(true)
    }

    async fn contains(&self, jobnumber_value: &str) -> Result<bool, OdsError> {
        let records = self.records.lock().await;
        Ok(records.iter().any(|r| r.jobnumber_value == jobnumber_value))
    }

    async fn all(&self) -> Result<Vec<JobNumberRecord>, OdsError> {
        Ok(self.records.lock().await.clone())
    }
}
