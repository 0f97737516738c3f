//! Job-number allocation and release.
//!
//! Numbers are `{prefix}{suffix}` with a numeric suffix that starts at the
//! configured base and increases per prefix. A candidate is committed only
//! after both the local ledger and the loading system confirm it free.
//! Allocation serializes on an internal mutex: the ledger read and the
//! subsequent insert must be one critical section or two concurrent
//! requests can mint the same number.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::OdsApi;
use crate::config::OdsConfig;
use crate::error::OdsError;
use crate::language::Language;
use crate::ledger::LedgerStore;
use crate::model::JobNumberRecord;

/// Outcome of a release call. "Not found" is a normal business outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotFound,
}

/// Allocates, registers and releases job numbers for one site prefix.
pub struct JobNumberAllocator<S, A> {
    store: Arc<S>,
    api: Arc<A>,
    prefix: String,
    number_base: u64,
    max_attempts: u32,
    // One allocator serves one prefix; this is the per-prefix allocation lock.
    alloc_lock: Mutex<()>,
}

impl<S: LedgerStore, A: OdsApi> JobNumberAllocator<S, A> {
    pub fn new(store: Arc<S>, api: Arc<A>, config: &OdsConfig) -> Self {
        Self {
            store,
            api,
            prefix: config.prefix.clone(),
            number_base: config.number_base,
            max_attempts: config.max_allocation_attempts,
            alloc_lock: Mutex::new(()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allocate a fresh number for a symbol/language pair and persist it.
    ///
    /// The candidate is probed against the loading system before commit;
    /// on collision the suffix is incremented and probed again, up to the
    /// configured attempt cap. A failed probe aborts the allocation - an
    /// unverifiable number must not be handed out.
    pub async fn allocate(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<JobNumberRecord, OdsError> {
        let _guard = self.alloc_lock.lock().await;

        let mut suffix = match self.store.last_for_prefix(&self.prefix).await? {
            Some(last) => self.parse_suffix(&last.jobnumber_value)? + 1,
            None => self.number_base,
        };
        // An upserted remote number can sit below the base; never go back
        // under it.
        suffix = suffix.max(self.number_base);

        for attempt in 0..self.max_attempts {
            let candidate = format!("{}{}", self.prefix, suffix);

            if self.store.contains(&candidate).await? {
                debug!(candidate = %candidate, "Candidate already in local ledger");
                suffix += 1;
                continue;
            }

            if self.api.number_exists(&candidate).await? {
                debug!(candidate = %candidate, attempt = attempt, "Candidate registered remotely");
                suffix += 1;
                continue;
            }

            let record = JobNumberRecord {
                created_date: Utc::now(),
                jobnumber_value: candidate,
                docsymbol: docsymbol.to_string(),
                language,
            };
            self.store.insert(record.clone()).await?;

            info!(
                jobnumber = %record.jobnumber_value,
                docsymbol = %docsymbol,
                language = %language,
                "Job number allocated"
            );
            return Ok(record);
        }

        Err(OdsError::AllocationConflict {
            prefix: self.prefix.clone(),
            attempts: self.max_attempts,
        })
    }

    /// Number already held in the ledger for a symbol/language pair.
    ///
    /// A prior run may have minted a number and then failed before the
    /// loading system learned it; that number must be reused, never
    /// re-minted.
    pub async fn held_for(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<JobNumberRecord>, OdsError> {
        self.store.find_for_symbol(docsymbol, language).await
    }

    /// Register a number the loading system already holds for a slot, so
    /// the local ledger stays consistent with the remote authority.
    pub async fn register(
        &self,
        docsymbol: &str,
        language: Language,
        jobnumber: &str,
    ) -> Result<(), OdsError> {
        let record = JobNumberRecord {
            created_date: Utc::now(),
            jobnumber_value: jobnumber.to_string(),
            docsymbol: docsymbol.to_string(),
            language,
        };
        self.store.upsert(record).await?;
        debug!(jobnumber = %jobnumber, docsymbol = %docsymbol, "Remote job number registered locally");
        Ok(())
    }

    /// Delete a number that turned out to be unused.
    pub async fn release(&self, jobnumber: &str) -> Result<ReleaseOutcome, OdsError> {
        if self.store.remove(jobnumber).await? {
            info!(jobnumber = %jobnumber, "Job number released");
            Ok(ReleaseOutcome::Released)
        } else {
            warn!(jobnumber = %jobnumber, "Job number not found in ledger");
            Ok(ReleaseOutcome::NotFound)
        }
    }

    fn parse_suffix(&self, value: &str) -> Result<u64, OdsError> {
        value
            .get(self.prefix.len()..)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                OdsError::PersistenceError(format!(
                    "ledger holds a malformed job number for prefix {}: {}",
                    self.prefix, value
                ))
            })
    }
}
