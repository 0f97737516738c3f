//! Metadata reconciliation between the central database and the loading
//! system.
//!
//! Per symbol this is a small state machine: no central-DB record is
//! terminal (`NotInSource`); an unknown symbol gets a full registration
//! with seven freshly allocated job numbers (`Created`); a registered
//! symbol gets its empty slots filled and its remote-held numbers
//! re-registered locally (`Updated`); more than one registration is a
//! conflict nothing may touch (`Conflict`).
//!
//! Allocation only ever fills empty slots, so re-running reconciliation
//! against unchanged remote state allocates nothing. A slot's number is
//! taken from the local ledger when a prior run minted one the loading
//! system never learned; fresh numbers are minted only when neither side
//! holds one.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::activity::Actor;
use crate::allocator::JobNumberAllocator;
use crate::api::{LanguageSlot, OdsApi, SymbolPayload};
use crate::catalogue::CatalogueSource;
use crate::config::OdsConfig;
use crate::error::OdsError;
use crate::language::{Language, LanguageMap};
use crate::ledger::LedgerStore;
use crate::model::{CbMetadataSnapshot, ReconcileOutcome, ReconcileStatus, RemoteSymbolState};
use crate::oracle::{ExistenceOracle, SymbolPresence};

/// Per-symbol entry of a batch run.
#[derive(Debug)]
pub struct ReconcileBatchItem {
    pub docsymbol: String,
    pub result: Result<ReconcileOutcome, OdsError>,
}

/// Drives create-vs-update decisions for document symbols.
pub struct Reconciler<S, A> {
    config: OdsConfig,
    api: Arc<A>,
    oracle: ExistenceOracle<A>,
    allocator: Arc<JobNumberAllocator<S, A>>,
    catalogue: Arc<dyn CatalogueSource>,
    actor: Option<Actor>,
}

impl<S: LedgerStore, A: OdsApi> Reconciler<S, A> {
    pub fn new(
        config: OdsConfig,
        api: Arc<A>,
        allocator: Arc<JobNumberAllocator<S, A>>,
        catalogue: Arc<dyn CatalogueSource>,
    ) -> Self {
        Self {
            oracle: ExistenceOracle::new(Arc::clone(&api)),
            config,
            api,
            allocator,
            catalogue,
            actor: None,
        }
    }

    /// Record outcomes to an activity log.
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Reconcile one symbol. State is re-fetched fresh; nothing from a
    /// previous call is trusted.
    pub async fn reconcile(&self, docsymbol: &str) -> Result<ReconcileOutcome, OdsError> {
        let snapshot = match self.catalogue.snapshot(docsymbol).await? {
            Some(snapshot) => snapshot,
            None => {
                warn!(docsymbol = %docsymbol, "Symbol not found in central database");
                let outcome = ReconcileOutcome::terminal(docsymbol, ReconcileStatus::NotInSource);
                self.record(&outcome).await;
                return Ok(outcome);
            }
        };

        let state = self.oracle.lookup(docsymbol).await?;

        let outcome = match SymbolPresence::classify(state.matches) {
            SymbolPresence::Unknown => self.create(&snapshot).await?,
            SymbolPresence::Registered => self.update(&snapshot, &state).await?,
            SymbolPresence::Duplicate => {
                warn!(
                    docsymbol = %docsymbol,
                    matches = state.matches,
                    "Duplicate registration, refusing to allocate or write"
                );
                ReconcileOutcome::terminal(docsymbol, ReconcileStatus::Conflict)
            }
        };

        self.record(&outcome).await;
        Ok(outcome)
    }

    /// Reconcile a batch, one outcome per symbol. A failing symbol never
    /// aborts the rest.
    pub async fn reconcile_batch(&self, docsymbols: &[String]) -> Vec<ReconcileBatchItem> {
        let mut items = Vec::with_capacity(docsymbols.len());
        for docsymbol in docsymbols {
            let result = self.reconcile(docsymbol).await;
            if let Err(e) = &result {
                warn!(docsymbol = %docsymbol, error = %e, "Reconciliation failed");
            }
            items.push(ReconcileBatchItem {
                docsymbol: docsymbol.clone(),
                result,
            });
        }
        items
    }

    /// Register a symbol the loading system does not know yet.
    async fn create(&self, snapshot: &CbMetadataSnapshot) -> Result<ReconcileOutcome, OdsError> {
        let mut slots: LanguageMap<LanguageSlot> = LanguageMap::default();
        let mut numbers: LanguageMap<Option<String>> = LanguageMap::default();
        let mut allocated = 0;

        for language in Language::ALL {
            let value = self
                .slot_number(&snapshot.symbol, language, &mut allocated)
                .await?;
            slots.get_mut(language).job_number = value.clone();
            numbers.set(language, Some(value));
        }
        self.fill_titles(&mut slots, snapshot);
        // Release dates stay empty: they are set once, at file-send time.

        self.api
            .write_symbol(&self.build_payload(snapshot, &slots))
            .await?;

        info!(docsymbol = %snapshot.symbol, allocated = allocated, "Symbol created in loading system");
        Ok(ReconcileOutcome {
            docsymbol: snapshot.symbol.clone(),
            status: ReconcileStatus::Created,
            job_numbers: numbers,
            allocated,
        })
    }

    /// Update a registered symbol: fill empty slots, trust the remote
    /// numbering authority for the rest.
    async fn update(
        &self,
        snapshot: &CbMetadataSnapshot,
        state: &RemoteSymbolState,
    ) -> Result<ReconcileOutcome, OdsError> {
        let mut slots: LanguageMap<LanguageSlot> = LanguageMap::default();
        let mut numbers: LanguageMap<Option<String>> = LanguageMap::default();
        let mut allocated = 0;

        for language in Language::ALL {
            let value = match state.job_number(language) {
                Some(remote) => {
                    self.allocator
                        .register(&snapshot.symbol, language, remote)
                        .await?;
                    remote.to_string()
                }
                None => {
                    self.slot_number(&snapshot.symbol, language, &mut allocated)
                        .await?
                }
            };
            slots.get_mut(language).job_number = value.clone();
            numbers.set(language, Some(value));
            // Pass release dates through untouched, sentinel or not.
            slots.get_mut(language).release_date = state.release_dates.get(language).clone();
        }
        self.fill_titles(&mut slots, snapshot);

        self.api
            .write_symbol(&self.build_payload(snapshot, &slots))
            .await?;

        info!(
            docsymbol = %snapshot.symbol,
            allocated = allocated,
            "Symbol updated in loading system"
        );
        Ok(ReconcileOutcome {
            docsymbol: snapshot.symbol.clone(),
            status: ReconcileStatus::Updated,
            job_numbers: numbers,
            allocated,
        })
    }

    /// Number for a slot neither side has settled: the ledger's, when a
    /// prior run already minted one for this pair, else a fresh
    /// allocation.
    async fn slot_number(
        &self,
        docsymbol: &str,
        language: Language,
        allocated: &mut usize,
    ) -> Result<String, OdsError> {
        if let Some(held) = self.allocator.held_for(docsymbol, language).await? {
            debug!(
                docsymbol = %docsymbol,
                language = %language,
                jobnumber = %held.jobnumber_value,
                "Reusing locally held job number"
            );
            return Ok(held.jobnumber_value);
        }
        let record = self.allocator.allocate(docsymbol, language).await?;
        *allocated += 1;
        Ok(record.jobnumber_value)
    }

    fn fill_titles(&self, slots: &mut LanguageMap<LanguageSlot>, snapshot: &CbMetadataSnapshot) {
        slots.get_mut(self.config.title_language).title = snapshot.title.clone();
    }

    fn build_payload(
        &self,
        snapshot: &CbMetadataSnapshot,
        slots: &LanguageMap<LanguageSlot>,
    ) -> SymbolPayload {
        let publication_date = if snapshot.publication_date.trim().is_empty() {
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
        } else {
            snapshot.publication_date.clone()
        };

        SymbolPayload::new(
            &snapshot.symbol,
            &snapshot.sessions,
            &snapshot.agendas,
            &self.config.area,
            &snapshot.distribution,
            snapshot.tcodes.clone(),
            &publication_date,
            slots,
        )
    }

    async fn record(&self, outcome: &ReconcileOutcome) {
        if let Some(actor) = &self.actor {
            actor
                .record(
                    &format!("reconcile:{}", outcome.status),
                    &outcome.docsymbol,
                )
                .await;
        }
    }
}
