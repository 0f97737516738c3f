//! File transfer into the loading system.
//!
//! A transfer run walks a symbol's seven language slots, resolves the
//! latest source file per slot, downloads it into a per-run scratch
//! directory and uploads it under the slot's job number. Afterwards every
//! job number seen this run that did not carry a successful send is
//! released; the next run re-resolves numbers from the loading system's
//! registration, so nothing is lost by letting one go.
//!
//! Release dates are set here, not at reconcile time: a slot is stamped
//! with the upload time only when its current date is unset or the
//! sentinel, so an already-released document keeps its original date.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::activity::Actor;
use crate::allocator::JobNumberAllocator;
use crate::api::{FileUpload, OdsApi};
use crate::catalogue::{CatalogueSource, FileStore};
use crate::config::OdsConfig;
use crate::error::OdsError;
use crate::language::Language;
use crate::ledger::LedgerStore;
use crate::model::{TransferReport, TransferResult};
use crate::oracle::{ExistenceOracle, SymbolPresence};
use crate::pacing::TransferPacer;

/// Per-symbol entry of a batch run.
#[derive(Debug)]
pub struct TransferBatchItem {
    pub docsymbol: String,
    pub result: Result<Vec<TransferReport>, OdsError>,
}

/// Drives per-language file transfers for document symbols.
pub struct TransferOrchestrator<S, A> {
    config: OdsConfig,
    api: Arc<A>,
    oracle: ExistenceOracle<A>,
    allocator: Arc<JobNumberAllocator<S, A>>,
    catalogue: Arc<dyn CatalogueSource>,
    files: Arc<dyn FileStore>,
    pacer: TransferPacer,
    actor: Option<Actor>,
}

impl<S: LedgerStore, A: OdsApi> TransferOrchestrator<S, A> {
    pub fn new(
        config: OdsConfig,
        api: Arc<A>,
        allocator: Arc<JobNumberAllocator<S, A>>,
        catalogue: Arc<dyn CatalogueSource>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            oracle: ExistenceOracle::new(Arc::clone(&api)),
            pacer: TransferPacer::new(config.transfer_interval_ms),
            config,
            api,
            allocator,
            catalogue,
            files,
            actor: None,
        }
    }

    /// Record outcomes to an activity log.
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Transfer every available source file for one symbol.
    ///
    /// Returns one report per language, or a single short-circuit entry
    /// when the symbol has no registration to send files against.
    pub async fn transfer(&self, docsymbol: &str) -> Result<Vec<TransferReport>, OdsError> {
        let state = self.oracle.lookup(docsymbol).await?;
        if let SymbolPresence::Unknown = SymbolPresence::classify(state.matches) {
            warn!(docsymbol = %docsymbol, "Symbol not registered, nothing to send files against");
            let report = vec![TransferReport {
                filename: String::new(),
                docsymbol: docsymbol.to_string(),
                language: None,
                jobnumber: None,
                result: TransferResult::SymbolNotFound,
            }];
            self.record(docsymbol, &report).await;
            return Ok(report);
        }

        let distribution = match self.catalogue.snapshot(docsymbol).await? {
            Some(snapshot) => snapshot.distribution,
            None => String::new(),
        };

        // Scratch space lives only for this run; dropping the handle
        // removes the directory and every downloaded file in it.
        let scratch = self.scratch_dir()?;

        let mut reports = Vec::with_capacity(7);
        let mut release_candidates: Vec<String> = Vec::new();

        for language in Language::ALL {
            // Re-fetch per slot: an earlier iteration's write must not be
            // reasoned about from stale state.
            let state = self.oracle.lookup(docsymbol).await?;
            let jobnumber = match state.job_number(language) {
                Some(number) => number.to_string(),
                None => {
                    debug!(docsymbol = %docsymbol, language = %language, "No job number for slot");
                    reports.push(TransferReport {
                        filename: expected_filename(docsymbol, language),
                        docsymbol: docsymbol.to_string(),
                        language: Some(language),
                        jobnumber: None,
                        result: TransferResult::NotSent,
                    });
                    continue;
                }
            };

            let file = match self.files.latest(docsymbol, language).await? {
                Some(file) => file,
                None => {
                    debug!(docsymbol = %docsymbol, language = %language, "No source file for slot");
                    release_candidates.push(jobnumber.clone());
                    reports.push(TransferReport {
                        filename: expected_filename(docsymbol, language),
                        docsymbol: docsymbol.to_string(),
                        language: Some(language),
                        jobnumber: Some(jobnumber),
                        result: TransferResult::FileNotFound,
                    });
                    continue;
                }
            };

            let dest = scratch.path().join(&file.filename);
            if let Err(e) = self.files.download(&file, &dest).await {
                warn!(
                    docsymbol = %docsymbol,
                    language = %language,
                    error = %e,
                    "Source file download failed"
                );
                release_candidates.push(jobnumber.clone());
                reports.push(TransferReport {
                    filename: file.filename,
                    docsymbol: docsymbol.to_string(),
                    language: Some(language),
                    jobnumber: Some(jobnumber),
                    result: TransferResult::FileNotFound,
                });
                continue;
            }

            let upload = FileUpload {
                docsymbol: docsymbol.to_string(),
                area: self.config.area.clone(),
                distribution: distribution.clone(),
                language,
                jobnumber: jobnumber.clone(),
            };

            self.pacer.wait().await;
            match self.api.upload_file(&upload, &dest).await {
                Ok(()) => {
                    self.pacer.report_success();
                    self.stamp_release_date(docsymbol, language, state.release_dates.get(language))
                        .await;
                    info!(
                        docsymbol = %docsymbol,
                        language = %language,
                        jobnumber = %jobnumber,
                        "File sent"
                    );
                    reports.push(TransferReport {
                        filename: file.filename,
                        docsymbol: docsymbol.to_string(),
                        language: Some(language),
                        jobnumber: Some(jobnumber),
                        result: TransferResult::SentOk,
                    });
                }
                Err(e) => {
                    self.pacer.report_failure();
                    warn!(
                        docsymbol = %docsymbol,
                        language = %language,
                        jobnumber = %jobnumber,
                        error = %e,
                        "File upload failed"
                    );
                    release_candidates.push(jobnumber.clone());
                    reports.push(TransferReport {
                        filename: file.filename,
                        docsymbol: docsymbol.to_string(),
                        language: Some(language),
                        jobnumber: Some(jobnumber),
                        result: TransferResult::NotSent,
                    });
                }
            }
        }

        // Everything seen but not sent goes back to the pool. The next
        // run resolves numbers from the remote registration, not the
        // local ledger, so a released number costs a retry nothing.
        for jobnumber in release_candidates {
            if let Err(e) = self.allocator.release(&jobnumber).await {
                warn!(jobnumber = %jobnumber, error = %e, "Failed to release unused job number");
            }
        }

        self.record(docsymbol, &reports).await;
        Ok(reports)
    }

    /// Transfer a batch, one report set per symbol. A failing symbol never
    /// aborts the rest.
    pub async fn transfer_batch(&self, docsymbols: &[String]) -> Vec<TransferBatchItem> {
        let mut items = Vec::with_capacity(docsymbols.len());
        for docsymbol in docsymbols {
            let result = self.transfer(docsymbol).await;
            if let Err(e) = &result {
                warn!(docsymbol = %docsymbol, error = %e, "Transfer failed");
            }
            items.push(TransferBatchItem {
                docsymbol: docsymbol.clone(),
                result,
            });
        }
        items
    }

    /// Stamp the slot with the send time unless it already carries a real
    /// release date. A failed patch is warned about; the file is already
    /// in, and metadata can be fixed by a later reconciliation.
    async fn stamp_release_date(&self, docsymbol: &str, language: Language, current: &str) {
        if !self.config.is_unreleased(current) {
            debug!(
                docsymbol = %docsymbol,
                language = %language,
                release_date = %current,
                "Slot already released, keeping its date"
            );
            return;
        }
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        if let Err(e) = self
            .api
            .patch_release_date(docsymbol, language, &stamp)
            .await
        {
            warn!(docsymbol = %docsymbol, language = %language, error = %e, "Release date patch failed");
        }
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, OdsError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ods-transfer-");
        let dir = match &self.config.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn record(&self, docsymbol: &str, reports: &[TransferReport]) {
        if let Some(actor) = &self.actor {
            let sent = reports
                .iter()
                .filter(|r| r.result == TransferResult::SentOk)
                .count();
            actor
                .record(&format!("transfer:{}", sent), docsymbol)
                .await;
        }
    }
}

/// The conventional name a slot's file is expected under, used in reports
/// for slots where resolution never produced a real filename.
fn expected_filename(docsymbol: &str, language: Language) -> String {
    format!("{}-{}.pdf", docsymbol.replace('/', "_"), language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::testkit::{FakeApi, FakeCatalogue, FakeFileStore};

    const SYMBOL: &str = "A/RES/75/1";

    struct Fixture {
        api: Arc<FakeApi>,
        store: Arc<MemoryLedger>,
        files: Arc<FakeFileStore>,
        allocator: Arc<JobNumberAllocator<MemoryLedger, FakeApi>>,
        orchestrator: TransferOrchestrator<MemoryLedger, FakeApi>,
    }

    fn fixture(config: OdsConfig) -> Fixture {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(MemoryLedger::new());
        let catalogue = Arc::new(FakeCatalogue::new());
        let files = Arc::new(FakeFileStore::new());
        let allocator = Arc::new(JobNumberAllocator::new(
            Arc::clone(&store),
            Arc::clone(&api),
            &config,
        ));
        let orchestrator = TransferOrchestrator::new(
            config,
            Arc::clone(&api),
            Arc::clone(&allocator),
            Arc::clone(&catalogue) as Arc<dyn CatalogueSource>,
            Arc::clone(&files) as Arc<dyn FileStore>,
        );
        Fixture {
            api,
            store,
            files,
            allocator,
            orchestrator,
        }
    }

    fn quick_config() -> OdsConfig {
        OdsConfig::default().with_transfer_interval_ms(0)
    }

    /// Register all seven numbers both remotely and in the local ledger,
    /// the state a prior reconciliation run leaves behind.
    async fn register_all_slots(f: &Fixture) -> Vec<String> {
        let mut numbers = Vec::new();
        for language in Language::ALL {
            let number = format!("NX90000{}", language.index());
            f.api
                .set_symbol_state(SYMBOL, |state| {
                    state.matches = 1;
                    state.job_numbers.set(language, number.clone());
                })
                .await;
            f.allocator
                .register(SYMBOL, language, &number)
                .await
                .unwrap();
            numbers.push(number);
        }
        numbers
    }

    #[tokio::test]
    async fn unknown_symbol_short_circuits() {
        let f = fixture(quick_config());

        let reports = f.orchestrator.transfer(SYMBOL).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].result, TransferResult::SymbolNotFound);
        assert_eq!(reports[0].language, None);
        assert_eq!(reports[0].jobnumber, None);
        assert!(f.api.uploads().await.is_empty());
    }

    #[tokio::test]
    async fn sends_available_files_and_releases_the_rest() {
        let f = fixture(quick_config());
        register_all_slots(&f).await;
        for language in [Language::En, Language::Fr, Language::Es] {
            f.files.add(SYMBOL, language, b"%PDF-1.4 fake body").await;
        }

        let reports = f.orchestrator.transfer(SYMBOL).await.unwrap();

        assert_eq!(reports.len(), 7);
        let sent: Vec<_> = reports
            .iter()
            .filter(|r| r.result == TransferResult::SentOk)
            .collect();
        let missing: Vec<_> = reports
            .iter()
            .filter(|r| r.result == TransferResult::FileNotFound)
            .collect();
        assert_eq!(sent.len(), 3);
        assert_eq!(missing.len(), 4);

        // The four unused numbers are gone, the three used ones remain.
        let remaining = f.store.all().await.unwrap();
        assert_eq!(remaining.len(), 3);
        for report in &sent {
            assert!(f
                .store
                .contains(report.jobnumber.as_deref().unwrap())
                .await
                .unwrap());
        }

        let uploads = f.api.uploads().await;
        assert_eq!(uploads.len(), 3);
        for (upload, bytes) in &uploads {
            assert_eq!(upload.docsymbol, SYMBOL);
            assert_eq!(*bytes, b"%PDF-1.4 fake body".len() as u64);
        }
    }

    #[tokio::test]
    async fn upload_failure_is_not_sent_and_releases_the_number() {
        let f = fixture(quick_config());
        register_all_slots(&f).await;
        f.files.add(SYMBOL, Language::En, b"body").await;
        f.api.fail_upload_for(Language::En).await;

        let reports = f.orchestrator.transfer(SYMBOL).await.unwrap();

        let en = reports
            .iter()
            .find(|r| r.language == Some(Language::En))
            .unwrap();
        assert_eq!(en.result, TransferResult::NotSent);
        // Not sent means not used; the number joins the released set.
        assert!(!f
            .store
            .contains(en.jobnumber.as_deref().unwrap())
            .await
            .unwrap());
        assert!(f.api.uploads().await.is_empty());
        // Every slot was seen and none sent, so the ledger drains.
        assert!(f.store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_failure_reports_file_not_found() {
        let f = fixture(quick_config());
        register_all_slots(&f).await;
        f.files.add(SYMBOL, Language::En, b"body").await;
        f.files.fail_downloads().await;

        let reports = f.orchestrator.transfer(SYMBOL).await.unwrap();

        let en = reports
            .iter()
            .find(|r| r.language == Some(Language::En))
            .unwrap();
        assert_eq!(en.result, TransferResult::FileNotFound);
        assert!(f.api.uploads().await.is_empty());
    }

    #[tokio::test]
    async fn unreleased_slot_gets_stamped_released_slot_does_not() {
        let f = fixture(quick_config());
        register_all_slots(&f).await;
        f.api
            .set_symbol_state(SYMBOL, |state| {
                // En carries the sentinel, Fr a real date, Es is empty.
                state
                    .release_dates
                    .set(Language::En, "1900-01-01T00:00:00Z".to_string());
                state
                    .release_dates
                    .set(Language::Fr, "2023-11-02T00:00:00Z".to_string());
            })
            .await;
        for language in [Language::En, Language::Fr, Language::Es] {
            f.files.add(SYMBOL, language, b"body").await;
        }

        f.orchestrator.transfer(SYMBOL).await.unwrap();

        let patches = f.api.patches().await;
        let patched: Vec<Language> = patches.iter().map(|(_, l, _)| *l).collect();
        assert!(patched.contains(&Language::En));
        assert!(patched.contains(&Language::Es));
        assert!(!patched.contains(&Language::Fr));
        for (_, _, date) in &patches {
            assert!(date.ends_with('Z'));
            assert_ne!(date, "1900-01-01T00:00:00Z");
        }
    }

    #[tokio::test]
    async fn slot_without_number_is_not_sent() {
        let f = fixture(quick_config());
        f.api
            .set_symbol_state(SYMBOL, |state| {
                state.matches = 1;
                state.job_numbers.set(Language::En, "NX900002".to_string());
            })
            .await;
        f.allocator
            .register(SYMBOL, Language::En, "NX900002")
            .await
            .unwrap();
        f.files.add(SYMBOL, Language::En, b"body").await;
        f.files.add(SYMBOL, Language::De, b"body").await;

        let reports = f.orchestrator.transfer(SYMBOL).await.unwrap();

        let de = reports
            .iter()
            .find(|r| r.language == Some(Language::De))
            .unwrap();
        // A file with no job number to send it under stays unsent.
        assert_eq!(de.result, TransferResult::NotSent);
        assert_eq!(de.jobnumber, None);
        assert_eq!(f.api.uploads().await.len(), 1);
    }

    #[tokio::test]
    async fn scratch_root_is_empty_after_a_run() {
        let root = tempfile::tempdir().unwrap();
        let config = quick_config().with_scratch_root(root.path());
        let f = fixture(config);
        register_all_slots(&f).await;
        f.files.add(SYMBOL, Language::En, b"body").await;
        f.files.add(SYMBOL, Language::Ru, b"body").await;
        f.api.fail_upload_for(Language::Ru).await;

        f.orchestrator.transfer(SYMBOL).await.unwrap();

        // Success or failure, the per-run scratch directory is gone.
        let entries: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn batch_continues_past_failures() {
        let f = fixture(quick_config());
        register_all_slots(&f).await;
        f.files.add(SYMBOL, Language::En, b"body").await;

        let items = f
            .orchestrator
            .transfer_batch(&["A/UNKNOWN/9".to_string(), SYMBOL.to_string()])
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].result.as_ref().unwrap()[0].result,
            TransferResult::SymbolNotFound
        );
        let sent = items[1]
            .result
            .as_ref()
            .unwrap()
            .iter()
            .filter(|r| r.result == TransferResult::SentOk)
            .count();
        assert_eq!(sent, 1);
    }
}
