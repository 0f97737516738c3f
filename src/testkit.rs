//! Shared fakes for exercising the pipeline without a network.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::{FileUpload, OdsApi, SymbolPayload};
use crate::catalogue::{CatalogueSource, FileStore, SourceFile};
use crate::error::OdsError;
use crate::language::Language;
use crate::model::{CbMetadataSnapshot, RemoteSymbolState};

#[derive(Default)]
struct FakeApiState {
    symbols: HashMap<String, RemoteSymbolState>,
    existing_numbers: HashSet<String>,
    written: Vec<SymbolPayload>,
    patches: Vec<(String, Language, String)>,
    uploads: Vec<(FileUpload, u64)>,
    fail_lookup: bool,
    fail_search: bool,
    reject_write: Option<String>,
    fail_upload_for: HashSet<Language>,
}

/// Scripted loading API: serves configured symbol states and records
/// every write, patch and upload.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeApiState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_symbol_state(
        &self,
        docsymbol: &str,
        configure: impl FnOnce(&mut RemoteSymbolState),
    ) {
        let mut state = self.state.lock().await;
        let entry = state.symbols.entry(docsymbol.to_string()).or_default();
        configure(entry);
    }

    pub async fn set_existing_numbers(&self, numbers: &[&str]) {
        let mut state = self.state.lock().await;
        state.existing_numbers = numbers.iter().map(|n| n.to_string()).collect();
    }

    pub async fn fail_symbol_lookup(&self) {
        self.state.lock().await.fail_lookup = true;
    }

    pub async fn fail_number_search(&self) {
        self.state.lock().await.fail_search = true;
    }

    pub async fn reject_writes(&self, message: &str) {
        self.state.lock().await.reject_write = Some(message.to_string());
    }

    pub async fn accept_writes(&self) {
        self.state.lock().await.reject_write = None;
    }

    pub async fn fail_upload_for(&self, language: Language) {
        self.state.lock().await.fail_upload_for.insert(language);
    }

    pub async fn written(&self) -> Vec<SymbolPayload> {
        self.state.lock().await.written.clone()
    }

    pub async fn patches(&self) -> Vec<(String, Language, String)> {
        self.state.lock().await.patches.clone()
    }

    pub async fn uploads(&self) -> Vec<(FileUpload, u64)> {
        self.state.lock().await.uploads.clone()
    }
}

#[async_trait]
impl OdsApi for FakeApi {
    async fn symbol_lookup(&self, docsymbol: &str) -> Result<RemoteSymbolState, OdsError> {
        let state = self.state.lock().await;
        if state.fail_lookup {
            return Err(OdsError::LookupFailed("scripted lookup failure".to_string()));
        }
        Ok(state.symbols.get(docsymbol).cloned().unwrap_or_default())
    }

    async fn number_exists(&self, jobnumber: &str) -> Result<bool, OdsError> {
        let state = self.state.lock().await;
        if state.fail_search {
            return Err(OdsError::LookupFailed("scripted search failure".to_string()));
        }
        Ok(state.existing_numbers.contains(jobnumber))
    }

    async fn write_symbol(&self, payload: &SymbolPayload) -> Result<(), OdsError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.reject_write {
            return Err(OdsError::RemoteWriteRejected(message.clone()));
        }
        state.written.push(payload.clone());
        Ok(())
    }

    async fn patch_release_date(
        &self,
        docsymbol: &str,
        language: Language,
        release_date: &str,
    ) -> Result<(), OdsError> {
        self.state.lock().await.patches.push((
            docsymbol.to_string(),
            language,
            release_date.to_string(),
        ));
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload, path: &Path) -> Result<(), OdsError> {
        let mut state = self.state.lock().await;
        if state.fail_upload_for.contains(&upload.language) {
            return Err(OdsError::UploadFailed("scripted upload failure".to_string()));
        }
        // The orchestrator must hand over a real downloaded file.
        let bytes = std::fs::read(path)?;
        state.uploads.push((upload.clone(), bytes.len() as u64));
        Ok(())
    }
}

/// Scripted central database.
#[derive(Default)]
pub(crate) struct FakeCatalogue {
    snapshots: Mutex<HashMap<String, CbMetadataSnapshot>>,
}

impl FakeCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, snapshot: CbMetadataSnapshot) {
        self.snapshots
            .lock()
            .await
            .insert(snapshot.symbol.clone(), snapshot);
    }

    /// A plausible snapshot with the given title.
    pub fn snapshot(symbol: &str, title: &str) -> CbMetadataSnapshot {
        CbMetadataSnapshot {
            symbol: symbol.to_string(),
            distribution: "GENERAL".to_string(),
            area: "UNDOC".to_string(),
            publication_date: "2024-05-01T00:00:00Z".to_string(),
            sessions: "75".to_string(),
            title: title.to_string(),
            agendas: "12a".to_string(),
            tcodes: vec!["T001".to_string()],
        }
    }
}

#[async_trait]
impl CatalogueSource for FakeCatalogue {
    async fn snapshot(&self, docsymbol: &str) -> Result<Option<CbMetadataSnapshot>, OdsError> {
        Ok(self.snapshots.lock().await.get(docsymbol).cloned())
    }
}

/// Scripted file store: files keyed by symbol/language, downloads write
/// the bytes to the requested destination.
#[derive(Default)]
pub(crate) struct FakeFileStore {
    files: Mutex<HashMap<(String, Language), Vec<u8>>>,
    fail_download: Mutex<bool>,
}

impl FakeFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, docsymbol: &str, language: Language, bytes: &[u8]) {
        self.files
            .lock()
            .await
            .insert((docsymbol.to_string(), language), bytes.to_vec());
    }

    pub async fn fail_downloads(&self) {
        *self.fail_download.lock().await = true;
    }
}

#[async_trait]
impl FileStore for FakeFileStore {
    async fn latest(
        &self,
        docsymbol: &str,
        language: Language,
    ) -> Result<Option<SourceFile>, OdsError> {
        let files = self.files.lock().await;
        if !files.contains_key(&(docsymbol.to_string(), language)) {
            return Ok(None);
        }
        Ok(Some(SourceFile {
            filename: format!("{}-{}.pdf", docsymbol.replace('/', "_"), language),
            uri: format!("fake://{}/{}", docsymbol, language),
        }))
    }

    async fn download(&self, file: &SourceFile, dest: &Path) -> Result<u64, OdsError> {
        if *self.fail_download.lock().await {
            return Err(OdsError::DownloadFailed("scripted download failure".to_string()));
        }

        // Recover the key from the fake URI.
        let rest = file
            .uri
            .strip_prefix("fake://")
            .ok_or_else(|| OdsError::DownloadFailed(format!("unknown uri {}", file.uri)))?;
        let (symbol, lang) = rest
            .rsplit_once('/')
            .ok_or_else(|| OdsError::DownloadFailed(format!("unknown uri {}", file.uri)))?;
        let language: Language = lang
            .parse()
            .map_err(|_| OdsError::DownloadFailed(format!("unknown language in {}", file.uri)))?;

        let files = self.files.lock().await;
        let bytes = files
            .get(&(symbol.to_string(), language))
            .ok_or_else(|| OdsError::DownloadFailed(format!("no bytes for {}", file.uri)))?;

        tokio::fs::write(dest, bytes).await?;
        Ok(bytes.len() as u64)
    }
}
