//! Loading-API surface: wire types and the client trait.
//!
//! Everything the pipeline needs from the remote loading system goes
//! through [`OdsApi`], so reconciliation and transfer can be exercised
//! against fakes. The reqwest implementation lives in [`client`].

pub mod client;
pub mod token;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OdsError;
use crate::language::{Language, LanguageMap};
use crate::model::RemoteSymbolState;

pub use client::OdsClient;
pub use token::TokenProvider;

/// Remote operations used by the allocator, reconciler and orchestrator.
#[async_trait]
pub trait OdsApi: Send + Sync {
    /// Fetch the loading system's current view of a symbol.
    async fn symbol_lookup(&self, docsymbol: &str) -> Result<RemoteSymbolState, OdsError>;

    /// Whether a job number is already registered remotely.
    async fn number_exists(&self, jobnumber: &str) -> Result<bool, OdsError>;

    /// Create or update a symbol's metadata registration.
    async fn write_symbol(&self, payload: &SymbolPayload) -> Result<(), OdsError>;

    /// Set the release date for one language slot.
    async fn patch_release_date(
        &self,
        docsymbol: &str,
        language: Language,
        release_date: &str,
    ) -> Result<(), OdsError>;

    /// Upload one file, tagged with its symbol and job number.
    async fn upload_file(&self, upload: &FileUpload, path: &Path) -> Result<(), OdsError>;
}

/// One per-language slot of a metadata write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSlot {
    pub job_number: String,
    pub release_date: String,
    pub title: String,
    pub full_text: String,
}

/// Body of `POST /api/loading/symbol`, camelCase to match the API.
///
/// `symbols`, `sessions` and `agendas` are three-element arrays with only
/// the first slot populated; the loading system reserves the others.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPayload {
    pub symbols: Vec<String>,
    pub sessions: Vec<String>,
    pub agendas: Vec<String>,
    pub area: String,
    pub distribution: String,
    pub tcodes: Vec<String>,
    pub publication_date: String,
    pub per_language: BTreeMap<String, LanguageSlot>,
}

impl SymbolPayload {
    /// Assemble a payload from central-DB facts and per-language slots.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        sessions: &str,
        agendas: &str,
        area: &str,
        distribution: &str,
        tcodes: Vec<String>,
        publication_date: &str,
        slots: &LanguageMap<LanguageSlot>,
    ) -> Self {
        let per_language = slots
            .iter()
            .map(|(lang, slot)| (lang.as_str().to_string(), slot.clone()))
            .collect();

        Self {
            symbols: vec![symbol.to_string(), String::new(), String::new()],
            sessions: vec![sessions.to_string(), String::new(), String::new()],
            agendas: vec![agendas.to_string(), String::new(), String::new()],
            area: area.to_string(),
            distribution: distribution.to_string(),
            tcodes,
            publication_date: publication_date.to_string(),
            per_language,
        }
    }

    /// Slot for a language, if present.
    pub fn slot(&self, language: Language) -> Option<&LanguageSlot> {
        self.per_language.get(language.as_str())
    }
}

/// Descriptor for a single file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub docsymbol: String,
    pub area: String,
    pub distribution: String,
    pub language: Language,
    pub jobnumber: String,
}

// --- wire response shapes -------------------------------------------------

/// Envelope wrapping every loading-API read response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub body: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeBody {
    pub meta: EnvelopeMeta,
    #[serde(default)]
    pub data: Vec<SymbolData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeMeta {
    pub matches: u32,
}

/// Positional per-symbol record as the API sends it.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SymbolData {
    #[serde(default)]
    pub job_numbers: Vec<String>,
    #[serde(default)]
    pub release_dates: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub agendas: String,
    #[serde(default)]
    pub sessions: String,
    #[serde(default)]
    pub tcodes: Vec<String>,
}

/// Acknowledgement from the write and upload endpoints.
///
/// `status == -1` is a remote-side validation failure carried in
/// `message`; it is treated as a rejection uniformly.
#[derive(Debug, Deserialize)]
pub(crate) struct WriteAck {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Pad or truncate a positional wire array into a [`LanguageMap`].
///
/// The API contract fixes the ordering as AR, ZH, EN, FR, RU, ES, DE;
/// this is the only place that ordering is assumed.
pub(crate) fn seven_slots(mut values: Vec<String>) -> LanguageMap<String> {
    values.resize(7, String::new());
    LanguageMap::from_fn(|lang| std::mem::take(&mut values[lang.index()]))
}

impl SymbolData {
    pub(crate) fn into_state(self, matches: u32) -> RemoteSymbolState {
        RemoteSymbolState {
            matches,
            job_numbers: seven_slots(self.job_numbers),
            release_dates: seven_slots(self.release_dates),
            title: self.title,
            agendas: self.agendas,
            sessions: self.sessions,
            tcodes: self.tcodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_camel_case() {
        let mut slots: LanguageMap<LanguageSlot> = LanguageMap::default();
        slots.set(
            Language::En,
            LanguageSlot {
                job_number: "NX900002".to_string(),
                release_date: "2024-05-01T00:00:00Z".to_string(),
                title: "Report of the Secretary-General".to_string(),
                full_text: String::new(),
            },
        );

        let payload = SymbolPayload::new(
            "A/RES/75/1",
            "75",
            "12a",
            "UNDOC",
            "GENERAL",
            vec!["T001".to_string()],
            "2024-05-01T00:00:00Z",
            &slots,
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["symbols"][0], "A/RES/75/1");
        assert_eq!(json["symbols"][1], "");
        assert_eq!(json["publicationDate"], "2024-05-01T00:00:00Z");
        assert_eq!(json["perLanguage"]["EN"]["jobNumber"], "NX900002");
        assert_eq!(json["perLanguage"]["EN"]["fullText"], "");
        assert_eq!(json["perLanguage"]["AR"]["title"], "");
    }

    #[test]
    fn envelope_deserializes() {
        let raw = r#"{
            "body": {
                "meta": { "matches": 1 },
                "data": [{
                    "job_numbers": ["NX1", "NX2", "NX3", "NX4", "NX5", "NX6", "NX7"],
                    "release_dates": ["", "", "2024-01-01T00:00:00Z", "", "", "", ""],
                    "title": "A title",
                    "agendas": "5",
                    "sessions": "75",
                    "tcodes": ["T1"]
                }]
            }
        }"#;

        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.body.meta.matches, 1);
        let state = envelope
            .body
            .data
            .into_iter()
            .next()
            .unwrap()
            .into_state(1);
        assert_eq!(state.job_number(Language::Ar), Some("NX1"));
        assert_eq!(state.job_number(Language::De), Some("NX7"));
        assert_eq!(state.release_dates.get(Language::En), "2024-01-01T00:00:00Z");
        assert_eq!(state.title, "A title");
    }

    #[test]
    fn short_wire_arrays_pad_to_empty() {
        let slots = seven_slots(vec!["NX1".to_string(), "NX2".to_string()]);
        assert_eq!(slots.get(Language::Ar), "NX1");
        assert_eq!(slots.get(Language::Zh), "NX2");
        assert_eq!(slots.get(Language::En), "");
        assert_eq!(slots.get(Language::De), "");
    }

    #[test]
    fn ack_parses_optional_message() {
        let ack: WriteAck =
            serde_json::from_str(r#"{"status": -1, "message": "bad tcode"}"#).unwrap();
        assert_eq!(ack.status, -1);
        assert_eq!(ack.message.as_deref(), Some("bad tcode"));

        let ack: WriteAck = serde_json::from_str(r#"{"status": 1}"#).unwrap();
        assert_eq!(ack.status, 1);
        assert!(ack.message.is_none());
    }
}
