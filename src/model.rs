//! Core data types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::{Language, LanguageMap};

/// One entry in the job-number ledger.
///
/// Created lazily on first need, re-registered (upsert on
/// `jobnumber_value`) when the loading system turns out to already hold a
/// number for the slot, and deleted only when a transfer run proves the
/// number unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNumberRecord {
    pub created_date: DateTime<Utc>,
    pub jobnumber_value: String,
    pub docsymbol: String,
    pub language: Language,
}

/// The loading system's view of a symbol, fetched on demand.
///
/// `matches` classifies the registration state: 0 = unknown, 1 = exactly
/// one registration, >1 = duplicate conflict. Never cached across
/// reconciliation calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSymbolState {
    pub matches: u32,
    pub job_numbers: LanguageMap<String>,
    pub release_dates: LanguageMap<String>,
    pub title: String,
    pub agendas: String,
    pub sessions: String,
    pub tcodes: Vec<String>,
}

impl RemoteSymbolState {
    /// Job number for a language, `None` when the slot is empty.
    pub fn job_number(&self, language: Language) -> Option<&str> {
        let value = self.job_numbers.get(language).trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// Bibliographic facts pulled from the central database for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CbMetadataSnapshot {
    pub symbol: String,
    pub distribution: String,
    pub area: String,
    pub publication_date: String,
    pub sessions: String,
    pub title: String,
    pub agendas: String,
    pub tcodes: Vec<String>,
}

/// Outcome of one reconciliation state-machine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileStatus {
    /// Symbol was unknown remotely; a full registration was created.
    Created,
    /// Symbol was registered; metadata was updated in place.
    Updated,
    /// More than one remote registration; nothing was allocated or written.
    Conflict,
    /// The central database has no record for the symbol.
    NotInSource,
}

impl ReconcileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStatus::Created => "CREATED",
            ReconcileStatus::Updated => "UPDATED",
            ReconcileStatus::Conflict => "CONFLICT",
            ReconcileStatus::NotInSource => "NOT_IN_SOURCE",
        }
    }
}

impl std::fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-symbol result of a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub docsymbol: String,
    pub status: ReconcileStatus,
    /// Job numbers per language after the run, `None` for untouched slots.
    pub job_numbers: LanguageMap<Option<String>>,
    /// How many fresh numbers this run allocated.
    pub allocated: usize,
}

impl ReconcileOutcome {
    pub fn terminal(docsymbol: impl Into<String>, status: ReconcileStatus) -> Self {
        Self {
            docsymbol: docsymbol.into(),
            status,
            job_numbers: LanguageMap::default(),
            allocated: 0,
        }
    }
}

/// Per-language result of a transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferResult {
    /// Downloaded and uploaded, job number registered as used.
    SentOk,
    /// Upload failed, or the slot had no job number to send under.
    NotSent,
    /// The file store holds no file for this symbol/language.
    FileNotFound,
    /// The symbol is unknown to the loading system; nothing was attempted.
    SymbolNotFound,
}

/// One entry per (docsymbol, language) in a transfer run's report.
///
/// `language` is `None` only for the single `SymbolNotFound` entry of a
/// short-circuited run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    pub filename: String,
    pub docsymbol: String,
    pub language: Option<Language>,
    pub jobnumber: Option<String>,
    pub result: TransferResult,
}
