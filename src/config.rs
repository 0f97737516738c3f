//! Pipeline configuration.

use std::path::PathBuf;

use crate::language::Language;

/// Configuration for the ODS loading pipeline.
///
/// Credentials and the base URL come from the deployment; everything else
/// has defaults matching the observed loading-system conventions.
#[derive(Clone)]
pub struct OdsConfig {
    /// Base URL of the loading API, e.g. `https://ods.example.org/`.
    pub base_url: String,

    /// Credential components exchanged for a bearer token.
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,

    /// Site prefix namespacing the job-number sequence.
    pub prefix: String,

    /// First numeric suffix issued under an empty prefix history.
    pub number_base: u64,

    /// Document area constant sent with every payload.
    pub area: String,

    /// Which per-language slot carries the title on a metadata write.
    ///
    /// The source system only ever populated the English slot; this keeps
    /// that a convention rather than a structural fact.
    pub title_language: Language,

    /// Explicit "never released" sentinel value, in addition to empty
    /// slots. A release date matching this is treated as unset.
    pub release_sentinel: String,

    /// How many candidate numbers to probe before giving up an allocation.
    pub max_allocation_attempts: u32,

    /// Baseline pause between per-language file uploads (ms).
    pub transfer_interval_ms: u64,

    /// Root under which per-run scratch directories are created.
    /// `None` uses the system temp directory.
    pub scratch_root: Option<PathBuf>,
}

impl OdsConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_number_base(mut self, base: u64) -> Self {
        self.number_base = base;
        self
    }

    pub fn with_title_language(mut self, language: Language) -> Self {
        self.title_language = language;
        self
    }

    pub fn with_transfer_interval_ms(mut self, interval: u64) -> Self {
        self.transfer_interval_ms = interval;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_max_allocation_attempts(mut self, attempts: u32) -> Self {
        self.max_allocation_attempts = attempts.max(1);
        self
    }
}

impl Default for OdsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            prefix: "NX".to_string(),
            number_base: 900_000,
            area: "UNDOC".to_string(),
            title_language: Language::En,
            release_sentinel: "1900-01-01T00:00:00Z".to_string(),
            max_allocation_attempts: 50,
            transfer_interval_ms: 2_000,
            scratch_root: None,
        }
    }
}

// Credentials stay out of debug output.
impl std::fmt::Debug for OdsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdsConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("prefix", &self.prefix)
            .field("number_base", &self.number_base)
            .field("area", &self.area)
            .field("title_language", &self.title_language)
            .field("max_allocation_attempts", &self.max_allocation_attempts)
            .field("transfer_interval_ms", &self.transfer_interval_ms)
            .field("scratch_root", &self.scratch_root)
            .finish()
    }
}

impl OdsConfig {
    /// True when `date` means "never released".
    pub fn is_unreleased(&self, date: &str) -> bool {
        let trimmed = date.trim();
        trimmed.is_empty() || trimmed == self.release_sentinel
    }
}
