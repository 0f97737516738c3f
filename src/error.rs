//! Error taxonomy for the ODS loading pipeline.

/// Errors surfaced by the loading pipeline.
///
/// Per-symbol and per-language failures are caught at their loop boundary
/// and turned into report entries; these variants are what crosses a
/// component boundary before that happens.
#[derive(Debug, thiserror::Error)]
pub enum OdsError {
    /// Token exchange with the loading API failed.
    #[error("authentication with the loading API failed: {0}")]
    AuthFailed(String),

    /// Symbol or number lookup against the loading API failed.
    ///
    /// Never interpreted as "symbol unknown" - an erroneous create over an
    /// existing registration would follow from that.
    #[error("lookup against the loading API failed: {0}")]
    LookupFailed(String),

    /// Every candidate number was already registered remotely.
    #[error("no free job number under prefix {prefix} after {attempts} attempts")]
    AllocationConflict { prefix: String, attempts: u32 },

    /// The write endpoint rejected the metadata payload (status = -1).
    /// Carries the remote message verbatim.
    #[error("loading API rejected the metadata write: {0}")]
    RemoteWriteRejected(String),

    /// A resolved source file could not be retrieved from the file store.
    #[error("source file download failed: {0}")]
    DownloadFailed(String),

    /// File upload to the loading API failed.
    #[error("file upload failed: {0}")]
    UploadFailed(String),

    /// The job-number ledger could not be read or written.
    #[error("ledger persistence error: {0}")]
    PersistenceError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OdsError {
    /// Short tag for report entries and activity records.
    pub fn kind(&self) -> &'static str {
        match self {
            OdsError::AuthFailed(_) => "auth_failed",
            OdsError::LookupFailed(_) => "lookup_failed",
            OdsError::AllocationConflict { .. } => "allocation_conflict",
            OdsError::RemoteWriteRejected(_) => "remote_write_rejected",
            OdsError::DownloadFailed(_) => "download_failed",
            OdsError::UploadFailed(_) => "upload_failed",
            OdsError::PersistenceError(_) => "persistence_error",
            OdsError::Io(_) => "io",
        }
    }
}
