//! Synchronization core for loading United Nations documents into the
//! Official Document System.
//!
//! The pipeline keeps a local job-number ledger consistent with the
//! remote loading system and moves documents in two phases:
//!
//! - [`reconcile::Reconciler`] compares the central bibliographic
//!   database with the loading system's registration for a symbol and
//!   creates or updates the metadata, allocating job numbers for empty
//!   language slots via [`allocator::JobNumberAllocator`].
//! - [`transfer::TransferOrchestrator`] resolves and downloads the
//!   latest source file per language and uploads each under its job
//!   number, stamping release dates and releasing numbers that turned
//!   out to have no file behind them.
//!
//! All remote traffic goes through the [`api::OdsApi`] seam; the reqwest
//! client in [`api::client`] is the production implementation.

pub mod activity;
pub mod allocator;
pub mod api;
pub mod catalogue;
pub mod config;
pub mod error;
pub mod language;
pub mod ledger;
pub mod model;
pub mod oracle;
pub mod pacing;
pub mod reconcile;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testkit;

pub use activity::{ActivityLog, Actor, MemoryActivityLog};
pub use allocator::{JobNumberAllocator, ReleaseOutcome};
pub use api::{OdsApi, OdsClient, TokenProvider};
pub use catalogue::{CatalogueSource, FileStore, HttpFileStore, SourceFile};
pub use config::OdsConfig;
pub use error::OdsError;
pub use language::{Language, LanguageMap};
pub use ledger::{FileLedger, LedgerStore, MemoryLedger};
pub use model::{
    CbMetadataSnapshot, JobNumberRecord, ReconcileOutcome, ReconcileStatus, RemoteSymbolState,
    TransferReport, TransferResult,
};
pub use reconcile::{ReconcileBatchItem, Reconciler};
pub use transfer::{TransferBatchItem, TransferOrchestrator};
