//! Remote existence checks against the loading system.

use std::sync::Arc;

use tracing::debug;

use crate::api::OdsApi;
use crate::error::OdsError;
use crate::model::RemoteSymbolState;

/// Registration state of a symbol in the loading system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPresence {
    /// No registration; candidate for create.
    Unknown,
    /// Exactly one registration; candidate for update.
    Registered,
    /// More than one registration; terminal conflict, never auto-resolved.
    Duplicate,
}

impl SymbolPresence {
    pub fn classify(matches: u32) -> Self {
        match matches {
            0 => SymbolPresence::Unknown,
            1 => SymbolPresence::Registered,
            _ => SymbolPresence::Duplicate,
        }
    }
}

/// Answers "does this symbol/number already exist remotely".
///
/// A failed lookup surfaces as [`OdsError::LookupFailed`] and is never
/// collapsed into "unknown" - that misreading would trigger a create over
/// an existing registration.
pub struct ExistenceOracle<A> {
    api: Arc<A>,
}

impl<A: OdsApi> ExistenceOracle<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Fresh view of a symbol. Never cached.
    pub async fn lookup(&self, docsymbol: &str) -> Result<RemoteSymbolState, OdsError> {
        let state = self.api.symbol_lookup(docsymbol).await?;
        debug!(
            docsymbol = %docsymbol,
            matches = state.matches,
            presence = ?SymbolPresence::classify(state.matches),
            "Oracle lookup"
        );
        Ok(state)
    }

    /// Whether a job number is already registered remotely.
    pub async fn number_exists(&self, jobnumber: &str) -> Result<bool, OdsError> {
        self.api.number_exists(jobnumber).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::testkit::FakeApi;

    #[test]
    fn classification_boundaries() {
        assert_eq!(SymbolPresence::classify(0), SymbolPresence::Unknown);
        assert_eq!(SymbolPresence::classify(1), SymbolPresence::Registered);
        assert_eq!(SymbolPresence::classify(2), SymbolPresence::Duplicate);
        assert_eq!(SymbolPresence::classify(17), SymbolPresence::Duplicate);
    }

    #[tokio::test]
    async fn lookup_failure_is_not_unknown() {
        let api = FakeApi::new();
        api.fail_symbol_lookup().await;
        let oracle = ExistenceOracle::new(Arc::new(api));

        let err = oracle.lookup("A/RES/75/1").await.unwrap_err();
        assert!(matches!(err, OdsError::LookupFailed(_)));
    }

    #[tokio::test]
    async fn lookup_passes_remote_state_through() {
        let api = FakeApi::new();
        api.set_symbol_state("A/RES/75/1", |state| {
            state.matches = 1;
            state.job_numbers.set(Language::En, "NX900002".to_string());
        })
        .await;
        let oracle = ExistenceOracle::new(Arc::new(api));

        let state = oracle.lookup("A/RES/75/1").await.unwrap();
        assert_eq!(state.matches, 1);
        assert_eq!(state.job_number(Language::En), Some("NX900002"));
    }
}
