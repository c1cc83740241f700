//! Persistence of proposal review state

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::review::ProposalId;
use crate::workflow::ProposalReviewState;
use crate::{Error, Result};

/// Storage for [`ProposalReviewState`] records, keyed by proposal
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state of a proposal, if it was ever registered
    async fn load(&self, proposal: &ProposalId) -> Result<Option<ProposalReviewState>>;

    /// Insert or update the state of a proposal
    ///
    /// The save only succeeds if the stored revision still equals
    /// `state.revision()` (no stored record counts as revision 0); otherwise
    /// it fails with [`Error::StateConflict`](crate::Error::StateConflict)
    /// and writes nothing. A successful save bumps the stored revision by one.
    ///
    /// Requests and votes are append-only: implementations never drop or
    /// rewrite a request or vote that was already saved.
    async fn save(&self, state: &ProposalReviewState) -> Result<()>;

    /// All proposals with stored state
    async fn list(&self) -> Result<Vec<ProposalId>>;
}

/// State store held in memory
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<BTreeMap<ProposalId, ProposalReviewState>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, proposal: &ProposalId) -> Result<Option<ProposalReviewState>> {
        Ok(self.states.read().await.get(proposal).cloned())
    }

    async fn save(&self, state: &ProposalReviewState) -> Result<()> {
        let mut states = self.states.write().await;

        let stored = states.get(&state.proposal).map_or(0, |s| s.revision());
        if stored != state.revision() {
            return Err(Error::StateConflict {
                proposal: state.proposal.to_string(),
                expected: state.revision(),
            });
        }

        states.insert(
            state.proposal.clone(),
            state.clone().at_revision(stored + 1),
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProposalId>> {
        Ok(self.states.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskId;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStateStore::new();
        let proposal = ProposalId::followup(2).unwrap();
        assert!(store.load(&proposal).await.unwrap().is_none());

        let state = ProposalReviewState::new(proposal.clone(), TaskId::from("T1"));
        store.save(&state).await.unwrap();

        let loaded = store.load(&proposal).await.unwrap().unwrap();
        assert_eq!(loaded.revision(), 1);
        assert_eq!(loaded, state.at_revision(1));
        assert_eq!(store.list().await.unwrap(), vec![proposal]);
    }

    #[tokio::test]
    async fn test_stale_save_rejected() {
        let store = MemoryStateStore::new();
        let proposal = ProposalId::proposal(1).unwrap();
        store
            .save(&ProposalReviewState::new(proposal.clone(), TaskId::from("T1")))
            .await
            .unwrap();

        let first = store.load(&proposal).await.unwrap().unwrap();
        let second = first.clone();
        store.save(&first).await.unwrap();

        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, Error::StateConflict { expected: 1, .. }));
        assert_eq!(store.load(&proposal).await.unwrap().unwrap().revision(), 2);
    }
}
