//! SQLite implementation of the review state store

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use tribunal_core::persist::StateStore;
use tribunal_core::review::{ProposalId, ReviewRequest, Vote};
use tribunal_core::workflow::ProposalReviewState;

use crate::schema::{ProposalRow, RequestRow, VoteRow};
use crate::{Error, Result};

/// Review state store backed by SQLite
///
/// Every save is checked against the `revision` column of the proposal row
/// and bumps it; a copy loaded before another writer's save is rejected with
/// [`Error::Conflict`]. Requests and votes are written with `INSERT OR IGNORE`,
/// so a save never rewrites history.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Create a store over an open pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_state(&self, proposal: &ProposalId) -> Result<Option<ProposalReviewState>> {
        let key = proposal.to_string();

        let row: Option<ProposalRow> = sqlx::query_as(
            "SELECT proposal_id, proposal_task, status, status_round, revision, created_at, updated_at
             FROM proposals
             WHERE proposal_id = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let requests: Vec<RequestRow> = sqlx::query_as(
            "SELECT name, task_id, requested_at
             FROM review_requests
             WHERE proposal_id = ?
             ORDER BY round, axis",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;

        let votes: Vec<VoteRow> = sqlx::query_as(
            "SELECT request_name, value, reviewer, note, cast_at
             FROM votes
             WHERE proposal_id = ?",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;

        let requests = requests
            .into_iter()
            .map(ReviewRequest::try_from)
            .collect::<Result<Vec<_>>>()?;
        let votes = votes
            .into_iter()
            .map(Vote::try_from)
            .collect::<Result<Vec<_>>>()?;

        let state = ProposalReviewState::restore(
            row.proposal()?,
            row.task(),
            row.status()?,
            requests,
            votes,
            row.created_at,
            row.updated_at,
        )
        .map_err(|e| Error::InvalidData(e.to_string()))?
        .at_revision(row.revision()?);

        Ok(Some(state))
    }

    async fn save_state(&self, state: &ProposalReviewState) -> Result<()> {
        let key = state.proposal.to_string();
        let status = state.status();

        let mut tx = self.pool.begin().await?;

        let expected = state.revision();
        let conflict = || Error::Conflict {
            proposal: key.clone(),
            expected,
        };

        if expected == 0 {
            let inserted = sqlx::query(
                "INSERT INTO proposals (proposal_id, proposal_task, status, status_round, revision, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 1, ?, ?)",
            )
            .bind(key.as_str())
            .bind(state.proposal_task.as_str())
            .bind(status.as_str())
            .bind(status.round().map(i64::from))
            .bind(state.created_at)
            .bind(state.updated_at)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    return Err(conflict());
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            let stored = i64::try_from(expected).map_err(|_| conflict())?;
            let updated = sqlx::query(
                "UPDATE proposals
                 SET status = ?, status_round = ?, updated_at = ?, revision = revision + 1
                 WHERE proposal_id = ? AND revision = ?",
            )
            .bind(status.as_str())
            .bind(status.round().map(i64::from))
            .bind(state.updated_at)
            .bind(key.as_str())
            .bind(stored)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(conflict());
            }
        }

        for request in state.requests() {
            sqlx::query(
                "INSERT OR IGNORE INTO review_requests (name, proposal_id, axis, round, task_id, requested_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(request.name.to_string())
            .bind(key.as_str())
            .bind(request.axis().to_string())
            .bind(i64::from(request.round()))
            .bind(request.task_id.as_str())
            .bind(request.requested_at)
            .execute(&mut *tx)
            .await?;
        }

        for vote in state.votes() {
            sqlx::query(
                "INSERT OR IGNORE INTO votes (request_name, proposal_id, value, reviewer, note, cast_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(vote.request.to_string())
            .bind(key.as_str())
            .bind(vote.value.as_str())
            .bind(vote.reviewer.as_deref())
            .bind(vote.note.as_deref())
            .bind(vote.cast_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            proposal = %state.proposal,
            status = %status,
            revision = expected + 1,
            "Saved review state"
        );
        Ok(())
    }

    async fn list_proposals(&self) -> Result<Vec<ProposalId>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT proposal_id FROM proposals ORDER BY created_at, proposal_id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id,)| id.parse::<ProposalId>().map_err(|e| Error::InvalidData(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, proposal: &ProposalId) -> tribunal_core::Result<Option<ProposalReviewState>> {
        Ok(self.load_state(proposal).await?)
    }

    async fn save(&self, state: &ProposalReviewState) -> tribunal_core::Result<()> {
        Ok(self.save_state(state).await?)
    }

    async fn list(&self) -> tribunal_core::Result<Vec<ProposalId>> {
        Ok(self.list_proposals().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use tempfile::TempDir;
    use tribunal_core::review::{Axis, VoteValue};
    use tribunal_core::store::TaskId;
    use tribunal_core::workflow::{ConsensusState, ProposalStatus};

    async fn store() -> (TempDir, SqliteStateStore) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("test.db")).await.unwrap();
        (temp_dir, db.state_store())
    }

    fn open_round(state: &mut ProposalReviewState, round: u32) {
        let requests = Axis::ALL
            .iter()
            .enumerate()
            .map(|(i, axis)| {
                ReviewRequest::new(
                    state.proposal.review_name(*axis, round).unwrap(),
                    TaskId::new(format!("R{}{}", round, i)),
                )
            })
            .collect();
        state.open_round(requests).unwrap();
    }

    fn vote(state: &mut ProposalReviewState, axis: Axis, round: u32, value: VoteValue) {
        let name = state.proposal.review_name(axis, round).unwrap();
        state.record_vote(Vote::new(name, value)).unwrap();
    }

    #[tokio::test]
    async fn test_load_missing() {
        let (_dir, store) = store().await;
        let proposal = ProposalId::proposal(1).unwrap();
        assert!(store.load(&proposal).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let proposal = ProposalId::followup(7).unwrap();

        {
            let store = Database::new(&path).await.unwrap().state_store();
            let mut state = ProposalReviewState::new(proposal.clone(), TaskId::from("P7"));
            open_round(&mut state, 1);
            vote(&mut state, Axis::A, 1, VoteValue::Accept);
            vote(&mut state, Axis::C, 1, VoteValue::Revise);
            store.save(&state).await.unwrap();

            let mut state = store.load(&proposal).await.unwrap().unwrap();
            open_round(&mut state, 2);
            store.save(&state).await.unwrap();
        }

        let store = Database::new(&path).await.unwrap().state_store();
        let state = store.load(&proposal).await.unwrap().unwrap();

        assert_eq!(state.proposal_task, TaskId::from("P7"));
        assert_eq!(state.status(), ProposalStatus::AwaitingReview { round: 2 });
        assert_eq!(state.requests().len(), 6);
        assert_eq!(
            state.requests()[3].name.to_string(),
            "FOLLOWUP_PROPOSAL-7-REVIEW-A-2"
        );
        assert_eq!(state.requests()[3].task_id, TaskId::from("R20"));
        assert_eq!(state.votes().count(), 2);
        assert_eq!(
            state.consensus(),
            ConsensusState::Pending {
                round: 2,
                awaiting: Axis::ALL.to_vec(),
            }
        );
        assert_eq!(store.list().await.unwrap(), vec![proposal]);
    }

    #[tokio::test]
    async fn test_vote_details_round_trip() {
        let (_dir, store) = store().await;
        let proposal = ProposalId::proposal(3).unwrap();
        let mut state = ProposalReviewState::new(proposal.clone(), TaskId::from("P3"));
        open_round(&mut state, 1);

        let name = proposal.review_name(Axis::B, 1).unwrap();
        state
            .record_vote(
                Vote::new(name.clone(), VoteValue::Revise)
                    .by("agent-b")
                    .with_note("no test for eviction"),
            )
            .unwrap();
        store.save(&state).await.unwrap();

        let loaded = store.load(&proposal).await.unwrap().unwrap();
        let vote = loaded.vote(&name).unwrap();
        assert_eq!(vote.value, VoteValue::Revise);
        assert_eq!(vote.reviewer.as_deref(), Some("agent-b"));
        assert_eq!(vote.note.as_deref(), Some("no test for eviction"));
    }

    #[tokio::test]
    async fn test_stale_copy_is_rejected() {
        let (_dir, store) = store().await;
        let proposal = ProposalId::proposal(4).unwrap();
        let mut state = ProposalReviewState::new(proposal.clone(), TaskId::from("P4"));
        open_round(&mut state, 1);
        vote(&mut state, Axis::A, 1, VoteValue::Accept);
        store.save(&state).await.unwrap();

        // a copy that never saw the vote must not erase it
        let mut stale = ProposalReviewState::new(proposal.clone(), TaskId::from("P4"));
        open_round(&mut stale, 1);
        let err = store.save(&stale).await.unwrap_err();
        assert!(matches!(
            err,
            tribunal_core::Error::StateConflict { expected: 0, .. }
        ));

        let loaded = store.load(&proposal).await.unwrap().unwrap();
        assert_eq!(loaded.revision(), 1);
        assert_eq!(loaded.votes().count(), 1);
    }

    /// Two handles on one database file, both holding a round 1 state in
    /// which A already accepted
    async fn two_writers(
        temp_dir: &TempDir,
        proposal: &ProposalId,
    ) -> (SqliteStateStore, SqliteStateStore) {
        let path = temp_dir.path().join("shared.db");
        let first = Database::new(&path).await.unwrap().state_store();
        let second = Database::new(&path).await.unwrap().state_store();

        let mut state = ProposalReviewState::new(proposal.clone(), TaskId::from("P6"));
        open_round(&mut state, 1);
        vote(&mut state, Axis::A, 1, VoteValue::Accept);
        first.save(&state).await.unwrap();
        (first, second)
    }

    #[tokio::test]
    async fn test_second_vote_on_same_request_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let proposal = ProposalId::proposal(6).unwrap();
        let (first, second) = two_writers(&temp_dir, &proposal).await;

        let mut mine = first.load(&proposal).await.unwrap().unwrap();
        let mut theirs = second.load(&proposal).await.unwrap().unwrap();

        vote(&mut mine, Axis::B, 1, VoteValue::Accept);
        first.save(&mine).await.unwrap();

        vote(&mut theirs, Axis::B, 1, VoteValue::Revise);
        let err = second.save(&theirs).await.unwrap_err();
        assert!(matches!(
            err,
            tribunal_core::Error::StateConflict { expected: 1, .. }
        ));

        // reloading surfaces the vote that won
        let mut reloaded = second.load(&proposal).await.unwrap().unwrap();
        let name = proposal.review_name(Axis::B, 1).unwrap();
        assert_eq!(reloaded.vote(&name).unwrap().value, VoteValue::Accept);
        let err = reloaded
            .record_vote(Vote::new(name, VoteValue::Revise))
            .unwrap_err();
        assert!(matches!(err, tribunal_core::Error::DuplicateVote { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_final_accepts_reach_consensus() {
        let temp_dir = TempDir::new().unwrap();
        let proposal = ProposalId::proposal(6).unwrap();
        let (first, second) = two_writers(&temp_dir, &proposal).await;

        let mut mine = first.load(&proposal).await.unwrap().unwrap();
        let mut theirs = second.load(&proposal).await.unwrap().unwrap();

        vote(&mut mine, Axis::B, 1, VoteValue::Accept);
        first.save(&mine).await.unwrap();

        vote(&mut theirs, Axis::C, 1, VoteValue::Accept);
        assert!(second.save(&theirs).await.is_err());

        let mut theirs = second.load(&proposal).await.unwrap().unwrap();
        vote(&mut theirs, Axis::C, 1, VoteValue::Accept);
        second.save(&theirs).await.unwrap();

        let loaded = first.load(&proposal).await.unwrap().unwrap();
        assert_eq!(loaded.revision(), 3);
        assert_eq!(loaded.votes().count(), 3);
        assert_eq!(loaded.status(), ProposalStatus::Consensus { round: 1 });
    }

    #[tokio::test]
    async fn test_terminal_status_persisted() {
        let (_dir, store) = store().await;
        let proposal = ProposalId::proposal(5).unwrap();
        let mut state = ProposalReviewState::new(proposal.clone(), TaskId::from("P5"));
        open_round(&mut state, 1);
        for axis in Axis::ALL {
            vote(&mut state, axis, 1, VoteValue::Accept);
        }
        store.save(&state).await.unwrap();

        let loaded = store.load(&proposal).await.unwrap().unwrap();
        assert_eq!(loaded.status(), ProposalStatus::Consensus { round: 1 });
        assert!(loaded.consensus().is_reached());
    }
}
