//! Review coordinator
//!
//! The coordinator spawns one review task per axis for a proposal, records
//! the votes reviewers cast, and decides when the proposal has consensus:
//! 1. `request_review` creates `{proposal}-REVIEW-{A,B,C}-{round}` tasks
//! 2. reviewers vote ACCEPT or REVISE, in any order
//! 3. all ACCEPT ends the review; any REVISE lets `advance` open a full new round
//!
//! The Task Store only ever receives appends: new tasks and new comments.
//! Proposal content is never modified.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::proposal::{ConsensusState, ProposalReviewState};
use super::state::ProposalStatus;
use crate::config::{ExhaustionPolicy, ReviewConfig};
use crate::persist::StateStore;
use crate::review::{
    Axis, ProposalId, ReviewBrief, ReviewRequest, ReviewTaskName, Vote, VoteTag, VoteValue,
};
use crate::store::{TaskId, TaskStore};
use crate::{Error, Result};

/// Load-modify-save attempts before a concurrent writer wins outright
const SAVE_ATTEMPTS: u32 = 5;

/// Result of trying to move a proposal to its next round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A new round of reviewers was spawned
    Requested {
        round: u32,
        requests: Vec<ReviewRequest>,
    },
    /// The round bound ran out and the proposal was accepted as it stands
    ForceAccepted { round: u32 },
    /// The latest round has not asked for revision; nothing was done
    Unchanged(ConsensusState),
}

/// Coordinates three-axis review of proposals
pub struct ReviewCoordinator {
    tasks: Arc<dyn TaskStore>,
    states: Arc<dyn StateStore>,
    config: ReviewConfig,
    call_timeout: Duration,
    // Serialises load-modify-save cycles on review state
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ReviewCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewCoordinator")
            .field("config", &self.config)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl ReviewCoordinator {
    /// Create a coordinator over a Task Store and a state store
    pub fn new(tasks: Arc<dyn TaskStore>, states: Arc<dyn StateStore>) -> Self {
        Self {
            tasks,
            states,
            config: ReviewConfig::default(),
            call_timeout: Duration::from_secs(30),
            write_lock: Mutex::new(()),
        }
    }

    /// Use a custom review configuration
    pub fn with_config(mut self, config: ReviewConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound every Task Store call by `timeout`
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The review configuration in use
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Spawn one reviewer per axis for the next round of `proposal`
    ///
    /// Opens round 1 for a new proposal, or the round after one that asked
    /// for revision. Review tasks that already exist under the same title are
    /// reused, so a call that failed halfway can simply be retried. Nothing is
    /// recorded unless all three tasks exist and the announcement was posted.
    ///
    /// When the next round would exceed `max_rounds`, the exhaustion policy
    /// is applied and `RoundsExhausted` is returned.
    #[instrument(skip(self), fields(proposal = %proposal))]
    pub async fn request_review(
        &self,
        proposal: &ProposalId,
        proposal_task: &TaskId,
    ) -> Result<Vec<ReviewRequest>> {
        let _guard = self.write_lock.lock().await;

        let outcome = self
            .retry_on_conflict(|| self.request_once(proposal, proposal_task))
            .await?;

        match outcome {
            Advance::Requested { requests, .. } => Ok(requests),
            _ => Err(Error::RoundsExhausted {
                proposal: proposal.to_string(),
                max_rounds: self.config.max_rounds,
            }),
        }
    }

    async fn request_once(&self, proposal: &ProposalId, proposal_task: &TaskId) -> Result<Advance> {
        let state = match self.states.load(proposal).await? {
            Some(state) => {
                if &state.proposal_task != proposal_task {
                    return Err(Error::Other(format!(
                        "{} is registered with task {}, not {}",
                        proposal, state.proposal_task, proposal_task
                    )));
                }
                state
            }
            None => ProposalReviewState::new(proposal.clone(), proposal_task.clone()),
        };

        self.open_round(state).await
    }

    /// Record a vote on a review request
    ///
    /// Each request takes exactly one vote. A second vote fails with
    /// `DuplicateVote` and leaves the first one in place.
    pub async fn record_vote(&self, request: &ReviewTaskName, value: VoteValue) -> Result<Vote> {
        self.cast(Vote::new(request.clone(), value)).await
    }

    /// Record a fully described vote
    #[instrument(skip(self, vote), fields(request = %vote.request, value = %vote.value))]
    pub async fn cast(&self, vote: Vote) -> Result<Vote> {
        let _guard = self.write_lock.lock().await;

        self.retry_on_conflict(|| self.cast_once(&vote)).await?;
        Ok(vote)
    }

    async fn cast_once(&self, vote: &Vote) -> Result<()> {
        let mut state = self.load_existing(vote.request.proposal()).await?;

        state.record_vote(vote.clone())?;
        self.states.save(&state).await?;

        if let ProposalStatus::Consensus { round } = state.status() {
            self.announce_consensus(&state, round).await;
        }
        Ok(())
    }

    /// Consensus state of the latest round of `proposal`
    ///
    /// Pure read, safe at any time. A proposal that was never sent to review
    /// reports `NotRequested`.
    pub async fn check_consensus(&self, proposal: &ProposalId) -> Result<ConsensusState> {
        Ok(self
            .states
            .load(proposal)
            .await?
            .map(|state| state.consensus())
            .unwrap_or(ConsensusState::NotRequested))
    }

    /// The next round number, if the latest round asked for revision
    pub async fn next_round(&self, proposal: &ProposalId) -> Result<Option<u32>> {
        Ok(self
            .states
            .load(proposal)
            .await?
            .and_then(|state| state.next_round()))
    }

    /// Open the next round if the latest one asked for revision
    ///
    /// A REVISE on any axis restarts review on all three.
    #[instrument(skip(self), fields(proposal = %proposal))]
    pub async fn advance(&self, proposal: &ProposalId) -> Result<Advance> {
        let _guard = self.write_lock.lock().await;

        self.retry_on_conflict(|| self.advance_once(proposal)).await
    }

    async fn advance_once(&self, proposal: &ProposalId) -> Result<Advance> {
        let state = self.load_existing(proposal).await?;
        if state.next_round().is_none() {
            let consensus = state.consensus();
            debug!(%consensus, "Nothing to advance");
            return Ok(Advance::Unchanged(consensus));
        }

        self.open_round(state).await
    }

    /// Read structured votes from the comments of pending review tasks
    ///
    /// Only `tribunal:vote` blocks are read; the first one on a task wins.
    /// Returns the votes newly recorded by this call.
    #[instrument(skip(self), fields(proposal = %proposal))]
    pub async fn sync_votes(&self, proposal: &ProposalId) -> Result<Vec<Vote>> {
        let _guard = self.write_lock.lock().await;

        self.retry_on_conflict(|| self.sync_once(proposal)).await
    }

    async fn sync_once(&self, proposal: &ProposalId) -> Result<Vec<Vote>> {
        let mut state = self.load_existing(proposal).await?;
        if state.status().is_terminal() {
            return Ok(Vec::new());
        }
        let Some(round) = state.latest_round() else {
            return Ok(Vec::new());
        };

        let pending: Vec<ReviewRequest> = state
            .round_requests(round)
            .filter(|r| state.vote(&r.name).is_none())
            .cloned()
            .collect();

        let mut recorded = Vec::new();
        for request in pending {
            let comments = self
                .call(self.tasks.list_comments(&request.task_id))
                .await?;

            let Some(tag) = comments.iter().find_map(|c| VoteTag::parse(c)) else {
                debug!(request = %request.name, "No vote posted yet");
                continue;
            };

            let mut vote = Vote::new(request.name.clone(), tag.value);
            vote.reviewer = tag.reviewer;
            vote.note = tag.note;

            state.record_vote(vote.clone())?;
            recorded.push(vote);
        }

        if !recorded.is_empty() {
            self.states.save(&state).await?;
            info!(count = recorded.len(), "Synced votes from task store");

            if let ProposalStatus::Consensus { round } = state.status() {
                self.announce_consensus(&state, round).await;
            }
        }

        Ok(recorded)
    }

    /// Pending review requests of the latest round older than the reviewer timeout
    pub async fn overdue(
        &self,
        proposal: &ProposalId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewRequest>> {
        let state = self.load_existing(proposal).await?;
        Ok(state
            .overdue(now, self.config.reviewer_timeout)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Stored review state of `proposal`
    pub async fn status(&self, proposal: &ProposalId) -> Result<Option<ProposalReviewState>> {
        self.states.load(proposal).await
    }

    /// All proposals with review state
    pub async fn proposals(&self) -> Result<Vec<ProposalId>> {
        self.states.list().await
    }

    /// Re-run a load-modify-save cycle that lost a race with another writer
    ///
    /// The write lock only serialises this process; other processes sharing
    /// the state store are detected through its revision check.
    async fn retry_on_conflict<T, F, Fut>(&self, mut attempt_once: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(Error::StateConflict { proposal, expected }) if attempt < SAVE_ATTEMPTS => {
                    debug!(%proposal, expected, attempt, "Review state changed concurrently, reloading");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn load_existing(&self, proposal: &ProposalId) -> Result<ProposalReviewState> {
        self.states
            .load(proposal)
            .await?
            .ok_or_else(|| Error::UnknownProposal(proposal.to_string()))
    }

    /// Spawn the next round for `state`, or apply the exhaustion policy
    ///
    /// Callers hold the write lock.
    async fn open_round(&self, mut state: ProposalReviewState) -> Result<Advance> {
        let round = state.round_to_request()?;

        if round > self.config.max_rounds {
            return self.exhaust(state).await;
        }

        let proposal_body = self.call(self.tasks.show_task(&state.proposal_task)).await?;
        if proposal_body.trim().is_empty() {
            return Err(Error::PreconditionNotMet(format!(
                "proposal task {} of {} has no content",
                state.proposal_task, state.proposal
            )));
        }

        let mut requests = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            let name = state.proposal.review_name(axis, round)?;
            let task_id = self.ensure_review_task(&name, &state.proposal_task).await?;
            requests.push(ReviewRequest::new(name, task_id));
        }

        state.open_round(requests.clone())?;

        self.call(
            self.tasks
                .add_comment(&state.proposal_task, &announcement(&state.proposal, round, &requests)),
        )
        .await?;

        self.states.save(&state).await?;
        info!(proposal = %state.proposal, round, "Review requested");

        Ok(Advance::Requested { round, requests })
    }

    /// Find or create the review task called `name`
    async fn ensure_review_task(&self, name: &ReviewTaskName, proposal_task: &TaskId) -> Result<TaskId> {
        let title = name.to_string();

        if let Some(existing) = self.call(self.tasks.find_task(&title)).await? {
            info!(%title, task = %existing, "Reusing existing review task");
            return Ok(existing);
        }

        let mut brief =
            ReviewBrief::new(name.clone(), proposal_task.clone()).max_rounds(self.config.max_rounds);
        if let Some(ref reference) = self.config.requirements_ref {
            brief = brief.requirements(reference.clone());
        }

        let task_id = self.call(self.tasks.create_task(&title, &brief.render())).await?;
        debug!(%title, task = %task_id, "Created review task");
        Ok(task_id)
    }

    async fn exhaust(&self, mut state: ProposalReviewState) -> Result<Advance> {
        let max_rounds = self.config.max_rounds;
        let force_accept = self.config.on_exhaustion == ExhaustionPolicy::ForceAccept;

        let status = state.exhaust(force_accept)?;
        self.states.save(&state).await?;
        warn!(proposal = %state.proposal, %status, max_rounds, "Review rounds exhausted");

        let text = if force_accept {
            format!(
                "{} exhausted {} review rounds without consensus and was accepted as it stands.",
                state.proposal, max_rounds
            )
        } else {
            format!(
                "{} exhausted {} review rounds without consensus. Escalating for a human decision.",
                state.proposal, max_rounds
            )
        };
        self.comment_best_effort(&state.proposal_task, &text).await;

        match status {
            ProposalStatus::ForceAccepted { round } => Ok(Advance::ForceAccepted { round }),
            _ => Err(Error::RoundsExhausted {
                proposal: state.proposal.to_string(),
                max_rounds,
            }),
        }
    }

    async fn announce_consensus(&self, state: &ProposalReviewState, round: u32) {
        info!(proposal = %state.proposal, round, "Consensus reached");
        let text = format!(
            "Consensus reached for {} in round {}: all axes voted ACCEPT.",
            state.proposal, round
        );
        self.comment_best_effort(&state.proposal_task, &text).await;
    }

    /// Post a comment whose loss does not invalidate already-saved state
    async fn comment_best_effort(&self, task: &TaskId, text: &str) {
        if let Err(e) = self.call(self.tasks.add_comment(task, text)).await {
            warn!(%task, error = %e, "Failed to post comment");
        }
    }

    /// Run a Task Store call under the call timeout
    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| {
                Error::TaskStoreUnavailable(format!(
                    "task store call timed out after {:?}",
                    self.call_timeout
                ))
            })?
    }
}

/// Comment posted on the proposal task once reviewers are spawned
fn announcement(proposal: &ProposalId, round: u32, requests: &[ReviewRequest]) -> String {
    let mut text = format!("Review requested for {} (round {}):\n\n", proposal, round);
    for request in requests {
        text.push_str(&format!(
            "- {} {}: {} (task {})\n",
            request.axis().letter(),
            request.axis().label(),
            request.name,
            request.task_id
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStateStore;
    use crate::store::MemoryTaskStore;

    struct Fixture {
        tasks: Arc<MemoryTaskStore>,
        coordinator: ReviewCoordinator,
        proposal: ProposalId,
        proposal_task: TaskId,
    }

    fn fixture_with(config: ReviewConfig) -> Fixture {
        let tasks = Arc::new(MemoryTaskStore::new());
        let proposal_task = tasks.seed("PROPOSAL-1", "Add a cache in front of the index");
        let coordinator = ReviewCoordinator::new(tasks.clone(), Arc::new(MemoryStateStore::new()))
            .with_config(config);
        Fixture {
            tasks,
            coordinator,
            proposal: ProposalId::proposal(1).unwrap(),
            proposal_task,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ReviewConfig::default())
    }

    fn names(requests: &[ReviewRequest]) -> Vec<String> {
        requests.iter().map(|r| r.name.to_string()).collect()
    }

    impl Fixture {
        async fn vote(&self, axis: Axis, round: u32, value: VoteValue) -> Result<Vote> {
            let name = self.proposal.review_name(axis, round).unwrap();
            self.coordinator.record_vote(&name, value).await
        }

        async fn consensus(&self) -> ConsensusState {
            self.coordinator.check_consensus(&self.proposal).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_review_until_consensus() {
        let f = fixture();

        let round1 = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        assert_eq!(
            names(&round1),
            vec![
                "PROPOSAL-1-REVIEW-A-1",
                "PROPOSAL-1-REVIEW-B-1",
                "PROPOSAL-1-REVIEW-C-1"
            ]
        );

        f.vote(Axis::A, 1, VoteValue::Accept).await.unwrap();
        f.vote(Axis::B, 1, VoteValue::Accept).await.unwrap();
        f.vote(Axis::C, 1, VoteValue::Revise).await.unwrap();
        assert!(!f.consensus().await.is_reached());
        assert_eq!(f.coordinator.next_round(&f.proposal).await.unwrap(), Some(2));

        let Advance::Requested { round, requests } =
            f.coordinator.advance(&f.proposal).await.unwrap()
        else {
            panic!("expected a new round");
        };
        assert_eq!(round, 2);
        assert_eq!(
            names(&requests),
            vec![
                "PROPOSAL-1-REVIEW-A-2",
                "PROPOSAL-1-REVIEW-B-2",
                "PROPOSAL-1-REVIEW-C-2"
            ]
        );

        for axis in Axis::ALL {
            f.vote(axis, 2, VoteValue::Accept).await.unwrap();
        }
        assert_eq!(f.consensus().await, ConsensusState::Reached { round: 2 });

        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert_eq!(state.status(), ProposalStatus::Consensus { round: 2 });
        assert_eq!(state.requests().len(), 6);

        // terminal: no further rounds
        assert!(matches!(
            f.coordinator.advance(&f.proposal).await.unwrap(),
            Advance::Unchanged(ConsensusState::Reached { round: 2 })
        ));
        assert!(matches!(
            f.coordinator
                .request_review(&f.proposal, &f.proposal_task)
                .await,
            Err(Error::AlreadyConcluded { .. })
        ));
    }

    #[tokio::test]
    async fn test_review_tasks_and_comments_in_store() {
        let f = fixture();
        let requests = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        assert_eq!(
            f.tasks.titles(),
            vec![
                "PROPOSAL-1",
                "PROPOSAL-1-REVIEW-A-1",
                "PROPOSAL-1-REVIEW-B-1",
                "PROPOSAL-1-REVIEW-C-1"
            ]
        );

        let brief = f.tasks.show_task(&requests[1].task_id).await.unwrap();
        assert!(brief.contains(&format!("Proposal task: {}", f.proposal_task)));
        assert!(brief.contains("Reviewer axis: Test quality"));

        let comments = f.tasks.list_comments(&f.proposal_task).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].starts_with("Review requested for PROPOSAL-1 (round 1)"));
        assert!(comments[0].contains("PROPOSAL-1-REVIEW-C-1"));
    }

    #[tokio::test]
    async fn test_empty_proposal_not_reviewed() {
        let f = fixture();
        let empty = f.tasks.seed("PROPOSAL-2", "  ");
        let proposal = ProposalId::proposal(2).unwrap();

        let err = f
            .coordinator
            .request_review(&proposal, &empty)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionNotMet(_)));
        assert_eq!(f.tasks.titles(), vec!["PROPOSAL-1", "PROPOSAL-2"]);
    }

    #[tokio::test]
    async fn test_check_consensus_before_anything() {
        let f = fixture();
        assert_eq!(f.consensus().await, ConsensusState::NotRequested);
        assert_eq!(f.coordinator.next_round(&f.proposal).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rerequest_while_pending() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::A, 1, VoteValue::Accept).await.unwrap();

        let err = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReviewInProgress { round: 1, .. }));
        assert!(matches!(
            f.coordinator.advance(&f.proposal).await.unwrap(),
            Advance::Unchanged(ConsensusState::Pending { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_vote_reported() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        f.vote(Axis::B, 1, VoteValue::Accept).await.unwrap();
        let err = f.vote(Axis::B, 1, VoteValue::Revise).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateVote {
                existing: VoteValue::Accept,
                ..
            }
        ));

        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        let name = f.proposal.review_name(Axis::B, 1).unwrap();
        assert_eq!(state.vote(&name).unwrap().value, VoteValue::Accept);
    }

    #[tokio::test]
    async fn test_vote_on_unknown_proposal() {
        let f = fixture();
        let err = f.vote(Axis::A, 1, VoteValue::Accept).await.unwrap_err();
        assert!(matches!(err, Error::UnknownProposal(_)));
    }

    #[tokio::test]
    async fn test_store_failure_records_nothing() {
        let f = fixture();
        f.tasks.fail_creates_after(1);

        let err = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TaskStoreUnavailable(_)));
        assert_eq!(f.consensus().await, ConsensusState::NotRequested);
        assert!(f.coordinator.status(&f.proposal).await.unwrap().is_none());

        // retry reuses the task that did get created
        f.tasks.fail_creates_after(usize::MAX);
        let requests = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(f.tasks.titles().len(), 4);
    }

    #[tokio::test]
    async fn test_store_offline_keeps_next_round() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::A, 1, VoteValue::Revise).await.unwrap();

        f.tasks.set_offline(true);
        assert!(matches!(
            f.coordinator.advance(&f.proposal).await,
            Err(Error::TaskStoreUnavailable(_))
        ));
        assert_eq!(f.coordinator.next_round(&f.proposal).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_sync_votes_reads_tags_only() {
        let f = fixture();
        let requests = f
            .coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        let tagged = format!(
            "Tests hit the real index.\n\n{}",
            VoteTag {
                value: VoteValue::Accept,
                reviewer: Some("agent-b".to_string()),
                note: None,
            }
            .render()
        );
        f.tasks
            .add_comment(&requests[0].task_id, "ACCEPT, looks great")
            .await
            .unwrap();
        f.tasks.add_comment(&requests[1].task_id, &tagged).await.unwrap();
        f.tasks
            .add_comment(&requests[2].task_id, &VoteTag::new(VoteValue::Revise).render())
            .await
            .unwrap();

        let synced = f.coordinator.sync_votes(&f.proposal).await.unwrap();
        let axes: Vec<Axis> = synced.iter().map(|v| v.request.axis()).collect();
        assert_eq!(axes, vec![Axis::B, Axis::C]);
        assert_eq!(synced[0].reviewer.as_deref(), Some("agent-b"));

        assert_eq!(
            f.consensus().await,
            ConsensusState::RevisionRequested {
                round: 1,
                revise: vec![Axis::C],
                awaiting: vec![Axis::A],
            }
        );

        // a second sync finds nothing new
        assert!(f.coordinator.sync_votes(&f.proposal).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_escalate_when_rounds_exhausted() {
        let f = fixture_with(ReviewConfig {
            max_rounds: 1,
            ..Default::default()
        });
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::B, 1, VoteValue::Revise).await.unwrap();

        let err = f.coordinator.advance(&f.proposal).await.unwrap_err();
        assert!(matches!(err, Error::RoundsExhausted { max_rounds: 1, .. }));

        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert_eq!(state.status(), ProposalStatus::Escalated { round: 1 });
        assert_eq!(state.requests().len(), 3);

        let comments = f.tasks.list_comments(&f.proposal_task).await.unwrap();
        assert!(comments.last().unwrap().contains("Escalating"));
    }

    #[tokio::test]
    async fn test_force_accept_when_rounds_exhausted() {
        let f = fixture_with(ReviewConfig {
            max_rounds: 2,
            on_exhaustion: ExhaustionPolicy::ForceAccept,
            ..Default::default()
        });
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::A, 1, VoteValue::Revise).await.unwrap();
        assert!(matches!(
            f.coordinator.advance(&f.proposal).await.unwrap(),
            Advance::Requested { round: 2, .. }
        ));
        f.vote(Axis::A, 2, VoteValue::Revise).await.unwrap();

        assert_eq!(
            f.coordinator.advance(&f.proposal).await.unwrap(),
            Advance::ForceAccepted { round: 2 }
        );
        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert!(state.status().is_accepted());
        assert!(!state.consensus().is_reached());
    }

    #[tokio::test]
    async fn test_rounds_only_grow_after_revise() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        let mut rounds = Vec::new();
        for (axis, value) in [
            (Axis::A, VoteValue::Accept),
            (Axis::B, VoteValue::Accept),
            (Axis::C, VoteValue::Revise),
        ] {
            f.vote(axis, 1, value).await.unwrap();
            let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
            rounds.push(state.latest_round().unwrap());
        }
        assert_eq!(rounds, vec![1, 1, 1]);

        f.coordinator.advance(&f.proposal).await.unwrap();
        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert_eq!(state.latest_round(), Some(2));
    }

    #[tokio::test]
    async fn test_mismatched_proposal_task() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::A, 1, VoteValue::Revise).await.unwrap();

        let err = f
            .coordinator
            .request_review(&f.proposal, &TaskId::from("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[tokio::test]
    async fn test_overdue_requests() {
        let f = fixture_with(ReviewConfig {
            reviewer_timeout: Duration::from_secs(60),
            ..Default::default()
        });
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::C, 1, VoteValue::Accept).await.unwrap();

        let now = Utc::now();
        assert!(f.coordinator.overdue(&f.proposal, now).await.unwrap().is_empty());

        let later = now + chrono::Duration::minutes(5);
        let overdue = f.coordinator.overdue(&f.proposal, later).await.unwrap();
        assert_eq!(
            names(&overdue),
            vec!["PROPOSAL-1-REVIEW-A-1", "PROPOSAL-1-REVIEW-B-1"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_votes() {
        let f = fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        let (a, b, c) = tokio::join!(
            f.vote(Axis::A, 1, VoteValue::Accept),
            f.vote(Axis::B, 1, VoteValue::Accept),
            f.vote(Axis::C, 1, VoteValue::Accept),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(f.consensus().await, ConsensusState::Reached { round: 1 });

        let comments = f.tasks.list_comments(&f.proposal_task).await.unwrap();
        assert!(comments.last().unwrap().starts_with("Consensus reached"));
    }

    /// Hands out a competing vote to another writer just before the next save
    #[derive(Default)]
    struct RacingStateStore {
        inner: MemoryStateStore,
        pending: std::sync::Mutex<Option<Vote>>,
    }

    impl RacingStateStore {
        fn slip_in(&self, vote: Vote) {
            *self.pending.lock().unwrap() = Some(vote);
        }
    }

    #[async_trait::async_trait]
    impl StateStore for RacingStateStore {
        async fn load(&self, proposal: &ProposalId) -> Result<Option<ProposalReviewState>> {
            self.inner.load(proposal).await
        }

        async fn save(&self, state: &ProposalReviewState) -> Result<()> {
            let pending = self.pending.lock().unwrap().take();
            if let Some(vote) = pending {
                let mut theirs = self.inner.load(&state.proposal).await?.unwrap();
                theirs.record_vote(vote)?;
                self.inner.save(&theirs).await?;
            }
            self.inner.save(state).await
        }

        async fn list(&self) -> Result<Vec<ProposalId>> {
            self.inner.list().await
        }
    }

    fn racing_fixture() -> (Fixture, Arc<RacingStateStore>) {
        let tasks = Arc::new(MemoryTaskStore::new());
        let proposal_task = tasks.seed("PROPOSAL-1", "Add a cache in front of the index");
        let states = Arc::new(RacingStateStore::default());
        let coordinator = ReviewCoordinator::new(tasks.clone(), states.clone());
        let fixture = Fixture {
            tasks,
            coordinator,
            proposal: ProposalId::proposal(1).unwrap(),
            proposal_task,
        };
        (fixture, states)
    }

    #[tokio::test]
    async fn test_vote_lost_to_other_writer_is_duplicate() {
        let (f, states) = racing_fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();

        let b = f.proposal.review_name(Axis::B, 1).unwrap();
        states.slip_in(Vote::new(b.clone(), VoteValue::Accept));
        let err = f.vote(Axis::B, 1, VoteValue::Revise).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateVote {
                existing: VoteValue::Accept,
                ..
            }
        ));

        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert_eq!(state.vote(&b).unwrap().value, VoteValue::Accept);
    }

    #[tokio::test]
    async fn test_final_accepts_from_two_writers_reach_consensus() {
        let (f, states) = racing_fixture();
        f.coordinator
            .request_review(&f.proposal, &f.proposal_task)
            .await
            .unwrap();
        f.vote(Axis::A, 1, VoteValue::Accept).await.unwrap();

        let c = f.proposal.review_name(Axis::C, 1).unwrap();
        states.slip_in(Vote::new(c, VoteValue::Accept));
        f.vote(Axis::B, 1, VoteValue::Accept).await.unwrap();

        let state = f.coordinator.status(&f.proposal).await.unwrap().unwrap();
        assert_eq!(state.status(), ProposalStatus::Consensus { round: 1 });
        assert_eq!(state.votes().count(), 3);
        assert_eq!(f.consensus().await, ConsensusState::Reached { round: 1 });

        let comments = f.tasks.list_comments(&f.proposal_task).await.unwrap();
        assert!(comments.last().unwrap().starts_with("Consensus reached"));
    }
}
