//! Persisted review state of a single proposal
//!
//! `ProposalReviewState` is the single source of truth for which reviewers
//! were spawned and how they voted. Consensus is derived from it on demand
//! and never stored separately.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::{ProposalStatus, Workflow};
use crate::review::{Axis, ProposalId, ReviewRequest, ReviewTaskName, Vote};
use crate::store::TaskId;
use crate::{Error, Result};

/// Outcome of the latest review round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConsensusState {
    /// No reviewers were spawned yet
    NotRequested,
    /// Some axes have not voted and nobody asked for revision
    Pending { round: u32, awaiting: Vec<Axis> },
    /// At least one axis voted REVISE; the round cannot reach consensus
    RevisionRequested {
        round: u32,
        revise: Vec<Axis>,
        awaiting: Vec<Axis>,
    },
    /// All three axes voted ACCEPT
    Reached { round: u32 },
}

impl ConsensusState {
    /// True iff all three axes accepted the latest round
    pub fn is_reached(&self) -> bool {
        matches!(self, ConsensusState::Reached { .. })
    }

    /// True if any axis asked for revision in the latest round
    pub fn needs_revision(&self) -> bool {
        matches!(self, ConsensusState::RevisionRequested { .. })
    }

    /// The round this state describes
    pub fn round(&self) -> Option<u32> {
        match self {
            ConsensusState::NotRequested => None,
            ConsensusState::Pending { round, .. }
            | ConsensusState::RevisionRequested { round, .. }
            | ConsensusState::Reached { round } => Some(*round),
        }
    }
}

impl std::fmt::Display for ConsensusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letters = |axes: &[Axis]| axes.iter().map(|a| a.letter()).collect::<String>();
        match self {
            ConsensusState::NotRequested => write!(f, "not requested"),
            ConsensusState::Pending { round, awaiting } => {
                write!(f, "round {}: awaiting {}", round, letters(awaiting))
            }
            ConsensusState::RevisionRequested { round, revise, .. } => {
                write!(f, "round {}: revision requested by {}", round, letters(revise))
            }
            ConsensusState::Reached { round } => write!(f, "round {}: consensus", round),
        }
    }
}

/// Everything the coordinator knows about one proposal's review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalReviewState {
    /// The proposal under review
    pub proposal: ProposalId,
    /// The proposal's task in the Task Store
    pub proposal_task: TaskId,
    status: ProposalStatus,
    /// Review requests ordered by round, then axis
    requests: Vec<ReviewRequest>,
    votes: BTreeMap<ReviewTaskName, Vote>,
    /// When the state was first created
    pub created_at: DateTime<Utc>,
    /// When the state last changed
    pub updated_at: DateTime<Utc>,
    /// Stored revision this state was loaded at, 0 if never saved
    #[serde(default)]
    revision: u64,
}

impl ProposalReviewState {
    /// Register a proposal that has not been sent to review yet
    pub fn new(proposal: ProposalId, proposal_task: TaskId) -> Self {
        let now = Utc::now();
        Self {
            proposal,
            proposal_task,
            status: ProposalStatus::Drafted,
            requests: Vec::new(),
            votes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Rebuild a state read back from storage
    ///
    /// Requests and votes are re-validated so a corrupt store cannot produce
    /// a state that violates the one-request-per-axis-and-round invariant.
    pub fn restore(
        proposal: ProposalId,
        proposal_task: TaskId,
        status: ProposalStatus,
        mut requests: Vec<ReviewRequest>,
        votes: Vec<Vote>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        requests.sort_by_key(|r| (r.round(), r.axis()));

        for pair in requests.windows(2) {
            if pair[0].round() == pair[1].round() && pair[0].axis() == pair[1].axis() {
                return Err(Error::StateStore(format!(
                    "duplicate review request {}",
                    pair[0].name
                )));
            }
        }
        if let Some(foreign) = requests.iter().find(|r| r.proposal() != &proposal) {
            return Err(Error::StateStore(format!(
                "review request {} does not belong to {}",
                foreign.name, proposal
            )));
        }

        let mut by_name = BTreeMap::new();
        for vote in votes {
            if !requests.iter().any(|r| r.name == vote.request) {
                return Err(Error::StateStore(format!(
                    "vote for unknown review request {}",
                    vote.request
                )));
            }
            by_name.insert(vote.request.clone(), vote);
        }

        Ok(Self {
            proposal,
            proposal_task,
            status,
            requests,
            votes: by_name,
            created_at,
            updated_at,
            revision: 0,
        })
    }

    /// Mark the stored revision this state was read at
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Stored revision this state was read at
    ///
    /// A [`StateStore`](crate::persist::StateStore) only accepts a save whose
    /// revision still matches the stored one.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current review status
    pub fn status(&self) -> ProposalStatus {
        self.status
    }

    /// All review requests ever issued, ordered by round then axis
    pub fn requests(&self) -> &[ReviewRequest] {
        &self.requests
    }

    /// All recorded votes
    pub fn votes(&self) -> impl Iterator<Item = &Vote> {
        self.votes.values()
    }

    /// Look up a review request by name
    pub fn request(&self, name: &ReviewTaskName) -> Option<&ReviewRequest> {
        self.requests.iter().find(|r| &r.name == name)
    }

    /// Look up the vote for a review request
    pub fn vote(&self, name: &ReviewTaskName) -> Option<&Vote> {
        self.votes.get(name)
    }

    /// Highest round that has been requested
    pub fn latest_round(&self) -> Option<u32> {
        self.requests.iter().map(|r| r.round()).max()
    }

    /// Requests belonging to `round`
    pub fn round_requests(&self, round: u32) -> impl Iterator<Item = &ReviewRequest> {
        self.requests.iter().filter(move |r| r.round() == round)
    }

    /// Current round of one axis
    ///
    /// The highest round in which the axis voted, or the highest round it was
    /// requested in if it has never voted.
    pub fn current_round(&self, axis: Axis) -> Option<u32> {
        let voted = self
            .votes
            .keys()
            .filter(|name| name.axis() == axis)
            .map(|name| name.round())
            .max();

        voted.or_else(|| {
            self.requests
                .iter()
                .filter(|r| r.axis() == axis)
                .map(|r| r.round())
                .max()
        })
    }

    /// Derive the consensus state of the latest round
    ///
    /// Pure read. Every round carries all three axes, so only votes of the
    /// latest round count; an axis that voted in an earlier round but not in
    /// the latest one is still awaited.
    pub fn consensus(&self) -> ConsensusState {
        let Some(round) = self.latest_round() else {
            return ConsensusState::NotRequested;
        };

        let mut awaiting = Vec::new();
        let mut revise = Vec::new();

        for request in self.round_requests(round) {
            match self.votes.get(&request.name) {
                None => awaiting.push(request.axis()),
                Some(vote) if vote.value.is_revise() => revise.push(request.axis()),
                Some(_) => {}
            }
        }

        if !revise.is_empty() {
            ConsensusState::RevisionRequested {
                round,
                revise,
                awaiting,
            }
        } else if !awaiting.is_empty() {
            ConsensusState::Pending { round, awaiting }
        } else {
            ConsensusState::Reached { round }
        }
    }

    /// The round to request next, if the latest round asked for revision
    pub fn next_round(&self) -> Option<u32> {
        match self.consensus() {
            ConsensusState::RevisionRequested { round, .. } => Some(round + 1),
            _ => None,
        }
    }

    /// The round a new `request_review` call would open
    ///
    /// Round 1 for a fresh proposal, the next round after a revision request,
    /// and an error while the latest round is undecided or the review is over.
    pub fn round_to_request(&self) -> Result<u32> {
        if self.status.is_terminal() {
            return Err(Error::AlreadyConcluded {
                proposal: self.proposal.to_string(),
                status: self.status.to_string(),
            });
        }

        match self.consensus() {
            ConsensusState::NotRequested => Ok(1),
            ConsensusState::RevisionRequested { round, .. } => Ok(round + 1),
            ConsensusState::Pending { round, .. } => Err(Error::ReviewInProgress {
                proposal: self.proposal.to_string(),
                round,
            }),
            ConsensusState::Reached { .. } => Err(Error::AlreadyConcluded {
                proposal: self.proposal.to_string(),
                status: self.status.to_string(),
            }),
        }
    }

    /// Add a complete round of review requests
    ///
    /// The requests must cover each axis exactly once and share the round that
    /// [`round_to_request`](Self::round_to_request) allows.
    pub fn open_round(&mut self, requests: Vec<ReviewRequest>) -> Result<u32> {
        let round = self.round_to_request()?;

        let mut axes: Vec<Axis> = requests.iter().map(|r| r.axis()).collect();
        axes.sort();
        if axes != Axis::ALL {
            return Err(Error::Other(format!(
                "a review round needs exactly one request per axis, got {:?}",
                axes
            )));
        }
        if let Some(wrong) = requests
            .iter()
            .find(|r| r.round() != round || r.proposal() != &self.proposal)
        {
            return Err(Error::Other(format!(
                "review request {} does not belong to round {} of {}",
                wrong.name, round, self.proposal
            )));
        }

        self.transition_to(ProposalStatus::AwaitingReview { round })?;
        let mut requests = requests;
        requests.sort_by_key(|r| r.axis());
        self.requests.extend(requests);
        Ok(round)
    }

    /// Record a vote
    ///
    /// Fails without touching the state if the request is unknown, belongs to
    /// a superseded round, already has a vote, or the review is over. A vote
    /// that completes an all-ACCEPT round moves the proposal to consensus.
    pub fn record_vote(&mut self, vote: Vote) -> Result<()> {
        if self.request(&vote.request).is_none() {
            return Err(Error::UnknownReview(vote.request));
        }

        if let Some(existing) = self.votes.get(&vote.request) {
            return Err(Error::DuplicateVote {
                request: vote.request,
                existing: existing.value,
            });
        }

        let latest = self.latest_round().unwrap_or(0);
        if vote.request.round() < latest {
            return Err(Error::SupersededRound {
                request: vote.request,
                latest,
            });
        }

        if self.status.is_terminal() {
            return Err(Error::AlreadyConcluded {
                proposal: self.proposal.to_string(),
                status: self.status.to_string(),
            });
        }

        info!(
            request = %vote.request,
            value = %vote.value,
            reviewer = ?vote.reviewer,
            "Recording vote"
        );
        self.votes.insert(vote.request.clone(), vote);
        self.touch();

        if let ConsensusState::Reached { round } = self.consensus() {
            self.transition_to(ProposalStatus::Consensus { round })?;
        }

        Ok(())
    }

    /// Close the review because the round bound ran out
    pub fn exhaust(&mut self, force_accept: bool) -> Result<ProposalStatus> {
        let round = self.latest_round().ok_or_else(|| {
            Error::Other(format!("{} was never sent to review", self.proposal))
        })?;

        let status = if force_accept {
            ProposalStatus::ForceAccepted { round }
        } else {
            ProposalStatus::Escalated { round }
        };
        self.transition_to(status)?;
        Ok(status)
    }

    /// Pending requests of the latest round older than `timeout`
    pub fn overdue(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<&ReviewRequest> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        let Some(round) = self.latest_round() else {
            return Vec::new();
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return Vec::new();
        };

        self.round_requests(round)
            .filter(|r| !self.votes.contains_key(&r.name))
            .filter(|r| r.requested_at + timeout < now)
            .collect()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Workflow for ProposalReviewState {
    type Phase = ProposalStatus;

    fn current_phase(&self) -> &Self::Phase {
        &self.status
    }

    fn can_transition_to(&self, phase: &Self::Phase) -> bool {
        self.status.allows(phase)
    }

    fn transition_to(&mut self, phase: Self::Phase) -> Result<()> {
        if !self.can_transition_to(&phase) {
            return Err(Error::Other(format!(
                "Invalid transition for {} from {} to {}",
                self.proposal, self.status, phase
            )));
        }

        info!(
            proposal = %self.proposal,
            from = %self.status,
            to = %phase,
            "Proposal status transition"
        );

        self.status = phase;
        self.touch();
        Ok(())
    }
}
