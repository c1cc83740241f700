//! Row types of the review state tables

use chrono::{DateTime, Utc};
use tribunal_core::review::{ProposalId, ReviewRequest, ReviewTaskName, Vote, VoteValue};
use tribunal_core::store::TaskId;
use tribunal_core::workflow::ProposalStatus;

use crate::{Error, Result};

/// Row of the `proposals` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProposalRow {
    pub proposal_id: String,
    pub proposal_task: String,
    pub status: String,
    pub status_round: Option<i64>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProposalRow {
    pub fn proposal(&self) -> Result<ProposalId> {
        self.proposal_id.parse().map_err(invalid)
    }

    pub fn task(&self) -> TaskId {
        TaskId::new(self.proposal_task.clone())
    }

    pub fn revision(&self) -> Result<u64> {
        u64::try_from(self.revision).map_err(|_| {
            Error::InvalidData(format!("revision {} for {}", self.revision, self.proposal_id))
        })
    }

    pub fn status(&self) -> Result<ProposalStatus> {
        let round = self.status_round.map(to_round).transpose()?;
        ProposalStatus::from_parts(&self.status, round).ok_or_else(|| {
            Error::InvalidData(format!(
                "status {} with round {:?} for {}",
                self.status, self.status_round, self.proposal_id
            ))
        })
    }
}

/// Row of the `review_requests` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRow {
    pub name: String,
    pub task_id: String,
    pub requested_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for ReviewRequest {
    type Error = Error;

    fn try_from(row: RequestRow) -> Result<Self> {
        let name: ReviewTaskName = row.name.parse().map_err(invalid)?;
        let mut request = ReviewRequest::new(name, TaskId::new(row.task_id));
        request.requested_at = row.requested_at;
        Ok(request)
    }
}

/// Row of the `votes` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VoteRow {
    pub request_name: String,
    pub value: String,
    pub reviewer: Option<String>,
    pub note: Option<String>,
    pub cast_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = Error;

    fn try_from(row: VoteRow) -> Result<Self> {
        let request: ReviewTaskName = row.request_name.parse().map_err(invalid)?;
        let value: VoteValue = row.value.parse().map_err(invalid)?;

        let mut vote = Vote::new(request, value).at(row.cast_at);
        vote.reviewer = row.reviewer;
        vote.note = row.note;
        Ok(vote)
    }
}

fn to_round(round: i64) -> Result<u32> {
    u32::try_from(round)
        .ok()
        .filter(|r| *r >= 1)
        .ok_or_else(|| Error::InvalidData(format!("round {}", round)))
}

fn invalid(e: tribunal_core::Error) -> Error {
    Error::InvalidData(e.to_string())
}
