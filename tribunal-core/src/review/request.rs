//! Review requests and the instructions handed to reviewers
//!
//! A review request is created once per `(proposal, axis, round)`. The body of
//! its review task is a [`ReviewBrief`] rendered to markdown: it tells the
//! reviewer which proposal to read, where the requirements live, which axis
//! to judge and how to report the verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Axis, ProposalId, ReviewTaskName, VoteTag, VoteValue};
use crate::store::TaskId;

/// A review request issued to one reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Name of the review task, which is also the request identifier
    pub name: ReviewTaskName,
    /// Identifier of the review task in the Task Store
    pub task_id: TaskId,
    /// When the review task was created
    pub requested_at: DateTime<Utc>,
}

impl ReviewRequest {
    /// Create a request issued now
    pub fn new(name: ReviewTaskName, task_id: TaskId) -> Self {
        Self {
            name,
            task_id,
            requested_at: Utc::now(),
        }
    }

    /// The proposal under review
    pub fn proposal(&self) -> &ProposalId {
        self.name.proposal()
    }

    /// The review axis
    pub fn axis(&self) -> Axis {
        self.name.axis()
    }

    /// The review round
    pub fn round(&self) -> u32 {
        self.name.round()
    }
}

/// Instruction payload for one review task
#[derive(Debug, Clone)]
pub struct ReviewBrief {
    name: ReviewTaskName,
    proposal_task: TaskId,
    requirements_ref: Option<String>,
    max_rounds: Option<u32>,
}

impl ReviewBrief {
    /// Create a brief for `name`, reviewing the proposal held in `proposal_task`
    pub fn new(name: ReviewTaskName, proposal_task: TaskId) -> Self {
        Self {
            name,
            proposal_task,
            requirements_ref: None,
            max_rounds: None,
        }
    }

    /// Reference to the requirements the proposal answers
    pub fn requirements(mut self, reference: impl Into<String>) -> Self {
        self.requirements_ref = Some(reference.into());
        self
    }

    /// Mention the round bound in the brief
    pub fn max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = Some(max);
        self
    }

    /// Render the brief as the review task body
    pub fn render(&self) -> String {
        let axis = self.name.axis();
        let round = self.name.round();
        let mut body = String::new();

        body.push_str(&format!(
            "# Review {}: {} (axis {})\n\n",
            self.name.proposal(),
            axis.label(),
            axis.letter()
        ));

        body.push_str("## What to review\n\n");
        body.push_str(&format!("- Proposal task: {}\n", self.proposal_task));
        match self.requirements_ref {
            Some(ref reference) => body.push_str(&format!("- Requirements: {}\n", reference)),
            None => body.push_str("- Requirements: see the proposal task\n"),
        }
        body.push_str(&format!("- Reviewer axis: {}\n", axis.label()));
        match self.max_rounds {
            Some(max) => body.push_str(&format!("- Round: {} of at most {}\n", round, max)),
            None => body.push_str(&format!("- Round: {}\n", round)),
        }
        body.push('\n');

        if round > 1 {
            body.push_str("## Re-review\n\n");
            body.push_str(&format!(
                "Round {} asked for revision. Review the revised proposal in full; \
                 every axis is re-reviewed, not only the one that asked for changes.\n\n",
                round - 1
            ));
        }

        body.push_str("## Focus questions\n\n");
        for question in axis.questions() {
            body.push_str(&format!("- {}\n", question));
        }
        body.push('\n');

        body.push_str("## How to vote\n\n");
        body.push_str(
            "Judge only this axis. Post exactly one comment on this task containing \
             one of the blocks below. Prose outside the block is kept for humans \
             but is not read as a vote.\n\n",
        );
        for value in [VoteValue::Accept, VoteValue::Revise] {
            body.push_str("```\n");
            body.push_str(&VoteTag::new(value).render());
            body.push_str("\n```\n\n");
        }

        body
    }
}
