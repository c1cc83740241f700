//! Proposal and review task naming
//!
//! Names are consumed by humans and other agents through the task tracker,
//! so formatting and parsing are bit-exact:
//!
//! - `PROPOSAL-N` / `FOLLOWUP_PROPOSAL-N`
//! - `PROPOSAL-N-REVIEW-{A|B|C}-{round}` / `FOLLOWUP_PROPOSAL-N-REVIEW-{A|B|C}-{round}`

use serde::{Deserialize, Serialize};

use super::Axis;
use crate::{Error, Result};

const REVIEW_INFIX: &str = "-REVIEW-";

/// Whether a proposal is an original proposal or a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    Proposal,
    Followup,
}

impl ProposalKind {
    /// Name prefix used in task titles
    pub fn prefix(&self) -> &'static str {
        match self {
            ProposalKind::Proposal => "PROPOSAL",
            ProposalKind::Followup => "FOLLOWUP_PROPOSAL",
        }
    }
}

/// Identifier of a proposal under review, e.g. `PROPOSAL-7`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProposalId {
    kind: ProposalKind,
    number: u32,
}

impl ProposalId {
    /// Create an original proposal id
    pub fn proposal(number: u32) -> Result<Self> {
        Self::new(ProposalKind::Proposal, number)
    }

    /// Create a follow-up proposal id
    pub fn followup(number: u32) -> Result<Self> {
        Self::new(ProposalKind::Followup, number)
    }

    /// Create a proposal id, rejecting number zero
    pub fn new(kind: ProposalKind, number: u32) -> Result<Self> {
        if number == 0 {
            return Err(Error::InvalidName(format!("{}-0", kind.prefix())));
        }
        Ok(Self { kind, number })
    }

    /// The proposal kind
    pub fn kind(&self) -> ProposalKind {
        self.kind
    }

    /// The proposal number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Name of the review task for this proposal on `axis` in `round`
    pub fn review_name(&self, axis: Axis, round: u32) -> Result<ReviewTaskName> {
        ReviewTaskName::new(self.clone(), axis, round)
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.number)
    }
}

impl std::str::FromStr for ProposalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidName(s.to_string());

        // FOLLOWUP_PROPOSAL must be tried first since it ends with PROPOSAL
        let (kind, rest) = if let Some(rest) = s.strip_prefix("FOLLOWUP_PROPOSAL-") {
            (ProposalKind::Followup, rest)
        } else if let Some(rest) = s.strip_prefix("PROPOSAL-") {
            (ProposalKind::Proposal, rest)
        } else {
            return Err(invalid());
        };

        let number = parse_positive(rest).ok_or_else(invalid)?;
        Self::new(kind, number)
    }
}

impl TryFrom<String> for ProposalId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProposalId> for String {
    fn from(id: ProposalId) -> Self {
        id.to_string()
    }
}

/// Name and identity of one review request, e.g. `PROPOSAL-7-REVIEW-B-2`
///
/// Unique per `(proposal, axis, round)`, which is what makes it usable as the
/// review request identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReviewTaskName {
    proposal: ProposalId,
    axis: Axis,
    round: u32,
}

impl ReviewTaskName {
    /// Create a review task name, rejecting round zero
    pub fn new(proposal: ProposalId, axis: Axis, round: u32) -> Result<Self> {
        if round == 0 {
            return Err(Error::InvalidName(format!(
                "{}{}{}-0",
                proposal, REVIEW_INFIX, axis
            )));
        }
        Ok(Self {
            proposal,
            axis,
            round,
        })
    }

    /// The proposal under review
    pub fn proposal(&self) -> &ProposalId {
        &self.proposal
    }

    /// The review axis
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// The review round
    pub fn round(&self) -> u32 {
        self.round
    }
}

impl std::fmt::Display for ReviewTaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}-{}",
            self.proposal, REVIEW_INFIX, self.axis, self.round
        )
    }
}

impl std::str::FromStr for ReviewTaskName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidName(s.to_string());

        let (proposal, rest) = s.split_once(REVIEW_INFIX).ok_or_else(invalid)?;
        let proposal: ProposalId = proposal.parse().map_err(|_| invalid())?;

        let (axis, round) = rest.split_once('-').ok_or_else(invalid)?;
        let axis: Axis = match axis {
            "A" | "B" | "C" => axis.parse()?,
            _ => return Err(invalid()),
        };
        let round = parse_positive(round).ok_or_else(invalid)?;

        Self::new(proposal, axis, round)
    }
}

impl TryFrom<String> for ReviewTaskName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReviewTaskName> for String {
    fn from(name: ReviewTaskName) -> Self {
        name.to_string()
    }
}

/// Parse a canonical positive decimal: digits only, no sign, no leading zero
fn parse_positive(s: &str) -> Option<u32> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
