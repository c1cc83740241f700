//! Votes cast on review requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReviewTaskName;
use crate::{Error, Result};

/// A reviewer's verdict on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteValue {
    /// The proposal is acceptable on this axis
    Accept,
    /// The proposal needs another revision
    Revise,
}

impl VoteValue {
    /// Check if accepting
    pub fn is_accept(&self) -> bool {
        matches!(self, VoteValue::Accept)
    }

    /// Check if asking for revision
    pub fn is_revise(&self) -> bool {
        matches!(self, VoteValue::Revise)
    }

    /// Wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Accept => "ACCEPT",
            VoteValue::Revise => "REVISE",
        }
    }
}

impl std::fmt::Display for VoteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoteValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("accept") {
            Ok(VoteValue::Accept)
        } else if s.eq_ignore_ascii_case("revise") {
            Ok(VoteValue::Revise)
        } else {
            Err(Error::Other(format!(
                "Unknown vote '{}', expected ACCEPT or REVISE",
                s
            )))
        }
    }
}

/// A vote recorded against a review request
///
/// Exactly one vote may exist per review request and it never changes once
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The review request this vote answers
    pub request: ReviewTaskName,
    /// The verdict
    pub value: VoteValue,
    /// Who cast the vote, if known
    #[serde(default)]
    pub reviewer: Option<String>,
    /// Free-form remarks; never interpreted
    #[serde(default)]
    pub note: Option<String>,
    /// When the vote was recorded
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    /// Create a vote cast now
    pub fn new(request: ReviewTaskName, value: VoteValue) -> Self {
        Self {
            request,
            value,
            reviewer: None,
            note: None,
            cast_at: Utc::now(),
        }
    }

    /// Attribute the vote to a reviewer
    pub fn by(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Override the timestamp
    pub fn at(mut self, cast_at: DateTime<Utc>) -> Self {
        self.cast_at = cast_at;
        self
    }
}
