//! Review axes and their fixed focus questions

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One of the three fixed review criteria
///
/// Every round issues exactly one review request per axis. The focus
/// questions are part of the reviewer contract and are rendered verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Correctness
    A,
    /// Test quality
    B,
    /// Elegance
    C,
}

impl Axis {
    /// All axes in letter order
    pub const ALL: [Axis; 3] = [Axis::A, Axis::B, Axis::C];

    /// The single-letter code used in review task names
    pub fn letter(&self) -> char {
        match self {
            Axis::A => 'A',
            Axis::B => 'B',
            Axis::C => 'C',
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Axis::A => "Correctness",
            Axis::B => "Test quality",
            Axis::C => "Elegance",
        }
    }

    /// The focus questions a reviewer on this axis must answer
    pub fn questions(&self) -> &'static [&'static str] {
        match self {
            Axis::A => &[
                "Faithful to user intent?",
                "Technical decisions consistent with stated rationale?",
            ],
            Axis::B => &[
                "Integration-style over unit-style?",
                "System-under-test not replaced by doubles?",
                "Shared fixtures used?",
                "Outcomes asserted (not implementation details)?",
            ],
            Axis::C => &[
                "API shape appropriate?",
                "Not over- or under-engineered?",
                "Complexity proportional to problem size?",
            ],
        }
    }

    /// Parse an axis from its letter
    pub fn from_letter(c: char) -> Result<Self> {
        match c {
            'A' => Ok(Axis::A),
            'B' => Ok(Axis::B),
            'C' => Ok(Axis::C),
            other => Err(Error::InvalidName(format!("unknown axis '{}'", other))),
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl std::str::FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_letter(c.to_ascii_uppercase()),
            _ => Err(Error::InvalidName(format!("unknown axis '{}'", s))),
        }
    }
}
