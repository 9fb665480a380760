use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::action::Action;

/// Verdict severity, ordered from least to most severe.
///
/// When several inspectors report, the most severe rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Rank {
    /// Nothing matched
    #[default]
    None = 0,
    /// Matches to be reported, request continues
    Record = 1,
    /// Request must be blocked
    Block = 2,
    /// Request must be redirected
    Redirect = 3,
}

impl Rank {
    /// Returns true if the caller has to interrupt the request.
    #[inline]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Rank::Block | Rank::Redirect)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::None => write!(f, "none"),
            Rank::Record => write!(f, "record"),
            Rank::Block => write!(f, "block"),
            Rank::Redirect => write!(f, "redirect"),
        }
    }
}

/// Output of one evaluation: serialized match records plus actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// One JSON document per matched rule.
    pub data: Vec<String>,

    pub actions: SmallVec<[Action; 2]>,
}

impl Event {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.actions.is_empty()
    }
}

/// Rank plus the event that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub rank: Rank,
    pub event: Event,
}

impl Verdict {
    /// A verdict with nothing to report.
    pub fn none() -> Self {
        Verdict::default()
    }

    /// Combine two verdicts, keeping the strictly more severe one.
    /// On equal rank the receiver is kept.
    pub fn combine(self, other: Self) -> Self {
        if other.rank > self.rank {
            other
        } else {
            self
        }
    }
}

impl From<Event> for Verdict {
    fn from(event: Event) -> Self {
        let rank = if event.is_empty() {
            Rank::None
        } else {
            event
                .actions
                .iter()
                .map(|a| a.kind.rank())
                .fold(Rank::Record, Rank::max)
        };
        Verdict { rank, event }
    }
}
