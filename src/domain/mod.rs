pub mod action;
pub mod parameter;
pub mod verdict;

pub use action::{Action, ActionType};
pub use parameter::{Address, Parameter, ParameterView};
pub use verdict::{Event, Rank, Verdict};

use std::collections::BTreeMap;

/// String diagnostics (versions, error summaries, derived outputs).
pub type Meta = BTreeMap<String, String>;

/// Numeric diagnostics (counts, durations).
pub type Metrics = BTreeMap<String, f64>;
