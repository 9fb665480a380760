pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod inspector;
pub mod matcher;
pub mod observability;
pub mod policy;
pub mod tags;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineSettings;
pub use dispatch::{Context, Engine};
pub use domain::{Action, ActionType, Event, Parameter, ParameterView, Rank, Verdict};
pub use error::{Error, Result};
pub use inspector::{Inspector, Listener, WafInspector};
pub use policy::{EngineRuleset, EngineSlot};
