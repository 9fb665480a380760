use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::verdict::Rank;

/// Kind of response an action asks the caller to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Unrecognized or custom action, passed through untouched.
    Invalid,
    Record,
    Redirect,
    Block,
}

impl ActionType {
    /// Map a configured type name to a known kind.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "block_request" => ActionType::Block,
            "redirect_request" => ActionType::Redirect,
            "record" => ActionType::Record,
            _ => ActionType::Invalid,
        }
    }

    /// The verdict rank an action of this kind implies.
    #[inline]
    pub fn rank(&self) -> Rank {
        match self {
            ActionType::Block => Rank::Block,
            ActionType::Redirect => Rank::Redirect,
            ActionType::Record | ActionType::Invalid => Rank::Record,
        }
    }

    /// Parameters filled in when the configuration omits them.
    pub fn default_parameters(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ActionType::Block => &[("status_code", "403"), ("grpc_status_code", "10"), ("type", "auto")],
            ActionType::Redirect => &[("status_code", "303")],
            ActionType::Record | ActionType::Invalid => &[],
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Invalid => write!(f, "invalid"),
            ActionType::Record => write!(f, "record"),
            ActionType::Redirect => write!(f, "redirect"),
            ActionType::Block => write!(f, "block"),
        }
    }
}

/// An action requested by a matched rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,

    /// Type name as written in the ruleset, kept for custom actions.
    pub type_name: String,

    pub parameters: BTreeMap<String, String>,
}

impl Action {
    /// Build an action from its configured type name and parameters,
    /// filling defaults for recognized kinds.
    pub fn from_config(type_name: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        let type_name = type_name.into();
        let kind = ActionType::from_type_name(&type_name);
        let mut parameters = parameters;
        for (key, value) in kind.default_parameters() {
            parameters
                .entry((*key).to_string())
                .or_insert_with(|| (*value).to_string());
        }

        Action {
            kind,
            type_name,
            parameters,
        }
    }

    /// The built-in `block` action.
    pub fn block() -> Self {
        Action::from_config("block_request", BTreeMap::new())
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}
