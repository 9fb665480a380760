use thiserror::Error;

/// Errors surfaced by the inspection core.
#[derive(Error, Debug)]
pub enum Error {
    /// Published data or an update document does not have the required shape.
    #[error("invalid object at '{path}': {reason}")]
    InvalidObject { path: String, reason: String },

    /// An evaluation did not complete within its budget.
    #[error("evaluation exceeded its budget of {budget_us}us")]
    Timeout { budget_us: u64 },

    /// A ruleset or engine setting could not be used at all.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn invalid_object(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for budget exhaustion.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
