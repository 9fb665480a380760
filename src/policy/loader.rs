use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// A parsed ruleset document.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRuleset {
    document: Value,
}

impl EngineRuleset {
    /// Load a ruleset from a file.
    ///
    /// `.yaml` and `.yml` files are read as YAML, anything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_file_content(path, &content)
    }

    /// Parse file content already read from `path`.
    pub(crate) fn from_file_content(path: &Path, content: &str) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let document: Value = if is_yaml {
            serde_yaml::from_str(content)?
        } else {
            serde_json::from_str(content)?
        };

        Self::from_value(document)
    }

    /// Parse a JSON ruleset.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(Error::Config("ruleset root is not an object".to_string()));
        }
        Ok(EngineRuleset { document })
    }

    /// Declared `metadata.rules_version`.
    pub fn version(&self) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("rules_version"))
            .and_then(Value::as_str)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}
