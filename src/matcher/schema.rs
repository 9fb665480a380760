use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::Parameter;

use super::{Deadline, MAX_CONTAINER_SIZE};

const MAX_SCHEMA_DEPTH: usize = 18;
const MAX_ARRAY_TYPES: usize = 10;
const MAX_MAP_KEYS: usize = 255;

// Scalar type codes
const TYPE_NULL: u8 = 1;
const TYPE_BOOL: u8 = 2;
const TYPE_INTEGER: u8 = 4;
const TYPE_STRING: u8 = 8;
const TYPE_FLOAT: u8 = 16;

/// Classifies string leaves (e.g. as PII) while extracting a schema.
#[derive(Debug)]
pub(crate) struct Scanner {
    pub id: String,
    key: Option<Regex>,
    value: Option<Regex>,
    pub tags: BTreeMap<String, String>,
}

impl Scanner {
    pub fn parse(value: &Value) -> Result<Self, String> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or("missing key 'id'")?;
        let tags = value
            .get("tags")
            .and_then(Value::as_object)
            .ok_or("missing key 'tags'")?
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
        let key = value.get("key").map(scanner_regex).transpose()?;
        let value_re = value.get("value").map(scanner_regex).transpose()?;
        if key.is_none() && value_re.is_none() {
            return Err("scanner requires a key or value matcher".to_string());
        }

        Ok(Scanner {
            id: id.to_string(),
            key,
            value: value_re,
            tags,
        })
    }

    fn matches(&self, key: Option<&str>, value: &str) -> bool {
        let key_ok = match (&self.key, key) {
            (Some(re), Some(k)) => re.is_match(k),
            (Some(_), None) => false,
            (None, _) => true,
        };
        key_ok && self.value.as_ref().map_or(true, |re| re.is_match(value))
    }

    /// True if this scanner carries every given tag.
    pub fn has_tags(&self, wanted: &Map<String, Value>) -> bool {
        wanted
            .iter()
            .all(|(k, v)| v.as_str().is_some_and(|v| self.tags.get(k).is_some_and(|t| t == v)))
    }
}

fn scanner_regex(matcher: &Value) -> Result<Regex, String> {
    let operator = matcher.get("operator").and_then(Value::as_str);
    if operator != Some("match_regex") {
        return Err(format!("unknown matcher: {}", operator.unwrap_or_default()));
    }
    let params = matcher.get("parameters");
    let pattern = params
        .and_then(|p| p.get("regex"))
        .and_then(Value::as_str)
        .ok_or("missing key 'regex'")?;
    let case_sensitive = params
        .and_then(|p| p.get("options"))
        .and_then(|o| o.get("case_sensitive"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| format!("invalid regular expression: {}", e))
}

/// Extract the compact schema of a value.
///
/// Scalars encode as `[type]`, maps as `[{key: schema}]` and arrays as
/// `[[distinct item schemas], {"len": n}]`. String leaves recognized by a
/// scanner carry its tags: `[8, {tags}]`.
pub(crate) fn extract(
    param: &Parameter,
    scanners: &[Arc<Scanner>],
    deadline: &Deadline,
) -> crate::Result<Value> {
    schema_of(param, None, scanners, 0, deadline)
}

fn schema_of(
    param: &Parameter,
    key: Option<&str>,
    scanners: &[Arc<Scanner>],
    depth: usize,
    deadline: &Deadline,
) -> crate::Result<Value> {
    deadline.tick()?;
    let schema = match param {
        Parameter::Invalid | Parameter::Null => json!([TYPE_NULL]),
        Parameter::Bool(_) => json!([TYPE_BOOL]),
        Parameter::Int(_) | Parameter::Uint(_) => json!([TYPE_INTEGER]),
        Parameter::Float(_) => json!([TYPE_FLOAT]),
        Parameter::String(s) => match scanners.iter().find(|sc| sc.matches(key, s)) {
            Some(scanner) => json!([TYPE_STRING, scanner.tags]),
            None => json!([TYPE_STRING]),
        },
        Parameter::Map(entries) => {
            let mut fields = Map::new();
            if depth < MAX_SCHEMA_DEPTH {
                for (k, v) in entries.iter().take(MAX_MAP_KEYS) {
                    fields.insert(k.clone(), schema_of(v, Some(k), scanners, depth + 1, deadline)?);
                }
            }
            json!([fields])
        }
        Parameter::Array(items) => {
            let mut types: Vec<Value> = Vec::new();
            if depth < MAX_SCHEMA_DEPTH {
                for item in items.iter().take(MAX_CONTAINER_SIZE) {
                    let schema = schema_of(item, key, scanners, depth + 1, deadline)?;
                    if !types.contains(&schema) {
                        types.push(schema);
                        if types.len() == MAX_ARRAY_TYPES {
                            break;
                        }
                    }
                }
            }
            json!([types, {"len": items.len()}])
        }
    };
    Ok(schema)
}
