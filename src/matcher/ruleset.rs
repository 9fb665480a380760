use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::domain::Action;

use super::operator::Operator;

/// An input address with an optional path into its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub address: String,
    pub key_path: Vec<String>,
}

impl Target {
    pub fn parse(value: &Value) -> Result<Self, String> {
        let address = value
            .get("address")
            .and_then(Value::as_str)
            .ok_or("missing key 'address'")?;
        let key_path = match value.get("key_path") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|k| match k {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err("invalid type for 'key_path'".to_string()),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err("invalid type for 'key_path'".to_string()),
        };
        Ok(Target {
            address: address.to_string(),
            key_path,
        })
    }

    /// Parse a list of targets, rejecting an empty list.
    pub fn parse_list(value: Option<&Value>, key: &str) -> Result<Vec<Self>, String> {
        let items = value
            .and_then(Value::as_array)
            .ok_or_else(|| format!("missing key '{}'", key))?;
        if items.is_empty() {
            return Err(format!("empty '{}'", key));
        }
        items.iter().map(Target::parse).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transformer {
    Lowercase,
}

impl Transformer {
    fn parse(name: &str) -> Result<Self, String> {
        match name {
            "lowercase" => Ok(Transformer::Lowercase),
            other => Err(format!("unknown transformer: {}", other)),
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Transformer::Lowercase => value.to_lowercase(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Condition {
    pub operator: Operator,
    pub targets: Vec<Target>,
}

/// A compiled detection rule. All conditions must match.
#[derive(Debug)]
pub(crate) struct Rule {
    pub id: String,
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub conditions: Vec<Condition>,
    pub transformers: Vec<Transformer>,
    pub on_match: Vec<String>,
}

/// A rule that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RuleError {
    pub id: String,
    pub message: String,
}

impl Rule {
    pub fn parse(value: &Value, index: usize) -> Result<Self, RuleError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("index:{}", index));

        Self::parse_body(value, id.clone()).map_err(|message| RuleError { id, message })
    }

    fn parse_body(value: &Value, id: String) -> Result<Self, String> {
        let obj = value.as_object().ok_or("rule is not an object")?;
        if !obj.contains_key("id") {
            return Err("missing key 'id'".to_string());
        }
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or("missing key 'name'")?
            .to_string();

        let tags_obj = obj
            .get("tags")
            .and_then(Value::as_object)
            .ok_or("missing key 'tags'")?;
        if !tags_obj.contains_key("type") {
            return Err("missing key 'type'".to_string());
        }
        let tags = tags_obj
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();

        let conditions = obj
            .get("conditions")
            .and_then(Value::as_array)
            .ok_or("missing key 'conditions'")?
            .iter()
            .map(parse_condition)
            .collect::<Result<Vec<_>, _>>()?;
        if conditions.is_empty() {
            return Err("empty 'conditions'".to_string());
        }

        let transformers = match obj.get("transformers") {
            None => Vec::new(),
            Some(v) => v
                .as_array()
                .ok_or("invalid type for 'transformers'")?
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| "invalid type for 'transformers'".to_string())
                        .and_then(Transformer::parse)
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let on_match = match obj.get("on_match") {
            Some(v) => v
                .as_array()
                .ok_or("invalid type for 'on_match'")?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        Ok(Rule {
            id,
            name,
            tags,
            conditions,
            transformers,
            on_match,
        })
    }

    /// Apply this rule's transformers in order.
    pub fn transform(&self, value: &str) -> Option<String> {
        if self.transformers.is_empty() {
            return None;
        }
        let mut out = value.to_string();
        for t in &self.transformers {
            out = t.apply(&out);
        }
        Some(out)
    }
}

fn parse_condition(value: &Value) -> Result<Condition, String> {
    let operator = value
        .get("operator")
        .and_then(Value::as_str)
        .ok_or("missing key 'operator'")?;
    let params = value
        .get("parameters")
        .and_then(Value::as_object)
        .ok_or("missing key 'parameters'")?;
    let targets = Target::parse_list(params.get("inputs"), "inputs")?;
    let operator = Operator::parse(operator, params)?;
    Ok(Condition { operator, targets })
}

/// Actions available to `on_match`, keyed by id, including the built-in
/// `block` action.
pub(crate) fn parse_actions(doc: &Map<String, Value>) -> HashMap<String, Action> {
    let mut actions = HashMap::from([("block".to_string(), Action::block())]);

    let Some(items) = doc.get("actions").and_then(Value::as_array) else {
        return actions;
    };
    for item in items {
        let id = item.get("id").and_then(Value::as_str);
        let type_name = item.get("type").and_then(Value::as_str);
        let (Some(id), Some(type_name)) = (id, type_name) else {
            warn!(action = %item, "Discarding action without id or type");
            continue;
        };
        let parameters = item
            .get("parameters")
            .and_then(Value::as_object)
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.clone(), stringify(v)))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();
        actions.insert(id.to_string(), Action::from_config(type_name, parameters));
    }
    actions
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
