use aho_corasick::AhoCorasick;
use ipnetwork::IpNetwork;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::net::IpAddr;

use super::rule_data::DataStore;

/// Condition operator compiled from a rule definition.
#[derive(Debug)]
pub(crate) enum Operator {
    MatchRegex {
        regex: Regex,
        min_length: usize,
    },
    PhraseMatch {
        automaton: AhoCorasick,
    },
    ExactMatch {
        list: HashSet<String>,
        data_id: Option<String>,
    },
    IpMatch {
        list: Vec<IpNetwork>,
        data_id: Option<String>,
    },
}

impl Operator {
    /// Compile an operator from its name and condition parameters.
    pub fn parse(name: &str, params: &Map<String, Value>) -> Result<Self, String> {
        match name {
            "match_regex" => {
                let pattern = params
                    .get("regex")
                    .and_then(Value::as_str)
                    .ok_or("missing key 'regex'")?;
                let options = params.get("options");
                let case_sensitive = options
                    .and_then(|o| o.get("case_sensitive"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let min_length = options
                    .and_then(|o| o.get("min_length"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize;
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| format!("invalid regular expression: {}", e))?;
                Ok(Operator::MatchRegex { regex, min_length })
            }
            "phrase_match" => {
                let list = string_list(params, "list")?.ok_or("missing key 'list'")?;
                let automaton = AhoCorasick::new(&list)
                    .map_err(|e| format!("invalid phrase list: {}", e))?;
                Ok(Operator::PhraseMatch { automaton })
            }
            "exact_match" => {
                let (list, data_id) = list_or_data(params)?;
                Ok(Operator::ExactMatch {
                    list: list.into_iter().collect(),
                    data_id,
                })
            }
            "ip_match" => {
                let (list, data_id) = list_or_data(params)?;
                let list = list
                    .iter()
                    .map(|ip| ip.parse::<IpNetwork>().map_err(|_| format!("invalid ip: {}", ip)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operator::IpMatch { list, data_id })
            }
            other => Err(format!("unknown matcher: {}", other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::MatchRegex { .. } => "match_regex",
            Operator::PhraseMatch { .. } => "phrase_match",
            Operator::ExactMatch { .. } => "exact_match",
            Operator::IpMatch { .. } => "ip_match",
        }
    }

    /// Value reported as `operator_value` in match records.
    pub fn operator_value(&self) -> &str {
        match self {
            Operator::MatchRegex { regex, .. } => regex.as_str(),
            _ => "",
        }
    }

    /// Match a value, returning the highlighted fragment on success.
    pub fn matches(&self, value: &str, data: &DataStore, now: u64) -> Option<String> {
        match self {
            Operator::MatchRegex { regex, min_length } => {
                if value.len() < *min_length {
                    return None;
                }
                regex.find(value).map(|m| m.as_str().to_string())
            }
            Operator::PhraseMatch { automaton } => automaton
                .find(value)
                .map(|m| value[m.start()..m.end()].to_string()),
            Operator::ExactMatch { list, data_id } => {
                let hit = list.contains(value)
                    || data_id
                        .as_deref()
                        .and_then(|id| data.get(id))
                        .is_some_and(|set| set.contains_value(value, now));
                hit.then(|| value.to_string())
            }
            Operator::IpMatch { list, data_id } => {
                let ip: IpAddr = value.trim().parse().ok()?;
                let hit = list.iter().any(|net| net.contains(ip))
                    || data_id
                        .as_deref()
                        .and_then(|id| data.get(id))
                        .is_some_and(|set| set.contains_ip(ip, now));
                hit.then(|| value.to_string())
            }
        }
    }
}

fn string_list(params: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>, String> {
    let Some(value) = params.get(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| format!("invalid type for '{}'", key))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("invalid type for '{}'", key))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn list_or_data(params: &Map<String, Value>) -> Result<(Vec<String>, Option<String>), String> {
    let list = string_list(params, "list")?;
    let data_id = params.get("data").and_then(Value::as_str).map(str::to_string);
    if list.is_none() && data_id.is_none() {
        return Err("missing key 'list' or 'data'".to_string());
    }
    Ok((list.unwrap_or_default(), data_id))
}
