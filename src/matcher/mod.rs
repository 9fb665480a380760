//! Built-in rule-matching engine.
//!
//! A [`Handle`] is an immutable, compiled ruleset. Updating rule data yields a
//! new handle and leaves the original usable.

mod fingerprint;
mod obfuscator;
mod operator;
mod processor;
mod rule_data;
mod ruleset;
mod schema;

use serde_json::{json, Value};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::{Action, Parameter, ParameterView};
use crate::error::{Error, Result};

pub use obfuscator::{Obfuscator, DEFAULT_KEY_REGEX, DEFAULT_VALUE_REGEX, REDACTED};

use processor::Processor;
use rule_data::{DataSet, DataStore};
use ruleset::{Rule, Target};
use schema::Scanner;

/// Version reported as the matching engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const MAX_DEPTH: usize = 20;
const MAX_CONTAINER_SIZE: usize = 256;
const MAX_STRING_LENGTH: usize = 4096;

/// Visited input nodes between two clock reads.
const DEADLINE_POLL_INTERVAL: u32 = 16;

/// Outcome of compiling a ruleset.
#[derive(Debug, Clone, Default)]
pub struct BuildDiagnostics {
    /// Ids of rules that compiled.
    pub loaded: Vec<String>,
    /// Rule ids that failed, grouped by error message.
    pub failed: BTreeMap<String, Vec<String>>,
    /// `metadata.rules_version` of the document, if declared.
    pub rules_version: Option<String>,
}

impl BuildDiagnostics {
    pub fn failed_count(&self) -> usize {
        self.failed.values().map(Vec::len).sum()
    }

    /// Errors as `{"message": ["id", ...]}`.
    pub fn errors_json(&self) -> String {
        json!(self.failed).to_string()
    }
}

/// Memory of one request context: rules already reported and outputs
/// already produced.
#[derive(Debug, Default)]
pub struct EvalState {
    matched: HashSet<String>,
    outputs: HashSet<String>,
}

/// Result of one evaluation call.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// One JSON match record per newly matched rule.
    pub events: Vec<String>,
    pub actions: Vec<Action>,
    /// Derived outputs (fingerprints, schemas) as `(key, value)`.
    pub derivatives: Vec<(String, String)>,
}

/// A compiled ruleset with its rule data and redaction settings.
#[derive(Debug, Clone)]
pub struct Handle {
    rules: Arc<Vec<Rule>>,
    processors: Arc<Vec<Processor>>,
    actions: Arc<HashMap<String, Action>>,
    data: Arc<DataStore>,
    obfuscator: Arc<Obfuscator>,
    addresses: BTreeSet<String>,
    rules_version: Option<String>,
}

impl Handle {
    /// Compile a ruleset document.
    ///
    /// Malformed rules are skipped and reported in the diagnostics. Only a
    /// document that is not an object, or invalid obfuscation patterns, fail
    /// the build.
    pub fn build(
        doc: &Value,
        key_pattern: &str,
        value_pattern: &str,
    ) -> Result<(Handle, BuildDiagnostics)> {
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::Config("ruleset is not an object".to_string()))?;
        let obfuscator = Obfuscator::new(key_pattern, value_pattern)
            .map_err(|e| Error::Config(format!("invalid obfuscation pattern: {}", e)))?;

        let mut diagnostics = BuildDiagnostics {
            rules_version: obj
                .get("metadata")
                .and_then(|m| m.get("rules_version"))
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Default::default()
        };

        let mut rules: Vec<Rule> = Vec::new();
        let rule_values = match obj.get("rules") {
            None => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => return Err(Error::Config("invalid type for 'rules'".to_string())),
        };
        for (index, value) in rule_values.iter().enumerate() {
            match Rule::parse(value, index) {
                Ok(rule) if rules.iter().any(|r| r.id == rule.id) => {
                    diagnostics
                        .failed
                        .entry("duplicate rule".to_string())
                        .or_default()
                        .push(rule.id);
                }
                Ok(rule) => {
                    diagnostics.loaded.push(rule.id.clone());
                    rules.push(rule);
                }
                Err(err) => {
                    debug!(rule = %err.id, error = %err.message, "Failed to load rule");
                    diagnostics.failed.entry(err.message).or_default().push(err.id);
                }
            }
        }

        let scanners: Vec<Arc<Scanner>> = list(obj.get("scanners"))
            .iter()
            .filter_map(|value| match Scanner::parse(value) {
                Ok(scanner) => Some(Arc::new(scanner)),
                Err(e) => {
                    warn!(scanner = %value, error = %e, "Discarding scanner");
                    None
                }
            })
            .collect();

        let processors: Vec<Processor> = list(obj.get("processors"))
            .iter()
            .filter_map(|value| match Processor::parse(value, &scanners) {
                Ok(Some(processor)) => {
                    debug!(processor = %processor.id, outputs = processor.mappings.len(), "Processor loaded");
                    Some(processor)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(processor = %value, error = %e, "Discarding processor");
                    None
                }
            })
            .collect();

        let mut data = Vec::new();
        for entry in list(obj.get("rules_data")) {
            match DataSet::parse(entry) {
                Ok(set) => data.push(set),
                Err(e) => warn!(error = %e, "Discarding rule data"),
            }
        }

        let mut addresses: BTreeSet<String> = rules
            .iter()
            .flat_map(|r| r.conditions.iter())
            .flat_map(|c| c.targets.iter())
            .map(|t| t.address.clone())
            .collect();
        addresses.extend(processors.iter().flat_map(|p| p.addresses()).map(str::to_string));

        let handle = Handle {
            rules: Arc::new(rules),
            processors: Arc::new(processors),
            actions: Arc::new(ruleset::parse_actions(obj)),
            data: Arc::new(DataStore::default().merged(data)),
            obfuscator: Arc::new(obfuscator),
            addresses,
            rules_version: diagnostics.rules_version.clone(),
        };
        Ok((handle, diagnostics))
    }

    /// Addresses read by rules and processors.
    pub fn addresses(&self) -> &BTreeSet<String> {
        &self.addresses
    }

    pub fn rules_version(&self) -> Option<&str> {
        self.rules_version.as_deref()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Output keys of every fingerprint processor.
    pub fn fingerprint_outputs(&self) -> impl Iterator<Item = &str> {
        self.processors
            .iter()
            .filter(|p| p.generator.is_fingerprint())
            .flat_map(|p| p.mappings.iter())
            .map(|m| m.output.as_str())
    }

    /// A copy of this handle with the `rules_data` entries of `doc` replacing
    /// the data sets of the same id.
    pub fn update_rule_data(&self, doc: &Parameter) -> Result<Handle> {
        if !doc.is_map() {
            return Err(Error::invalid_object(".", "rule data update is not a map"));
        }
        let entries = match doc.get("rules_data") {
            Some(Parameter::Array(entries)) => entries,
            Some(_) => return Err(Error::invalid_object("rules_data", "not an array")),
            None => return Err(Error::invalid_object("rules_data", "missing key 'rules_data'")),
        };

        let updates = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                DataSet::parse(&entry.to_json())
                    .map_err(|reason| Error::invalid_object(format!("rules_data[{}]", i), reason))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut handle = self.clone();
        handle.data = Arc::new(self.data.merged(updates));
        Ok(handle)
    }

    /// Evaluate the input against every rule not yet matched in `state`.
    ///
    /// `state` is only updated when the evaluation completes in time.
    pub fn evaluate(
        &self,
        state: &mut EvalState,
        input: ParameterView<'_>,
        budget_us: u64,
    ) -> Result<Evaluation> {
        if !input.is_map() {
            return Err(Error::invalid_object(".", "input is not a map"));
        }
        let deadline = Deadline::new(budget_us);
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let mut out = Evaluation::default();

        for processor in self.processors.iter() {
            deadline.check()?;
            for mapping in &processor.mappings {
                if state.outputs.contains(&mapping.output) {
                    continue;
                }
                if let Some(value) = processor.run(mapping, input, &deadline)? {
                    out.derivatives.push((mapping.output.clone(), value));
                }
            }
        }

        let mut matched = Vec::new();
        for rule in self.rules.iter() {
            if state.matched.contains(&rule.id) {
                continue;
            }
            deadline.check()?;
            let Some(record) = self.match_rule(rule, input, now, &deadline)? else {
                continue;
            };
            out.events.push(record.to_string());
            matched.push(rule.id.clone());

            for action_id in &rule.on_match {
                match self.actions.get(action_id) {
                    Some(action) if !out.actions.contains(action) => out.actions.push(action.clone()),
                    Some(_) => {}
                    None => debug!(rule = %rule.id, action = %action_id, "Unknown action"),
                }
            }
        }

        state.matched.extend(matched);
        state
            .outputs
            .extend(out.derivatives.iter().map(|(key, _)| key.clone()));
        Ok(out)
    }

    /// Match record for a rule whose conditions all hold.
    fn match_rule(
        &self,
        rule: &Rule,
        input: ParameterView<'_>,
        now: u64,
        deadline: &Deadline,
    ) -> Result<Option<Value>> {
        let mut rule_matches = Vec::with_capacity(rule.conditions.len());

        for condition in &rule.conditions {
            deadline.check()?;
            let mut test = |value: &str| match rule.transform(value) {
                Some(transformed) => condition.operator.matches(&transformed, &self.data, now),
                None => condition.operator.matches(value, &self.data, now),
            };

            let mut hit = None;
            for target in &condition.targets {
                let Some(start) = resolve(input, target) else {
                    continue;
                };
                let mut path = target.key_path.clone();
                if let Some(found) = find_match(start, &mut path, 0, deadline, &mut test)? {
                    hit = Some((target, found));
                    break;
                }
            }
            let Some((target, (key_path, mut value, mut highlight))) = hit else {
                return Ok(None);
            };
            if self.obfuscator.is_sensitive(&key_path, &value) {
                value = REDACTED.to_string();
                highlight = REDACTED.to_string();
            }
            rule_matches.push(json!({
                "operator": condition.operator.name(),
                "operator_value": condition.operator.operator_value(),
                "parameters": [{
                    "address": target.address,
                    "key_path": key_path,
                    "value": value,
                    "highlight": [highlight],
                }],
            }));
        }

        Ok(Some(json!({
            "rule": {"id": rule.id, "name": rule.name, "tags": rule.tags},
            "rule_matches": rule_matches,
        })))
    }
}

/// Hard time limit of one evaluation.
///
/// Checked before each processor, rule and condition, and polled while
/// walking input trees.
pub(crate) struct Deadline {
    end: Option<Instant>,
    budget_us: u64,
    visits: Cell<u32>,
}

impl Deadline {
    pub(crate) fn new(budget_us: u64) -> Self {
        Deadline {
            end: Instant::now().checked_add(Duration::from_micros(budget_us)),
            budget_us,
            visits: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        match self.end {
            Some(end) if Instant::now() >= end => Err(Error::Timeout {
                budget_us: self.budget_us,
            }),
            _ => Ok(()),
        }
    }

    /// Count one visited node, reading the clock every few nodes.
    #[inline]
    pub(crate) fn tick(&self) -> Result<()> {
        let visits = self.visits.get().wrapping_add(1);
        self.visits.set(visits);
        if visits % DEADLINE_POLL_INTERVAL == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

fn list(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Resolve a target's address and key path in the input.
pub(crate) fn resolve<'a>(input: ParameterView<'a>, target: &Target) -> Option<&'a Parameter> {
    let mut current = input.get(&target.address)?;
    for key in &target.key_path {
        current = match current {
            Parameter::Map(_) => current.get(key)?,
            Parameter::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Depth-first search for the first scalar accepted by `test`, returning its
/// key path, its value and the highlighted fragment.
fn find_match(
    param: &Parameter,
    path: &mut Vec<String>,
    depth: usize,
    deadline: &Deadline,
    test: &mut dyn FnMut(&str) -> Option<String>,
) -> Result<Option<(Vec<String>, String, String)>> {
    deadline.tick()?;
    match param {
        Parameter::Map(entries) => {
            if depth >= MAX_DEPTH {
                return Ok(None);
            }
            for (key, value) in entries.iter().take(MAX_CONTAINER_SIZE) {
                path.push(key.clone());
                let found = find_match(value, path, depth + 1, deadline, test);
                path.pop();
                if !matches!(found, Ok(None)) {
                    return found;
                }
            }
            Ok(None)
        }
        Parameter::Array(items) => {
            if depth >= MAX_DEPTH {
                return Ok(None);
            }
            for (index, value) in items.iter().enumerate().take(MAX_CONTAINER_SIZE) {
                path.push(index.to_string());
                let found = find_match(value, path, depth + 1, deadline, test);
                path.pop();
                if !matches!(found, Ok(None)) {
                    return found;
                }
            }
            Ok(None)
        }
        Parameter::Invalid | Parameter::Null => Ok(None),
        scalar => {
            let Some(mut value) = scalar.scalar_string() else {
                return Ok(None);
            };
            truncate(&mut value, MAX_STRING_LENGTH);
            Ok(test(&value).map(|highlight| (path.clone(), value, highlight)))
        }
    }
}

fn truncate(value: &mut String, max: usize) {
    if value.len() <= max {
        return;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
}
