use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{Parameter, ParameterView};
use crate::tags;

use super::fingerprint;
use super::ruleset::Target;
use super::schema::{self, Scanner};
use super::{resolve, Deadline};

#[derive(Debug)]
pub(crate) enum Generator {
    ExtractSchema { scanners: Vec<Arc<Scanner>> },
    HttpEndpointFingerprint,
    HttpNetworkFingerprint,
    HttpHeaderFingerprint,
    SessionFingerprint,
}

impl Generator {
    /// Argument names and whether each one is required.
    fn arguments(&self) -> &'static [(&'static str, bool)] {
        match self {
            Generator::ExtractSchema { .. } => &[("inputs", true)],
            Generator::HttpEndpointFingerprint => {
                &[("method", true), ("uri_raw", true), ("query", false), ("body", false)]
            }
            Generator::HttpNetworkFingerprint | Generator::HttpHeaderFingerprint => {
                &[("headers", true)]
            }
            Generator::SessionFingerprint => {
                &[("cookies", false), ("session_id", false), ("user_id", false)]
            }
        }
    }

    fn default_output(&self) -> Option<&'static str> {
        match self {
            Generator::ExtractSchema { .. } => None,
            Generator::HttpEndpointFingerprint => Some(tags::FP_HTTP_ENDPOINT),
            Generator::HttpNetworkFingerprint => Some(tags::FP_HTTP_NETWORK),
            Generator::HttpHeaderFingerprint => Some(tags::FP_HTTP_HEADER),
            Generator::SessionFingerprint => Some(tags::FP_SESSION),
        }
    }

    pub fn is_fingerprint(&self) -> bool {
        !matches!(self, Generator::ExtractSchema { .. })
    }
}

#[derive(Debug)]
pub(crate) struct Mapping {
    arguments: Vec<(&'static str, Vec<Target>)>,
    pub output: String,
}

/// A generator producing derived metadata from request inputs.
#[derive(Debug)]
pub(crate) struct Processor {
    pub id: String,
    pub generator: Generator,
    pub mappings: Vec<Mapping>,
}

impl Processor {
    /// Parse a processor definition.
    ///
    /// Returns `Ok(None)` for processors that do not produce output, which
    /// this engine does not evaluate.
    pub fn parse(value: &Value, scanners: &[Arc<Scanner>]) -> Result<Option<Self>, String> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or("missing key 'id'")?;
        let generator_name = value
            .get("generator")
            .and_then(Value::as_str)
            .ok_or("missing key 'generator'")?;
        let params = value
            .get("parameters")
            .and_then(Value::as_object)
            .ok_or("missing key 'parameters'")?;

        if !value.get("output").and_then(Value::as_bool).unwrap_or(true) {
            debug!(processor = id, "Skipping processor without output");
            return Ok(None);
        }

        let generator = match generator_name {
            "extract_schema" => Generator::ExtractSchema {
                scanners: select_scanners(params, scanners),
            },
            "http_endpoint_fingerprint" => Generator::HttpEndpointFingerprint,
            "http_network_fingerprint" => Generator::HttpNetworkFingerprint,
            "http_header_fingerprint" => Generator::HttpHeaderFingerprint,
            "session_fingerprint" => Generator::SessionFingerprint,
            other => return Err(format!("unknown generator: {}", other)),
        };

        let mappings = params
            .get("mappings")
            .and_then(Value::as_array)
            .ok_or("missing key 'mappings'")?
            .iter()
            .map(|m| parse_mapping(m, &generator))
            .collect::<Result<Vec<_>, _>>()?;
        if mappings.is_empty() {
            return Err("empty 'mappings'".to_string());
        }

        Ok(Some(Processor {
            id: id.to_string(),
            generator,
            mappings,
        }))
    }

    /// Addresses read by this processor.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .flat_map(|m| m.arguments.iter())
            .flat_map(|(_, targets)| targets.iter())
            .map(|t| t.address.as_str())
    }

    /// Run one mapping; `None` if its required inputs are not all present.
    pub fn run(
        &self,
        mapping: &Mapping,
        input: ParameterView<'_>,
        deadline: &Deadline,
    ) -> crate::Result<Option<String>> {
        let args: Vec<Option<&Parameter>> = mapping
            .arguments
            .iter()
            .map(|(_, targets)| targets.iter().find_map(|t| resolve(input, t)))
            .collect();

        let required_missing = self
            .generator
            .arguments()
            .iter()
            .zip(&args)
            .any(|((_, required), arg)| *required && arg.is_none());
        if required_missing {
            return Ok(None);
        }

        let output = match &self.generator {
            Generator::ExtractSchema { scanners } => match args[0] {
                Some(param) => Some(schema::extract(param, scanners, deadline)?.to_string()),
                None => None,
            },
            Generator::HttpEndpointFingerprint => match (args[0], args[1]) {
                (Some(method), Some(uri)) => {
                    fingerprint::http_endpoint(method, uri, args[2], args[3])
                }
                _ => None,
            },
            Generator::HttpNetworkFingerprint => args[0].and_then(fingerprint::http_network),
            Generator::HttpHeaderFingerprint => args[0].and_then(fingerprint::http_header),
            Generator::SessionFingerprint => fingerprint::session(args[0], args[1], args[2]),
        };
        Ok(output)
    }
}

fn parse_mapping(value: &Value, generator: &Generator) -> Result<Mapping, String> {
    let mut arguments = Vec::new();
    for (name, required) in generator.arguments() {
        match value.get(*name) {
            Some(targets) => arguments.push((*name, Target::parse_list(Some(targets), name)?)),
            None if *required => return Err(format!("missing key '{}'", name)),
            None => arguments.push((*name, Vec::new())),
        }
    }

    let output = match value.get("output").and_then(Value::as_str) {
        Some(output) => output.to_string(),
        None => generator
            .default_output()
            .ok_or("missing key 'output'")?
            .to_string(),
    };

    Ok(Mapping { arguments, output })
}

/// Scanners referenced by id or selected by tags.
fn select_scanners(params: &Map<String, Value>, scanners: &[Arc<Scanner>]) -> Vec<Arc<Scanner>> {
    let Some(refs) = params.get("scanners").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut selected: Vec<Arc<Scanner>> = Vec::new();
    for reference in refs {
        let hits: Vec<&Arc<Scanner>> = if let Some(id) = reference.get("id").and_then(Value::as_str) {
            scanners.iter().filter(|s| s.id == id).collect()
        } else if let Some(tags) = reference.get("tags").and_then(Value::as_object) {
            scanners.iter().filter(|s| s.has_tags(tags)).collect()
        } else {
            warn!(reference = %reference, "Ignoring scanner reference without id or tags");
            Vec::new()
        };
        for scanner in hits {
            if !selected.iter().any(|s| Arc::ptr_eq(s, scanner)) {
                selected.push(Arc::clone(scanner));
            }
        }
    }
    selected
}
