use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::EngineSettings;
use crate::domain::{Address, Event, Meta, Metrics, Parameter, ParameterView};
use crate::error::{Error, Result};
use crate::matcher::{
    self, BuildDiagnostics, EvalState, Handle, DEFAULT_KEY_REGEX, DEFAULT_VALUE_REGEX,
};
use crate::policy::EngineRuleset;
use crate::tags;

use super::{Inspector, Listener};

/// Default evaluation budget in microseconds.
pub const DEFAULT_WAF_TIMEOUT_US: u64 = 10_000;

/// Build options of a [`WafInspector`].
#[derive(Debug, Clone)]
pub struct WafOptions {
    /// Upper bound on every evaluation call.
    pub timeout_us: u64,
    pub obfuscator_key_regex: String,
    pub obfuscator_value_regex: String,
}

impl Default for WafOptions {
    fn default() -> Self {
        WafOptions {
            timeout_us: DEFAULT_WAF_TIMEOUT_US,
            obfuscator_key_regex: DEFAULT_KEY_REGEX.to_string(),
            obfuscator_value_regex: DEFAULT_VALUE_REGEX.to_string(),
        }
    }
}

impl From<&EngineSettings> for WafOptions {
    fn from(settings: &EngineSettings) -> Self {
        WafOptions {
            timeout_us: settings.waf_timeout_us,
            obfuscator_key_regex: settings.obfuscator_key_regex.clone(),
            obfuscator_value_regex: settings.obfuscator_value_regex.clone(),
        }
    }
}

/// Inspector backed by the rule-matching engine.
#[derive(Debug)]
pub struct WafInspector {
    handle: Arc<Handle>,
    diagnostics: Arc<BuildDiagnostics>,
    subscriptions: BTreeSet<Address>,
    timeout_us: u64,
}

impl WafInspector {
    /// Build from a ruleset document.
    ///
    /// Rules that fail to compile are reported in `meta`/`metrics` and do not
    /// fail the build.
    pub fn from_ruleset(
        ruleset: &EngineRuleset,
        meta: &mut Meta,
        metrics: &mut Metrics,
        options: WafOptions,
    ) -> Result<Self> {
        let (handle, diagnostics) = Handle::build(
            ruleset.document(),
            &options.obfuscator_key_regex,
            &options.obfuscator_value_regex,
        )?;

        report_diagnostics(&diagnostics, meta, metrics);

        info!(
            loaded = diagnostics.loaded.len(),
            failed = diagnostics.failed_count(),
            rules_version = diagnostics.rules_version.as_deref().unwrap_or("unknown"),
            "Rule-matching engine built"
        );

        Ok(WafInspector::with_handle(
            handle,
            Arc::new(diagnostics),
            options.timeout_us,
        ))
    }

    /// Build from ruleset text.
    pub fn from_json_str(
        text: &str,
        meta: &mut Meta,
        metrics: &mut Metrics,
        options: WafOptions,
    ) -> Result<Self> {
        let ruleset = EngineRuleset::from_json_str(text)?;
        Self::from_ruleset(&ruleset, meta, metrics, options)
    }

    /// Build with timeout and obfuscation taken from settings.
    pub fn from_settings(
        settings: &EngineSettings,
        ruleset: &EngineRuleset,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<Self> {
        Self::from_ruleset(ruleset, meta, metrics, WafOptions::from(settings))
    }

    fn with_handle(handle: Handle, diagnostics: Arc<BuildDiagnostics>, timeout_us: u64) -> Self {
        let subscriptions = handle.addresses().clone();
        WafInspector {
            handle: Arc::new(handle),
            diagnostics,
            subscriptions,
            timeout_us,
        }
    }

    /// Apply a `rules_data` document, producing a new inspector.
    ///
    /// The rules are unchanged, so the diagnostics reported are those of the
    /// original build.
    pub fn with_rule_data(
        &self,
        doc: &Parameter,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<WafInspector> {
        let handle = self.handle.update_rule_data(doc)?;

        report_diagnostics(&self.diagnostics, meta, metrics);

        debug!(rules = handle.rule_count(), "Rule data applied");
        Ok(WafInspector::with_handle(
            handle,
            Arc::clone(&self.diagnostics),
            self.timeout_us,
        ))
    }

    pub fn timeout_us(&self) -> u64 {
        self.timeout_us
    }

    pub fn rules_version(&self) -> Option<&str> {
        self.handle.rules_version()
    }

    /// Concrete listener, for callers that do not go through the trait.
    pub fn listener(&self) -> WafListener {
        WafListener {
            handle: Arc::clone(&self.handle),
            timeout_us: self.timeout_us,
            state: EvalState::default(),
            duration: Duration::ZERO,
            timeouts: 0,
            derivatives: BTreeMap::new(),
        }
    }
}

/// Ruleset diagnostics as metadata and metrics.
///
/// The errors key is removed when the build had no failures, so maps reused
/// across builds never keep a stale entry.
fn report_diagnostics(diagnostics: &BuildDiagnostics, meta: &mut Meta, metrics: &mut Metrics) {
    meta.insert(tags::WAF_VERSION.to_string(), matcher::VERSION.to_string());
    if diagnostics.failed.is_empty() {
        meta.remove(tags::EVENT_RULES_ERRORS);
    } else {
        meta.insert(tags::EVENT_RULES_ERRORS.to_string(), diagnostics.errors_json());
    }
    if let Some(version) = &diagnostics.rules_version {
        meta.insert(tags::EVENT_RULES_VERSION.to_string(), version.clone());
    }
    metrics.insert(
        tags::EVENT_RULES_LOADED.to_string(),
        diagnostics.loaded.len() as f64,
    );
    metrics.insert(
        tags::EVENT_RULES_FAILED.to_string(),
        diagnostics.failed_count() as f64,
    );
}

impl Inspector for WafInspector {
    fn name(&self) -> &str {
        "waf"
    }

    fn subscriptions(&self) -> &BTreeSet<Address> {
        &self.subscriptions
    }

    fn create_listener(&self) -> Box<dyn Listener> {
        Box::new(self.listener())
    }

    fn update(
        &self,
        config: &Parameter,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<Arc<dyn Inspector>> {
        Ok(Arc::new(self.with_rule_data(config, meta, metrics)?))
    }
}

/// Evaluation state of one request context, bound to one engine instance.
#[derive(Debug)]
pub struct WafListener {
    handle: Arc<Handle>,
    timeout_us: u64,
    state: EvalState,
    duration: Duration,
    timeouts: u64,
    derivatives: BTreeMap<String, String>,
}

impl Listener for WafListener {
    fn call(&mut self, data: ParameterView<'_>, budget_us: u64) -> Result<Event> {
        if !data.is_map() {
            return Err(Error::invalid_object(".", "published data is not a map"));
        }

        let budget_us = budget_us.min(self.timeout_us);
        let start = Instant::now();
        let result = self.handle.evaluate(&mut self.state, data, budget_us);
        self.duration += start.elapsed();

        let evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(e) => {
                if e.is_timeout() {
                    self.timeouts += 1;
                }
                return Err(e);
            }
        };

        self.derivatives.extend(evaluation.derivatives);
        Ok(Event {
            data: evaluation.events,
            actions: evaluation.actions.into_iter().collect(),
        })
    }

    fn get_meta_and_metrics(&self, meta: &mut Meta, metrics: &mut Metrics) {
        if let Some(version) = self.handle.rules_version() {
            meta.insert(tags::EVENT_RULES_VERSION.to_string(), version.to_string());
        }
        // Fingerprint keys are always reported, empty when not computed
        for output in self.handle.fingerprint_outputs() {
            meta.insert(output.to_string(), String::new());
        }
        meta.extend(self.derivatives.iter().map(|(k, v)| (k.clone(), v.clone())));

        metrics.insert(
            tags::WAF_DURATION.to_string(),
            self.duration.as_secs_f64() * 1_000_000.0,
        );
        if self.timeouts > 0 {
            metrics.insert(tags::WAF_TIMEOUTS.to_string(), self.timeouts as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionType;
    use crate::testing::{RULES_INVALID, RULES_OK, WAF_RULE, WAF_RULE_WITH_DATA};
    use regex::Regex;
    use serde_json::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ruleset_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn inspector(text: &str, options: WafOptions) -> WafInspector {
        WafInspector::from_json_str(text, &mut Meta::new(), &mut Metrics::new(), options).unwrap()
    }

    fn parse(event: &Event, index: usize) -> Value {
        serde_json::from_str(&event.data[index]).unwrap()
    }

    fn client_ip() -> Parameter {
        let mut p = Parameter::map();
        p.add("http.client_ip", Parameter::string("192.168.1.1"));
        p
    }

    fn rules_with_action(on_match: &str, actions: &str) -> String {
        format!(
            r#"{{"version":"2.1","rules":[{{"id":"blk-001-001","name":"BlockIPAddresses","tags":{{"type":"block_ip","category":"security_response"}},"conditions":[{{"parameters":{{"inputs":[{{"address":"http.client_ip"}}],"data":"blocked_ips"}},"operator":"ip_match"}}],"transformers":[],"on_match":["{}"]}}],"actions":{},"rules_data":[{{"id":"blocked_ips","type":"data_with_expiration","data":[{{"value":"192.168.1.1","expiration":"9999999999"}}]}}]}}"#,
            on_match, actions
        )
    }

    #[test]
    fn test_init_with_invalid_rules() {
        let file = ruleset_file(RULES_INVALID);
        let settings = EngineSettings {
            rules_file: file.path().to_path_buf(),
            ..Default::default()
        };
        let ruleset = EngineRuleset::from_path(&settings.rules_file).unwrap();
        let mut meta = Meta::new();
        let mut metrics = Metrics::new();

        WafInspector::from_settings(&settings, &ruleset, &mut meta, &mut metrics).unwrap();

        assert_eq!(meta.len(), 2);
        assert_eq!(meta[tags::WAF_VERSION], matcher::VERSION);

        let errors: Value = serde_json::from_str(&meta[tags::EVENT_RULES_ERRORS]).unwrap();
        assert!(errors.is_object());
        assert!(errors.get("missing key 'type'").is_some());
        assert!(errors.get("unknown matcher: squash").is_some());
        assert!(errors.get("missing key 'inputs'").is_some());

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[tags::EVENT_RULES_LOADED], 1.0);
        assert_eq!(metrics[tags::EVENT_RULES_FAILED], 4.0);
    }

    #[test]
    fn test_run_with_invalid_param() {
        let wi = inspector(WAF_RULE, WafOptions::default());
        let mut listener = wi.create_listener();

        let err = listener.call(ParameterView::default(), DEFAULT_WAF_TIMEOUT_US).unwrap_err();
        assert!(matches!(err, Error::InvalidObject { .. }));
    }

    #[test]
    fn test_run_with_timeout() {
        let wi = inspector(
            WAF_RULE,
            WafOptions {
                timeout_us: 0,
                ..Default::default()
            },
        );
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        p.add("arg1", Parameter::string("string 1"));
        p.add("arg2", Parameter::string("string 2"));

        let err = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap_err();
        assert!(err.is_timeout());

        let mut metrics = Metrics::new();
        listener.get_meta_and_metrics(&mut Meta::new(), &mut metrics);
        assert_eq!(metrics[tags::WAF_TIMEOUTS], 1.0);
    }

    #[test]
    fn test_valid_run_good() {
        let wi = inspector(WAF_RULE, WafOptions::default());
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        p.add("arg1", Parameter::string("string 1"));
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();
        assert!(event.is_empty());

        let mut meta = Meta::new();
        let mut metrics = Metrics::new();
        listener.get_meta_and_metrics(&mut meta, &mut metrics);
        assert_eq!(meta[tags::EVENT_RULES_VERSION], "1.2.3");
        assert!(metrics[tags::WAF_DURATION] > 0.0);
        assert!(!metrics.contains_key(tags::WAF_TIMEOUTS));
    }

    #[test]
    fn test_valid_run_monitor() {
        let wi = inspector(WAF_RULE, WafOptions::default());
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        p.add("arg1", Parameter::string("string 1"));
        p.add("arg2", Parameter::string("string 3"));
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();

        assert_eq!(event.data.len(), 1);
        assert!(parse(&event, 0).is_object());
        assert!(event.actions.is_empty());

        let mut meta = Meta::new();
        let mut metrics = Metrics::new();
        listener.get_meta_and_metrics(&mut meta, &mut metrics);
        assert_eq!(meta[tags::EVENT_RULES_VERSION], "1.2.3");
        assert!(metrics[tags::WAF_DURATION] > 0.0);
    }

    #[test]
    fn test_valid_run_monitor_obfuscated() {
        let wi = inspector(
            WAF_RULE,
            WafOptions {
                obfuscator_key_regex: "password".to_string(),
                obfuscator_value_regex: "string 3".to_string(),
                ..Default::default()
            },
        );
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        let mut sub = Parameter::map();
        sub.add("password", Parameter::string("string 1"));
        p.add("arg1", sub);
        p.add("arg2", Parameter::string("string 3"));
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();

        assert_eq!(event.data.len(), 1);
        let doc = parse(&event, 0);
        assert_eq!(doc["rule_matches"][0]["parameters"][0]["value"], "<Redacted>");
        assert_eq!(doc["rule_matches"][1]["parameters"][0]["value"], "<Redacted>");
        assert!(event.actions.is_empty());
    }

    #[test]
    fn test_valid_run_monitor_obfuscated_from_settings() {
        let file = ruleset_file(RULES_OK);
        let settings = EngineSettings {
            rules_file: file.path().to_path_buf(),
            obfuscator_key_regex: "password".to_string(),
            ..Default::default()
        };
        let ruleset = EngineRuleset::from_path(&settings.rules_file).unwrap();
        let mut meta = Meta::new();
        let mut metrics = Metrics::new();
        let wi = WafInspector::from_settings(&settings, &ruleset, &mut meta, &mut metrics).unwrap();
        assert_eq!(wi.timeout_us(), DEFAULT_WAF_TIMEOUT_US);
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        let mut sub = Parameter::map();
        sub.add("password", Parameter::string("acunetix-product"));
        p.add("server.request.headers.no_cookies", sub);
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();

        assert_eq!(event.data.len(), 1);
        assert!(event.actions.is_empty());
        assert_eq!(parse(&event, 0)["rule_matches"][0]["parameters"][0]["value"], "<Redacted>");

        listener.get_meta_and_metrics(&mut meta, &mut metrics);
        assert_eq!(meta[tags::EVENT_RULES_VERSION], "1.2.3");
        assert!(metrics[tags::WAF_DURATION] > 0.0);
    }

    #[test]
    fn test_unredacted_match_keeps_value() {
        let wi = inspector(
            WAF_RULE,
            WafOptions {
                obfuscator_key_regex: String::new(),
                obfuscator_value_regex: String::new(),
                ..Default::default()
            },
        );
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        p.add("arg1", Parameter::string("string 1"));
        p.add("arg2", Parameter::string("string 3"));
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();

        let doc = parse(&event, 0);
        assert_eq!(doc["rule_matches"][0]["parameters"][0]["value"], "string 1");
        assert_eq!(doc["rule_matches"][1]["parameters"][0]["value"], "string 3");
    }

    #[test]
    fn test_update_rule_data() {
        let wi = inspector(WAF_RULE_WITH_DATA, WafOptions::default());
        assert_eq!(wi.subscriptions().len(), 1);
        assert!(wi.subscriptions().contains("http.client_ip"));

        let p = client_ip();
        let event = wi
            .create_listener()
            .call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();
        assert!(event.data.is_empty());

        let update = Parameter::from_json_str(
            r#"{"rules_data":[{"id":"blocked_ips","type":"data_with_expiration","data":[{"value":"192.168.1.1","expiration":"9999999999"}]}]}"#,
        )
        .unwrap();
        let updated = wi
            .update(&update, &mut Meta::new(), &mut Metrics::new())
            .unwrap();
        assert_eq!(updated.subscriptions().len(), 1);

        let event = updated
            .create_listener()
            .call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();
        assert_eq!(event.data.len(), 1);
        assert_eq!(parse(&event, 0)["rule_matches"][0]["parameters"][0]["value"], "192.168.1.1");
        assert_eq!(event.actions.len(), 1);
        assert_eq!(event.actions[0].kind, ActionType::Block);
    }

    #[test]
    fn test_update_invalid() {
        let wi = inspector(WAF_RULE_WITH_DATA, WafOptions::default());
        let update = Parameter::from_json_str("{}").unwrap();

        let err = wi
            .update(&update, &mut Meta::new(), &mut Metrics::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidObject { .. }));

        // The original inspector keeps serving
        let p = client_ip();
        let event = wi
            .create_listener()
            .call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_update_reports_build_diagnostics() {
        let update = Parameter::from_json_str(
            r#"{"rules_data":[{"id":"blocked_ips","type":"data_with_expiration","data":[{"value":"192.168.1.1","expiration":"9999999999"}]}]}"#,
        )
        .unwrap();
        let mut meta = Meta::new();
        let mut metrics = Metrics::new();

        let wi = WafInspector::from_json_str(RULES_INVALID, &mut meta, &mut metrics, WafOptions::default())
            .unwrap();
        let errors = meta[tags::EVENT_RULES_ERRORS].clone();
        wi.update(&update, &mut meta, &mut metrics).unwrap();

        assert_eq!(metrics[tags::EVENT_RULES_LOADED], 1.0);
        assert_eq!(metrics[tags::EVENT_RULES_FAILED], 4.0);
        assert_eq!(meta[tags::EVENT_RULES_ERRORS], errors);

        // Same maps, clean ruleset: no stale failures survive the update
        let wi = inspector(WAF_RULE_WITH_DATA, WafOptions::default());
        wi.update(&update, &mut meta, &mut metrics).unwrap();

        assert_eq!(metrics[tags::EVENT_RULES_LOADED], 1.0);
        assert_eq!(metrics[tags::EVENT_RULES_FAILED], 0.0);
        assert!(!meta.contains_key(tags::EVENT_RULES_ERRORS));
    }

    #[test]
    fn test_schemas_are_added() {
        let wi = inspector(WAF_RULE, WafOptions::default());
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        let mut sub = Parameter::map();
        sub.add("password", Parameter::string("string 1"));
        p.add("arg1", sub);
        p.add("arg2", Parameter::string("string 3"));
        let event = listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();
        assert_eq!(event.data.len(), 1);

        let mut meta = Meta::new();
        listener.get_meta_and_metrics(&mut meta, &mut Metrics::new());
        assert_eq!(meta["_dd.appsec.s.arg2"], "[8]");
    }

    fn rules_ok_inspector() -> WafInspector {
        let file = ruleset_file(RULES_OK);
        let ruleset = EngineRuleset::from_path(file.path()).unwrap();
        WafInspector::from_settings(
            &EngineSettings::default(),
            &ruleset,
            &mut Meta::new(),
            &mut Metrics::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_fingerprints_are_not_added() {
        let wi = rules_ok_inspector();
        let mut listener = wi.create_listener();

        let p = Parameter::map();
        listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();

        let mut meta = Meta::new();
        listener.get_meta_and_metrics(&mut meta, &mut Metrics::new());
        assert_eq!(meta[tags::FP_HTTP_ENDPOINT], "");
        assert_eq!(meta[tags::FP_HTTP_NETWORK], "");
        assert_eq!(meta[tags::FP_HTTP_HEADER], "");
        assert_eq!(meta[tags::FP_SESSION], "");
    }

    #[test]
    fn test_fingerprints_are_added() {
        let wi = rules_ok_inspector();
        let mut listener = wi.create_listener();

        let mut p = Parameter::map();
        let mut query = Parameter::map();
        query.add("query", Parameter::string("asdfds"));
        p.add("server.request.uri.raw", Parameter::string("asdfds"));
        p.add("server.request.method", Parameter::string("GET"));
        p.add("server.request.query", query);

        let mut headers = Parameter::map();
        headers.add("X-Forwarded-For", Parameter::string("192.168.72.0"));
        headers.add("user-agent", Parameter::string("acunetix-product"));
        p.add("server.request.headers.no_cookies", headers);

        p.add("server.request.cookies", Parameter::string("asdfds"));
        p.add("usr.session_id", Parameter::string("asdfds"));
        p.add("usr.id", Parameter::string("asdfds"));

        listener.call(ParameterView::new(&p), DEFAULT_WAF_TIMEOUT_US).unwrap();
        let mut meta = Meta::new();
        listener.get_meta_and_metrics(&mut meta, &mut Metrics::new());

        let full = |pattern: &str| Regex::new(&format!("^{}$", pattern)).unwrap();
        assert!(full("http-get(-[A-Za-z0-9]*){3}").is_match(&meta[tags::FP_HTTP_ENDPOINT]));
        assert!(full("net-[0-9]*-[a-zA-Z0-9]*").is_match(&meta[tags::FP_HTTP_NETWORK]));
        assert!(full("hdr(-[0-9]*-[a-zA-Z0-9]*){2}").is_match(&meta[tags::FP_HTTP_HEADER]));
        assert!(full("ssn(-[a-zA-Z0-9]*){4}").is_match(&meta[tags::FP_SESSION]));
    }

    #[test]
    fn test_actions_with_custom_parameters() {
        let rules = rules_with_action(
            "custom",
            r#"[{"id":"custom","type":"block_request","parameters":{"status_code":123,"grpc_status_code":321,"type":"json","custom_param":"foo"}}]"#,
        );
        let wi = inspector(&rules, WafOptions::default());
        let event = wi
            .create_listener()
            .call(ParameterView::new(&client_ip()), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();

        assert_eq!(event.data.len(), 1);
        assert_eq!(event.actions.len(), 1);
        let action = &event.actions[0];
        assert_eq!(action.kind, ActionType::Block);
        assert_eq!(action.parameter("status_code"), Some("123"));
        assert_eq!(action.parameter("grpc_status_code"), Some("321"));
        assert_eq!(action.parameter("type"), Some("json"));
        assert_eq!(action.parameter("custom_param"), Some("foo"));
    }

    #[test]
    fn test_actions_with_default_parameters() {
        let rules = rules_with_action(
            "custom",
            r#"[{"id":"custom","type":"block_request","parameters":{}}]"#,
        );
        let wi = inspector(&rules, WafOptions::default());
        let event = wi
            .create_listener()
            .call(ParameterView::new(&client_ip()), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();

        let action = &event.actions[0];
        assert_eq!(action.kind, ActionType::Block);
        assert_eq!(action.parameter("status_code"), Some("403"));
        assert_eq!(action.parameter("grpc_status_code"), Some("10"));
        assert_eq!(action.parameter("type"), Some("auto"));
    }

    #[test]
    fn test_custom_action_type() {
        let rules = rules_with_action(
            "custom",
            r#"[{"id":"custom","type":"custom_type","parameters":{"some":"parameter"}}]"#,
        );
        let wi = inspector(&rules, WafOptions::default());
        let event = wi
            .create_listener()
            .call(ParameterView::new(&client_ip()), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();

        assert_eq!(event.actions.len(), 1);
        let action = &event.actions[0];
        assert_eq!(action.kind, ActionType::Invalid);
        assert_eq!(action.type_name, "custom_type");
        assert_eq!(action.parameter("some"), Some("parameter"));
    }

    #[test]
    fn test_default_block_action() {
        let rules = rules_with_action("block", "[]");
        let wi = inspector(&rules, WafOptions::default());
        let event = wi
            .create_listener()
            .call(ParameterView::new(&client_ip()), DEFAULT_WAF_TIMEOUT_US)
            .unwrap();

        assert_eq!(event.actions.len(), 1);
        assert_eq!(event.actions[0], crate::domain::Action::block());
    }
}
