//! Metadata and metric keys reported by inspectors.

pub const WAF_VERSION: &str = "_dd.appsec.waf.version";
pub const EVENT_RULES_VERSION: &str = "_dd.appsec.event_rules.version";
pub const EVENT_RULES_ERRORS: &str = "_dd.appsec.event_rules.errors";

pub const EVENT_RULES_LOADED: &str = "_dd.appsec.event_rules.loaded";
pub const EVENT_RULES_FAILED: &str = "_dd.appsec.event_rules.error_count";
pub const WAF_DURATION: &str = "_dd.appsec.waf.duration";
pub const WAF_TIMEOUTS: &str = "_dd.appsec.waf.timeouts";

pub const FP_HTTP_ENDPOINT: &str = "_dd.appsec.fp.http.endpoint";
pub const FP_HTTP_NETWORK: &str = "_dd.appsec.fp.http.network";
pub const FP_HTTP_HEADER: &str = "_dd.appsec.fp.http.header";
pub const FP_SESSION: &str = "_dd.appsec.fp.session";
