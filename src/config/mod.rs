use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::inspector::DEFAULT_WAF_TIMEOUT_US;
use crate::matcher::{DEFAULT_KEY_REGEX, DEFAULT_VALUE_REGEX};

/// Inspection engine configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "appsec-engine")]
#[command(about = "Request inspection engine with hot-swappable rulesets")]
pub struct EngineSettings {
    /// Path to the ruleset file (JSON, or YAML by extension)
    #[arg(long, default_value = "rules.json", env = "DD_APPSEC_RULES")]
    pub rules_file: PathBuf,

    /// Evaluation budget in microseconds per inspector call
    #[arg(long, default_value_t = DEFAULT_WAF_TIMEOUT_US, env = "DD_APPSEC_WAF_TIMEOUT")]
    pub waf_timeout_us: u64,

    /// Pattern for keys whose matched values are redacted (empty disables)
    #[arg(long, default_value = DEFAULT_KEY_REGEX, env = "DD_APPSEC_OBFUSCATION_PARAMETER_KEY_REGEXP")]
    pub obfuscator_key_regex: String,

    /// Pattern for matched values that are redacted (empty disables)
    #[arg(long, default_value = DEFAULT_VALUE_REGEX, env = "DD_APPSEC_OBFUSCATION_PARAMETER_VALUE_REGEXP")]
    pub obfuscator_value_regex: String,

    /// Ruleset reload check interval in seconds
    #[arg(long, default_value = "30", env = "DD_APPSEC_RULES_RELOAD_SECS")]
    pub rules_reload_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl EngineSettings {
    /// Ruleset reload interval as Duration.
    pub fn rules_reload_interval(&self) -> Duration {
        Duration::from_secs(self.rules_reload_secs)
    }

    /// Evaluation budget as Duration.
    pub fn waf_timeout(&self) -> Duration {
        Duration::from_micros(self.waf_timeout_us)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            rules_file: PathBuf::from("rules.json"),
            waf_timeout_us: DEFAULT_WAF_TIMEOUT_US,
            obfuscator_key_regex: DEFAULT_KEY_REGEX.to_string(),
            obfuscator_value_regex: DEFAULT_VALUE_REGEX.to_string(),
            rules_reload_secs: 30,
            log_level: "info".to_string(),
        }
    }
}
