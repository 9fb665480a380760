use regex::{Regex, RegexBuilder};

/// Placeholder written over sensitive values in match records.
pub const REDACTED: &str = "<Redacted>";

/// Default pattern applied to key paths.
pub const DEFAULT_KEY_REGEX: &str = r"(?i)pass|pw(?:or)?d|secret|(?:api|private|public|access)[_-]?key|token|consumer[_-]?(?:id|key|secret)|sign(?:ed|ature)|bearer|authorization|jsessionid|phpsessid|asp\.net[_-]sessionid|sid|jwt";

/// Default pattern applied to matched values.
pub const DEFAULT_VALUE_REGEX: &str = r#"(?i)(?:p(?:ass)?w(?:or)?d|pass(?:[_-]?phrase)?|secret(?:[_-]?key)?|(?:(?:api|private|public|access)[_-]?)key(?:[_-]?id)?|(?:(?:auth|access|id|refresh)[_-]?)?token|consumer[_-]?(?:id|key|secret)|sign(?:ed|ature)?|auth(?:entication|orization)?|jsessionid|phpsessid|asp\.net(?:[_-]|-)sessionid|sid|jwt)(?:\s*=[^;]|"\s*:\s*"[^"]+")|bearer\s+[a-z0-9._\-]+|token:[a-z0-9]{13}|gh[opsu]_[0-9a-zA-Z]{36}|ey[I-L][\w=-]+\.ey[I-L][\w=-]+(?:\.[\w.+/=-]+)?|[\-]{5}BEGIN[a-z\s]+PRIVATE\sKEY[\-]{5}[^\-]+[\-]{5}END[a-z\s]+PRIVATE\sKEY|ssh-rsa\s*[a-z0-9/\.+]{100,}"#;

/// Decides which matched values must not leave the process.
///
/// An empty pattern disables the corresponding check.
#[derive(Debug, Clone, Default)]
pub struct Obfuscator {
    key: Option<Regex>,
    value: Option<Regex>,
}

impl Obfuscator {
    pub fn new(key_pattern: &str, value_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Obfuscator {
            key: compile(key_pattern)?,
            value: compile(value_pattern)?,
        })
    }

    /// Obfuscator using the default key and value patterns.
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Obfuscator::new(DEFAULT_KEY_REGEX, DEFAULT_VALUE_REGEX)
    }

    /// True if the value at `key_path` must be replaced by [`REDACTED`].
    pub fn is_sensitive(&self, key_path: &[String], value: &str) -> bool {
        if let Some(key) = &self.key {
            if key_path.iter().any(|k| key.is_match(k)) {
                return true;
            }
        }
        self.value.as_ref().is_some_and(|re| re.is_match(value))
    }
}

fn compile(pattern: &str) -> Result<Option<Regex>, regex::Error> {
    if pattern.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
}
