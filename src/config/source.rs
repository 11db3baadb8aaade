//! Typed property lookups and the process-wide override layer.
use std::collections::HashMap;

/// Anything that can answer "what is the string value of this key".
///
/// Typed accessors never fail: a missing key or a value that does not parse
/// yields the caller's default.
pub trait PropertySource {
    /// Raw lookup.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Raw lookup with a fallback.
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Parse the value as an integer, falling back to `default` when absent or malformed.
    fn get_integer(&self, key: &str, default: i64) -> i64 {
        self.get_string(key)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// `"1"` and case-insensitive `"true"` are true; every other value,
    /// including empty or absent, yields `default`.
    fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get_string(key) {
            Some(value) if value == "1" || value.eq_ignore_ascii_case("true") => true,
            _ => default,
        }
    }
}

/// Override layer consulted before any property file.
///
/// Runtime properties (set explicitly, e.g. from `-D KEY=VALUE` on the command
/// line) win over environment variables. The environment is snapshotted when the
/// layer is created so the effective configuration stays immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    properties: HashMap<String, String>,
    environment: HashMap<String, String>,
}

impl Overrides {
    /// Empty layer: no runtime properties, no environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer built from the running process: the given runtime properties plus
    /// the current environment.
    pub fn from_process<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            environment: std::env::vars().collect(),
        }
    }

    /// Set a runtime property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set an environment entry (used by embedders and tests instead of mutating
    /// the real process environment).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

impl PropertySource for Overrides {
    fn get_string(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .or_else(|| self.environment.get(key))
            .cloned()
    }
}

/// Parse a `KEY=VALUE` pair as given on the command line.
pub fn parse_property_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_property_wins_over_environment() {
        let overrides = Overrides::new()
            .with_env("JETTY_THREAD_POOL_MAX_THREADS", "200")
            .with_property("JETTY_THREAD_POOL_MAX_THREADS", "300");

        assert_eq!(
            overrides.get_string("JETTY_THREAD_POOL_MAX_THREADS").as_deref(),
            Some("300")
        );
    }

    #[test]
    fn test_environment_used_when_no_property() {
        let overrides = Overrides::new().with_env("JETTY_LOG_REQUESTS", "1");
        assert_eq!(overrides.get_string("JETTY_LOG_REQUESTS").as_deref(), Some("1"));
        assert_eq!(overrides.get_string("UNSET_KEY"), None);
    }

    #[test]
    fn test_get_boolean_truthy_tokens() {
        for token in ["1", "true", "TRUE", "True"] {
            let overrides = Overrides::new().with_env("FLAG", token);
            assert!(overrides.get_boolean("FLAG", false), "token {token}");
        }
    }

    #[test]
    fn test_get_boolean_other_tokens_yield_default() {
        for token in ["0", "false", "", "yes", "on"] {
            let overrides = Overrides::new().with_env("FLAG", token);
            assert!(!overrides.get_boolean("FLAG", false), "token {token}");
            assert!(overrides.get_boolean("FLAG", true), "token {token}");
        }
        assert!(Overrides::new().get_boolean("ABSENT", true));
        assert!(!Overrides::new().get_boolean("ABSENT", false));
    }

    #[test]
    fn test_get_integer() {
        let overrides = Overrides::new()
            .with_env("GOOD", "42")
            .with_env("NEGATIVE", "-7")
            .with_env("BAD", "4x2")
            .with_env("SPACED", " 42");

        assert_eq!(overrides.get_integer("GOOD", 10), 42);
        assert_eq!(overrides.get_integer("NEGATIVE", 10), -7);
        assert_eq!(overrides.get_integer("BAD", 10), 10);
        assert_eq!(overrides.get_integer("SPACED", 10), 10);
        assert_eq!(overrides.get_integer("ABSENT", 10), 10);
    }

    #[test]
    fn test_get_string_or() {
        let overrides = Overrides::new().with_property("NAME", "svc");
        assert_eq!(overrides.get_string_or("NAME", "x"), "svc");
        assert_eq!(overrides.get_string_or("OTHER", "x"), "x");
    }

    #[test]
    fn test_parse_property_assignment() {
        assert_eq!(
            parse_property_assignment("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert_eq!(
            parse_property_assignment("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_property_assignment("novalue").is_err());
        assert!(parse_property_assignment("=x").is_err());
    }
}
