use std::collections::BTreeMap;

use config::Config;
use eyre::{Context, Result};
use serde::de::DeserializeOwned;

use crate::config::source::{Overrides, PropertySource};

/// The merged, read-only key/value configuration of one process.
///
/// Lookups consult the override layer first, then the merged property files.
#[derive(Debug, Clone, Default)]
pub struct EffectiveConfig {
    values: BTreeMap<String, String>,
    overrides: Overrides,
}

impl EffectiveConfig {
    pub fn new(values: BTreeMap<String, String>, overrides: Overrides) -> Self {
        Self { values, overrides }
    }

    /// Keys defined by the property files, with override-layer values applied.
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.values
            .keys()
            .filter_map(|key| self.get_string(key).map(|value| (key.clone(), value)))
            .collect()
    }

    /// Deserialize every `prefix.*` key into `T`, e.g. `db.host` and `db.port`
    /// into a `Db { host, port }` struct. Values are strings and are coerced to
    /// the field types.
    pub fn section<T: DeserializeOwned>(&self, prefix: &str) -> Result<T> {
        let dotted = format!("{prefix}.");
        let mut builder = Config::builder();
        for (key, value) in self.properties() {
            if let Some(field) = key.strip_prefix(&dotted) {
                builder = builder
                    .set_override(field, value)
                    .with_context(|| format!("Invalid property key '{key}'"))?;
            }
        }

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<T>())
            .with_context(|| format!("Failed to bind configuration section '{prefix}'"))
    }
}

impl PropertySource for EffectiveConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.overrides
            .get_string(key)
            .or_else(|| self.values.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn config(pairs: &[(&str, &str)], overrides: Overrides) -> EffectiveConfig {
        EffectiveConfig::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            overrides,
        )
    }

    #[test]
    fn test_override_layer_wins() {
        let cfg = config(
            &[("pool_size", "5")],
            Overrides::new().with_env("pool_size", "9"),
        );
        assert_eq!(cfg.get_integer("pool_size", 1), 9);
        assert_eq!(cfg.properties().get("pool_size").map(String::as_str), Some("9"));
    }

    #[test]
    fn test_typed_accessors_fall_back() {
        let cfg = config(&[("count", "ten"), ("enabled", "TRUE")], Overrides::new());
        assert_eq!(cfg.get_integer("count", 10), 10);
        assert!(cfg.get_boolean("enabled", false));
        assert_eq!(cfg.get_string_or("missing", "fallback"), "fallback");
    }

    #[derive(Debug, Deserialize)]
    struct Db {
        host: String,
        port: u16,
        #[serde(default)]
        pool: Option<u32>,
    }

    #[test]
    fn test_section_binding() {
        let cfg = config(
            &[("db.host", "localhost"), ("db.port", "5432"), ("other", "x")],
            Overrides::new(),
        );

        let db: Db = cfg.section("db").unwrap();
        assert_eq!(db.host, "localhost");
        assert_eq!(db.port, 5432);
        assert_eq!(db.pool, None);
    }

    #[test]
    fn test_section_binding_rejects_bad_types() {
        let cfg = config(&[("db.host", "localhost"), ("db.port", "many")], Overrides::new());
        assert!(cfg.section::<Db>("db").is_err());
    }
}
