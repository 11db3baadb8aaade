use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use eyre::{Context, Result, eyre};

use crate::config::{effective::EffectiveConfig, source::Overrides};

/// Source name of the default property file, read before any overlay.
pub const DEFAULT_PROPERTY_FILE: &str = "/config/config.properties";

/// Merges property sources into an [`EffectiveConfig`].
///
/// Source names are resolved against a resource root directory; a leading `/`
/// is ignored so that `/config/config.properties` means
/// `<root>/config/config.properties`.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    root: PathBuf,
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read `default_source`, then every source in `additional` in order, each
    /// later source overwriting earlier keys.
    ///
    /// Missing, unreadable or malformed sources are skipped.
    pub fn resolve<I, S>(&self, default_source: &str, additional: I, overrides: Overrides) -> EffectiveConfig
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = self.load_source(default_source);
        for source in additional {
            values.extend(self.load_source(source.as_ref()));
        }

        tracing::debug!(keys = values.len(), root = %self.root.display(), "Resolved property sources");
        EffectiveConfig::new(values, overrides)
    }

    fn source_path(&self, source: &str) -> PathBuf {
        self.root.join(source.trim_start_matches('/'))
    }

    fn load_source(&self, source: &str) -> BTreeMap<String, String> {
        let path = self.source_path(source);
        match load_properties(&path) {
            Ok(values) => values,
            Err(e) => {
                tracing::debug!("Skipping property source {}: {:#}", path.display(), e);
                BTreeMap::new()
            }
        }
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Load one flat property file. A file that does not exist yields an empty map.
///
/// Keys are taken verbatim: `db` and `db.host` are two unrelated properties.
pub fn load_properties(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    let values = java_properties::read(BufReader::new(file))
        .map_err(|e| eyre!("Failed to read properties from {}: {}", path.display(), e))?;
    Ok(values.into_iter().collect())
}
