use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::wire::proto;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid solver configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize solver configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    solvers: BTreeMap<String, toml::Table>,
}

/// Per-solver parameters sent along with a solve request, keyed by solver name.
///
/// ```toml
/// [solvers.tamer]
/// weight = 0.8
/// heuristic = "hadd"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolverConfig {
    solvers: BTreeMap<String, BTreeMap<String, String>>,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-string values are kept as their TOML text (`0.8`, `true`, `[1, 2]`).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let solvers = raw
            .solvers
            .into_iter()
            .map(|(solver, table)| {
                let params = table
                    .into_iter()
                    .map(|(k, v)| match v {
                        toml::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
                (solver, params)
            })
            .collect();
        Ok(Self { solvers })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), solvers = config.solvers.len(), "loaded solver configuration");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn set(&mut self, solver: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.solvers.entry(solver.into()).or_default().insert(key.into(), value.into());
        self
    }

    pub fn solver(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.solvers.get(name)
    }

    pub fn solvers(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, String>)> {
        self.solvers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    pub fn to_wire(&self) -> Vec<proto::SolverEntry> {
        self.solvers
            .iter()
            .map(|(name, parameters)| proto::SolverEntry { name: name.clone(), parameters: parameters.clone() })
            .collect()
    }

    /// Entries naming the same solver are merged, later keys win.
    pub fn from_wire(entries: &[proto::SolverEntry]) -> Self {
        let mut config = Self::new();
        for entry in entries {
            config.solvers.entry(entry.name.clone()).or_default().extend(entry.parameters.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_rendered_as_text() {
        let config = SolverConfig::from_toml_str(
            r#"
            [solvers.tamer]
            weight = 0.8
            heuristic = "hadd"
            anytime = true

            [solvers.enhsp]
            timeout = 30
            "#,
        )
        .unwrap();
        let tamer = config.solver("tamer").unwrap();
        assert_eq!(tamer["weight"], "0.8");
        assert_eq!(tamer["heuristic"], "hadd");
        assert_eq!(tamer["anytime"], "true");
        assert_eq!(config.solver("enhsp").unwrap()["timeout"], "30");
        let names: Vec<_> = config.solvers().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["enhsp", "tamer"]);
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!(SolverConfig::from_toml_str("").unwrap().is_empty());
        assert!(matches!(SolverConfig::from_toml_str("[solvers"), Err(ConfigError::Parse(_))));
        assert!(matches!(SolverConfig::from_toml_str("solvers = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::Builder::new().prefix("upf_config").tempdir().unwrap();
        let path = dir.path().join("solvers.toml");
        let mut config = SolverConfig::new();
        config.set("tamer", "weight", "0.5").set("tamer", "heuristic", "hff");
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(SolverConfig::load(&path).unwrap(), config);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(SolverConfig::load(&missing), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_wire_entries_ordered() {
        let mut config = SolverConfig::new();
        config.set("b", "x", "1").set("a", "y", "2");
        let entries = config.to_wire();
        assert_eq!(entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(SolverConfig::from_wire(&entries), config);
    }
}
