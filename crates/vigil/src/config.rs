use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use vigil_policy::EngineConfig;

use crate::catalog::RequestTypeConfig;
use crate::error::{RootError, RootResult};

/// Top-level configuration for the vigil binary.
///
/// Loaded from a TOML file (typically `~/.vigil/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// JSON file mapping account uuids to their ordered policy lists.
    #[serde(default = "default_policies_path")]
    pub policies_path: PathBuf,

    /// Decision engine toggles.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Request types known to this deployment.
    #[serde(default)]
    pub request_types: Vec<RequestTypeConfig>,
}

fn default_policies_path() -> PathBuf {
    dirs_or_default(".vigil/policies.json")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            policies_path: default_policies_path(),
            engine: EngineConfig::default(),
            request_types: Vec::new(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.engine.max_pattern_length == 0 {
            return Err(RootError::Config("max_pattern_length must be > 0".into()));
        }

        let mut names = HashSet::new();
        for entry in &self.request_types {
            if entry.name.is_empty() {
                return Err(RootError::Config(
                    "request type name must not be empty".into(),
                ));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(RootError::Config(format!(
                    "request type '{}' declared more than once",
                    entry.name
                )));
            }
            if entry.fields.iter().any(|f| f.is_empty()) {
                return Err(RootError::Config(format!(
                    "request type '{}' declares an empty field name",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".vigil/config.toml")
    }
}
