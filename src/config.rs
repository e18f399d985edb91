//! Configuration loading and management
//!
//! Handles `config.json` inside the storage directory:
//!
//! ```json
//! { "default_project": "API", "projects": { "API": { "version": 2 } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lock;
use crate::project::validate_prefix;

/// Process-wide persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Project used when a command names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,

    /// Per-project schema versions
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub version: u32,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, or return defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file (atomic)
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        lock::write_atomic(path, content.as_bytes())
    }

    pub fn version_of(&self, prefix: &str) -> Option<u32> {
        self.projects.get(prefix).map(|project| project.version)
    }

    /// Record a schema version. Returns `true` when it changed.
    pub fn set_version(&mut self, prefix: &str, version: u32) -> bool {
        if self.version_of(prefix) == Some(version) {
            return false;
        }
        self.projects
            .insert(prefix.to_string(), ProjectConfig { version });
        true
    }

    pub fn set_default(&mut self, prefix: &str) -> Result<()> {
        validate_prefix(prefix)?;
        self.default_project = Some(prefix.to_string());
        Ok(())
    }
}
