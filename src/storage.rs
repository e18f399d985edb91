//! Project directory service
//!
//! Resolves where projects live and performs the load/save round trips.
//!
//! # Directory Structure
//!
//! ```text
//! .tckts/                 # or $TCKTS_DIR
//!   config.json           # default project + per-project schema versions
//!   <PREFIX>.jsonl        # one project, current layout
//!   <PREFIX>.tckts        # one project, block-text layout (until migrated)
//!   <PREFIX>.lock         # advisory lock held while saving
//!   .gitignore            # keeps lock files out of git status
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{self, StoredProject, JSONL_EXTENSION, LEGACY_EXTENSION, LEGACY_VERSION};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::migrate::{self, CURRENT_SCHEMA_VERSION};
use crate::project::{validate_prefix, Project};
use crate::ticket_id::TicketId;

/// Default name of the storage directory
pub const DEFAULT_DIR: &str = ".tckts";

const CONFIG_FILE: &str = "config.json";

const GITIGNORE: &str = ".gitignore";
const GITIGNORE_CONTENTS: &str = "*.lock\n";

/// Storage manager for one tckts directory
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Use `root` as the storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `dir` when given, else `.tckts` under `base`.
    ///
    /// The command layer resolves `--dir` / `TCKTS_DIR` once and passes the
    /// result here.
    pub fn resolve(dir: Option<&Path>, base: &Path) -> Self {
        match dir {
            Some(dir) if !dir.as_os_str().is_empty() => Self::new(base.join(dir)),
            _ => Self::new(base.join(DEFAULT_DIR)),
        }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Path of a project in the current layout
    pub fn project_file(&self, prefix: &str) -> PathBuf {
        self.root.join(format!("{prefix}.{JSONL_EXTENSION}"))
    }

    /// Path of a project in the block-text layout
    pub fn legacy_file(&self, prefix: &str) -> PathBuf {
        self.root.join(format!("{prefix}.{LEGACY_EXTENSION}"))
    }

    pub fn lock_file(&self, prefix: &str) -> PathBuf {
        self.root.join(format!("{prefix}.lock"))
    }

    pub fn project_exists(&self, prefix: &str) -> bool {
        self.project_file(prefix).exists() || self.legacy_file(prefix).exists()
    }

    /// Create the directory and its `.gitignore` if missing.
    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let gitignore = self.root.join(GITIGNORE);
        if !gitignore.exists() {
            lock::write_atomic(&gitignore, GITIGNORE_CONTENTS.as_bytes())?;
        }
        Ok(())
    }

    // =========================================================================
    // Config
    // =========================================================================

    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(&self.config_file())
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        self.ensure_root()?;
        config.save(&self.config_file())
    }

    /// Pick the explicit prefix, else the configured default.
    pub fn resolve_prefix(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(prefix) = explicit {
            return Ok(prefix.to_string());
        }
        self.load_config()?.default_project.ok_or_else(|| {
            Error::ProjectNotFound("no project given and no default project set".to_string())
        })
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Create an empty project file and register it in the config.
    pub fn init_project(&self, prefix: &str) -> Result<Project> {
        let project = Project::new(prefix)?;
        if self.project_exists(prefix) {
            return Err(Error::ProjectExists(prefix.to_string()));
        }

        self.ensure_root()?;
        self.write_project_file(&project)?;

        let mut config = self.load_config()?;
        config.set_version(prefix, CURRENT_SCHEMA_VERSION);
        if config.default_project.is_none() {
            config.default_project = Some(prefix.to_string());
        }
        self.save_config(&config)?;

        debug!(prefix, root = %self.root.display(), "initialized project");
        Ok(project)
    }

    /// Prefixes of every project file in the directory, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut prefixes = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let extension = path.extension().and_then(|ext| ext.to_str());
            if !matches!(extension, Some(JSONL_EXTENSION) | Some(LEGACY_EXTENSION)) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_prefix(stem).is_ok() {
                prefixes.insert(stem.to_string());
            }
        }
        Ok(prefixes.into_iter().collect())
    }

    /// Load a project stored in the current layout.
    pub fn load_project(&self, prefix: &str) -> Result<Project> {
        validate_prefix(prefix)?;
        let config = self.load_config()?;
        let version = self.stored_version(prefix, &config)?;
        ensure_current(prefix, version)?;
        let stored = self.read_stored(prefix, version)?;
        debug!(prefix, version, "loaded project");
        stored.into_project(prefix)
    }

    /// Like [`load_project`](Self::load_project), but `None` when the project
    /// does not exist.
    pub fn load_if_exists(&self, prefix: &str) -> Result<Option<Project>> {
        if validate_prefix(prefix).is_err() || !self.project_exists(prefix) {
            return Ok(None);
        }
        self.load_project(prefix).map(Some)
    }

    /// Load the project that owns `id`.
    pub fn load_for_id(&self, id: &TicketId) -> Result<Project> {
        self.load_project(&id.prefix)
    }

    /// Write a project in the current layout.
    ///
    /// Refuses to overwrite a project stored in an older layout; those only
    /// change through [`Migrator`](crate::migrate::Migrator).
    pub fn save_project(&self, project: &Project) -> Result<()> {
        let prefix = project.prefix();
        if self.project_exists(prefix) {
            let config = self.load_config()?;
            ensure_current(prefix, self.stored_version(prefix, &config)?)?;
        }
        if self.legacy_file(prefix).exists() {
            ensure_current(prefix, LEGACY_VERSION)?;
        }

        self.ensure_root()?;
        self.write_project_file(project)?;
        debug!(prefix = project.prefix(), tickets = project.len(), "saved project");
        Ok(())
    }

    fn write_project_file(&self, project: &Project) -> Result<()> {
        let text = codec::encode_project(project)?;
        let _lock = FileLock::acquire(self.lock_file(project.prefix()), DEFAULT_LOCK_TIMEOUT_MS)?;
        lock::write_atomic(self.project_file(project.prefix()), text.as_bytes())
    }

    // =========================================================================
    // Stored layouts (used by the migration engine)
    // =========================================================================

    /// Schema version of a project on disk.
    ///
    /// Block-text files are version 0. For JSONL files a current config entry
    /// wins. An older or missing entry is checked against the file itself,
    /// since a migration may have rewritten the file without reaching the
    /// config.
    pub fn stored_version(&self, prefix: &str, config: &Config) -> Result<u32> {
        let jsonl = self.project_file(prefix);
        if jsonl.exists() {
            if let Some(version) = config
                .version_of(prefix)
                .filter(|v| *v >= CURRENT_SCHEMA_VERSION)
            {
                return Ok(version);
            }
            let text = fs::read_to_string(&jsonl)?;
            return migrate::detect_jsonl_version(&text);
        }
        if self.legacy_file(prefix).exists() {
            return Ok(LEGACY_VERSION);
        }
        Err(Error::ProjectNotFound(prefix.to_string()))
    }

    pub fn read_stored(&self, prefix: &str, version: u32) -> Result<StoredProject> {
        let path = if version == LEGACY_VERSION {
            self.legacy_file(prefix)
        } else {
            self.project_file(prefix)
        };
        let text = fs::read_to_string(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::ProjectNotFound(prefix.to_string())
            } else {
                Error::Io(err)
            }
        })?;
        let stored = StoredProject::decode(version, &text)?;
        if let StoredProject::Legacy(doc) = &stored {
            if doc.prefix != prefix {
                return Err(Error::InvalidHeader(format!(
                    "{} declares prefix '{}'",
                    path.display(),
                    doc.prefix
                )));
            }
        }
        Ok(stored)
    }

    /// Write a stored layout to the file matching its version. Writing a
    /// JSONL layout retires the block-text file.
    pub fn write_stored(&self, prefix: &str, stored: &StoredProject) -> Result<()> {
        self.ensure_root()?;
        let text = stored.encode()?;
        let path = self.root.join(format!("{prefix}.{}", stored.extension()));
        {
            let _lock = FileLock::acquire(self.lock_file(prefix), DEFAULT_LOCK_TIMEOUT_MS)?;
            lock::write_atomic(&path, text.as_bytes())?;
        }
        if stored.extension() == JSONL_EXTENSION {
            let legacy = self.legacy_file(prefix);
            if legacy.exists() {
                fs::remove_file(legacy)?;
            }
        }
        Ok(())
    }
}

/// Only the current layout may be read into a [`Project`] or overwritten.
fn ensure_current(prefix: &str, version: u32) -> Result<()> {
    if version < CURRENT_SCHEMA_VERSION {
        return Err(Error::MigrationFailed(format!(
            "project {prefix} is at schema version {version}; run `tckts migrate` first"
        )));
    }
    Ok(())
}
