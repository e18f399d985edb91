//! Schema migration engine
//!
//! Every project carries a schema version in `config.json`. On each command
//! the engine compares those versions against [`CURRENT_SCHEMA_VERSION`] and
//! walks [`MIGRATIONS`] for any project that is behind:
//!
//! ```text
//! Idle -> CheckVersions -> CheckGitSafety -> ApplyChain -> PersistVersion -> Idle
//!                            (skipped with force)   (per project)
//! ```
//!
//! The git check runs once, before the first file is touched. A migrated
//! project leaves the tree dirty, so checking again for the next project
//! would always fail.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::{
    LegacyDocument, StoredProject, TicketV1, TicketV2, JSONL_V1_VERSION, JSONL_V2_VERSION,
    LEGACY_VERSION,
};
use crate::error::{Error, Result};
use crate::git::VcsStatus;
use crate::storage::Storage;
use crate::ticket::{HistoryEntry, Status};

/// Version every project is upgraded to
pub const CURRENT_SCHEMA_VERSION: u32 = JSONL_V2_VERSION;

/// One step of the chain. `transform` is pure: it never touches disk.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub from: u32,
    pub to: u32,
    pub name: &'static str,
    pub transform: fn(StoredProject) -> Result<StoredProject>,
}

/// Ordered upgrade chain, one entry per version step.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        from: LEGACY_VERSION,
        to: JSONL_V1_VERSION,
        name: "block-text to jsonl",
        transform: legacy_to_v1,
    },
    Migration {
        from: JSONL_V1_VERSION,
        to: JSONL_V2_VERSION,
        name: "timestamps to history",
        transform: v1_to_v2,
    },
];

/// Apply every migration from the stored version up to the current one.
pub fn upgrade(mut stored: StoredProject) -> Result<StoredProject> {
    loop {
        let version = stored.version();
        if version == CURRENT_SCHEMA_VERSION {
            return Ok(stored);
        }
        if version > CURRENT_SCHEMA_VERSION {
            return Err(Error::MigrationFailed(format!(
                "schema version {version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }

        let step = MIGRATIONS
            .iter()
            .find(|migration| migration.from == version)
            .ok_or_else(|| {
                Error::MigrationFailed(format!("no migration from schema version {version}"))
            })?;
        stored = (step.transform)(stored)?;
        if stored.version() != step.to {
            return Err(Error::MigrationFailed(format!(
                "migration '{}' produced version {} instead of {}",
                step.name,
                stored.version(),
                step.to
            )));
        }
        debug!(from = step.from, to = step.to, name = step.name, "applied migration");
    }
}

/// Guess the version of a JSONL file that has no entry in the config.
///
/// Any `history` key means version 2. An empty file is current. Everything
/// else is treated as version 1 so missing history gets backfilled.
pub fn detect_jsonl_version(text: &str) -> Result<u32> {
    let mut saw_ticket = false;
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|source| Error::InvalidJson {
            line: index + 1,
            source,
        })?;
        saw_ticket = true;
        if value.get("history").is_some() {
            return Ok(JSONL_V2_VERSION);
        }
    }

    if saw_ticket {
        Ok(JSONL_V1_VERSION)
    } else {
        Ok(CURRENT_SCHEMA_VERSION)
    }
}

fn legacy_to_v1(stored: StoredProject) -> Result<StoredProject> {
    let tickets = match stored {
        StoredProject::Legacy(LegacyDocument { tickets, .. }) => tickets,
        other => return Err(unexpected_layout("block-text", &other)),
    };
    let tickets = tickets
        .into_iter()
        .map(|ticket| TicketV1 {
            completed_at: if ticket.status.is_done() {
                ticket.completed_at
            } else {
                None
            },
            id: ticket.id,
            ticket_type: ticket.ticket_type,
            status: ticket.status,
            title: ticket.title,
            created_at: ticket.created_at,
            started_at: None,
            depends: ticket.depends,
            priority: ticket.priority,
            description: ticket.description,
        })
        .collect();
    Ok(StoredProject::V1(tickets))
}

fn v1_to_v2(stored: StoredProject) -> Result<StoredProject> {
    let tickets = match stored {
        StoredProject::V1(tickets) => tickets,
        other => return Err(unexpected_layout("jsonl v1", &other)),
    };
    Ok(StoredProject::V2(tickets.into_iter().map(synthesize_history).collect()))
}

/// pending at creation, in_progress at start, done at completion, then the
/// current status if the timeline does not already end there.
fn synthesize_history(ticket: TicketV1) -> TicketV2 {
    let mut history = vec![HistoryEntry::new(Status::Pending, ticket.created_at)];
    if let Some(at) = ticket.started_at {
        history.push(HistoryEntry::new(Status::InProgress, at));
    }
    if let Some(at) = ticket.completed_at {
        history.push(HistoryEntry::new(Status::Done, at));
    }
    history.sort_by_key(|entry| entry.at);

    if let Some(last) = history.last().cloned() {
        if last.status != ticket.status {
            history.push(HistoryEntry::new(ticket.status, last.at));
        }
    }

    TicketV2 {
        id: ticket.id,
        ticket_type: ticket.ticket_type,
        status: ticket.status,
        title: ticket.title,
        created_at: ticket.created_at,
        depends: ticket.depends,
        priority: ticket.priority,
        description: ticket.description,
        history,
    }
}

fn unexpected_layout(expected: &str, stored: &StoredProject) -> Error {
    Error::MigrationFailed(format!(
        "expected {expected} layout, got schema version {}",
        stored.version()
    ))
}

/// Where the engine is in a run; carried on log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CheckVersions,
    CheckGitSafety,
    ApplyChain,
    PersistVersion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::CheckVersions => "check_versions",
            Phase::CheckGitSafety => "check_git_safety",
            Phase::ApplyChain => "apply_chain",
            Phase::PersistVersion => "persist_version",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectMigration {
    pub prefix: String,
    pub from: u32,
    pub to: u32,
}

/// What a run changed. Empty when everything was already current.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<ProjectMigration>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty()
    }
}

/// Runs the chain over every project in a storage directory.
pub struct Migrator<'a> {
    storage: &'a Storage,
    vcs: &'a dyn VcsStatus,
    force: bool,
    phase: Phase,
}

impl<'a> Migrator<'a> {
    pub fn new(storage: &'a Storage, vcs: &'a dyn VcsStatus) -> Self {
        Self {
            storage,
            vcs,
            force: false,
            phase: Phase::Idle,
        }
    }

    /// Skip the git cleanliness check.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run(&mut self) -> Result<MigrationReport> {
        let result = self.run_phases();
        self.enter(Phase::Idle);
        result
    }

    fn run_phases(&mut self) -> Result<MigrationReport> {
        self.enter(Phase::CheckVersions);
        let mut config = self.storage.load_config()?;
        let mut pending = Vec::new();
        for prefix in self.storage.list_projects()? {
            let version = self.storage.stored_version(&prefix, &config)?;
            if version > CURRENT_SCHEMA_VERSION {
                return Err(Error::MigrationFailed(format!(
                    "project {prefix} is at schema version {version}, newer than supported version {CURRENT_SCHEMA_VERSION}"
                )));
            }
            if version < CURRENT_SCHEMA_VERSION {
                pending.push((prefix, version));
            }
        }

        let mut report = MigrationReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        if self.force {
            info!("skipping git safety check");
        } else {
            self.enter(Phase::CheckGitSafety);
            self.vcs.ensure_clean(self.storage.root())?;
        }

        for (prefix, from) in pending {
            self.enter(Phase::ApplyChain);
            let stored = self.storage.read_stored(&prefix, from)?;
            let upgraded = upgrade(stored)?;
            upgraded
                .clone()
                .into_project(&prefix)
                .map_err(|err| Error::MigrationFailed(format!("project {prefix}: {err}")))?;
            self.storage.write_stored(&prefix, &upgraded)?;

            self.enter(Phase::PersistVersion);
            config.set_version(&prefix, CURRENT_SCHEMA_VERSION);
            self.storage.save_config(&config)?;

            info!(prefix = %prefix, from, to = CURRENT_SCHEMA_VERSION, "migrated project");
            report.migrated.push(ProjectMigration {
                prefix,
                from,
                to: CURRENT_SCHEMA_VERSION,
            });
        }

        Ok(report)
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "migration phase");
        self.phase = phase;
    }
}
