//! Error types for tckts
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (limits exceeded, malformed ids, unknown tickets/projects)
//! - 3: Blocked by policy (open dependencies, unsafe migration)
//! - 4: Operation failed (unreadable files, I/O, git)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tckts CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tckts operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (exit code 2)
    #[error("Title too long: {len} bytes (max {max})")]
    TitleTooLong { len: usize, max: usize },

    #[error("Description too long: {len} bytes (max {max})")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("Too many tickets in project (max {max})")]
    TooManyTickets { max: usize },

    #[error("Too many dependencies: {count} (max {max})")]
    TooManyDependencies { count: usize, max: usize },

    #[error("Prefix too long: {len} bytes (max {max})")]
    PrefixTooLong { len: usize, max: usize },

    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid ticket id: {0}")]
    InvalidTicketId(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    // Lookup errors (exit code 2)
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project already exists: {0}")]
    ProjectExists(String),

    // Policy blocks (exit code 3)
    #[error("{id} is blocked by open dependencies: {blockers}")]
    BlockedByDependencies { id: String, blockers: String },

    #[error("Not a git repository: {0}")]
    NotGitRepo(PathBuf),

    #[error("Uncommitted changes in {0}; commit them before migrating")]
    UncommittedChanges(PathBuf),

    // Format errors (exit code 4)
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid JSON on line {line}: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required field '{field}' on line {line}")]
    MissingRequiredField { field: String, line: usize },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    // Migration and operation failures (exit code 4)
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::TitleTooLong { .. }
            | Error::DescriptionTooLong { .. }
            | Error::TooManyTickets { .. }
            | Error::TooManyDependencies { .. }
            | Error::PrefixTooLong { .. }
            | Error::InvalidPrefix(_)
            | Error::InvalidTicketId(_)
            | Error::InvalidArgument(_)
            | Error::DependencyCycle(_)
            | Error::TicketNotFound(_)
            | Error::ProjectNotFound(_)
            | Error::ProjectExists(_) => exit_codes::USER_ERROR,

            Error::BlockedByDependencies { .. }
            | Error::NotGitRepo(_)
            | Error::UncommittedChanges(_) => exit_codes::POLICY_BLOCKED,

            Error::InvalidHeader(_)
            | Error::InvalidJson { .. }
            | Error::MissingRequiredField { .. }
            | Error::InvalidFormat(_)
            | Error::MigrationFailed(_)
            | Error::LockFailed(_)
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured context for JSON output, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::BlockedByDependencies { id, blockers } => Some(serde_json::json!({
                "id": id,
                "blockers": blockers.split(", ").collect::<Vec<_>>(),
            })),
            Error::InvalidJson { line, .. } => Some(serde_json::json!({ "line": line })),
            Error::MissingRequiredField { field, line } => {
                Some(serde_json::json!({ "field": field, "line": line }))
            }
            Error::UncommittedChanges(path) | Error::NotGitRepo(path) => {
                Some(serde_json::json!({ "path": path.to_string_lossy() }))
            }
            _ => None,
        }
    }
}

/// Result type alias for tckts operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
