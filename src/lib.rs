//! tckts - file-backed ticket storage
//!
//! Tickets live in a directory (`.tckts/` by default), one file per project,
//! in a line-oriented format that diffs and merges well under git.
//!
//! # Core Concepts
//!
//! - **Projects**: a prefix such as `API` plus its tickets, numbered `API-1`,
//!   `API-2`, ... Numbers are never reused.
//! - **Dependencies**: a ticket may depend on tickets in any project and
//!   cannot be completed while a dependency is open.
//! - **Schema versions**: older block-text and JSONL files are upgraded by a
//!   migration chain, guarded by a clean git checkout.
//!
//! # Module Organization
//!
//! - `ticket_id`: `PREFIX-N` identifiers
//! - `ticket`: ticket entity, status/type/priority enums, history
//! - `project`: project aggregate and its mutations
//! - `deps`: dependency blocking and cycle checks
//! - `codec`: block-text and JSONL encodings
//! - `migrate`: schema migration engine
//! - `git`: repository cleanliness check using libgit2
//! - `config`: `config.json` handling
//! - `storage`: directory layout, load/save of projects
//! - `lock`: file locking and atomic writes
//! - `output`: human and JSON rendering for the CLI
//! - `cli`: command-line interface using clap

pub mod cli;
pub mod codec;
pub mod config;
pub mod deps;
pub mod error;
pub mod git;
pub mod lock;
pub mod migrate;
pub mod output;
pub mod project;
pub mod storage;
pub mod ticket;
pub mod ticket_id;

pub use error::{Error, Result};
pub use project::Project;
pub use storage::Storage;
pub use ticket::{Priority, Status, Ticket, TicketType};
pub use ticket_id::TicketId;
