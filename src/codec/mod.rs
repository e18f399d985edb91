//! On-disk encodings of a project.
//!
//! Three layouts exist, tagged by schema version:
//!
//! ```text
//! 0  <PREFIX>.tckts   block-text with a `# tckts | prefix: P | version: N` header
//! 1  <PREFIX>.jsonl   one ticket per line, started_at / completed_at fields
//! 2  <PREFIX>.jsonl   one ticket per line, status history (current)
//! ```
//!
//! Only the current layout is ever written by the directory service. Older
//! layouts are decoded into a [`StoredProject`] and upgraded by
//! [`crate::migrate`].

pub mod jsonl;
pub mod legacy;

use crate::error::{Error, Result};
use crate::project::Project;

pub use jsonl::{TicketV1, TicketV2};
pub use legacy::{LegacyDocument, LegacyTicket};

/// Schema version of the block-text layout
pub const LEGACY_VERSION: u32 = 0;

/// Schema version of JSONL with started/completed timestamps
pub const JSONL_V1_VERSION: u32 = 1;

/// Schema version of JSONL with status history
pub const JSONL_V2_VERSION: u32 = 2;

/// File extension of the block-text layout
pub const LEGACY_EXTENSION: &str = "tckts";

/// File extension of the JSONL layouts
pub const JSONL_EXTENSION: &str = "jsonl";

/// A project as read from disk, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredProject {
    Legacy(LegacyDocument),
    V1(Vec<TicketV1>),
    V2(Vec<TicketV2>),
}

impl StoredProject {
    pub fn version(&self) -> u32 {
        match self {
            StoredProject::Legacy(_) => LEGACY_VERSION,
            StoredProject::V1(_) => JSONL_V1_VERSION,
            StoredProject::V2(_) => JSONL_V2_VERSION,
        }
    }

    /// Decode file contents using the layout for `version`.
    pub fn decode(version: u32, text: &str) -> Result<Self> {
        match version {
            LEGACY_VERSION => Ok(StoredProject::Legacy(legacy::parse(text)?)),
            JSONL_V1_VERSION => Ok(StoredProject::V1(jsonl::parse_lines(text)?)),
            JSONL_V2_VERSION => Ok(StoredProject::V2(jsonl::parse_lines(text)?)),
            other => Err(Error::InvalidFormat(format!(
                "unknown schema version {other}"
            ))),
        }
    }

    /// Encode back into the layout this variant came from.
    pub fn encode(&self) -> Result<String> {
        match self {
            StoredProject::Legacy(doc) => Ok(legacy::serialize(doc)),
            StoredProject::V1(tickets) => jsonl::serialize_lines(tickets),
            StoredProject::V2(tickets) => jsonl::serialize_lines(tickets),
        }
    }

    /// File extension for this layout.
    pub fn extension(&self) -> &'static str {
        match self {
            StoredProject::Legacy(_) => LEGACY_EXTENSION,
            StoredProject::V1(_) | StoredProject::V2(_) => JSONL_EXTENSION,
        }
    }

    /// Build the in-memory project. Only the current layout can be
    /// normalized; older ones go through the migration chain first.
    pub fn into_project(self, prefix: &str) -> Result<Project> {
        match self {
            StoredProject::V2(tickets) => jsonl::into_project(prefix, tickets),
            other => Err(Error::MigrationFailed(format!(
                "project {prefix} is at schema version {} and must be upgraded before use",
                other.version()
            ))),
        }
    }
}

/// Serialize a project in the current layout.
pub fn encode_project(project: &Project) -> Result<String> {
    jsonl::encode_project(project)
}

/// Parse a project stored in the current layout.
pub fn decode_project(prefix: &str, text: &str) -> Result<Project> {
    StoredProject::decode(JSONL_V2_VERSION, text)?.into_project(prefix)
}
