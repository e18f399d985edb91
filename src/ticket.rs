//! Ticket entity and its enumerations.
//!
//! A ticket is owned by exactly one [`Project`](crate::project::Project).
//! Timestamps are second-precision UTC and serialize as
//! `YYYY-MM-DDTHH:MM:SSZ`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ticket_id::TicketId;

/// Maximum title length in bytes
pub const MAX_TITLE_BYTES: usize = 280;

/// Maximum description length in bytes
pub const MAX_DESCRIPTION_BYTES: usize = 64 * 1024;

/// Maximum dependencies per ticket
pub const MAX_DEPENDENCIES: usize = 100;

/// Current UTC time truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Serde adapter for `YYYY-MM-DDTHH:MM:SSZ` timestamps.
pub mod timestamp {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn format(at: &DateTime<Utc>) -> String {
        at.format(FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|at| at.with_timezone(&Utc).trunc_subsecs(0))
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    /// Same adapter for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => super::serialize(at, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp '{raw}'"))
                }),
                None => Ok(None),
            }
        }
    }
}

// =============================================================================
// Ticket Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Bug,
    Feature,
    Task,
    Chore,
    Epic,
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketType::Bug => "bug",
            TicketType::Feature => "feature",
            TicketType::Task => "task",
            TicketType::Chore => "chore",
            TicketType::Epic => "epic",
        };
        f.write_str(name)
    }
}

impl FromStr for TicketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bug" => Ok(TicketType::Bug),
            "feature" => Ok(TicketType::Feature),
            "task" => Ok(TicketType::Task),
            "chore" => Ok(TicketType::Chore),
            "epic" => Ok(TicketType::Epic),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid ticket type '{s}'. Expected: bug, feature, task, chore, epic"
            ))),
        }
    }
}

impl Default for TicketType {
    fn default() -> Self {
        TicketType::Task
    }
}

// =============================================================================
// Status
// =============================================================================

/// Lifecycle state of a ticket. Legacy files only know `pending` and `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Blocked,
    Done,
}

impl Status {
    pub fn is_done(&self) -> bool {
        matches!(self, Status::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(Status::Pending),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "done" => Ok(Status::Done),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid status '{s}'. Expected: pending, in_progress, blocked, done"
            ))),
        }
    }
}

// =============================================================================
// Priority
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid priority '{s}'. Expected: low, medium, high"
            ))),
        }
    }
}

// =============================================================================
// History
// =============================================================================

/// One recorded status value. Entries are appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryEntry {
    pub status: Status,
    #[serde(with = "timestamp")]
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(status: Status, at: DateTime<Utc>) -> Self {
        Self { status, at }
    }
}

// =============================================================================
// Ticket
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_type: TicketType,
    pub status: Status,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub depends: Vec<TicketId>,
    pub priority: Option<Priority>,
    pub description: String,
    pub history: Vec<HistoryEntry>,
}

impl Ticket {
    pub fn number(&self) -> u64 {
        self.id.number
    }

    /// Set the status and record it in the history.
    pub(crate) fn transition(&mut self, status: Status, at: DateTime<Utc>) {
        self.status = status;
        self.history.push(HistoryEntry::new(status, at));
    }

    pub fn depends_on(&self, id: &TicketId) -> bool {
        self.depends.iter().any(|dep| dep == id)
    }

    /// When the ticket last entered `in_progress`, if ever.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.status == Status::InProgress)
            .map(|entry| entry.at)
    }

    /// When the ticket was completed, if it is currently done.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        if !self.status.is_done() {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|entry| entry.status == Status::Done)
            .map(|entry| entry.at)
    }
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.len() > MAX_TITLE_BYTES {
        return Err(Error::TitleTooLong {
            len: title.len(),
            max: MAX_TITLE_BYTES,
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_BYTES {
        return Err(Error::DescriptionTooLong {
            len: description.len(),
            max: MAX_DESCRIPTION_BYTES,
        });
    }
    Ok(())
}

pub fn validate_dependency_count(count: usize) -> Result<()> {
    if count > MAX_DEPENDENCIES {
        return Err(Error::TooManyDependencies {
            count,
            max: MAX_DEPENDENCIES,
        });
    }
    Ok(())
}
