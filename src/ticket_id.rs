//! Ticket identifiers of the form `PREFIX-NUMBER`.
//!
//! The prefix may itself contain hyphens (`MY-PROJECT-42`), so parsing splits
//! on the last `-`. Numbers are rendered without padding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Identifier of a ticket: project prefix plus per-project number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId {
    pub prefix: String,
    pub number: u64,
}

impl TicketId {
    pub fn new(prefix: impl Into<String>, number: u64) -> Self {
        Self {
            prefix: prefix.into(),
            number,
        }
    }

    /// Parse `PREFIX-N`, splitting on the last dash.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidTicketId(text.to_string());
        let dash = text.rfind('-').ok_or_else(invalid)?;
        if dash == 0 || dash + 1 == text.len() {
            return Err(invalid());
        }

        let (prefix, rest) = text.split_at(dash);
        let digits = &rest[1..];
        // u64::from_str accepts a leading '+'
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self::new(prefix, number))
    }

    /// Whether this id lives in the project with the given prefix.
    pub fn belongs_to(&self, prefix: &str) -> bool {
        self.prefix == prefix
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.number)
    }
}

impl FromStr for TicketId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TicketId::parse(s)
    }
}

impl Serialize for TicketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TicketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TicketId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Join ids as `A-1, A-2` for messages.
pub fn join_ids(ids: &[TicketId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
