//! Newline-delimited JSON layouts (schema versions 1 and 2).
//!
//! Each line is a standalone ticket object. Optional fields are omitted
//! rather than written as `null`, and unknown fields are rejected so a v1
//! line never decodes silently as v2 or the other way round.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::project::Project;
use crate::ticket::{timestamp, HistoryEntry, Priority, Status, Ticket, TicketType};
use crate::ticket_id::TicketId;

/// Ticket line with `started_at` / `completed_at` (schema version 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketV1 {
    pub id: TicketId,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub status: Status,
    pub title: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<TicketId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Ticket line with a status history (schema version 2, current).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketV2 {
    pub id: TicketId,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub status: Status,
    pub title: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<TicketId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl From<&Ticket> for TicketV2 {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id.clone(),
            ticket_type: ticket.ticket_type,
            status: ticket.status,
            title: ticket.title.clone(),
            created_at: ticket.created_at,
            depends: ticket.depends.clone(),
            priority: ticket.priority,
            description: ticket.description.clone(),
            history: ticket.history.clone(),
        }
    }
}

impl From<TicketV2> for Ticket {
    fn from(line: TicketV2) -> Self {
        Self {
            id: line.id,
            ticket_type: line.ticket_type,
            status: line.status,
            title: line.title,
            created_at: line.created_at,
            depends: line.depends,
            priority: line.priority,
            description: line.description,
            history: line.history,
        }
    }
}

/// Parse every non-blank line as one record. The first bad line fails the
/// whole file.
pub fn parse_lines<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| Error::InvalidJson {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn serialize_lines<T: Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Serialize tickets ordered by `created_at` (ties keep number order).
pub fn encode_project(project: &Project) -> Result<String> {
    let mut lines: Vec<TicketV2> = project.tickets().iter().map(TicketV2::from).collect();
    lines.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.number.cmp(&b.id.number))
    });
    serialize_lines(&lines)
}

pub(crate) fn into_project(prefix: &str, lines: Vec<TicketV2>) -> Result<Project> {
    for line in &lines {
        if let Some(last) = line.history.last() {
            if last.status != line.status {
                return Err(Error::InvalidFormat(format!(
                    "{}: history ends in '{}' but status is '{}'",
                    line.id, last.status, line.status
                )));
            }
        }
    }
    Project::from_tickets(prefix, lines.into_iter().map(Ticket::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_project;

    const V2_LINE: &str = r#"{"id":"API-1","type":"bug","status":"done","title":"Fix it","created_at":"2024-01-01T00:00:00Z","depends":["WEB-2"],"priority":"high","description":"line one\nline two","history":[{"status":"pending","at":"2024-01-01T00:00:00Z"},{"status":"done","at":"2024-01-02T00:00:00Z"}]}"#;

    #[test]
    fn decodes_full_v2_line() {
        let project = decode_project("API", V2_LINE).unwrap();
        let ticket = project.get(1).unwrap();
        assert_eq!(ticket.ticket_type, TicketType::Bug);
        assert_eq!(ticket.status, Status::Done);
        assert_eq!(ticket.depends, vec![TicketId::new("WEB", 2)]);
        assert_eq!(ticket.priority, Some(Priority::High));
        assert_eq!(ticket.description, "line one\nline two");
        assert_eq!(ticket.history.len(), 2);
        assert_eq!(project.next_number(), 2);
    }

    #[test]
    fn re_encodes_byte_for_byte() {
        let project = decode_project("API", V2_LINE).unwrap();
        assert_eq!(encode_project(&project).unwrap(), format!("{V2_LINE}\n"));
    }

    #[test]
    fn omits_empty_optional_fields() {
        let line = r#"{"id":"API-3","type":"task","status":"pending","title":"t","created_at":"2024-01-01T00:00:00Z"}"#;
        let project = decode_project("API", line).unwrap();
        let encoded = encode_project(&project).unwrap();
        assert_eq!(encoded, format!("{line}\n"));
        assert!(!encoded.contains("null"));
        assert_eq!(project.next_number(), 4);
    }

    #[test]
    fn missing_required_field_is_invalid_json() {
        let line = r#"{"id":"API-1","type":"task","status":"pending","created_at":"2024-01-01T00:00:00Z"}"#;
        let err = decode_project("API", line).unwrap_err();
        assert!(matches!(err, Error::InvalidJson { line: 1, .. }), "{err}");
    }

    #[test]
    fn malformed_line_fails_whole_file() {
        let text = format!("{V2_LINE}\n\n{{not json\n");
        let err = decode_project("API", &text).unwrap_err();
        assert!(matches!(err, Error::InvalidJson { line: 3, .. }), "{err}");
    }

    #[test]
    fn v1_fields_are_rejected_by_v2_decoder() {
        let line = r#"{"id":"API-1","type":"task","status":"done","title":"t","created_at":"2024-01-01T00:00:00Z","completed_at":"2024-01-03T00:00:00Z"}"#;
        assert!(matches!(
            decode_project("API", line),
            Err(Error::InvalidJson { .. })
        ));
        let parsed: Vec<TicketV1> = parse_lines(line).unwrap();
        assert!(parsed[0].completed_at.is_some());
    }

    #[test]
    fn history_must_end_in_current_status() {
        let line = r#"{"id":"API-1","type":"task","status":"done","title":"t","created_at":"2024-01-01T00:00:00Z","history":[{"status":"pending","at":"2024-01-01T00:00:00Z"}]}"#;
        assert!(matches!(
            decode_project("API", line),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn over_limit_lines_fail_the_load() {
        let title = "x".repeat(400);
        let long_title = format!(
            r#"{{"id":"API-5","type":"task","status":"pending","title":"{title}","created_at":"2024-01-01T00:00:00Z"}}"#
        );
        assert!(matches!(
            decode_project("API", &format!("{V2_LINE}\n{long_title}\n")),
            Err(Error::TitleTooLong { len: 400, .. })
        ));

        let depends: Vec<String> = (1..=150).map(|n| format!("\"WEB-{n}\"")).collect();
        let many_deps = format!(
            r#"{{"id":"API-2","type":"task","status":"pending","title":"t","created_at":"2024-01-01T00:00:00Z","depends":[{}]}}"#,
            depends.join(",")
        );
        assert!(matches!(
            decode_project("API", &many_deps),
            Err(Error::TooManyDependencies { count: 150, .. })
        ));
    }

    #[test]
    fn largest_ticket_number_is_rejected() {
        let line = format!(
            r#"{{"id":"API-{}","type":"task","status":"pending","title":"t","created_at":"2024-01-01T00:00:00Z"}}"#,
            u64::MAX
        );
        let err = decode_project("API", &line).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)), "{err}");

        let below = line.replace(&u64::MAX.to_string(), &(u64::MAX - 1).to_string());
        assert_eq!(decode_project("API", &below).unwrap().next_number(), u64::MAX);
    }

    #[test]
    fn encode_sorts_by_created_at() {
        let mut project = Project::new("API").unwrap();
        let later = timestamp::parse("2024-05-01T00:00:00Z").unwrap();
        let earlier = timestamp::parse("2024-04-01T00:00:00Z").unwrap();
        project
            .add_ticket_at(TicketType::Task, "later", "", vec![], None, later)
            .unwrap();
        project
            .add_ticket_at(TicketType::Task, "earlier", "", vec![], None, earlier)
            .unwrap();

        let encoded = encode_project(&project).unwrap();
        let lines: Vec<&str> = encoded.lines().collect();
        assert!(lines[0].contains("\"API-2\""));
        assert!(lines[1].contains("\"API-1\""));

        let reloaded = decode_project("API", &encoded).unwrap();
        assert_eq!(reloaded.next_number(), 3);
        assert_eq!(reloaded.get(1).unwrap().title, "later");
    }
}
