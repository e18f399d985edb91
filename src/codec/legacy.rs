//! Block-text layout (schema version 0).
//!
//! ```text
//! # tckts | prefix: API | version: 1
//! ---
//! id: API-1
//! type: bug
//! status: pending
//! title: Crash on start
//! created_at: 2024-01-01T00:00:00Z
//! depends: API-2, WEB-4
//! priority: high
//!
//! Free-form description.
//! \--- a description line that starts with dashes
//! ---
//! ```
//!
//! Description lines matching `\*---` gain one leading backslash on write and
//! lose one on read, so they are never mistaken for a block terminator.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::ticket::{timestamp, Priority, Status, TicketType};
use crate::ticket_id::TicketId;

const HEADER_TAG: &str = "# tckts";
const DELIMITER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDocument {
    pub prefix: String,
    pub version: u32,
    pub tickets: Vec<LegacyTicket>,
}

/// A ticket in block-text form. Only `pending` and `done` are valid here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTicket {
    pub id: TicketId,
    pub ticket_type: TicketType,
    pub status: Status,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub depends: Vec<TicketId>,
    pub priority: Option<Priority>,
    pub description: String,
}

pub fn parse(text: &str) -> Result<LegacyDocument> {
    let mut lines = text
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .peekable();

    let (_, header) = lines
        .next()
        .ok_or_else(|| Error::InvalidHeader("file is empty".to_string()))?;
    let (prefix, version) = parse_header(header)?;

    let mut tickets = Vec::new();
    loop {
        while matches!(lines.peek(), Some((_, line)) if line.trim().is_empty()) {
            lines.next();
        }
        let Some((line_no, opener)) = lines.next() else {
            break;
        };
        if opener != DELIMITER {
            return Err(Error::InvalidFormat(format!(
                "line {line_no}: expected '{DELIMITER}' to open a ticket block"
            )));
        }

        let mut fields = BlockFields::new(line_no);
        let mut closed = false;
        for (line_no, line) in lines.by_ref() {
            if line == DELIMITER {
                closed = true;
                break;
            }
            if line.trim().is_empty() {
                break;
            }
            fields.push(line_no, line)?;
        }

        let mut description: Vec<String> = Vec::new();
        if !closed {
            for (_, line) in lines.by_ref() {
                if line == DELIMITER {
                    closed = true;
                    break;
                }
                description.push(unescape_line(line));
            }
        }
        if !closed {
            return Err(Error::InvalidFormat(format!(
                "line {line_no}: ticket block is not terminated by '{DELIMITER}'"
            )));
        }

        tickets.push(fields.finish(description.join("\n"))?);
    }

    Ok(LegacyDocument {
        prefix,
        version,
        tickets,
    })
}

pub fn serialize(doc: &LegacyDocument) -> String {
    let mut out = format!(
        "{HEADER_TAG} | prefix: {} | version: {}\n",
        doc.prefix, doc.version
    );
    for ticket in &doc.tickets {
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&format!("id: {}\n", ticket.id));
        out.push_str(&format!("type: {}\n", ticket.ticket_type));
        out.push_str(&format!("status: {}\n", ticket.status));
        out.push_str(&format!("title: {}\n", ticket.title));
        out.push_str(&format!(
            "created_at: {}\n",
            timestamp::format(&ticket.created_at)
        ));
        if let Some(at) = &ticket.completed_at {
            out.push_str(&format!("completed_at: {}\n", timestamp::format(at)));
        }
        if !ticket.depends.is_empty() {
            let depends: Vec<String> = ticket.depends.iter().map(|id| id.to_string()).collect();
            out.push_str(&format!("depends: {}\n", depends.join(", ")));
        }
        if let Some(priority) = ticket.priority {
            out.push_str(&format!("priority: {priority}\n"));
        }
        if !ticket.description.is_empty() {
            out.push('\n');
            for line in ticket.description.split('\n') {
                out.push_str(&escape_line(line));
                out.push('\n');
            }
        }
        out.push_str(DELIMITER);
        out.push('\n');
    }
    out
}

fn parse_header(header: &str) -> Result<(String, u32)> {
    let parts: Vec<&str> = header.split('|').map(str::trim).collect();
    if parts.len() != 3 || parts[0] != HEADER_TAG {
        return Err(Error::InvalidHeader(format!(
            "expected '{HEADER_TAG} | prefix: <PREFIX> | version: <N>', got '{header}'"
        )));
    }

    let prefix = parts[1]
        .strip_prefix("prefix:")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::InvalidHeader(format!("missing prefix in '{header}'")))?;
    let version = parts[2]
        .strip_prefix("version:")
        .map(str::trim)
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| Error::InvalidHeader(format!("missing or invalid version in '{header}'")))?;

    Ok((prefix.to_string(), version))
}

fn is_escaped_delimiter(line: &str) -> bool {
    line.trim_start_matches('\\').starts_with(DELIMITER)
}

fn escape_line(line: &str) -> String {
    if is_escaped_delimiter(line) {
        format!("\\{line}")
    } else {
        line.to_string()
    }
}

fn unescape_line(line: &str) -> String {
    match line.strip_prefix('\\') {
        Some(rest) if is_escaped_delimiter(rest) => rest.to_string(),
        _ => line.to_string(),
    }
}

/// Metadata lines of one block, collected before validation.
struct BlockFields {
    start_line: usize,
    id: Option<TicketId>,
    ticket_type: Option<TicketType>,
    status: Option<Status>,
    title: Option<String>,
    created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    depends: Vec<TicketId>,
    priority: Option<Priority>,
}

impl BlockFields {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            id: None,
            ticket_type: None,
            status: None,
            title: None,
            created_at: None,
            completed_at: None,
            depends: Vec::new(),
            priority: None,
        }
    }

    fn push(&mut self, line_no: usize, line: &str) -> Result<()> {
        let (key, value) = line.split_once(':').ok_or_else(|| {
            Error::InvalidFormat(format!("line {line_no}: expected 'key: value', got '{line}'"))
        })?;
        let value = value.trim();
        let bad_value = |what: &str| {
            Error::InvalidFormat(format!("line {line_no}: invalid {what} '{value}'"))
        };

        match key.trim() {
            "id" => self.id = Some(TicketId::parse(value)?),
            "type" => self.ticket_type = Some(value.parse().map_err(|_| bad_value("type"))?),
            "status" => {
                self.status = Some(match value {
                    "pending" => Status::Pending,
                    "done" => Status::Done,
                    _ => return Err(bad_value("status")),
                })
            }
            "title" => self.title = Some(value.to_string()),
            "created_at" => {
                self.created_at = Some(timestamp::parse(value).ok_or_else(|| bad_value("timestamp"))?)
            }
            "completed_at" => {
                self.completed_at =
                    Some(timestamp::parse(value).ok_or_else(|| bad_value("timestamp"))?)
            }
            "depends" => {
                self.depends = value
                    .split(',')
                    .map(str::trim)
                    .filter(|raw| !raw.is_empty())
                    .map(TicketId::parse)
                    .collect::<Result<Vec<_>>>()?
            }
            "priority" => {
                self.priority = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().map_err(|_| bad_value("priority"))?)
                }
            }
            other => {
                return Err(Error::InvalidFormat(format!(
                    "line {line_no}: unknown field '{other}'"
                )))
            }
        }
        Ok(())
    }

    fn finish(self, description: String) -> Result<LegacyTicket> {
        let start_line = self.start_line;
        let missing = |field: &str| Error::MissingRequiredField {
            field: field.to_string(),
            line: start_line,
        };
        Ok(LegacyTicket {
            id: self.id.ok_or_else(|| missing("id"))?,
            ticket_type: self.ticket_type.ok_or_else(|| missing("type"))?,
            status: self.status.ok_or_else(|| missing("status"))?,
            title: self.title.ok_or_else(|| missing("title"))?,
            created_at: self.created_at.ok_or_else(|| missing("created_at"))?,
            completed_at: self.completed_at,
            depends: self.depends,
            priority: self.priority,
            description,
        })
    }
}
