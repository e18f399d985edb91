//! tckts ticket command implementations.

use serde::Serialize;

use crate::codec::TicketV2;
use crate::deps;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::project::Project;
use crate::storage::Storage;
use crate::ticket::{timestamp, Priority, Status, Ticket, TicketType};
use crate::ticket_id::{join_ids, TicketId};

pub struct AddOptions {
    pub title: String,
    pub project: Option<String>,
    pub ticket_type: String,
    pub description: Option<String>,
    pub depends: Vec<String>,
    pub priority: Option<String>,
}

pub struct ListOptions {
    pub project: Option<String>,
    pub status: Option<String>,
    pub ticket_type: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub ticket_type: Option<String>,
}

/// Status changes that need no dependency check.
#[derive(Debug, Clone, Copy)]
pub enum Transition {
    Start,
    Block,
    Reopen,
}

impl Transition {
    fn status(self) -> Status {
        match self {
            Transition::Start => Status::InProgress,
            Transition::Block => Status::Blocked,
            Transition::Reopen => Status::Pending,
        }
    }

    fn command(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Block => "block",
            Transition::Reopen => "reopen",
        }
    }
}

#[derive(Serialize)]
struct TicketStatusOutput {
    id: TicketId,
    status: Status,
}

#[derive(Serialize)]
struct TicketListOutput {
    project: String,
    total: usize,
    tickets: Vec<TicketV2>,
}

#[derive(Serialize)]
struct TicketShowOutput {
    #[serde(flatten)]
    ticket: TicketV2,
    blocked_by: Vec<TicketId>,
}

#[derive(Serialize)]
struct DependencyOutput {
    id: TicketId,
    depends_on: TicketId,
    changed: bool,
}

#[derive(Serialize)]
struct BlockedEntry {
    id: TicketId,
    title: String,
    blocked_by: Vec<TicketId>,
}

#[derive(Serialize)]
struct BlockedOutput {
    project: String,
    tickets: Vec<BlockedEntry>,
}

pub fn run_add(storage: &Storage, options: OutputOptions, add: AddOptions) -> Result<()> {
    let title = add.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    let prefix = storage.resolve_prefix(add.project.as_deref())?;
    let mut project = storage.load_project(&prefix)?;

    let ticket_type: TicketType = add.ticket_type.parse()?;
    let priority = add
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()?;
    let depends = add
        .depends
        .iter()
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_id_in(&prefix, raw))
        .collect::<Result<Vec<_>>>()?;

    let mut warnings = Vec::new();
    for dep in &depends {
        if dep.belongs_to(&prefix) && project.find_by_id(dep).is_none() {
            warnings.push(format!("{dep} does not exist yet"));
        }
    }

    let id = project
        .add_ticket(
            ticket_type,
            title,
            add.description.unwrap_or_default(),
            depends,
            priority,
        )?
        .id
        .clone();
    storage.save_project(&project)?;

    let ticket = project.find_by_id(&id).ok_or_else(|| Error::TicketNotFound(id.to_string()))?;
    let mut human = HumanOutput::new("Ticket created");
    human.push_summary("ID", id.to_string());
    human.push_summary("Type", ticket.ticket_type.to_string());
    if let Some(priority) = ticket.priority {
        human.push_summary("Priority", priority.to_string());
    }
    if !ticket.depends.is_empty() {
        human.push_summary("Depends", join_ids(&ticket.depends));
    }
    for warning in warnings {
        human.push_warning(warning);
    }

    emit_success(options, "add", &TicketV2::from(ticket), Some(&human))
}

pub fn run_list(storage: &Storage, options: OutputOptions, list: ListOptions) -> Result<()> {
    let prefix = storage.resolve_prefix(list.project.as_deref())?;
    let project = storage.load_project(&prefix)?;
    let status = list.status.as_deref().map(str::parse::<Status>).transpose()?;
    let ticket_type = list
        .ticket_type
        .as_deref()
        .map(str::parse::<TicketType>)
        .transpose()?;

    let tickets: Vec<&Ticket> = project
        .tickets()
        .iter()
        .filter(|ticket| status.map_or(true, |status| ticket.status == status))
        .filter(|ticket| ticket_type.map_or(true, |kind| ticket.ticket_type == kind))
        .collect();

    let mut human = HumanOutput::new(format!("Tickets in {prefix}"));
    human.push_summary("Total", tickets.len().to_string());
    for ticket in &tickets {
        human.push_detail(ticket_line(ticket));
    }

    let output = TicketListOutput {
        project: prefix,
        total: tickets.len(),
        tickets: tickets.into_iter().map(TicketV2::from).collect(),
    };
    emit_success(options, "list", &output, Some(&human))
}

pub fn run_show(storage: &Storage, options: OutputOptions, raw: &str) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let project = storage.load_for_id(&id)?;
    let ticket = project.get(id.number)?;
    let blocked_by = open_blockers(storage, &project, id.number)?;

    let mut human = HumanOutput::new(format!("{} {}", ticket.id, ticket.title));
    human.push_summary("Type", ticket.ticket_type.to_string());
    human.push_summary("Status", ticket.status.to_string());
    if let Some(priority) = ticket.priority {
        human.push_summary("Priority", priority.to_string());
    }
    human.push_summary("Created", timestamp::format(&ticket.created_at));
    if !ticket.depends.is_empty() {
        human.push_summary("Depends", join_ids(&ticket.depends));
    }
    if !blocked_by.is_empty() {
        human.push_summary("Blocked by", join_ids(&blocked_by));
    }
    if !ticket.description.is_empty() {
        for line in ticket.description.lines() {
            human.push_detail(line);
        }
    }
    for entry in &ticket.history {
        human.push_detail(format!("{} {}", timestamp::format(&entry.at), entry.status));
    }

    let output = TicketShowOutput {
        ticket: TicketV2::from(ticket),
        blocked_by,
    };
    emit_success(options, "show", &output, Some(&human))
}

pub fn run_transition(
    storage: &Storage,
    options: OutputOptions,
    raw: &str,
    transition: Transition,
) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let mut project = storage.load_for_id(&id)?;
    project.set_status(id.number, transition.status())?;
    storage.save_project(&project)?;
    emit_status(options, transition.command(), id, transition.status())
}

/// Complete a ticket once every dependency, here or in other projects, is done.
pub fn run_done(storage: &Storage, options: OutputOptions, raw: &str) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let mut project = storage.load_for_id(&id)?;

    let blockers = open_blockers(storage, &project, id.number)?;
    if !blockers.is_empty() {
        return Err(Error::BlockedByDependencies {
            id: id.to_string(),
            blockers: join_ids(&blockers),
        });
    }
    project.complete(id.number)?;
    storage.save_project(&project)?;
    emit_status(options, "done", id, Status::Done)
}

pub fn run_edit(storage: &Storage, options: OutputOptions, edit: EditOptions) -> Result<()> {
    if edit.title.is_none()
        && edit.description.is_none()
        && edit.priority.is_none()
        && edit.ticket_type.is_none()
    {
        return Err(Error::InvalidArgument(
            "nothing to edit; pass --title, --description, --priority or --type".to_string(),
        ));
    }

    let id = resolve_id(storage, &edit.id)?;
    let mut project = storage.load_for_id(&id)?;
    let number = id.number;
    project.get(number)?;

    let mut human = HumanOutput::new(format!("Ticket {id} updated"));
    if let Some(title) = edit.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        project.set_title(number, title)?;
        human.push_summary("Title", title);
    }
    if let Some(description) = edit.description {
        project.set_description(number, description)?;
        human.push_summary("Description", "updated");
    }
    if let Some(raw) = edit.priority {
        let priority = match raw.trim() {
            "none" | "" => None,
            value => Some(value.parse::<Priority>()?),
        };
        project.set_priority(number, priority)?;
        human.push_summary(
            "Priority",
            priority.map_or_else(|| "none".to_string(), |p| p.to_string()),
        );
    }
    if let Some(raw) = edit.ticket_type {
        let ticket_type: TicketType = raw.parse()?;
        project.set_type(number, ticket_type)?;
        human.push_summary("Type", ticket_type.to_string());
    }
    storage.save_project(&project)?;

    let ticket = project.get(number)?;
    emit_success(options, "edit", &TicketV2::from(ticket), Some(&human))
}

pub fn run_rm(storage: &Storage, options: OutputOptions, raw: &str) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let mut project = storage.load_for_id(&id)?;
    let removed = project.remove_ticket(id.number)?;
    storage.save_project(&project)?;

    let mut human = HumanOutput::new(format!("Ticket {id} deleted"));
    human.push_summary("Title", removed.title.clone());
    emit_success(options, "rm", &TicketV2::from(&removed), Some(&human))
}

pub fn run_dep_add(
    storage: &Storage,
    options: OutputOptions,
    raw: &str,
    raw_dependency: &str,
) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let dependency = parse_id_in(&id.prefix, raw_dependency)?;
    let mut project = storage.load_for_id(&id)?;
    let changed = project.add_dependency(id.number, dependency.clone())?;
    if changed {
        storage.save_project(&project)?;
    }

    let mut human = if changed {
        HumanOutput::new(format!("{id} now depends on {dependency}"))
    } else {
        HumanOutput::new(format!("{id} already depends on {dependency}"))
    };
    if dependency.belongs_to(project.prefix()) {
        if project.find_by_id(&dependency).is_none() {
            human.push_warning(format!("{dependency} does not exist yet"));
        }
    } else if !storage.project_exists(&dependency.prefix) {
        human.push_warning(format!("project {} does not exist", dependency.prefix));
    }

    let output = DependencyOutput {
        id,
        depends_on: dependency,
        changed,
    };
    emit_success(options, "dep add", &output, Some(&human))
}

pub fn run_dep_rm(
    storage: &Storage,
    options: OutputOptions,
    raw: &str,
    raw_dependency: &str,
) -> Result<()> {
    let id = resolve_id(storage, raw)?;
    let dependency = parse_id_in(&id.prefix, raw_dependency)?;
    let mut project = storage.load_for_id(&id)?;
    let changed = project.remove_dependency(id.number, &dependency)?;
    if changed {
        storage.save_project(&project)?;
    }

    let human = if changed {
        HumanOutput::new(format!("{id} no longer depends on {dependency}"))
    } else {
        HumanOutput::new(format!("{id} did not depend on {dependency}"))
    };
    let output = DependencyOutput {
        id,
        depends_on: dependency,
        changed,
    };
    emit_success(options, "dep rm", &output, Some(&human))
}

pub fn run_blocked(storage: &Storage, options: OutputOptions, project: Option<&str>) -> Result<()> {
    let prefix = storage.resolve_prefix(project)?;
    let project = storage.load_project(&prefix)?;

    let mut entries = Vec::new();
    for ticket in project.tickets().iter().filter(|t| !t.status.is_done()) {
        let blocked_by = open_blockers(storage, &project, ticket.number())?;
        if !blocked_by.is_empty() {
            entries.push(BlockedEntry {
                id: ticket.id.clone(),
                title: ticket.title.clone(),
                blocked_by,
            });
        }
    }

    let mut human = HumanOutput::new(format!("Blocked tickets in {prefix}"));
    human.push_summary("Total", entries.len().to_string());
    for entry in &entries {
        human.push_detail(format!(
            "{} {} (waiting on {})",
            entry.id,
            entry.title,
            join_ids(&entry.blocked_by)
        ));
    }

    let output = BlockedOutput {
        project: prefix,
        tickets: entries,
    };
    emit_success(options, "blocked", &output, Some(&human))
}

pub fn run_ready(storage: &Storage, options: OutputOptions, project: Option<&str>) -> Result<()> {
    let prefix = storage.resolve_prefix(project)?;
    let project = storage.load_project(&prefix)?;

    let mut tickets = Vec::new();
    for ticket in project.ready() {
        let cross = deps::cross_project_blockers(&project, ticket.number(), |other| {
            storage.load_if_exists(other)
        })?;
        if cross.is_empty() {
            tickets.push(ticket);
        }
    }

    let mut human = HumanOutput::new(format!("Ready tickets in {prefix}"));
    human.push_summary("Total", tickets.len().to_string());
    for ticket in &tickets {
        human.push_detail(ticket_line(ticket));
    }

    let output = TicketListOutput {
        project: prefix,
        total: tickets.len(),
        tickets: tickets.into_iter().map(TicketV2::from).collect(),
    };
    emit_success(options, "ready", &output, Some(&human))
}

/// Accept `API-12`, or a bare `12` in the default project.
fn resolve_id(storage: &Storage, raw: &str) -> Result<TicketId> {
    let raw = raw.trim();
    if is_bare_number(raw) {
        let prefix = storage.resolve_prefix(None)?;
        return parse_id_in(&prefix, raw);
    }
    TicketId::parse(raw)
}

/// Like [`resolve_id`], with bare numbers taken from `prefix`.
fn parse_id_in(prefix: &str, raw: &str) -> Result<TicketId> {
    let raw = raw.trim();
    if is_bare_number(raw) {
        let number = raw
            .parse::<u64>()
            .map_err(|_| Error::InvalidTicketId(raw.to_string()))?;
        return Ok(TicketId::new(prefix, number));
    }
    TicketId::parse(raw)
}

fn is_bare_number(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Open dependencies in this project and in any other project.
fn open_blockers(storage: &Storage, project: &Project, number: u64) -> Result<Vec<TicketId>> {
    let mut blockers = deps::blocking_dependencies(project, number)?;
    blockers.extend(deps::cross_project_blockers(project, number, |prefix| {
        storage.load_if_exists(prefix)
    })?);
    Ok(blockers)
}

fn ticket_line(ticket: &Ticket) -> String {
    let priority = ticket
        .priority
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    format!(
        "[{}][{}] {} {} ({})",
        ticket.status, priority, ticket.id, ticket.title, ticket.ticket_type
    )
}

fn emit_status(options: OutputOptions, command: &str, id: TicketId, status: Status) -> Result<()> {
    let mut human = HumanOutput::new(format!("Ticket {id} is {status}"));
    human.push_summary("ID", id.to_string());
    human.push_summary("Status", status.to_string());
    let output = TicketStatusOutput { id, status };
    emit_success(options, command, &output, Some(&human))
}
