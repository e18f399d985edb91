//! Project aggregate.
//!
//! A project owns an ordered collection of tickets sharing one prefix and one
//! storage file. Ticket numbers are assigned from `next_number` and never
//! reused, even after deletion.

use chrono::{DateTime, Utc};

use crate::deps;
use crate::error::{Error, Result};
use crate::ticket::{
    self, validate_dependency_count, validate_description, validate_title, HistoryEntry,
    Priority, Status, Ticket, TicketType,
};
use crate::ticket_id::{join_ids, TicketId};

/// Maximum prefix length in bytes
pub const MAX_PREFIX_BYTES: usize = 32;

/// Maximum tickets per project
pub const MAX_TICKETS: usize = 10_000;

/// Check a project prefix: non-empty, at most 32 bytes, and safe to use as a
/// file name.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::InvalidPrefix("prefix cannot be empty".to_string()));
    }
    if prefix.len() > MAX_PREFIX_BYTES {
        return Err(Error::PrefixTooLong {
            len: prefix.len(),
            max: MAX_PREFIX_BYTES,
        });
    }
    if !prefix
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(Error::InvalidPrefix(format!(
            "'{prefix}' may only contain letters, digits, '-' and '_'"
        )));
    }
    if prefix.starts_with('-') {
        return Err(Error::InvalidPrefix(format!(
            "'{prefix}' cannot start with '-'"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    prefix: String,
    tickets: Vec<Ticket>,
    next_number: u64,
}

impl Project {
    /// Create an empty project.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self {
            prefix,
            tickets: Vec::new(),
            next_number: 1,
        })
    }

    /// Rebuild a project from decoded tickets.
    ///
    /// Decoded tickets are held to the same limits as new ones. `next_number`
    /// is derived from the highest number present.
    pub fn from_tickets(prefix: impl Into<String>, tickets: Vec<Ticket>) -> Result<Self> {
        let mut project = Self::new(prefix)?;
        if tickets.len() > MAX_TICKETS {
            return Err(Error::TooManyTickets { max: MAX_TICKETS });
        }
        for ticket in tickets {
            validate_title(&ticket.title)?;
            validate_description(&ticket.description)?;
            validate_dependency_count(ticket.depends.len())?;
            if !ticket.id.belongs_to(&project.prefix) {
                return Err(Error::InvalidFormat(format!(
                    "ticket {} does not belong to project {}",
                    ticket.id, project.prefix
                )));
            }
            if project.find_by_number(ticket.number()).is_some() {
                return Err(Error::InvalidFormat(format!(
                    "duplicate ticket {}",
                    ticket.id
                )));
            }
            let after = ticket.number().checked_add(1).ok_or_else(|| {
                Error::InvalidFormat(format!("ticket number of {} is out of range", ticket.id))
            })?;
            project.next_number = project.next_number.max(after);
            project.tickets.push(ticket);
        }
        Ok(project)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn next_number(&self) -> u64 {
        self.next_number
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Id the ticket with `number` would have in this project.
    pub fn id_for(&self, number: u64) -> TicketId {
        TicketId::new(self.prefix.clone(), number)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn find_by_number(&self, number: u64) -> Option<&Ticket> {
        self.tickets.iter().find(|ticket| ticket.number() == number)
    }

    /// Like [`find_by_number`](Self::find_by_number) but also requires the
    /// id's prefix to match this project.
    pub fn find_by_id(&self, id: &TicketId) -> Option<&Ticket> {
        if !id.belongs_to(&self.prefix) {
            return None;
        }
        self.find_by_number(id.number)
    }

    pub fn get(&self, number: u64) -> Result<&Ticket> {
        self.find_by_number(number)
            .ok_or_else(|| Error::TicketNotFound(self.id_for(number).to_string()))
    }

    fn get_mut(&mut self, number: u64) -> Result<&mut Ticket> {
        let missing = self.id_for(number).to_string();
        self.tickets
            .iter_mut()
            .find(|ticket| ticket.number() == number)
            .ok_or(Error::TicketNotFound(missing))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a ticket stamped with the current time.
    pub fn add_ticket(
        &mut self,
        ticket_type: TicketType,
        title: impl Into<String>,
        description: impl Into<String>,
        depends: Vec<TicketId>,
        priority: Option<Priority>,
    ) -> Result<&Ticket> {
        self.add_ticket_at(ticket_type, title, description, depends, priority, ticket::now())
    }

    pub(crate) fn add_ticket_at(
        &mut self,
        ticket_type: TicketType,
        title: impl Into<String>,
        description: impl Into<String>,
        depends: Vec<TicketId>,
        priority: Option<Priority>,
        created_at: DateTime<Utc>,
    ) -> Result<&Ticket> {
        let title = title.into();
        let description = description.into();
        validate_title(&title)?;
        validate_description(&description)?;
        if self.tickets.len() >= MAX_TICKETS {
            return Err(Error::TooManyTickets { max: MAX_TICKETS });
        }
        validate_dependency_count(depends.len())?;

        let mut unique: Vec<TicketId> = Vec::with_capacity(depends.len());
        for dep in depends {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }

        let id = self.id_for(self.next_number);
        // A dependency may name a number that has not been assigned yet, so
        // the new id can already have incoming edges.
        for dep in &unique {
            if let Some(path) = deps::path_between(self, dep, &id) {
                return Err(Error::DependencyCycle(format!(
                    "{id} -> {}",
                    join_ids(&path).replace(", ", " -> ")
                )));
            }
        }

        self.tickets.push(Ticket {
            id,
            ticket_type,
            status: Status::Pending,
            title,
            created_at,
            depends: unique,
            priority,
            description,
            history: vec![HistoryEntry::new(Status::Pending, created_at)],
        });
        self.next_number += 1;

        let index = self.tickets.len() - 1;
        Ok(&self.tickets[index])
    }

    /// Delete a ticket and drop its id from every other ticket's `depends`.
    pub fn remove_ticket(&mut self, number: u64) -> Result<Ticket> {
        let index = self
            .tickets
            .iter()
            .position(|ticket| ticket.number() == number)
            .ok_or_else(|| Error::TicketNotFound(self.id_for(number).to_string()))?;
        let removed = self.tickets.remove(index);
        for ticket in &mut self.tickets {
            ticket.depends.retain(|dep| dep != &removed.id);
        }
        Ok(removed)
    }

    /// Set a status and append a history entry.
    ///
    /// Dependencies are not checked here; see [`complete`](Self::complete).
    pub fn set_status(&mut self, number: u64, status: Status) -> Result<()> {
        self.set_status_at(number, status, ticket::now())
    }

    pub(crate) fn set_status_at(
        &mut self,
        number: u64,
        status: Status,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.get_mut(number)?.transition(status, at);
        Ok(())
    }

    /// Mark a ticket done after checking its same-project dependencies.
    pub fn complete(&mut self, number: u64) -> Result<()> {
        let blockers = deps::blocking_dependencies(self, number)?;
        if !blockers.is_empty() {
            return Err(Error::BlockedByDependencies {
                id: self.id_for(number).to_string(),
                blockers: join_ids(&blockers),
            });
        }
        self.set_status(number, Status::Done)
    }

    pub fn set_title(&mut self, number: u64, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        validate_title(&title)?;
        self.get_mut(number)?.title = title;
        Ok(())
    }

    pub fn set_description(&mut self, number: u64, description: impl Into<String>) -> Result<()> {
        let description = description.into();
        validate_description(&description)?;
        self.get_mut(number)?.description = description;
        Ok(())
    }

    pub fn set_priority(&mut self, number: u64, priority: Option<Priority>) -> Result<()> {
        self.get_mut(number)?.priority = priority;
        Ok(())
    }

    pub fn set_type(&mut self, number: u64, ticket_type: TicketType) -> Result<()> {
        self.get_mut(number)?.ticket_type = ticket_type;
        Ok(())
    }

    /// Add `dependency` to a ticket's `depends`.
    ///
    /// Returns `false` when it was already present.
    pub fn add_dependency(&mut self, number: u64, dependency: TicketId) -> Result<bool> {
        let id = self.get(number)?.id.clone();
        if dependency == id {
            return Err(Error::DependencyCycle(format!("{id} cannot depend on itself")));
        }
        let ticket = self.get(number)?;
        if ticket.depends_on(&dependency) {
            return Ok(false);
        }
        validate_dependency_count(ticket.depends.len() + 1)?;
        if let Some(path) = deps::path_between(self, &dependency, &id) {
            return Err(Error::DependencyCycle(format!(
                "{id} -> {}",
                join_ids(&path).replace(", ", " -> ")
            )));
        }
        self.get_mut(number)?.depends.push(dependency);
        Ok(true)
    }

    /// Returns `false` when the dependency was not present.
    pub fn remove_dependency(&mut self, number: u64, dependency: &TicketId) -> Result<bool> {
        let ticket = self.get_mut(number)?;
        let before = ticket.depends.len();
        ticket.depends.retain(|dep| dep != dependency);
        Ok(ticket.depends.len() != before)
    }

    /// Pending tickets with no open same-project dependencies.
    pub fn ready(&self) -> Vec<&Ticket> {
        self.tickets
            .iter()
            .filter(|ticket| ticket.status == Status::Pending)
            .filter(|ticket| {
                deps::blocking_dependencies(self, ticket.number())
                    .map(|blockers| blockers.is_empty())
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(count: usize) -> Project {
        let mut project = Project::new("CORE").unwrap();
        for i in 0..count {
            project
                .add_ticket(TicketType::Task, format!("ticket {i}"), "", vec![], None)
                .unwrap();
        }
        project
    }

    #[test]
    fn new_rejects_bad_prefixes() {
        assert!(matches!(
            Project::new("A".repeat(33)),
            Err(Error::PrefixTooLong { len: 33, .. })
        ));
        assert!(Project::new("A".repeat(32)).is_ok());
        assert!(matches!(Project::new(""), Err(Error::InvalidPrefix(_))));
        assert!(matches!(Project::new("a/b"), Err(Error::InvalidPrefix(_))));
        assert!(Project::new("MY-PROJECT").is_ok());
    }

    #[test]
    fn add_assigns_numbers_and_initial_history() {
        let mut project = Project::new("CORE").unwrap();
        let ticket = project
            .add_ticket(TicketType::Bug, "crash", "details", vec![], Some(Priority::High))
            .unwrap();
        assert_eq!(ticket.id, TicketId::new("CORE", 1));
        assert_eq!(ticket.status, Status::Pending);
        assert_eq!(ticket.history.len(), 1);
        assert_eq!(ticket.history[0].status, Status::Pending);
        assert_eq!(ticket.history[0].at, ticket.created_at);
        assert_eq!(project.next_number(), 2);
    }

    #[test]
    fn numbers_are_never_reused() {
        let mut project = project_with(3);
        project.remove_ticket(2).unwrap();
        let ticket = project
            .add_ticket(TicketType::Task, "fourth", "", vec![], None)
            .unwrap();
        assert_eq!(ticket.number(), 4);
        assert!(project.find_by_number(2).is_none());
    }

    #[test]
    fn failed_add_leaves_project_unchanged() {
        let mut project = project_with(1);
        let before = project.clone();

        let err = project
            .add_ticket(TicketType::Task, "t".repeat(281), "", vec![], None)
            .unwrap_err();
        assert!(matches!(err, Error::TitleTooLong { .. }));

        let deps: Vec<TicketId> = (1..=101).map(|n| TicketId::new("OTHER", n)).collect();
        let err = project
            .add_ticket(TicketType::Task, "many", "", deps, None)
            .unwrap_err();
        assert!(matches!(err, Error::TooManyDependencies { count: 101, .. }));

        let err = project
            .add_ticket(TicketType::Task, "big", "x".repeat(64 * 1024 + 1), vec![], None)
            .unwrap_err();
        assert!(matches!(err, Error::DescriptionTooLong { .. }));

        assert_eq!(project, before);
    }

    #[test]
    fn ticket_cap_is_enforced() {
        let mut project = Project::new("BIG").unwrap();
        let at = ticket::now();
        for _ in 0..MAX_TICKETS {
            project
                .add_ticket_at(TicketType::Chore, "x", "", vec![], None, at)
                .unwrap();
        }
        let err = project
            .add_ticket(TicketType::Chore, "one more", "", vec![], None)
            .unwrap_err();
        assert!(matches!(err, Error::TooManyTickets { .. }));
    }

    #[test]
    fn remove_cascades_to_dependents() {
        let mut project = project_with(1);
        let a = TicketId::new("CORE", 1);
        let external = TicketId::new("WEB", 9);
        project
            .add_ticket(TicketType::Task, "b", "", vec![a.clone(), external.clone()], None)
            .unwrap();

        let removed = project.remove_ticket(1).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(project.get(2).unwrap().depends, vec![external]);
    }

    #[test]
    fn remove_missing_ticket_fails() {
        let mut project = project_with(1);
        assert!(matches!(
            project.remove_ticket(5),
            Err(Error::TicketNotFound(ref id)) if id == "CORE-5"
        ));
    }

    #[test]
    fn set_status_appends_history() {
        let mut project = project_with(1);
        project.set_status(1, Status::InProgress).unwrap();
        project.set_status(1, Status::Done).unwrap();
        let ticket = project.get(1).unwrap();
        let statuses: Vec<Status> = ticket.history.iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![Status::Pending, Status::InProgress, Status::Done]);
        assert_eq!(ticket.history.last().unwrap().status, ticket.status);
        assert!(ticket.completed_at().is_some());
    }

    #[test]
    fn edits_revalidate_limits_and_skip_history() {
        let mut project = project_with(1);
        assert!(project.set_title(1, "t".repeat(281)).is_err());
        project.set_title(1, "renamed").unwrap();
        project.set_description(1, "more words").unwrap();
        let ticket = project.get(1).unwrap();
        assert_eq!(ticket.title, "renamed");
        assert_eq!(ticket.description, "more words");
        assert_eq!(ticket.history.len(), 1);
    }

    #[test]
    fn complete_refuses_open_dependencies() {
        let mut project = project_with(1);
        project
            .add_ticket(TicketType::Task, "b", "", vec![TicketId::new("CORE", 1)], None)
            .unwrap();

        let err = project.complete(2).unwrap_err();
        assert!(matches!(err, Error::BlockedByDependencies { ref blockers, .. } if blockers == "CORE-1"));
        assert_eq!(project.get(2).unwrap().status, Status::Pending);

        project.complete(1).unwrap();
        project.complete(2).unwrap();
        assert_eq!(project.get(2).unwrap().status, Status::Done);
    }

    #[test]
    fn add_dependency_rejects_cycles() {
        let mut project = project_with(3);
        project.add_dependency(2, TicketId::new("CORE", 1)).unwrap();
        project.add_dependency(3, TicketId::new("CORE", 2)).unwrap();

        let err = project.add_dependency(1, TicketId::new("CORE", 3)).unwrap_err();
        assert!(matches!(err, Error::DependencyCycle(_)));
        assert!(matches!(
            project.add_dependency(1, TicketId::new("CORE", 1)),
            Err(Error::DependencyCycle(_))
        ));
        assert!(!project.add_dependency(3, TicketId::new("CORE", 2)).unwrap());
        assert!(project.get(1).unwrap().depends.is_empty());
    }

    #[test]
    fn add_rejects_cycle_through_unassigned_number() {
        let mut project = Project::new("CORE").unwrap();
        project
            .add_ticket(TicketType::Task, "a", "", vec![TicketId::new("CORE", 2)], None)
            .unwrap();
        let err = project
            .add_ticket(TicketType::Task, "b", "", vec![TicketId::new("CORE", 1)], None)
            .unwrap_err();
        assert!(matches!(err, Error::DependencyCycle(_)));
        assert_eq!(project.next_number(), 2);
    }

    #[test]
    fn ready_lists_unblocked_pending_tickets() {
        let mut project = project_with(2);
        project.add_dependency(2, TicketId::new("CORE", 1)).unwrap();
        let ready: Vec<u64> = project.ready().iter().map(|t| t.number()).collect();
        assert_eq!(ready, vec![1]);

        project.set_status(1, Status::Done).unwrap();
        let ready: Vec<u64> = project.ready().iter().map(|t| t.number()).collect();
        assert_eq!(ready, vec![2]);
    }

    #[test]
    fn from_tickets_rebuilds_next_number() {
        let mut source = project_with(3);
        source.remove_ticket(3).unwrap();
        let rebuilt = Project::from_tickets("CORE", source.tickets().to_vec()).unwrap();
        assert_eq!(rebuilt.next_number(), 3);

        let foreign = Project::from_tickets("OTHER", source.tickets().to_vec());
        assert!(matches!(foreign, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn find_by_id_checks_prefix() {
        let project = project_with(1);
        assert!(project.find_by_id(&TicketId::new("CORE", 1)).is_some());
        assert!(project.find_by_id(&TicketId::new("WEB", 1)).is_none());
    }
}
