//! Dependency checks between tickets.
//!
//! Only same-project edges are followed. A dependency on another project is
//! left to the caller, who can load that project and use
//! [`cross_project_blockers`].

use std::collections::HashSet;

use crate::error::Result;
use crate::project::Project;
use crate::ticket_id::TicketId;

/// Same-project dependencies of ticket `number` that exist and are not done,
/// in `depends` order.
pub fn blocking_dependencies(project: &Project, number: u64) -> Result<Vec<TicketId>> {
    let ticket = project.get(number)?;
    Ok(ticket
        .depends
        .iter()
        .filter(|dep| dep.belongs_to(project.prefix()))
        .filter(|dep| {
            project
                .find_by_number(dep.number)
                .map(|target| !target.status.is_done())
                .unwrap_or(false)
        })
        .cloned()
        .collect())
}

/// Dependencies of ticket `number` that live in other projects and are not
/// done there.
///
/// `load` returns the project for a prefix, or `None` when it does not
/// exist. Missing projects and tickets do not block.
pub fn cross_project_blockers<F>(project: &Project, number: u64, mut load: F) -> Result<Vec<TicketId>>
where
    F: FnMut(&str) -> Result<Option<Project>>,
{
    let ticket = project.get(number)?;
    let mut blockers = Vec::new();
    let mut loaded: Vec<Project> = Vec::new();

    for dep in ticket
        .depends
        .iter()
        .filter(|dep| !dep.belongs_to(project.prefix()))
    {
        if !loaded.iter().any(|other| other.prefix() == dep.prefix) {
            match load(&dep.prefix)? {
                Some(other) => loaded.push(other),
                None => continue,
            }
        }
        let open = loaded
            .iter()
            .find(|other| other.prefix() == dep.prefix)
            .and_then(|other| other.find_by_id(dep))
            .map(|target| !target.status.is_done())
            .unwrap_or(false);
        if open {
            blockers.push(dep.clone());
        }
    }

    Ok(blockers)
}

/// Find a chain of same-project `depends` edges leading from `start` to
/// `target`, inclusive of both ends.
///
/// Adding an edge `target -> start` would close a cycle exactly when this
/// returns `Some`.
pub fn path_between(project: &Project, start: &TicketId, target: &TicketId) -> Option<Vec<TicketId>> {
    if !start.belongs_to(project.prefix()) || !target.belongs_to(project.prefix()) {
        return None;
    }

    let mut visited = HashSet::new();
    let mut path = vec![start.clone()];
    if walk(project, start, target, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn walk(
    project: &Project,
    current: &TicketId,
    target: &TicketId,
    visited: &mut HashSet<u64>,
    path: &mut Vec<TicketId>,
) -> bool {
    if current == target {
        return true;
    }
    if !visited.insert(current.number) {
        return false;
    }
    let Some(ticket) = project.find_by_number(current.number) else {
        return false;
    };
    for dep in ticket
        .depends
        .iter()
        .filter(|dep| dep.belongs_to(project.prefix()))
    {
        path.push(dep.clone());
        if walk(project, dep, target, visited, path) {
            return true;
        }
        path.pop();
    }
    false
}
