use std::fs;

use tckts::codec::{decode_project, encode_project};
use tckts::deps::blocking_dependencies;
use tckts::ticket::MAX_TITLE_BYTES;
use tckts::{Error, Priority, Project, Status, Storage, TicketId, TicketType};
use tempfile::TempDir;

fn storage() -> (TempDir, Storage) {
    let temp = TempDir::new().expect("tempdir");
    let storage = Storage::new(temp.path().join(".tckts"));
    (temp, storage)
}

fn sample_project() -> Result<Project, Error> {
    let mut project = Project::new("BACKEND")?;
    project.add_ticket(TicketType::Epic, "Auth rewrite", "", vec![], Some(Priority::High))?;
    project.add_ticket(
        TicketType::Feature,
        "Token refresh",
        "Refresh tokens before expiry.\n---\nNot a delimiter.",
        vec![TicketId::new("BACKEND", 1), TicketId::new("FRONTEND", 7)],
        None,
    )?;
    project.add_ticket(TicketType::Bug, "Clock skew", "", vec![TicketId::new("BACKEND", 2)], Some(Priority::Low))?;
    project.add_ticket(TicketType::Chore, "Bump deps", "", vec![], None)?;
    project.set_status(1, Status::InProgress)?;
    project.set_status(4, Status::Done)?;
    project.remove_ticket(3)?;
    Ok(project)
}

#[test]
fn encode_then_decode_reproduces_project() -> Result<(), Error> {
    let project = sample_project()?;
    let text = encode_project(&project)?;
    let decoded = decode_project("BACKEND", &text)?;

    assert_eq!(decoded.prefix(), project.prefix());
    assert_eq!(decoded.len(), project.len());
    for ticket in project.tickets() {
        assert_eq!(decoded.find_by_id(&ticket.id), Some(ticket));
    }
    assert_eq!(encode_project(&decoded)?, text);
    Ok(())
}

#[test]
fn save_and_load_through_storage() -> Result<(), Error> {
    let (_temp, storage) = storage();
    storage.init_project("BACKEND")?;
    let project = sample_project()?;
    storage.save_project(&project)?;

    let loaded = storage.load_project("BACKEND")?;
    assert_eq!(loaded, project);
    assert_eq!(storage.list_projects()?, vec!["BACKEND".to_string()]);

    let on_disk = fs::read_to_string(storage.project_file("BACKEND"))?;
    assert_eq!(on_disk.lines().count(), 3);
    assert!(!on_disk.contains("null"));
    Ok(())
}

#[test]
fn removed_numbers_are_not_reused() -> Result<(), Error> {
    let (_temp, storage) = storage();
    let mut project = storage.init_project("API")?;
    for title in ["one", "two", "three"] {
        project.add_ticket(TicketType::Task, title, "", vec![], None)?;
    }
    project.remove_ticket(2)?;
    let id = project.add_ticket(TicketType::Task, "four", "", vec![], None)?.id.clone();
    assert_eq!(id, TicketId::new("API", 4));

    storage.save_project(&project)?;
    let mut reloaded = storage.load_project("API")?;
    let next = reloaded.add_ticket(TicketType::Task, "five", "", vec![], None)?.id.clone();
    assert_eq!(next, TicketId::new("API", 5));
    Ok(())
}

#[test]
fn chained_dependencies_unblock_in_order() -> Result<(), Error> {
    let mut project = Project::new("API")?;
    project.add_ticket(TicketType::Task, "first", "", vec![], None)?;
    project.add_ticket(TicketType::Task, "second", "", vec![TicketId::new("API", 1)], None)?;
    project.add_ticket(TicketType::Task, "third", "", vec![TicketId::new("API", 2)], None)?;

    assert_eq!(blocking_dependencies(&project, 3)?, vec![TicketId::new("API", 2)]);
    assert_eq!(blocking_dependencies(&project, 2)?, vec![TicketId::new("API", 1)]);
    assert!(blocking_dependencies(&project, 1)?.is_empty());

    assert!(matches!(
        project.complete(2),
        Err(Error::BlockedByDependencies { .. })
    ));
    project.complete(1)?;
    project.complete(2)?;
    assert!(blocking_dependencies(&project, 3)?.is_empty());
    Ok(())
}

#[test]
fn failed_add_leaves_project_unchanged() -> Result<(), Error> {
    let mut project = Project::new("API")?;
    project.add_ticket(TicketType::Task, "kept", "", vec![], None)?;
    let before = project.clone();

    let long_title = "x".repeat(MAX_TITLE_BYTES + 1);
    assert!(matches!(
        project.add_ticket(TicketType::Task, long_title, "", vec![], None),
        Err(Error::TitleTooLong { .. })
    ));
    let too_many: Vec<TicketId> = (1..=101).map(|n| TicketId::new("WEB", n)).collect();
    assert!(matches!(
        project.add_ticket(TicketType::Task, "deps", "", too_many, None),
        Err(Error::TooManyDependencies { .. })
    ));

    assert_eq!(project, before);
    Ok(())
}

#[test]
fn corrupt_line_fails_whole_load() -> Result<(), Error> {
    let (_temp, storage) = storage();
    let mut project = storage.init_project("API")?;
    project.add_ticket(TicketType::Task, "fine", "", vec![], None)?;
    storage.save_project(&project)?;

    let path = storage.project_file("API");
    let mut text = fs::read_to_string(&path)?;
    text.push_str("{\"id\":\"API-2\",\"type\":\"task\"\n");
    fs::write(&path, text)?;

    assert!(matches!(
        storage.load_project("API"),
        Err(Error::InvalidJson { line: 2, .. })
    ));
    Ok(())
}
