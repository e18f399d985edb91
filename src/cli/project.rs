//! tckts project command implementations.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::git::Git;
use crate::migrate::{Migrator, CURRENT_SCHEMA_VERSION};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(Serialize)]
struct ProjectInitOutput {
    prefix: String,
    path: String,
    default: bool,
}

#[derive(Serialize)]
struct ProjectListOutput {
    default_project: Option<String>,
    projects: Vec<ProjectSummary>,
}

#[derive(Serialize)]
struct ProjectSummary {
    prefix: String,
    tickets: usize,
    open: usize,
}

#[derive(Serialize)]
struct DefaultOutput {
    default_project: Option<String>,
}

pub fn run_init(storage: &Storage, options: OutputOptions, prefix: &str) -> Result<()> {
    storage.init_project(prefix)?;
    let config = storage.load_config()?;
    let is_default = config.default_project.as_deref() == Some(prefix);

    let output = ProjectInitOutput {
        prefix: prefix.to_string(),
        path: storage.project_file(prefix).display().to_string(),
        default: is_default,
    };

    let mut human = HumanOutput::new(format!("Project {prefix} created"));
    human.push_summary("File", output.path.clone());
    if is_default {
        human.push_summary("Default", "yes");
    }
    human.push_next_step(format!("tckts add --project {prefix} \"first ticket\""));

    emit_success(options, "init", &output, Some(&human))
}

pub fn run_projects(storage: &Storage, options: OutputOptions) -> Result<()> {
    let config = storage.load_config()?;
    let mut projects = Vec::new();
    for prefix in storage.list_projects()? {
        let project = storage.load_project(&prefix)?;
        let open = project
            .tickets()
            .iter()
            .filter(|ticket| !ticket.status.is_done())
            .count();
        projects.push(ProjectSummary {
            prefix,
            tickets: project.len(),
            open,
        });
    }

    let mut human = HumanOutput::new("Projects");
    human.push_summary("Total", projects.len().to_string());
    for summary in &projects {
        let marker = if config.default_project.as_deref() == Some(summary.prefix.as_str()) {
            " (default)"
        } else {
            ""
        };
        human.push_detail(format!(
            "{}{marker}: {} open / {} total",
            summary.prefix, summary.open, summary.tickets
        ));
    }
    if projects.is_empty() {
        human.push_next_step("tckts init <PREFIX>");
    }

    let output = ProjectListOutput {
        default_project: config.default_project,
        projects,
    };
    emit_success(options, "projects", &output, Some(&human))
}

pub fn run_default(storage: &Storage, options: OutputOptions, prefix: Option<&str>) -> Result<()> {
    let mut config = storage.load_config()?;

    let header = match prefix {
        Some(prefix) => {
            if !storage.project_exists(prefix) {
                return Err(Error::ProjectNotFound(prefix.to_string()));
            }
            config.set_default(prefix)?;
            storage.save_config(&config)?;
            format!("Default project set to {prefix}")
        }
        None => match config.default_project.as_deref() {
            Some(current) => format!("Default project: {current}"),
            None => "No default project".to_string(),
        },
    };

    let human = HumanOutput::new(header);
    let output = DefaultOutput {
        default_project: config.default_project,
    };
    emit_success(options, "default", &output, Some(&human))
}

pub fn run_migrate(storage: &Storage, options: OutputOptions, force: bool) -> Result<()> {
    let report = Migrator::new(storage, &Git).force(force).run()?;

    let mut human = if report.is_empty() {
        HumanOutput::new(format!(
            "All projects already at schema version {CURRENT_SCHEMA_VERSION}"
        ))
    } else {
        HumanOutput::new("Projects migrated")
    };
    for migration in &report.migrated {
        human.push_detail(format!(
            "{}: v{} -> v{}",
            migration.prefix, migration.from, migration.to
        ));
    }
    if !report.is_empty() {
        human.push_next_step("review and commit the tickets directory");
    }

    emit_success(options, "migrate", &report, Some(&human))
}
