//! Command-line interface for tckts
//!
//! This module defines the CLI structure using clap derive macros.
//! Project-level commands live in `project`, ticket commands in `ticket`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::error::Result;
use crate::git::Git;
use crate::migrate::Migrator;
use crate::output::OutputOptions;
use crate::storage::Storage;

mod project;
mod ticket;

/// tckts - file-backed tickets that live next to your code
#[derive(Parser, Debug)]
#[command(name = "tckts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Tickets directory (defaults to .tckts in the current directory)
    #[arg(long, global = true, env = "TCKTS_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Migrate older project files even outside a clean git checkout
    #[arg(long, global = true)]
    pub force_migrate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a project
    Init {
        /// Project prefix, e.g. API
        prefix: String,
    },

    /// List projects
    Projects,

    /// Show or set the default project
    Default {
        /// Prefix to make the default
        prefix: Option<String>,
    },

    /// Create a ticket
    Add {
        /// Ticket title
        title: String,

        /// Project prefix (defaults to the default project)
        #[arg(short, long)]
        project: Option<String>,

        /// Ticket type: bug, feature, task, chore, epic
        #[arg(short = 't', long = "type", default_value = "task")]
        ticket_type: String,

        /// Description text
        #[arg(short, long)]
        description: Option<String>,

        /// Tickets this one depends on (comma separated)
        #[arg(long, value_delimiter = ',')]
        depends: Vec<String>,

        /// Priority: low, medium, high
        #[arg(long)]
        priority: Option<String>,
    },

    /// List tickets
    List {
        /// Project prefix (defaults to the default project)
        #[arg(short, long)]
        project: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by type
        #[arg(short = 't', long = "type")]
        ticket_type: Option<String>,
    },

    /// Show one ticket
    Show {
        /// Ticket id (API-12, or 12 in the default project)
        id: String,
    },

    /// Mark a ticket in progress
    Start { id: String },

    /// Mark a ticket blocked
    Block { id: String },

    /// Mark a ticket done (fails while dependencies are open)
    Done { id: String },

    /// Move a ticket back to pending
    Reopen { id: String },

    /// Change ticket fields
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Priority: low, medium, high, or none to clear
        #[arg(long)]
        priority: Option<String>,

        /// Ticket type: bug, feature, task, chore, epic
        #[arg(long = "type")]
        ticket_type: Option<String>,
    },

    /// Delete a ticket
    Rm { id: String },

    /// Dependency management
    #[command(subcommand)]
    Dep(DepCommands),

    /// List tickets waiting on open dependencies
    Blocked {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// List pending tickets with nothing left to wait for
    Ready {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Upgrade every project to the current file format
    Migrate {
        /// Skip the git cleanliness check
        #[arg(long)]
        force: bool,
    },
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Make a ticket depend on another
    Add {
        id: String,
        /// Ticket that must be done first
        depends_on: String,
    },

    /// Remove a dependency
    Rm { id: String, depends_on: String },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let base = std::env::current_dir()?;
        let storage = Storage::resolve(self.dir.as_deref(), &base);
        let options = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        debug!(root = %storage.root().display(), "resolved tickets directory");

        if !matches!(self.command, Commands::Init { .. } | Commands::Migrate { .. }) {
            Migrator::new(&storage, &Git)
                .force(self.force_migrate)
                .run()?;
        }

        match self.command {
            Commands::Init { prefix } => project::run_init(&storage, options, &prefix),
            Commands::Projects => project::run_projects(&storage, options),
            Commands::Default { prefix } => {
                project::run_default(&storage, options, prefix.as_deref())
            }
            Commands::Migrate { force } => {
                project::run_migrate(&storage, options, force || self.force_migrate)
            }
            Commands::Add {
                title,
                project,
                ticket_type,
                description,
                depends,
                priority,
            } => ticket::run_add(
                &storage,
                options,
                ticket::AddOptions {
                    title,
                    project,
                    ticket_type,
                    description,
                    depends,
                    priority,
                },
            ),
            Commands::List {
                project,
                status,
                ticket_type,
            } => ticket::run_list(
                &storage,
                options,
                ticket::ListOptions {
                    project,
                    status,
                    ticket_type,
                },
            ),
            Commands::Show { id } => ticket::run_show(&storage, options, &id),
            Commands::Start { id } => {
                ticket::run_transition(&storage, options, &id, ticket::Transition::Start)
            }
            Commands::Block { id } => {
                ticket::run_transition(&storage, options, &id, ticket::Transition::Block)
            }
            Commands::Reopen { id } => {
                ticket::run_transition(&storage, options, &id, ticket::Transition::Reopen)
            }
            Commands::Done { id } => ticket::run_done(&storage, options, &id),
            Commands::Edit {
                id,
                title,
                description,
                priority,
                ticket_type,
            } => ticket::run_edit(
                &storage,
                options,
                ticket::EditOptions {
                    id,
                    title,
                    description,
                    priority,
                    ticket_type,
                },
            ),
            Commands::Rm { id } => ticket::run_rm(&storage, options, &id),
            Commands::Dep(DepCommands::Add { id, depends_on }) => {
                ticket::run_dep_add(&storage, options, &id, &depends_on)
            }
            Commands::Dep(DepCommands::Rm { id, depends_on }) => {
                ticket::run_dep_rm(&storage, options, &id, &depends_on)
            }
            Commands::Blocked { project } => {
                ticket::run_blocked(&storage, options, project.as_deref())
            }
            Commands::Ready { project } => ticket::run_ready(&storage, options, project.as_deref()),
        }
    }
}
