//! CLI argument definitions for Sextant.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::Selection;

/// Sextant - facet consistency and insight scheduling for project dashboards.
///
/// Loads groups, projects, users and tasks, reconciles a group/project/user
/// selection, and reports options, filtered views and remote insights.
#[derive(Parser, Debug)]
#[command(name = "sx")]
#[command(author, version, about = "Facet consistency and insight scheduling for project dashboards", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("SX_GIT_COMMIT"),
    ", built ",
    env!("SX_BUILD_TIMESTAMP"),
    ")"
))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Entity snapshot file or API base URL (http/https).
    /// Can also be set via SX_DATA or `data-file` in sextant.kdl.
    #[arg(long = "data", global = true)]
    pub data: Option<String>,

    /// Project config file to use instead of ./sextant.kdl
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Facet selection flags shared by the selection-driven commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Selected group id (repeatable)
    #[arg(short = 'g', long = "group")]
    pub groups: Vec<String>,

    /// Selected project id (repeatable)
    #[arg(short = 'p', long = "project")]
    pub projects: Vec<String>,

    /// Selected user id (repeatable)
    #[arg(short = 'u', long = "user")]
    pub users: Vec<String>,
}

impl SelectionArgs {
    /// The draft selection described by the flags.
    pub fn draft(&self) -> Selection {
        Selection::new()
            .with_groups(self.groups.iter().cloned())
            .with_projects(self.projects.iter().cloned())
            .with_users(self.users.iter().cloned())
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a draft selection into a consistent one
    Reconcile {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Show the selectable options for each facet
    Options {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Show filtered projects, tasks and KPIs for a selection
    View {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Evaluation instant for overdue counts (RFC 3339 or YYYY-MM-DD; default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Request a remote insight for a selection (one shot)
    Insights {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Insight endpoint URL (overrides SX_INSIGHT_ENDPOINT and config)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Apply selection edits from stdin and schedule insight requests
    ///
    /// Reads one edit per line as JSON, e.g. {"op":"toggle","facet":"user","id":"u1"},
    /// or the words `refresh` and `quit`. Emits one JSON line per event.
    Watch {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Insight endpoint URL (overrides SX_INSIGHT_ENDPOINT and config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Quiet period before an automatic request, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration values and where each came from
    Show,
}
