//! CLI argument definitions for scrum.

use clap::{Parser, Subcommand, ValueEnum};

use crate::models::{IssueType, Priority, TaskStatus, TaskType};

/// scrum - Drive a scrum tracker's remote store with optimistic updates.
///
/// Start with `scrum seed` against an empty store, then `scrum load` to see
/// what is there.
#[derive(Parser, Debug)]
#[command(name = "scrum")]
#[command(author, version, about = "Optimistic sync client for a scrum tracker", long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SCRUM_GIT_COMMIT"),
    ", built ",
    env!("SCRUM_BUILD_TIMESTAMP"),
    ")"
))]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Remote store base URL (overrides SCRUMSYNC_BASE_URL and config files)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Author recorded on activity entries (overrides SCRUMSYNC_USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every collection and summarize the active sprint
    Load,

    /// Populate an empty remote store with demo data
    Seed,

    /// Task commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Sprint commands
    Sprint {
        #[command(subcommand)]
        command: SprintCommands,
    },

    /// Issue commands
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },

    /// Epic commands
    Epic {
        #[command(subcommand)]
        command: EpicCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Create {
        /// Task title
        title: String,

        /// Kind of work item
        #[arg(short = 't', long = "type", value_enum, default_value = "task")]
        task_type: TaskTypeArg,

        /// Priority
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,

        /// Sprint to add the task to (backlog if omitted)
        #[arg(short, long)]
        sprint: Option<String>,

        /// Story points
        #[arg(long, default_value_t = 1)]
        points: u32,

        /// Assignee ID
        #[arg(short, long)]
        assignee: Option<String>,

        /// Tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Move a task to another board column
    Move {
        /// Task ID
        id: String,

        /// Target status
        #[arg(value_enum)]
        status: TaskStatusArg,
    },

    /// Move a task into a sprint, or to the backlog with --backlog
    Sprint {
        /// Task ID
        id: String,

        /// Target sprint ID
        #[arg(required_unless_present = "backlog", conflicts_with = "backlog")]
        sprint_id: Option<String>,

        /// Move to the backlog instead of a sprint
        #[arg(long)]
        backlog: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SprintCommands {
    /// Create the next numbered sprint starting today
    Create,

    /// Complete a sprint and archive its unfinished tasks
    Complete {
        /// Sprint ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum IssueCommands {
    /// Create an issue
    Create {
        /// Issue title
        title: String,

        /// Kind of issue
        #[arg(short = 't', long = "type", value_enum, default_value = "bug")]
        issue_type: IssueTypeArg,

        /// Priority
        #[arg(short, long, value_enum, default_value = "normal")]
        priority: PriorityArg,

        /// Description
        #[arg(short, long)]
        desc: Option<String>,
    },

    /// Reopen an issue
    Reopen {
        /// Issue ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EpicCommands {
    /// Create an epic
    Create {
        /// Epic name
        name: String,
    },

    /// Recompute an epic's progress from its linked tasks
    Recalc {
        /// Epic ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration and where each value came from
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskStatusArg {
    New,
    InProgress,
    ReadyTest,
    ReadyDeploy,
    Done,
    Archived,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(arg: TaskStatusArg) -> Self {
        match arg {
            TaskStatusArg::New => TaskStatus::New,
            TaskStatusArg::InProgress => TaskStatus::InProgress,
            TaskStatusArg::ReadyTest => TaskStatus::ReadyTest,
            TaskStatusArg::ReadyDeploy => TaskStatus::ReadyDeploy,
            TaskStatusArg::Done => TaskStatus::Done,
            TaskStatusArg::Archived => TaskStatus::Archived,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskTypeArg {
    Story,
    Task,
    Bug,
}

impl From<TaskTypeArg> for TaskType {
    fn from(arg: TaskTypeArg) -> Self {
        match arg {
            TaskTypeArg::Story => TaskType::Story,
            TaskTypeArg::Task => TaskType::Task,
            TaskTypeArg::Bug => TaskType::Bug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IssueTypeArg {
    Bug,
    Question,
    Enhancement,
}

impl From<IssueTypeArg> for IssueType {
    fn from(arg: IssueTypeArg) -> Self {
        match arg {
            IssueTypeArg::Bug => IssueType::Bug,
            IssueTypeArg::Question => IssueType::Question,
            IssueTypeArg::Enhancement => IssueType::Enhancement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Critical,
    High,
    Normal,
    Low,
    Wishlist,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Critical => Priority::Critical,
            PriorityArg::High => Priority::High,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::Low => Priority::Low,
            PriorityArg::Wishlist => Priority::Wishlist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_task_move_parses_kebab_status() {
        let cli = Cli::try_parse_from(["scrum", "task", "move", "7", "ready-test"]).unwrap();
        match cli.command {
            Commands::Task {
                command: TaskCommands::Move { id, status },
            } => {
                assert_eq!(id, "7");
                assert_eq!(TaskStatus::from(status), TaskStatus::ReadyTest);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_task_sprint_requires_target() {
        assert!(Cli::try_parse_from(["scrum", "task", "sprint", "7"]).is_err());
        assert!(Cli::try_parse_from(["scrum", "task", "sprint", "7", "--backlog"]).is_ok());
        assert!(Cli::try_parse_from(["scrum", "task", "sprint", "7", "2", "--backlog"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["scrum", "load", "-H", "--base-url", "http://x:1"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.base_url.as_deref(), Some("http://x:1"));
    }
}
