//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use prontustore::{ParentRef, PlanId, TaskId};
use std::path::PathBuf;

/// Prontu - hierarchical to-do list with reusable training plans
#[derive(Parser)]
#[command(
    name = "pt",
    about = "Hierarchical to-do list with reusable training plans",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Parent task id ("root" for a top-level task)
        #[arg(short, long, default_value = "root")]
        parent: ParentRef,

        /// Create the task already completed
        #[arg(long)]
        done: bool,
    },

    /// Show the task tree
    List {
        /// Only show the subtree below this task
        #[arg(short, long, default_value = "root")]
        parent: ParentRef,
    },

    /// Show one task with its subtree
    Show {
        /// Task id
        id: TaskId,
    },

    /// Mark a task completed
    Done {
        /// Task id
        id: TaskId,
    },

    /// Mark a task not completed
    Undo {
        /// Task id
        id: TaskId,
    },

    /// Change a task's title
    Rename {
        /// Task id
        id: TaskId,

        /// New title
        title: String,
    },

    /// Drop a task immediately before another (taking that task's parent)
    Move {
        /// Task to move
        id: TaskId,

        /// Task to place it before
        #[arg(short, long)]
        before: TaskId,
    },

    /// Set a task's parent and order key directly
    Reorder {
        /// Task id
        id: TaskId,

        /// New parent ("root" or a task id)
        parent: ParentRef,

        /// New order key
        #[arg(allow_negative_numbers = true)]
        order: f64,
    },

    /// Delete a task and all of its subtasks
    Rm {
        /// Task id
        id: TaskId,
    },

    /// Delete every task
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Print the tree again whenever a task list changes
    Watch {
        /// Subtree to watch
        #[arg(short, long, default_value = "root")]
        parent: ParentRef,
    },

    /// Manage plans
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },

    /// Delete the database file and start over
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

/// Plan subcommands
#[derive(Debug, Subcommand)]
pub enum PlanCommand {
    /// List all plans
    List,

    /// Show a plan's tasks
    Show {
        /// Plan id
        id: PlanId,
    },

    /// Save the current tasks as a new plan
    Save {
        /// Plan title
        title: String,

        /// Plan description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Add a plan's tasks under a new top-level task
    Load {
        /// Plan id
        id: PlanId,
    },

    /// Delete a plan (tasks loaded from it are kept)
    Rm {
        /// Plan id
        id: PlanId,
    },

    /// Import a plan from a JSON file
    Import {
        /// Plan file
        file: PathBuf,
    },

    /// Export a plan to a JSON file
    Export {
        /// Plan id
        id: PlanId,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Restore the built-in plans
    Restore,
}
