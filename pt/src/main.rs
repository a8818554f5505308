//! Prontu - hierarchical to-do list
//!
//! CLI entry point for managing tasks and plans.

use std::fs;
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use prontu::cli::{Cli, Command, PlanCommand};
use prontu::config::Config;
use prontu::render::{render_plan, render_plan_list, render_tree};
use prontu::state::{StateError, StateEvent, StateManager};
use prontu::transfer::{export_plan, read_plan_document};
use prontustore::{ParentRef, Task, TaskNode};

fn setup_logging(log_dir: &Path, cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    fs::create_dir_all(log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("prontu.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Turn a state error into a report, adding recovery advice for engine failures
fn explain(err: StateError) -> eyre::Report {
    if err.is_storage_failure() {
        eyre::eyre!(
            "{}\nThe database could not complete the request. Try again, or run `pt reset --yes` to start over.",
            err
        )
    } else {
        eyre::Report::new(err)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(&config.log_dir, cli.log_level.as_deref(), config.log_level.as_deref())
        .context("Failed to setup logging")?;

    info!(db = %config.storage.path.display(), "Prontu loaded config");

    let state = StateManager::spawn(&config.storage.path).context("Failed to open database")?;

    let result = match cli.command {
        Some(Command::Watch { parent }) => {
            debug!(%parent, "main: matched Watch command");
            cmd_watch(&state, parent).await
        }
        Some(command) => run_command(&state, command).await,
        None => {
            debug!("main: no command specified, listing tasks");
            cmd_list(&state, ParentRef::Root).await
        }
    };

    state.shutdown().await.ok();
    result
}

/// Dispatch one command against the running state manager
async fn run_command(state: &StateManager, command: Command) -> Result<()> {
    debug!(?command, "run_command: called");
    match command {
        Command::Add { title, parent, done } => {
            let task = state.add_task(&title, parent, done).await.map_err(explain)?;
            println!("{} Added task {}: {}", "✓".green(), format!("#{}", task.id).cyan(), task.title);
        }
        Command::List { parent } => cmd_list(state, parent).await?,
        Command::Show { id } => {
            let task = state.get_task_required(id).await.map_err(explain)?;
            let children = state.task_tree(ParentRef::Task(id)).await.map_err(explain)?;
            print!("{}", render_tree(&[TaskNode { task, children }]));
        }
        Command::Done { id } => {
            let change = state.set_completed(id, true).await.map_err(explain)?;
            println!("{} Completed {}: {}", "✓".green(), format!("#{}", id).cyan(), change.after.title);
        }
        Command::Undo { id } => {
            let change = state.set_completed(id, false).await.map_err(explain)?;
            println!("{} Reopened {}: {}", "✓".green(), format!("#{}", id).cyan(), change.after.title);
        }
        Command::Rename { id, title } => {
            let change = state.rename_task(id, &title).await.map_err(explain)?;
            println!(
                "{} Renamed {}: {} -> {}",
                "✓".green(),
                format!("#{}", id).cyan(),
                change.before.title,
                change.after.title
            );
        }
        Command::Move { id, before } => match state.move_task(id, Some(before)).await.map_err(explain)? {
            Some(change) => println!(
                "{} Moved {} before {} (parent {})",
                "✓".green(),
                format!("#{}", id).cyan(),
                format!("#{}", before).cyan(),
                change.after.parent_id
            ),
            None => println!("Nothing to move"),
        },
        Command::Reorder { id, parent, order } => {
            state.reorder_task(id, parent, order).await.map_err(explain)?;
            println!(
                "{} Moved {} to parent {} at {}",
                "✓".green(),
                format!("#{}", id).cyan(),
                parent,
                order
            );
        }
        Command::Rm { id } => {
            let removed = state.delete_task(id).await.map_err(explain)?;
            println!("{} Deleted {} task(s)", "✓".green(), removed.len());
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete every task without --yes");
            }
            let count = state.clear_tasks().await.map_err(explain)?;
            println!("{} Cleared {} task(s)", "✓".green(), count);
        }
        Command::Watch { .. } => bail!("Already watching"),
        Command::Plan { command } => cmd_plan(state, command).await?,
        Command::Reset { yes } => {
            if !yes {
                bail!("Refusing to delete the database without --yes");
            }
            state.hard_reset().await.map_err(explain)?;
            println!("{} Database deleted and recreated", "✓".green());
        }
    }
    Ok(())
}

async fn cmd_list(state: &StateManager, parent: ParentRef) -> Result<()> {
    debug!(%parent, "cmd_list: called");
    let tree = state.task_tree(parent).await.map_err(explain)?;
    if tree.is_empty() {
        println!("No tasks yet. Add one with `pt add <title>` or load a plan with `pt plan load <id>`.");
    } else {
        print!("{}", render_tree(&tree));
    }
    Ok(())
}

async fn cmd_plan(state: &StateManager, command: PlanCommand) -> Result<()> {
    debug!(?command, "cmd_plan: called");
    match command {
        PlanCommand::List => {
            let plans = state.list_plans().await.map_err(explain)?;
            if plans.is_empty() {
                println!("No plans. Restore the built-in ones with `pt plan restore`.");
            } else {
                print!("{}", render_plan_list(&plans));
            }
        }
        PlanCommand::Show { id } => {
            let plan = state.get_plan_required(id).await.map_err(explain)?;
            print!("{}", render_plan(&plan));
        }
        PlanCommand::Save { title, description } => {
            let plan = state.save_plan(&title, &description).await.map_err(explain)?;
            println!(
                "{} Saved plan {}: {} ({} tasks)",
                "✓".green(),
                plan.id.to_string().cyan(),
                plan.title,
                plan.task_count()
            );
        }
        PlanCommand::Load { id } => {
            let root = state.load_plan(id).await.map_err(explain)?;
            println!("{} Loaded plan {} as task {}", "✓".green(), id, format!("#{}", root).cyan());
        }
        PlanCommand::Rm { id } => {
            state.delete_plan(id).await.map_err(explain)?;
            println!("{} Deleted plan {}", "✓".green(), id);
        }
        PlanCommand::Import { file } => {
            let doc = read_plan_document(&file).with_context(|| format!("Failed to import {}", file.display()))?;
            let plan = state.import_plan(doc).await.map_err(explain)?;
            println!(
                "{} Imported plan {}: {}",
                "✓".green(),
                plan.id.to_string().cyan(),
                plan.title
            );
        }
        PlanCommand::Export { id, dir } => {
            let plan = state.get_plan_required(id).await.map_err(explain)?;
            let path = export_plan(&plan, &dir).with_context(|| format!("Failed to export to {}", dir.display()))?;
            println!("{} Exported plan {} to {}", "✓".green(), id, path.display());
        }
        PlanCommand::Restore => {
            if state.seed_plans().await.map_err(explain)? {
                println!("{} Restored built-in plans", "✓".green());
            } else {
                println!("No built-in plans to restore");
            }
        }
    }
    Ok(())
}

/// Show the tree and keep it current while reading commands from stdin
async fn cmd_watch(state: &StateManager, parent: ParentRef) -> Result<()> {
    debug!(%parent, "cmd_watch: called");
    let mut children = state.watch_tasks(parent).await.map_err(explain)?;
    let mut events = state.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    cmd_list(state, parent).await?;
    println!(
        "{}",
        "Watching for changes. Enter commands such as `add \"Ginga\" -p 1`; Ctrl-D to stop.".dimmed()
    );

    loop {
        // Redraw before reading the next line so output follows each command
        tokio::select! {
            biased;

            changed = children.changed() => {
                if changed.is_err() {
                    break;
                }
                redraw(state, parent, &mut children, &mut events).await?;
            }
            event = events.recv() => match event {
                Ok(_) | Err(RecvError::Lagged(_)) => redraw(state, parent, &mut children, &mut events).await?,
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("cmd_watch: stdin closed");
                    break;
                };
                let words = split_words(&line);
                if words.is_empty() {
                    continue;
                }
                match Cli::try_parse_from(std::iter::once("pt".to_string()).chain(words)) {
                    Ok(Cli { command: Some(command), .. }) => {
                        if let Err(e) = run_command(state, command).await {
                            eprintln!("{} {}", "✗".red(), e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        e.print().ok();
                    }
                }
            }
        }
    }
    Ok(())
}

async fn redraw(
    state: &StateManager,
    parent: ParentRef,
    children: &mut watch::Receiver<Vec<Task>>,
    events: &mut broadcast::Receiver<StateEvent>,
) -> Result<()> {
    // One redraw covers every notification already queued
    children.borrow_and_update();
    while events.try_recv().is_ok() {}
    println!("{}", "─".repeat(40).dimmed());
    cmd_list(state, parent).await
}

/// Split a command line into words, honouring single and double quotes
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
