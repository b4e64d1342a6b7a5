use std::env;
use std::process;
use std::sync::Arc;

use clap::Parser;
use scrumsync::cli::{
    Cli, Commands, ConfigCommands, EpicCommands, IssueCommands, SprintCommands, TaskCommands,
};
use scrumsync::commands::{self, Output};
use scrumsync::config::{ConfigOverrides, ConfigPaths, ResolvedConfig, resolve_config};
use scrumsync::engine::SyncEngine;
use scrumsync::models::{NewIssue, NewTask};
use scrumsync::remote::{HttpTransport, RemoteStore};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!(
                "{}",
                serde_json::json!({ "error": e.to_string(), "category": e.category() })
            );
        }
        process::exit(1);
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`;
/// `SCRUMSYNC_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "scrumsync=debug,warn" } else { "warn" })
    });

    let format = env::var("SCRUMSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli) -> Result<(), scrumsync::Error> {
    let cwd = env::current_dir()?;
    let mut overrides = ConfigOverrides::new();
    if let Some(url) = cli.base_url {
        overrides = overrides.with_base_url(url);
    }
    if let Some(user) = cli.user {
        overrides = overrides.with_user(user);
    }
    let config = resolve_config(&ConfigPaths::discover(&cwd), &overrides)?;
    let human = cli.human_readable;

    // Configuration commands never touch the network.
    if let Commands::Config {
        command: ConfigCommands::Show,
    } = cli.command
    {
        output(&commands::config_show(&config), human);
        return Ok(());
    }

    let engine = build_engine(&config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_command(cli.command, &engine, human))
}

fn build_engine(config: &ResolvedConfig) -> Result<SyncEngine, scrumsync::Error> {
    let transport = HttpTransport::new(config.base_url(), config.timeout())?;
    let remote = RemoteStore::new(Arc::new(transport)).with_per_page(config.per_page());
    tracing::debug!(base_url = config.base_url(), "using remote store");
    Ok(SyncEngine::new(remote, config.sync_settings()))
}

async fn run_command(
    command: Commands,
    engine: &SyncEngine,
    human: bool,
) -> Result<(), scrumsync::Error> {
    match command {
        Commands::Load => {
            let result = commands::load(engine).await?;
            output(&result, human);
        }
        Commands::Seed => {
            let result = commands::seed(engine).await?;
            output(&result, human);
        }
        Commands::Task { command } => match command {
            TaskCommands::Create {
                title,
                task_type,
                priority,
                sprint,
                points,
                assignee,
                tags,
            } => {
                let mut draft = NewTask::new(title);
                draft.task_type = task_type.into();
                draft.priority = priority.into();
                draft.sprint_id = sprint;
                draft.points = points;
                draft.assignee_id = assignee;
                draft.tags = tags;
                let result = commands::task_create(engine, draft).await?;
                output(&result, human);
            }
            TaskCommands::Move { id, status } => {
                let result = commands::task_move(engine, &id, status.into()).await?;
                output(&result, human);
            }
            TaskCommands::Sprint { id, sprint_id, .. } => {
                let result = commands::task_sprint(engine, &id, sprint_id.as_deref()).await?;
                output(&result, human);
            }
        },
        Commands::Sprint { command } => match command {
            SprintCommands::Create => {
                let result = commands::sprint_create(engine).await?;
                output(&result, human);
            }
            SprintCommands::Complete { id } => {
                let result = commands::sprint_complete(engine, &id).await?;
                output(&result, human);
            }
        },
        Commands::Issue { command } => match command {
            IssueCommands::Create {
                title,
                issue_type,
                priority,
                desc,
            } => {
                let mut draft = NewIssue::new(title);
                draft.issue_type = issue_type.into();
                draft.priority = priority.into();
                draft.desc = desc.unwrap_or_default();
                let result = commands::issue_create(engine, draft).await?;
                output(&result, human);
            }
            IssueCommands::Reopen { id } => {
                let result = commands::issue_reopen(engine, &id).await?;
                output(&result, human);
            }
        },
        Commands::Epic { command } => match command {
            EpicCommands::Create { name } => {
                let result = commands::epic_create(engine, &name).await?;
                output(&result, human);
            }
            EpicCommands::Recalc { id } => {
                let result = commands::epic_recalc(engine, &id).await?;
                output(&result, human);
            }
        },
        Commands::Config {
            command: ConfigCommands::Show,
        } => {}
    }
    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
