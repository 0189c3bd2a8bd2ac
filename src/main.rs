//! Shepherd - Task Lifecycle Orchestrator
//!
//! Polls the task store for AI-actionable tasks and drives them through
//! their planning and implementation stages with an external code agent.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use shepherd::{
    CliCodeAgent, HttpTaskStore, ProjectConfig, Scheduler, SchedulerHandle, Settings,
    ShepherdError, TaskProcessor,
};

#[derive(Parser)]
#[command(name = "shepherd")]
#[command(version = "0.1.0")]
#[command(about = "Task lifecycle orchestrator - AI planning and implementation on a poll loop", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling loop until interrupted
    Run {
        #[command(flatten)]
        settings: Settings,

        /// Execute a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Validate configuration without polling
    Check {
        #[command(flatten)]
        settings: Settings,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "shepherd=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let result = match cli.command {
        Commands::Run { settings, once } => run(settings, once).await,
        Commands::Check { settings } => check(settings),
    };

    if let Err(e) = result {
        error!(error = %e, "shepherd exited with error");
        eprintln!("{} {e}", "Error:".red());
        std::process::exit(e.exit_code());
    }
}

/// Run the scheduler until a termination signal arrives.
async fn run(settings: Settings, once: bool) -> shepherd::Result<()> {
    settings.validate()?;

    println!("{}", "Shepherd - Task Lifecycle Orchestrator".bold());
    println!("Polling the task store for AI-actionable tasks.");
    println!("Press Ctrl+C to stop.\n");

    if which::which(&settings.agent_command).is_err() {
        warn!(
            command = %settings.agent_command,
            "agent command not found on PATH, invocations will fail until it is installed"
        );
    }

    let projects = ProjectConfig::load(&settings.projects_file)?;

    let store = Arc::new(HttpTaskStore::new(
        &settings.store_url,
        &settings.store_token,
        &settings.database_id,
        settings.status_field,
    ));
    let agent = Arc::new(CliCodeAgent::new(
        &settings.agent_command,
        settings.agent_timeout(),
        &settings.allowed_tools,
    ));
    let processor = TaskProcessor::new(
        store.clone(),
        agent,
        settings.max_retries,
        settings.backoff_base,
    );
    let mut scheduler = Scheduler::new(
        store,
        processor,
        projects,
        &settings.database_id,
        settings.poll_interval(),
    );

    if once {
        return scheduler
            .poll_once()
            .await
            .map_err(ShepherdError::Other);
    }

    spawn_signal_handler(scheduler.handle());
    scheduler.run().await;
    Ok(())
}

/// Validate configuration and report what a run would use.
fn check(settings: Settings) -> shepherd::Result<()> {
    settings.validate()?;

    match which::which(&settings.agent_command) {
        Ok(path) => println!("{} agent command: {}", "ok".green(), path.display()),
        Err(_) => println!(
            "{} agent command '{}' not found on PATH",
            "warn".yellow(),
            settings.agent_command
        ),
    }

    let projects = ProjectConfig::load(&settings.projects_file)?;
    println!(
        "{} project mappings: {} from {}",
        "ok".green(),
        projects.mappings().len(),
        settings.projects_file.display()
    );
    for mapping in projects.mappings() {
        println!(
            "   {} -> {}",
            mapping.database_id,
            mapping.working_directory.display()
        );
    }

    println!(
        "{} poll interval {}s, {} attempt(s), backoff base {}",
        "ok".green(),
        settings.poll_interval,
        settings.max_retries,
        settings.backoff_base
    );
    Ok(())
}

/// Stop the scheduler on SIGINT or SIGTERM.
///
/// The in-flight task is allowed to finish; only the remainder of the
/// batch and future cycles are abandoned.
fn spawn_signal_handler(handle: SchedulerHandle) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    if ctrl_c.await.is_ok() {
                        handle.stop();
                    }
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
            handle.stop();
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_ok() {
                handle.stop();
            }
        }
    });
}
