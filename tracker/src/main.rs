//! Modified Today - keeps a list of today's modified notes in the daily note.
//!
//! # Commands
//!
//! - `modified-today run`: Watch the vault and keep the daily note up to date
//! - `modified-today render`: Render the daily note once and exit
//! - `modified-today status`: Print the tracked files as JSON
//! - `modified-today track <PATH>`: Evaluate a single note as if it changed
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use modified_today::config::Config;
use modified_today::orchestrator::{Orchestrator, RenderOutcome};
use modified_today::persistence::SettingsStore;
use modified_today::vault::FsVault;
use modified_today::watcher::{VaultEvent, VaultWatcher};

/// How long shutdown waits for the watcher to hand over pending events.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Modified Today - a running list of notes modified today.
///
/// Watches a vault of markdown notes and rewrites the section under a
/// configured heading of today's daily note with one entry per modified note.
#[derive(Parser, Debug)]
#[command(name = "modified-today")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    MODIFIED_TODAY_VAULT         Vault directory (required unless --vault is given)
    MODIFIED_TODAY_DATA_DIR      Settings directory (default: <vault>/.modified-today)
    MODIFIED_TODAY_DAILY_FOLDER  Folder of daily notes (default: vault root)
    MODIFIED_TODAY_DAILY_FORMAT  Daily note name format (default: %Y-%m-%d)
    MODIFIED_TODAY_DEBOUNCE_MS   Change debounce delay (default: 250)
    MODIFIED_TODAY_QUEUE_SIZE    Command queue capacity (default: 256)

EXAMPLES:
    # Watch a vault
    modified-today run --vault ~/notes

    # Show what is tracked today
    modified-today status --vault ~/notes
")]
struct Cli {
    /// Vault directory, overriding MODIFIED_TODAY_VAULT.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the vault and keep today's daily note up to date.
    Run,

    /// Render today's daily note once and exit.
    Render,

    /// Print today's tracked files as JSON.
    Status,

    /// Evaluate a note as if it had just changed.
    Track {
        /// Note path, relative to the vault or absolute.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_json);

    let config = match cli.vault {
        Some(vault) => Config::from_env_with_vault(vault),
        None => Config::from_env(),
    }
    .context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Command::Run => run_tracker(config).await,
            Command::Render => run_render(config).await,
            Command::Status => run_status(&config),
            Command::Track { path } => run_track(config, &path).await,
        }
    })
}

/// Builds the vault described by the configuration.
fn open_vault(config: &Config) -> FsVault {
    FsVault::new(&config.vault_dir).with_daily_notes(&config.daily_folder, &config.daily_format)
}

fn open_orchestrator(config: &Config, vault: FsVault) -> Result<Orchestrator> {
    let store = SettingsStore::new(&config.data_dir);
    Orchestrator::load(store, Arc::new(vault)).context("Failed to load settings")
}

/// Runs the watcher until a shutdown signal arrives.
async fn run_tracker(config: Config) -> Result<()> {
    info!(
        vault = %config.vault_dir.display(),
        data_dir = %config.data_dir.display(),
        daily_folder = %config.daily_folder,
        "Starting Modified Today"
    );

    let vault = open_vault(&config);
    let orchestrator = open_orchestrator(&config, vault.clone())?;
    let (handle, worker) = orchestrator.spawn(config.queue_size);

    // Bring the note up to date with whatever was tracked before.
    handle.render().await.context("Orchestrator stopped during startup")?;

    let (event_tx, mut event_rx) = mpsc::channel::<VaultEvent>(config.queue_size);
    let watcher = VaultWatcher::new(
        vault,
        config.data_dir.clone(),
        Duration::from_millis(config.debounce_ms),
        event_tx,
    )
    .context(format!(
        "Failed to initialize file watcher for {}",
        config.vault_dir.display()
    ))?;

    info!("Tracker running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            Some(event) = event_rx.recv() => {
                if let Err(e) = handle.dispatch(event).await {
                    error!(error = %e, "Failed to queue vault event");
                    break;
                }
            }
        }
    }

    info!("Shutting down...");

    // Stop producing events, hand over what the watcher still held, then let
    // the worker drain its queue.
    drop(watcher);
    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        handle.forward_remaining(&mut event_rx),
    )
    .await
    {
        Ok(Ok(forwarded)) => info!(forwarded, "Forwarded remaining vault events"),
        Ok(Err(e)) => error!(error = %e, "Failed to forward remaining vault events"),
        Err(_) => warn!(
            timeout_secs = SHUTDOWN_TIMEOUT_SECS,
            "Timed out forwarding remaining vault events"
        ),
    }
    drop(handle);
    let settings = worker.await.context("Orchestrator task failed")?;

    info!(
        tracked = settings.tracked_files.len(),
        "Tracker stopped"
    );
    Ok(())
}

/// Renders the daily note once.
async fn run_render(config: Config) -> Result<()> {
    let vault = open_vault(&config);
    let mut orchestrator = open_orchestrator(&config, vault)?;

    match orchestrator.update_tracked_files().await? {
        RenderOutcome::Written {
            path,
            entries,
            skipped,
        } => println!("Updated {path} with {entries} entries ({skipped} skipped)"),
        RenderOutcome::Unchanged { path } => println!("{path} is already up to date"),
        RenderOutcome::Skipped { reason } => {
            warn!(reason = %reason, "Render skipped");
            println!("Skipped: {reason}");
        }
    }
    Ok(())
}

/// Prints the stored tracked files.
fn run_status(config: &Config) -> Result<()> {
    let settings = SettingsStore::new(&config.data_dir)
        .load()
        .context("Failed to load settings")?;

    let status = serde_json::json!({
        "lastTrackedDate": settings.last_tracked_date,
        "heading": settings.heading,
        "trackedFiles": settings.tracked_files,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Evaluates a single note.
async fn run_track(config: Config, path: &Path) -> Result<()> {
    let vault = open_vault(&config);
    let rel = if path.is_absolute() {
        vault
            .relative(path)
            .context(format!("{} is not inside the vault", path.display()))?
    } else {
        path.to_string_lossy().replace('\\', "/")
    };

    let mut orchestrator = open_orchestrator(&config, vault)?;
    let membership = orchestrator.on_cache_change(&rel).await?;
    println!("{rel}: {membership:?}");
    Ok(())
}

/// Initializes the logging subsystem.
///
/// Logs go to stderr so `status` output on stdout stays machine-readable.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
