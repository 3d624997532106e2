#![forbid(unsafe_code)]

//! `mimic-hostd` — hosted bot deployment orchestrator binary.
//!
//! Discovers provisioned bot identities, launches one chat session per
//! identity, and keeps hosted deployment lifecycle records current
//! until shutdown.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mimic_hostd::chat::gateway::GatewayConnector;
use mimic_hostd::config::GlobalConfig;
use mimic_hostd::markov::RemoteGenerator;
use mimic_hostd::orchestrator::launcher::{self, LauncherDeps, SessionHandle};
use mimic_hostd::orchestrator::watchdog::Watchdog;
use mimic_hostd::persistence::db;
use mimic_hostd::persistence::deployment_repo::DeploymentRepo;
use mimic_hostd::secrets::SecretSource;
use mimic_hostd::store::local::LocalStore;
use mimic_hostd::store::remote::RemoteStore;
use mimic_hostd::store::ConfigStore;
use mimic_hostd::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mimic-hostd", about = "Hosted bot deployment orchestrator", version, long_about = None)]
struct Cli {
    /// Run in local mode: file-backed secrets and a local settings store.
    #[arg(long)]
    local: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("mimic-hostd bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load()?;
    if !args.local {
        config.load_store_credentials().await?;
    }
    info!(local = args.local, max_bots = config.max_bots, "configuration loaded");

    std::fs::create_dir_all(&config.tmp_dir)
        .map_err(|err| AppError::Io(format!("cannot create tmp dir: {err}")))?;

    // ── Initialize database ─────────────────────────────
    let pool = db::connect(&config.db_path).await?;
    let repo = DeploymentRepo::new(pool);
    info!("database connected");

    // ── Assemble mode-dependent collaborators ───────────
    let secrets = if args.local {
        SecretSource::from_file(&config.secrets_file)?
    } else {
        SecretSource::Env
    };
    let store: Arc<dyn ConfigStore> = if args.local {
        Arc::new(LocalStore::new(&config.tmp_dir)?)
    } else {
        Arc::new(RemoteStore::new(&config.store, &config.tmp_dir)?)
    };

    let deps = LauncherDeps {
        store,
        connector: Arc::new(GatewayConnector::new(config.gateway_url.clone())?),
        generator: Arc::new(RemoteGenerator::new(config.generator_url.clone())?),
        repo: repo.clone(),
    };

    // ── Start lifecycle watchdog ────────────────────────
    let ct = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(32);
    let watchdog = Watchdog::new(
        repo.clone(),
        std::time::Duration::from_secs(config.lifecycle.watchdog_poll_seconds),
        config.lifecycle.staleness_window(),
        event_tx,
        ct.child_token(),
    )
    .spawn();
    info!("lifecycle watchdog started");

    // ── Launch bot sessions ─────────────────────────────
    let handles = launcher::launch_sessions(&config, &secrets, &deps, &ct).await;
    if handles.is_empty() {
        info!("no provisioned identities found; idling until shutdown");
    }
    let guard = launcher::spawn_expiry_guard(event_rx, &handles, ct.clone());

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // ── Graceful shutdown: terminate live records ───────
    if let Err(err) = graceful_shutdown(&repo).await {
        error!(%err, "error during graceful shutdown persistence");
    }

    // ── Wait for background tasks ───────────────────────
    for SessionHandle { index, join, .. } in handles {
        if let Err(err) = join.await {
            error!(index, %err, "session task panicked");
        }
    }
    let _ = guard.await;
    watchdog.await_completion().await;
    info!("mimic-hostd shut down");

    Ok(())
}

/// Mark every live hosted deployment record terminated.
///
/// Runs after session cancellation so no session heartbeats a record
/// back to life mid-termination.
///
/// # Errors
///
/// Returns `AppError::Db` if listing the live records fails; individual
/// termination failures are logged and skipped.
async fn graceful_shutdown(repo: &DeploymentRepo) -> Result<()> {
    let _span = tracing::info_span!("graceful_shutdown").entered();

    let live = repo.list_live().await?;
    for record in &live {
        if let Err(err) = repo.set_terminated(&record.id).await {
            error!(id = %record.id, %err, "failed to terminate record");
        }
    }

    info!(records = live.len(), "graceful shutdown persistence complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
