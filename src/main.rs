//! Lesson hub: console entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build LLM provider and specialist registry
//!   6. Open artifact store and progress ledger
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Run the console channel until exit or shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use lesson_hub::config;
use lesson_hub::error::AppError;
use lesson_hub::llm::providers;
use lesson_hub::logger;
use lesson_hub::orchestrator::Orchestrator;
use lesson_hub::subsystems::agents::{SpecialistKind, SpecialistRegistry};
use lesson_hub::subsystems::comms::{self, pty::PtyChannel};
use lesson_hub::subsystems::storage::{ArtifactStore, ProgressLedger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present, ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        user_id = %config.user_id,
        log_level = %effective_log_level,
        "config loaded"
    );

    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;
    info!(provider = provider.name(), "llm provider ready");

    let kinds: Vec<SpecialistKind> = SpecialistKind::ALL
        .into_iter()
        .filter(|k| *k != SpecialistKind::Notify || config.specialists.notifications)
        .filter(|k| *k != SpecialistKind::Track || config.specialists.progress_commentary)
        .collect();
    let registry = SpecialistRegistry::from_provider(provider, &kinds)
        .with_timeout(config.specialists.timeout_seconds.map(Duration::from_secs));
    info!(specialists = ?registry.kinds(), "specialist registry ready");

    let store = ArtifactStore::open(&config.storage.lessons_dir)?;
    let ledger = ProgressLedger::open(&config.storage.progress_dir)?;

    let orchestrator = Arc::new(
        Orchestrator::new(store, ledger, registry, config.user_id.clone())
            .with_progress_commentary(config.specialists.progress_commentary),
    );

    let shutdown = CancellationToken::new();

    // Ctrl-C handler, cancels the token so the console loop stops.
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let channel = Box::new(PtyChannel::new("pty0", &config.name));
    comms::run(channel, orchestrator, shutdown.clone()).await?;

    shutdown.cancel();
    info!("shutdown complete");
    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: lesson-hub [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
