//! TabPilot - single-tab browser control
//!
//! Host binary: loads config, connects to Chrome and feeds command records
//! into the execution loop, printing one JSON result per record.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tabpilot_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use tabpilot_engine::platform::{FileStateStore, MemoryStateStore, StateStore};
use tabpilot_engine::{
    BrowserPlatform, CdpPlatform, CommandExecutor, CommandRecord, ExecutionResult, OllamaVision,
    Session, VisionBackend,
};

use cli::{Cli, Commands};

/// Queued records waiting for the orchestrator.
const COMMAND_QUEUE_DEPTH: usize = 16;

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging.get_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("tabpilot")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    // stdout carries results, so the console layer writes to stderr.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(&cli.config)?;
    let warnings = ConfigValidator::validate(&config).into_result()?;
    init_tracing(&config.logging)?;
    for warning in warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    Ok(config)
}

fn vision_backend(config: &Config) -> Option<Arc<dyn VisionBackend>> {
    if !config.vision.enabled {
        info!("Vision fallback disabled");
        return None;
    }
    match OllamaVision::new(&config.vision) {
        Ok(vision) => Some(Arc::new(vision)),
        Err(e) => {
            warn!("Vision backend unavailable: {}", e);
            None
        }
    }
}

fn state_store(config: &Config) -> Arc<dyn StateStore> {
    if config.session.persist {
        Arc::new(FileStateStore::new(config.session.get_state_file()))
    } else {
        Arc::new(MemoryStateStore::new())
    }
}

async fn execute_line(executor: &CommandExecutor, line: &str) -> ExecutionResult {
    match serde_json::from_str::<CommandRecord>(line) {
        Ok(record) => executor.execute_record(&record).await,
        Err(e) => {
            warn!("Malformed command record: {}", e);
            ExecutionResult::failure(format!("Malformed command record: {}", e))
        }
    }
}

async fn print_result(result: &ExecutionResult) -> Result<(), Box<dyn std::error::Error>> {
    let mut line = serde_json::to_string(result)?;
    line.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Relay stdin lines to a single orchestrator until EOF or Ctrl-C.
async fn run(executor: &CommandExecutor) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel::<String>(COMMAND_QUEUE_DEPTH);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    info!("Ready for commands on stdin");
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else {
                    info!("Input closed");
                    break;
                };
                let result = execute_line(executor, &line).await;
                print_result(&result).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    reader.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let platform = Arc::new(CdpPlatform::start(&config.browser).await?);
    let session = Session::new(
        platform.clone() as Arc<dyn BrowserPlatform>,
        state_store(&config),
        vision_backend(&config),
        config.engine.clone(),
        &config.vision,
    );
    if let Some(tab) = session.tabs.restore().await {
        info!("Resumed control of tab {}", tab.tab_id);
    }
    let executor = CommandExecutor::new(session);

    let outcome = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&executor).await,
        Commands::Exec { record } => {
            let result = execute_line(&executor, &record).await;
            print_result(&result).await
        }
    };

    executor.teardown().await;
    platform.shutdown().await;
    outcome
}
