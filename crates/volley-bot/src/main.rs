//! volley - scheduled multi-account order burst runner.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use volley_bot::{AppConfig, AppError, Application, Overrides};
use volley_telemetry::LogConfig;

/// Fire one order burst per account around a scheduled instant.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VOLLEY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run only the account at this index in the config
    #[arg(long)]
    account_index: Option<usize>,

    /// Target hour in the configured timezone
    #[arg(long)]
    hour: Option<u32>,

    /// Target minute
    #[arg(long)]
    minute: Option<u32>,

    /// Days after today (0 rolls to tomorrow if the time has passed)
    #[arg(long)]
    day_offset: Option<u32>,

    /// Start firing this many ms before the target
    #[arg(long)]
    start_offset_ms: Option<u64>,

    /// Keep firing this many ms after the target
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Also write logs to a daily file in this directory (or VOLLEY_LOG_DIR)
    #[arg(long)]
    log_dir: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            account_index: self.account_index,
            hour: self.hour,
            minute: self.minute,
            day_offset: self.day_offset,
            start_offset_ms: self.start_offset_ms,
            duration_ms: self.duration_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = args
        .log_dir
        .clone()
        .or_else(|| std::env::var("VOLLEY_LOG_DIR").ok())
        .map(LogConfig::with_dir)
        .unwrap_or_default();
    volley_telemetry::init_logging(&log_config)?;

    info!("Starting volley v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > VOLLEY_CONFIG env var > default
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("VOLLEY_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = AppConfig::from_file(&config_path)?;
    config.apply_overrides(&args.overrides())?;
    info!(
        accounts = config.accounts.len(),
        order = %config.order,
        hour = config.schedule.hour,
        minute = config.schedule.minute,
        day_offset = config.schedule.day_offset,
        "Configuration loaded"
    );

    let app = Application::new(config)?;

    match app.run().await {
        Ok(batch) => {
            info!(
                total_requests = batch.total_requests,
                system_qps = batch.system_qps,
                failed_accounts = batch.failed(),
                "Done"
            );
            Ok(())
        }
        Err(AppError::Shutdown) => {
            warn!("Stopped before completion");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
