//! PrimeScan - pausable, cancellable prime number range scanner
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary crate provides the console front-end for PrimeScan. It initializes:
//! - Configuration loading ([`ConfigManager`], `PRIMESCAN_*` environment overrides)
//! - Logging infrastructure (daily file rotation + optional stderr output)
//! - Tokio runtime (scan segments run on its blocking pool)
//! - Scan service ([`ScanService`]) with a channel-backed event sink
//! - Console controller ([`ConsoleController`])
//!
//! # Execution Flow
//!
//! 1. Parse command line arguments
//! 2. Load `PrimeScan Data/PrimeScan Config.yaml` (written with defaults on first run)
//! 3. Initialize logging -> logs/primescan.<date>
//! 4. Create tokio runtime with the configured worker threads
//! 5. Run one scan (`--start`/`--end`) or the interactive command loop
//! 6. Cancel any active scan, log metrics, shutdown runtime with 5s timeout

use anyhow::Result;
use clap::Parser;
use primescan::ui::ConsoleController;
use primescan::{APP_NAME, ChannelSink, ConfigManager, JobState, ScanService, VERSION};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "primescan", version)]
#[command(about = "Scan a range of integers for primes, with pause, resume and cancel")]
struct Cli {
    /// Directory holding `PrimeScan Config.yaml`
    #[arg(long, default_value = "PrimeScan Data")]
    config_dir: String,

    /// Log at debug level regardless of the config file
    #[arg(short, long)]
    debug: bool,

    /// Scan from START and exit when done (requires --end)
    #[arg(long, requires = "end", allow_hyphen_values = true)]
    start: Option<String>,

    /// Last integer of the one-shot scan (requires --start)
    #[arg(long, requires = "start", allow_hyphen_values = true)]
    end: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    config_manager.ensure_user_config()?;
    let settings = config_manager.load_user_config()?.scan_settings;

    let _log_guard = primescan::logging::setup_logging_with_console(
        &settings.log_dir,
        "primescan",
        cli.debug || settings.debug_mode,
        settings.console_logging,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let worker_threads = settings.worker_threads.max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(worker_threads)
        .thread_name("primescan-worker")
        .build()?;

    tracing::info!(
        "Tokio runtime initialized with {} worker threads",
        worker_threads
    );

    let (sink, events) = ChannelSink::channel();
    let service = Arc::new(ScanService::new(Arc::new(sink), runtime.handle().clone()));
    let controller = ConsoleController::new(Arc::clone(&service), settings);

    let result = match (cli.start.as_deref(), cli.end.as_deref()) {
        (Some(start), Some(end)) => runtime
            .block_on(controller.run_once(start, end, events))
            .map(|terminal| {
                if terminal == JobState::Cancelled {
                    tracing::warn!("Scan cancelled before reaching the end of its range");
                }
            }),
        _ => runtime.block_on(controller.run_interactive(events)),
    };

    // An error in either mode can leave a scan running
    if service.is_active() {
        tracing::warn!("Exiting with an active scan - cancelling...");
        if let Err(e) = service.cancel() {
            tracing::debug!("Cancel on exit: {}", e);
        }
    }

    service.metrics().log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    result.inspect_err(|e| tracing::error!("{:#}", e))
}
