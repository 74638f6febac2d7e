//! SimpleCapture - Capture service client demo
//!
//! CLI entry point for the three demo phases: start the service, open a
//! session, and dispatch scanner events.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use simplecapture::bootstrap::{StartSignal, start_capture_service};
use simplecapture::capture::SimulatedCapture;
use simplecapture::cli::{Cli, Command, OutputFormat, get_log_path};
use simplecapture::client::{AcquisitionReport, CaptureClient};
use simplecapture::config::Config;
use simplecapture::dispatch::DispatchStats;
use simplecapture::notify::{Notifier, run_notifier};

/// How long the notifier may keep draining after the client is gone
const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Time for the sink to pick up the last scripted events
const SCRIPT_SETTLE: Duration = Duration::from_millis(100);

/// Longest wait for event handlers before the session is closed
const HANDLER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
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

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first so its log level can apply
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    // Config::load runs before the subscriber exists, so report its choice here
    match &config.source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    config.validate().context("Invalid configuration")?;

    info!(
        "SimpleCapture loaded config: service={}, max-retries={}, retry-interval-ms={}",
        config.service.package, config.acquisition.max_retries, config.acquisition.retry_interval_ms
    );

    match cli.command {
        Some(Command::StartService) => cmd_start_service(&config, cli.format),
        Some(Command::Open) => cmd_open(&config, cli.format).await,
        Some(Command::Run { duration_secs }) => cmd_run(&config, cli.format, duration_secs).await,
        Some(Command::Config) => cmd_config(&config),
        None => cmd_run(&config, cli.format, None).await,
    }
}

/// Phase 1: send the start signal
fn cmd_start_service(config: &Config, format: OutputFormat) -> Result<()> {
    debug!("cmd_start_service: called");
    let simulator = SimulatedCapture::new(&config.simulator);
    let signal = StartSignal::from_config(&config.service);
    start_capture_service(&simulator, &signal);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&signal)?),
        OutputFormat::Text => println!("Start signal sent: {}", signal),
    }
    Ok(())
}

/// Phase 2: open a session, report, close
async fn cmd_open(config: &Config, format: OutputFormat) -> Result<()> {
    debug!("cmd_open: called");
    let simulator = Arc::new(SimulatedCapture::new(&config.simulator));
    let (notifier, rx) = Notifier::channel(config.dispatch.notification_buffer);
    let notifier_task = tokio::spawn(run_notifier(rx, format.clone(), std::io::stdout()));

    let client = CaptureClient::from_config(config, simulator.clone(), simulator, notifier);
    let report = client.start().await?;
    client.stop().await;
    drop(client);

    finish_notifier(notifier_task).await;
    print_summary(&report, None, &format)?;
    Ok(())
}

/// Phase 3: full flow against the simulated service
async fn cmd_run(config: &Config, format: OutputFormat, duration_secs: Option<u64>) -> Result<()> {
    debug!(?duration_secs, "cmd_run: called");
    let simulator = Arc::new(SimulatedCapture::new(&config.simulator));
    let (notifier, rx) = Notifier::channel(config.dispatch.notification_buffer);
    let notifier_task = tokio::spawn(run_notifier(rx, format.clone(), std::io::stdout()));

    let client = CaptureClient::from_config(config, simulator.clone(), simulator.clone(), notifier);
    let report = client.start().await?;

    if report.is_success() {
        let run = async {
            match duration_secs {
                Some(secs) => {
                    let script = async {
                        simulator.play(&config.simulator.script).await;
                        std::future::pending::<()>().await
                    };
                    let _ = tokio::time::timeout(Duration::from_secs(secs), script).await;
                }
                None => {
                    simulator.play(&config.simulator.script).await;
                    tokio::time::sleep(SCRIPT_SETTLE.max(config.simulator.round_trip())).await;
                }
            }
        };

        tokio::select! {
            _ = run => debug!("cmd_run: run finished"),
            _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        }

        // Handlers still in flight would see the session closed under them
        if tokio::time::timeout(HANDLER_DRAIN_TIMEOUT, client.wait_idle()).await.is_err() {
            warn!("Event handlers still running at shutdown");
        }

        if let Some(device) = client.primary_device().await {
            debug!(%device, "cmd_run: device still connected at shutdown");
        }
    }

    let stats = client.stop().await;
    drop(client);

    finish_notifier(notifier_task).await;
    print_summary(&report, stats.as_ref(), &format)?;
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}

async fn finish_notifier(task: tokio::task::JoinHandle<usize>) {
    match tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, task).await {
        Ok(Ok(shown)) => debug!(shown, "finish_notifier: notifier drained"),
        Ok(Err(e)) => debug!(error = %e, "finish_notifier: notifier task failed"),
        Err(_) => debug!("finish_notifier: notifier still busy, leaving it"),
    }
}

fn print_summary(report: &AcquisitionReport, stats: Option<&DispatchStats>, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "acquisition": report,
                "events": stats.map(|s| serde_json::json!({
                    "arrivals": s.arrivals,
                    "removals": s.removals,
                    "decoded": s.decoded,
                    "lagged": s.lagged,
                })),
            });
            println!("{}", serde_json::to_string(&json)?);
        }
        OutputFormat::Text => {
            println!();
            println!("Capture Session");
            println!("---------------");
            println!("Result: {}", report.code);
            println!("Retries: {}", report.retries);
            println!("Attempts: {}", report.attempts);
            if let Some(stats) = stats {
                println!(
                    "Events: {} arrivals, {} removals, {} decoded",
                    stats.arrivals, stats.removals, stats.decoded
                );
            }
        }
    }
    Ok(())
}
