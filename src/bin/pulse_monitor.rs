use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use pulse_monitor::config::AppConfig;
use pulse_monitor::engine::{MonitorHandle, UdpSampleSource};
use pulse_monitor::managers::StopResult;
use pulse_monitor::replay::{self, ReplayReport};
use pulse_monitor::storage::{JsonlSessionStore, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "pulse_monitor", about = "Heart-pulse monitor for UDP sensor streams")]
struct Cli {
    /// Config file (defaults to $PULSE_MONITOR_CONFIG, then config/pulse_monitor.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level (falls back to $RUST_LOG, then info)
    #[arg(long, global = true)]
    log_level: Option<tracing::Level>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Receive sensor datagrams and serve the control surface until Ctrl-C
    Serve {
        /// Profile JSON; a session starts as soon as the socket is bound
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Skip the HTTP control surface
        #[arg(long)]
        no_http: bool,
    },
    /// Replay a recorded sample file as one session and print the summary
    Replay {
        #[arg(long)]
        recording: PathBuf,
        #[arg(long)]
        profile: PathBuf,
        /// Session start, RFC 3339 (defaults to today 00:00 UTC)
        #[arg(long)]
        start: Option<String>,
        /// Exit with status 2 unless exactly this many pulses are detected
        #[arg(long)]
        expect_pulses: Option<u64>,
    },
    /// List stored sessions
    Sessions {
        /// Day to list, YYYY-MM-DD; lists the days with sessions when omitted
        #[arg(long)]
        day: Option<NaiveDate>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = cli
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok()?.parse().ok())
        .unwrap_or(tracing::Level::INFO);
    pulse_monitor::init_logging(level);
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Serve { profile, no_http } => run_serve(config, profile, no_http),
        Commands::Replay {
            recording,
            profile,
            start,
            expect_pulses,
        } => run_replay(config, &recording, &profile, start.as_deref(), expect_pulses),
        Commands::Sessions { day } => run_sessions(&config, day),
    }
}

fn run_serve(config: AppConfig, profile: Option<PathBuf>, no_http: bool) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(serve(config, profile, no_http))
}

async fn serve(config: AppConfig, profile: Option<PathBuf>, no_http: bool) -> Result<ExitCode> {
    let handle = Arc::new(
        MonitorHandle::new(config.clone())
            .with_context(|| format!("opening session store {}", config.storage.directory))?,
    );
    let source = UdpSampleSource::bind(&config.transport)
        .await
        .context("binding sensor socket")?;

    if let Some(path) = profile {
        let profile = replay::load_profile(&path)?;
        let started = handle
            .start_session(Some(profile))
            .with_context(|| format!("starting session for profile {}", path.display()))?;
        tracing::info!("Measuring {}", started.display_name());
    }

    let http_task = if no_http {
        None
    } else {
        Some(spawn_http(Arc::clone(&handle), &config)?)
    };

    {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                report_shutdown(handle.shutdown());
            }
        });
    }

    let result = handle.run(Box::new(source)).await;
    // The source may end on its own; finalize and release the HTTP server too.
    report_shutdown(handle.shutdown());

    if let Some(task) = http_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!("HTTP server failed: {err:?}"),
            Err(err) => tracing::error!("HTTP server task aborted: {err}"),
        }
    }

    result.context("sensor source failed")?;
    Ok(ExitCode::from(0))
}

#[cfg(feature = "http")]
fn spawn_http(
    handle: Arc<MonitorHandle>,
    config: &AppConfig,
) -> Result<tokio::task::JoinHandle<Result<()>>> {
    let addr: std::net::SocketAddr = config
        .http
        .bind_addr
        .parse()
        .with_context(|| format!("invalid HTTP bind address {:?}", config.http.bind_addr))?;
    tracing::info!("HTTP control surface on http://{addr}");
    Ok(tokio::spawn(pulse_monitor::http::run_http_server(handle, addr)))
}

#[cfg(not(feature = "http"))]
fn spawn_http(
    _handle: Arc<MonitorHandle>,
    _config: &AppConfig,
) -> Result<tokio::task::JoinHandle<Result<()>>> {
    anyhow::bail!("built without the `http` feature; pass --no-http")
}

fn report_shutdown(result: Option<StopResult>) {
    match result {
        Some(StopResult::Completed { summary, persisted }) => tracing::info!(
            "Active session finalized: {} pulses, {} bpm average, saved: {}",
            summary.total_pulses,
            summary.average_rate,
            persisted
        ),
        Some(StopResult::NoData) => tracing::info!("Active session had no data"),
        None => {}
    }
}

fn run_replay(
    config: AppConfig,
    recording: &Path,
    profile: &Path,
    start: Option<&str>,
    expect_pulses: Option<u64>,
) -> Result<ExitCode> {
    let start = match start {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --start {:?}", raw))?
            .with_timezone(&Utc),
        None => Utc.from_utc_datetime(&Utc::now().date_naive().and_time(NaiveTime::MIN)),
    };

    let report = replay::replay_files(config, recording, profile, start)
        .with_context(|| format!("replaying {}", recording.display()))?;
    emit_report(&report)?;

    match expect_pulses {
        Some(expected) if expected != report.pulses => {
            eprintln!(
                "Pulse count mismatch: expected {}, detected {}",
                expected, report.pulses
            );
            Ok(ExitCode::from(2))
        }
        _ => Ok(ExitCode::from(0)),
    }
}

fn emit_report(report: &ReplayReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn run_sessions(config: &AppConfig, day: Option<NaiveDate>) -> Result<ExitCode> {
    let store = JsonlSessionStore::open(&config.storage.directory)
        .with_context(|| format!("opening session store {}", config.storage.directory))?;

    match day {
        Some(day) => {
            for record in store.list_day(day)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        None => {
            let days = store.days()?;
            if days.is_empty() {
                println!("No sessions under {}", store.directory().display());
            }
            for day in days {
                println!("{} {}", day, store.list_day(day)?.len());
            }
        }
    }
    Ok(ExitCode::from(0))
}
