use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tracing::info;

use gatekeeper::config::{GatekeeperConfig, LimitConfig, LogFormat};
use gatekeeper::load::{run_worker, LoadPlan, Tally};
use gatekeeper::logging::init_tracing;
use gatekeeper::ratelimit::{Admission, Limiter, LimiterStats};
use gatekeeper::sweeper::Sweeper;

/// Drive a limiter with synthetic concurrent load and report the outcome.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// Checks issued by each worker
    #[arg(long, default_value_t = 10)]
    requests_per_worker: usize,

    /// Size of the simulated client population
    #[arg(long, default_value_t = 100)]
    distinct_clients: usize,

    /// Keep the limiter and sweeper running this long after the load finishes
    #[arg(long, default_value_t = 0)]
    linger_ms: u64,

    /// Log output format, overriding the configuration file
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

/// Final output printed on stdout.
#[derive(Debug, Serialize)]
struct Report {
    limits: LimitConfig,
    interrupted: bool,
    tally: Tally,
    limiter: LimiterStats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GatekeeperConfig::from_file(path)?,
        None => GatekeeperConfig::default(),
    };
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    init_tracing(&config.logging);

    info!("Starting Gatekeeper");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        max_rate = config.limits.max_rate,
        window_ms = config.limits.window_ms,
        "Configuration loaded"
    );

    // One limiter per process, shared with the sweeper and every worker
    let limiter = Arc::new(Limiter::new());
    let sweeper = Sweeper::spawn(limiter.clone(), config.sweeper.clone());

    let plan = LoadPlan {
        requests_per_worker: args.requests_per_worker,
        distinct_clients: args.distinct_clients,
    };
    let stop = Arc::new(AtomicBool::new(false));
    let mut load = tokio::spawn(run_load(
        limiter.clone(),
        config.limits.clone(),
        plan,
        args.workers,
        stop.clone(),
    ));

    let mut interrupted = false;
    let tally = tokio::select! {
        result = &mut load => result?,
        _ = shutdown_signal() => {
            interrupted = true;
            stop.store(true, Ordering::Relaxed);
            load.await?
        }
    };
    info!(
        admitted = tally.admitted,
        denied = tally.denied,
        "Load finished"
    );

    if !interrupted && args.linger_ms > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(args.linger_ms)) => {}
            _ = shutdown_signal() => interrupted = true,
        }
    }

    sweeper.shutdown().await;

    let report = Report {
        limits: config.limits,
        interrupted,
        tally,
        limiter: limiter.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Gatekeeper stopped");
    Ok(())
}

/// Run `workers` blocking workers against the limiter and sum their tallies.
async fn run_load(
    admission: Arc<dyn Admission>,
    limits: LimitConfig,
    plan: LoadPlan,
    workers: usize,
    stop: Arc<AtomicBool>,
) -> Tally {
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let admission = admission.clone();
            let limits = limits.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                let mut rng = rand::thread_rng();
                run_worker(admission.as_ref(), &limits, plan, &stop, &mut rng)
            })
        })
        .collect();

    let mut total = Tally::default();
    for handle in handles {
        match handle.await {
            Ok(tally) => total.merge(tally),
            Err(e) => tracing::error!(error = %e, "Load worker failed"),
        }
    }
    total
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
