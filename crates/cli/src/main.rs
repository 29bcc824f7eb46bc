//! taskline: worker pool and timer scheduler service.
//!
//! `run` starts a pool and a scheduler from config, reports their stats on
//! a fixed-rate timer and shuts both down gracefully on Ctrl-C. `check`
//! validates a config file and prints the effective settings.

mod cli;

use std::io::ErrorKind;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use taskline_core::{load_dotenv, TasklineConfig, TasklineError};
use taskline_scheduler::{Scheduler, TimerEvent};
use taskline_worker::{callable_fn, work_fn, BoxError, Work, WorkerPool};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Check => {
            println!("{}", serde_json::to_string_pretty(&config.summary())?);
            Ok(())
        }
        Command::Run {
            report_interval,
            burst,
        } => run(config, Duration::from_secs(report_interval.max(1)), burst).await,
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Load the config file, falling back to defaults plus env overrides when
/// the file does not exist. Any other error is fatal.
fn load_config(path: &str) -> anyhow::Result<TasklineConfig> {
    match TasklineConfig::from_file(path) {
        Ok(config) => {
            info!(path = %path, "loaded taskline config");
            Ok(config)
        }
        Err(TasklineError::ConfigIo(e)) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path, "config file not found, using defaults");
            TasklineConfig::from_env().context("invalid config from environment")
        }
        Err(e) => Err(e).with_context(|| format!("failed to load config from {path}")),
    }
}

// ── Run ─────────────────────────────────────────────────────────────

async fn run(config: TasklineConfig, report_interval: Duration, burst: usize) -> anyhow::Result<()> {
    config.log_summary();

    let pool = Arc::new(WorkerPool::from_config(&config.pool).context("failed to start worker pool")?);
    let scheduler = Scheduler::from_config(&config.scheduler).context("failed to start scheduler")?;

    let reporter = stats_reporter(Arc::downgrade(&pool));
    scheduler
        .schedule(TimerEvent::fixed_rate(report_interval, report_interval, reporter))
        .context("scheduler rejected the stats reporter")?;

    if burst > 0 {
        submit_burst(&pool, burst);
    }

    info!("taskline running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    // Both stops block on thread joins.
    let termination = tokio::task::spawn_blocking(move || {
        scheduler.stop();
        drop(scheduler);
        pool.stop(false)
    })
    .await?;

    info!(termination = ?termination, "taskline exited");
    Ok(())
}

/// Logs pool stats as JSON. Holds the pool weakly so the timer never keeps
/// it alive past shutdown.
fn stats_reporter(pool: Weak<WorkerPool>) -> impl Work {
    work_fn(move || {
        let Some(pool) = pool.upgrade() else {
            return Ok(());
        };
        let stats = serde_json::to_string(&pool.stats())?;
        info!(stats = %stats, "worker pool stats");
        Ok(())
    })
    .named("stats-reporter")
}

/// Submit `count` demo jobs: fire-and-forget sleeps plus one callable whose
/// result is awaited on the runtime.
fn submit_burst(pool: &WorkerPool, count: usize) {
    for i in 0..count {
        let accepted = pool.execute(
            work_fn(move || {
                thread::sleep(Duration::from_millis(10 + (i % 5) as u64 * 10));
                Ok(())
            })
            .named("burst"),
        );
        if !accepted {
            warn!(submitted = i, "pool refused burst job");
            return;
        }
    }

    let total = count as u64;
    let Some(handle) = pool.submit_callable(
        callable_fn(move || Ok::<_, BoxError>((0..total).sum::<u64>())).named("burst-sum"),
    ) else {
        return;
    };
    tokio::spawn(async move {
        match handle.await.into_result() {
            Ok(sum) => info!(jobs = count, sum, "burst submitted"),
            Err(e) => warn!(error = %e, "burst callable failed"),
        }
    });
}
