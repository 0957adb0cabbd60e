//! `run` command implementation.
//!
//! Plants the configured forest as the process-wide one, then drives
//! sample traffic through it from several blocking tasks.

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, warn};

use canopy::{share_error, CanopyContext};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Outcome of one traffic run
#[derive(Debug, Default)]
struct TrafficStats {
    emitted: usize,
    workers: usize,
    duration: Duration,
}

impl TrafficStats {
    fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.emitted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Execute the `run` command
pub async fn run_traffic(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let config = super::load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let forest = canopy::init(&config).map_err(CliError::from)?;
    // Keep the crash buffer alive past uproot_all so it can be flushed last
    let crash = canopy::active_crash_buffer();

    info!(
        build_mode = %forest.build_mode(),
        trees = forest.tree_count(),
        threads = args.threads,
        messages = args.messages,
        "Forest planted, emitting traffic"
    );

    let start = Instant::now();
    let mut workers = JoinSet::new();
    for worker in 0..args.threads {
        let count = args.messages;
        workers.spawn_blocking(move || emit(worker, count));
    }

    let mut stats = TrafficStats {
        workers: args.threads,
        ..Default::default()
    };
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(Ok(emitted)) => stats.emitted += emitted,
                Some(Err(e)) => warn!(error = %e, "Traffic worker failed"),
                None => break,
            },
            _ = &mut shutdown => {
                warn!("Received shutdown signal, abandoning remaining traffic");
                workers.abort_all();
                break;
            }
        }
    }
    stats.duration = start.elapsed();

    // Dropping the forest's references drains async trees and flushes
    // remote trees
    canopy::uproot_all();

    if let Some(crash) = crash {
        crash.try_flush().map_err(CliError::from)?;
        info!(path = %crash.path().display(), lines = crash.len(), "Crash buffer persisted");
    }

    info!(
        emitted = stats.emitted,
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.0}", stats.rate()),
        "Traffic run completed"
    );
    print_summary(&stats);
    Ok(())
}

/// Emit `count` messages cycling through every level; returns `count`
fn emit(worker: usize, count: usize) -> usize {
    let context = format!("worker-{worker}");
    let _guard = CanopyContext::enter(Some(context.as_str()));

    for n in 0..count {
        match n % 5 {
            0 => canopy::v!("tick %d", n),
            1 => canopy::d!("worker %d at step %d of %d", worker, n, count),
            2 => canopy::i!(tag: "Traffic", "request %d served in %.2fms", n, 0.25 * n as f64),
            3 => canopy::tag("Traffic").w("slow upstream %s", &[&"billing"]),
            _ => {
                let err = share_error(io::Error::other(format!("simulated failure {n}")));
                canopy::e!(error: err, "request %d failed", n)
            }
        }
    }
    count
}

/// Ctrl+C or SIGTERM; pends forever when no handler can be installed
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_summary(stats: &TrafficStats) {
    println!("\n=== Traffic Summary ===\n");
    println!("  Workers: {}", stats.workers);
    println!("  Messages: {}", stats.emitted);
    println!("  Duration: {:.3}s", stats.duration.as_secs_f64());
    println!("  Rate: {:.0} msg/s", stats.rate());
    println!();
}
