//! Service container (C7 + C8 orchestration)
//!
//! Owns the two long-lived loops SPEC_FULL.md §5 requires — the Job
//! Generator's 60s tick and the Job Runner's poll loop — as explicit,
//! joinable tasks rather than hidden process-scoped singletons, per the
//! "Global singleton loops" redesign guidance in §9. `start` spawns both;
//! `stop` signals cancellation and joins, so a caller (the CLI's `serve`
//! command, or a test) controls the lifetime precisely.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::services::{JobGenerator, JobRunner};

pub struct Service {
    generator: Arc<JobGenerator>,
    runner: Arc<JobRunner>,
    job_generation_interval: Duration,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Service {
    pub fn new(generator: JobGenerator, runner: JobRunner, job_generation_interval: Duration) -> Self {
        Self {
            generator: Arc::new(generator),
            runner: Arc::new(runner),
            job_generation_interval,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawns the generator and runner loops. Each runs until `stop` is
    /// called or the process receives a shutdown signal the caller forwards
    /// onto the returned [`CancellationToken`] clone.
    pub fn start(&mut self) {
        info!("starting job generator and job runner loops");

        let generator = self.generator.clone();
        let interval = self.job_generation_interval;
        let generator_shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            run_generator_loop(generator, interval, generator_shutdown).await;
        }));

        let runner = self.runner.clone();
        let runner_shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            runner.run(runner_shutdown).await;
        }));
    }

    /// Signals both loops to stop and joins them. Flushing is implicit:
    /// neither loop holds unflushed in-memory state, every transition is a
    /// durable-store write that already completed by the time its tick
    /// function returns.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                error!(error = %err, "service task join failed");
            }
        }
        info!("service stopped");
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

async fn run_generator_loop(generator: Arc<JobGenerator>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("job generator shutting down");
                return;
            }
            _ = ticker.tick() => {
                match generator.generate_due() {
                    Ok(count) if count > 0 => info!(count, "generated due jobs"),
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "job generation tick failed"),
                }
            }
        }
    }
}
