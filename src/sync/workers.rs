//! Worker lifecycle and supervision.
//!
//! One tokio task per started source runs an eager import cycle at startup
//! and then keeps cycling on the configured interval. Cancellation flows
//! through a per-worker watch channel; stopping blocks, bounded by a
//! timeout, until the task has wound down. Status snapshots expose state,
//! counters, and the most recent error for an operator surface.
//!
//! The supervisor is a plain value owned by the process entry point; there
//! is no global registry.

use crate::errors::{Error, Result};
use crate::sync::importer::Importer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Lifecycle state of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Registered but not currently running
    Stopped,
    /// Actively cycling
    Running,
    /// Hit a fatal error; demoted to stopped once the task winds down
    Error,
}

/// Status snapshot of one worker.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    /// Current lifecycle state
    pub state: WorkerState,
    /// When the worker was last started
    pub started_at: Option<DateTime<Utc>>,
    /// Completed import cycles since registration
    pub cycles: u64,
    /// Entries committed since registration
    pub imported_total: u64,
    /// Errors observed since registration
    pub error_count: u64,
    /// Most recent error message
    pub last_error: Option<String>,
    /// When the most recent error happened
    pub last_error_at: Option<DateTime<Utc>>,
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            state: WorkerState::Stopped,
            started_at: None,
            cycles: 0,
            imported_total: 0,
            error_count: 0,
            last_error: None,
            last_error_at: None,
        }
    }
}

struct RunningWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Registered {
    importer: Arc<Importer>,
    interval: Duration,
    status: Arc<Mutex<WorkerStatus>>,
    runtime: Option<RunningWorker>,
}

/// Starts, stops, and monitors one import worker per registered source.
pub struct WorkerSupervisor {
    workers: Mutex<HashMap<String, Registered>>,
    stop_timeout: Duration,
}

impl WorkerSupervisor {
    /// Creates a supervisor; `stop_timeout` bounds how long stop and
    /// stop_all wait for a worker to acknowledge cancellation.
    pub fn new(stop_timeout: Duration) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            stop_timeout,
        }
    }

    /// Registers a worker under the importer's source name, in the stopped
    /// state. Registering the same name again replaces the previous entry.
    pub fn register(&self, importer: Importer, interval: Duration) {
        let name = importer.source_name().to_string();
        self.workers.lock().insert(
            name,
            Registered {
                importer: Arc::new(importer),
                interval,
                status: Arc::new(Mutex::new(WorkerStatus::default())),
                runtime: None,
            },
        );
    }

    /// Names of all registered workers.
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.lock().keys().cloned().collect()
    }

    /// Starts a registered worker. Starting a running worker is an error.
    pub fn start(&self, name: &str) -> Result<()> {
        let mut workers = self.workers.lock();
        let worker = workers.get_mut(name).ok_or_else(|| Error::UnknownWorker {
            name: name.to_string(),
        })?;

        if let Some(runtime) = &worker.runtime {
            if !runtime.handle.is_finished() {
                return Err(Error::WorkerAlreadyRunning {
                    name: name.to_string(),
                });
            }
            // The previous task ended on its own; clear it out
            worker.runtime = None;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        {
            let mut status = worker.status.lock();
            status.state = WorkerState::Running;
            status.started_at = Some(Utc::now());
        }

        let handle = tokio::spawn(run_worker(
            name.to_string(),
            Arc::clone(&worker.importer),
            worker.interval,
            shutdown_rx,
            Arc::clone(&worker.status),
        ));
        worker.runtime = Some(RunningWorker {
            shutdown: shutdown_tx,
            handle,
        });

        info!(worker = name, "Worker started");
        Ok(())
    }

    /// Stops a running worker, waiting (bounded) for it to wind down.
    /// Stopping a non-running worker is an error.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let (handle, status) = {
            let mut workers = self.workers.lock();
            let worker = workers.get_mut(name).ok_or_else(|| Error::UnknownWorker {
                name: name.to_string(),
            })?;
            let runtime = worker
                .runtime
                .take()
                .ok_or_else(|| Error::WorkerNotRunning {
                    name: name.to_string(),
                })?;

            runtime.shutdown.send(true).ok();
            (runtime.handle, Arc::clone(&worker.status))
        };

        finish_worker(name, handle, &status, self.stop_timeout).await;
        info!(worker = name, "Worker stopped");
        Ok(())
    }

    /// Starts every registered worker that is not already running.
    pub fn start_all(&self) -> Result<()> {
        for name in self.worker_names() {
            match self.start(&name) {
                Ok(()) | Err(Error::WorkerAlreadyRunning { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Cancels every running worker and waits, bounded per worker, until
    /// all have wound down.
    pub async fn stop_all(&self) -> Result<()> {
        // Signal everything first so workers wind down concurrently
        let mut stopping = Vec::new();
        {
            let mut workers = self.workers.lock();
            for (name, worker) in workers.iter_mut() {
                if let Some(runtime) = worker.runtime.take() {
                    runtime.shutdown.send(true).ok();
                    stopping.push((name.clone(), runtime.handle, Arc::clone(&worker.status)));
                }
            }
        }

        for (name, handle, status) in stopping {
            finish_worker(&name, handle, &status, self.stop_timeout).await;
            info!(worker = %name, "Worker stopped");
        }

        Ok(())
    }

    /// Status snapshot of a registered worker.
    pub fn status(&self, name: &str) -> Result<WorkerStatus> {
        let workers = self.workers.lock();
        let worker = workers.get(name).ok_or_else(|| Error::UnknownWorker {
            name: name.to_string(),
        })?;
        Ok(worker.status.lock().clone())
    }
}

/// Waits for a worker task to finish, recording panics and forcing the
/// final stopped state. Error details recorded by the task survive the
/// demotion.
async fn finish_worker(
    name: &str,
    mut handle: JoinHandle<()>,
    status: &Arc<Mutex<WorkerStatus>>,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(join_error)) => {
            error!(worker = name, error = %join_error, "Worker task panicked");
            let mut status = status.lock();
            status.error_count += 1;
            status.last_error = Some(format!("worker task panicked: {join_error}"));
            status.last_error_at = Some(Utc::now());
        }
        Err(_) => {
            warn!(worker = name, timeout_secs = timeout.as_secs(), "Worker did not stop in time; aborting");
            handle.abort();
            let mut status = status.lock();
            status.error_count += 1;
            status.last_error = Some("worker did not stop within the timeout".to_string());
            status.last_error_at = Some(Utc::now());
        }
    }

    status.lock().state = WorkerState::Stopped;
}

/// The worker task body: one eager cycle, then interval-driven cycles until
/// cancellation or a fatal error.
async fn run_worker(
    name: String,
    importer: Arc<Importer>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    status: Arc<Mutex<WorkerStatus>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The cycle gets its own receiver so cancellation can interrupt an
    // in-flight retry while this loop still watches for the signal itself
    let mut cycle_shutdown = shutdown.clone();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match importer.run_cycle(&mut cycle_shutdown).await {
                    Ok(report) => {
                        let mut status = status.lock();
                        status.cycles += 1;
                        status.imported_total += report.imported as u64;
                        if !report.errors.is_empty() {
                            status.error_count += report.errors.len() as u64;
                            status.last_error = report.errors.last().cloned();
                            status.last_error_at = Some(Utc::now());
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        error!(worker = %name, error = %e, "Fatal error; worker is giving up");
                        let mut status = status.lock();
                        status.state = WorkerState::Error;
                        status.error_count += 1;
                        status.last_error = Some(e.to_string());
                        status.last_error_at = Some(Utc::now());
                        break;
                    }
                    Err(e) => {
                        warn!(worker = %name, error = %e, "Import cycle failed");
                        let mut status = status.lock();
                        status.cycles += 1;
                        status.error_count += 1;
                        status.last_error = Some(e.to_string());
                        status.last_error_at = Some(Utc::now());
                    }
                }
            }
            changed = shutdown.changed() => {
                let cancelled = match changed {
                    Ok(()) => *shutdown.borrow(),
                    // Sender gone means the supervisor dropped us
                    Err(_) => true,
                };
                if cancelled {
                    info!(worker = %name, "Shutdown signal received");
                    break;
                }
            }
        }
    }

    // Error state is transient; the worker always comes to rest as stopped,
    // keeping whatever error details were recorded
    status.lock().state = WorkerState::Stopped;
}
