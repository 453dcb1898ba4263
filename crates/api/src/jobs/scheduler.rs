//! Job scheduler infrastructure for background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn, Instrument};

/// Job frequency for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    /// Run every N seconds.
    Seconds(u64),
    /// Run every N minutes.
    Minutes(u64),
}

impl JobFrequency {
    /// Get the duration between job executions.
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
        }
    }
}

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    /// The frequency at which this job should run.
    fn frequency(&self) -> JobFrequency;

    /// Whether the first run happens at startup instead of after one interval.
    fn run_on_start(&self) -> bool {
        false
    }

    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;
}

/// Background job scheduler.
///
/// Each job runs on its own task. A run that overruns its interval delays
/// the next one instead of stacking ticks, so a job never overlaps itself.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let frequency = job.frequency();
                let mut interval = tokio::time::interval(frequency.duration());
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                // The first tick completes immediately
                if !job.run_on_start() {
                    interval.tick().await;
                }

                info!(job = name, frequency = ?frequency, "Job scheduled");

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            run_job(job.as_ref())
                                .instrument(tracing::info_span!("job", job = name))
                                .await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Initiate graceful shutdown of all jobs.
    /// Returns immediately after signaling shutdown; a running job finishes
    /// its current execution first.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);

        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(job: &dyn Job) {
    let start = std::time::Instant::now();
    let result = job.execute().await;
    let elapsed = start.elapsed();

    let outcome = match &result {
        Ok(()) => {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "Job completed");
            "ok"
        }
        Err(e) => {
            error!(elapsed_ms = elapsed.as_millis() as u64, error = %e, "Job failed");
            "error"
        }
    };

    counter!("job_runs_total", "job" => job.name(), "outcome" => outcome).increment(1);
    histogram!("job_duration_seconds", "job" => job.name()).record(elapsed.as_secs_f64());
}
