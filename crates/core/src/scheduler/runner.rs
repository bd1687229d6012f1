//! Pass scheduler implementation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::classifier::{ClassifyReport, StatusClassifier};
use crate::clock::Clock;
use crate::sweeper::{ExpirySweeper, SweepReport};

use super::config::SchedulerConfig;
use super::types::{PassHistory, PassRecord, SchedulerError, SchedulerStatus};

/// Runs the expiry sweeper and the status classifier on their intervals.
pub struct Scheduler {
    config: SchedulerConfig,
    sweeper: Arc<ExpirySweeper>,
    classifier: Arc<StatusClassifier>,
    clock: Arc<dyn Clock>,

    // Runtime state
    running: Arc<AtomicBool>,
    history: Arc<RwLock<PassHistory>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        sweeper: Arc<ExpirySweeper>,
        classifier: Arc<StatusClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            sweeper,
            classifier,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            history: Arc::new(RwLock::new(PassHistory::default())),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Start both loops. Each runs one pass right away.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!(
            "Starting scheduler (sweep every {}s, classify every {}s)",
            self.config.sweep_interval_secs, self.config.classify_interval_secs
        );

        let sweeper = Arc::clone(&self.sweeper);
        let history = Arc::clone(&self.history);
        let clock = Arc::clone(&self.clock);
        let sweep_interval = Duration::from_secs(self.config.sweep_interval_secs);
        let sweep = self.spawn_loop(
            "Sweep",
            move || sweep_interval,
            move || {
                let sweeper = Arc::clone(&sweeper);
                let history = Arc::clone(&history);
                let clock = Arc::clone(&clock);
                async move {
                    if let Err(e) = run_sweep(sweeper, &history, clock.as_ref()).await {
                        warn!("Sweep pass failed: {}", e);
                    }
                }
            },
        );

        let classifier = Arc::clone(&self.classifier);
        let history = Arc::clone(&self.history);
        let clock = Arc::clone(&self.clock);
        // Classification also runs at every calendar day boundary.
        let classify_interval = Duration::from_secs(self.config.classify_interval_secs);
        let day_clock = Arc::clone(&self.classifier);
        let classify = self.spawn_loop(
            "Classify",
            move || classify_interval.min(day_clock.until_next_day()),
            move || {
                let classifier = Arc::clone(&classifier);
                let history = Arc::clone(&history);
                let clock = Arc::clone(&clock);
                async move {
                    if let Err(e) = run_classify(classifier, &history, clock.as_ref()).await {
                        warn!("Classification pass failed: {}", e);
                    }
                }
            },
        );

        self.tasks.lock().await.extend([sweep, classify]);
        info!("Scheduler started");
    }

    /// Stop both loops, waiting for an in-flight pass to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping scheduler");
        let _ = self.shutdown_tx.send(());

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }

        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let history = self.history.read().await;
        SchedulerStatus {
            running: self.is_running(),
            sweep_interval_secs: self.config.sweep_interval_secs,
            classify_interval_secs: self.config.classify_interval_secs,
            sweep_passes: history.sweep_passes,
            classify_passes: history.classify_passes,
            last_sweep: history.last_sweep.clone(),
            last_classify: history.last_classify.clone(),
        }
    }

    /// Run a sweep pass now, outside the loop.
    pub async fn sweep_now(&self) -> Result<SweepReport, SchedulerError> {
        run_sweep(Arc::clone(&self.sweeper), &self.history, self.clock.as_ref()).await
    }

    /// Run a classification pass now, outside the loop.
    pub async fn classify_now(&self) -> Result<ClassifyReport, SchedulerError> {
        run_classify(Arc::clone(&self.classifier), &self.history, self.clock.as_ref()).await
    }

    /// Run `pass` now, then again each time the delay from `next_delay`
    /// elapses.
    fn spawn_loop<D, F, Fut>(&self, name: &'static str, next_delay: D, pass: F) -> JoinHandle<()>
    where
        D: Fn() -> Duration + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("{} loop started", name);
            pass().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("{} loop received shutdown signal", name);
                        break;
                    }
                    _ = tokio::time::sleep(next_delay()) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        pass().await;
                    }
                }
            }
            info!("{} loop stopped", name);
        })
    }
}

// Passes take the event store's blocking lock, so they run off the runtime.

async fn run_sweep(
    sweeper: Arc<ExpirySweeper>,
    history: &RwLock<PassHistory>,
    clock: &dyn Clock,
) -> Result<SweepReport, SchedulerError> {
    let report = tokio::task::spawn_blocking(move || sweeper.sweep_once())
        .await
        .map_err(|e| SchedulerError::Join(e.to_string()))??;

    let mut history = history.write().await;
    history.sweep_passes += 1;
    history.last_sweep = Some(PassRecord {
        finished_at: clock.now(),
        report: report.clone(),
    });
    Ok(report)
}

async fn run_classify(
    classifier: Arc<StatusClassifier>,
    history: &RwLock<PassHistory>,
    clock: &dyn Clock,
) -> Result<ClassifyReport, SchedulerError> {
    let report = tokio::task::spawn_blocking(move || classifier.classify_once())
        .await
        .map_err(|e| SchedulerError::Join(e.to_string()))??;

    let mut history = history.write().await;
    history.classify_passes += 1;
    history.last_classify = Some(PassRecord {
        finished_at: clock.now(),
        report: report.clone(),
    });
    Ok(report)
}
