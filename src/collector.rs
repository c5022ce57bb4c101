//! Periodic and push-style sample collection
//!
//! The Collector pulls from registered producers on a fixed cadence and feeds
//! everything through validation into the rolling windows. Each producer is
//! polled on its own task with a time budget, so one stalled producer cannot
//! hold up the ingestion of other streams. Push-style samples are accepted at
//! any time between ticks through [`Collector::record`].

use crate::config::{RetryPolicy, TelemetryConfig};
use crate::error::CollectorError;
use crate::logstore::LogStore;
use crate::types::{DebugLogEntry, RawSample};
use crate::validator::SampleValidator;
use crate::window::RollingWindowStore;
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::json;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// A source of raw samples polled by the collector
///
/// Implementations wrap the external collaborators of the subsystem: system
/// probes, bot status clients, wallet clients. A poll should be quick; polls
/// exceeding the configured budget are abandoned for the tick.
#[cfg_attr(test, mockall::automock)]
pub trait Producer: Send + Sync {
    /// Stable name of the producer, used in failure logs
    fn name(&self) -> &str;

    /// Produce the current batch of raw samples
    fn poll(&self) -> Result<Vec<RawSample>, CollectorError>;
}

struct CollectorInner {
    poll_interval: Duration,
    poll_budget: Duration,
    retry: RetryPolicy,
    producers: RwLock<Vec<Arc<dyn Producer>>>,
    windows: Arc<RollingWindowStore>,
    validator: SampleValidator,
    log_store: Arc<LogStore>,
}

impl CollectorInner {
    /// Validate a raw sample and push it into its stream's window
    fn ingest(&self, raw: &RawSample) {
        let range = self.windows.declared_range(&raw.metric);
        if let Some(sample) = self.validator.validate(raw, range, Utc::now()) {
            self.windows.push(&raw.metric, sample);
        }
    }

    /// Poll one producer with the time budget and bounded retry
    ///
    /// A failed or timed-out attempt is retried up to the configured number
    /// of attempts; once exhausted, the failure is logged and the producer's
    /// contribution to this tick is skipped.
    async fn poll_producer(self: Arc<Self>, producer: Arc<dyn Producer>) {
        let name = producer.name().to_string();

        for attempt in 1..=self.retry.max_attempts {
            let poller = Arc::clone(&producer);
            let result = timeout(
                self.poll_budget,
                tokio::task::spawn_blocking(move || poller.poll()),
            )
            .await;

            let error = match result {
                Ok(Ok(Ok(samples))) => {
                    debug!("Producer '{}' yielded {} samples", name, samples.len());
                    for raw in &samples {
                        self.ingest(raw);
                    }
                    return;
                }
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Err(join_error)) => format!("poll task panicked: {}", join_error),
                Err(_) => CollectorError::Timeout(name.clone()).to_string(),
            };

            if attempt < self.retry.max_attempts {
                debug!(
                    "Producer '{}' attempt {}/{} failed ({}), retrying",
                    name, attempt, self.retry.max_attempts, error
                );
                tokio::time::sleep(Duration::from_millis(self.retry.backoff_ms)).await;
            } else {
                warn!("Producer '{}' failed, skipping this tick: {}", name, error);
                self.log_store.append(
                    DebugLogEntry::warn(
                        "collector",
                        format!("Producer '{}' skipped this tick", name),
                    )
                    .with_data(json!({
                        "producer": name,
                        "attempts": self.retry.max_attempts,
                        "error": error,
                    })),
                );
            }
        }
    }

    /// Run one collection pass: poll every producer concurrently
    async fn tick(self: &Arc<Self>) {
        let producers: Vec<Arc<dyn Producer>> =
            self.producers.read().unwrap().iter().cloned().collect();
        if producers.is_empty() {
            return;
        }

        let mut handles = Vec::with_capacity(producers.len());
        for producer in producers {
            handles.push(tokio::spawn(
                Arc::clone(self).poll_producer(producer),
            ));
        }
        for handle in handles {
            // Poll tasks never return errors of their own; a join error here
            // means the task panicked and the tick just moves on
            let _ = handle.await;
        }
    }
}

/// Entry point feeding samples into the telemetry engine
pub struct Collector {
    inner: Arc<CollectorInner>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Collector {
    /// Create a collector bound to the given stores
    pub fn new(
        config: &TelemetryConfig,
        windows: Arc<RollingWindowStore>,
        log_store: Arc<LogStore>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(CollectorInner {
                poll_interval: Duration::from_millis(config.collection_interval_ms),
                poll_budget: Duration::from_millis(config.producer_timeout_ms),
                retry: config.producer_retry.clone(),
                producers: RwLock::new(Vec::new()),
                windows,
                validator: SampleValidator::new(Arc::clone(&log_store)),
                log_store,
            }),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Register a producer to be polled on every tick
    pub fn register_producer(&self, producer: Arc<dyn Producer>) {
        debug!("Registering producer '{}'", producer.name());
        self.inner.producers.write().unwrap().push(producer);
    }

    /// Accept a push-style sample between ticks
    ///
    /// The sample goes through the same validation path as polled samples
    /// and lands in its window immediately, without waiting for the next
    /// tick. Invalid samples are dropped and logged, never an error.
    pub fn record(&self, raw: RawSample) {
        self.inner.ingest(&raw);
    }

    /// Run one collection pass immediately
    ///
    /// Used by the periodic loop, and directly by event-driven callers and
    /// tests that control their own cadence.
    pub async fn tick(&self) {
        self.inner.tick().await;
    }

    /// Start the periodic collection loop
    ///
    /// Idempotent: starting an already-running collector does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            info!("Collector already running, skipping start");
            return;
        }

        info!(
            "Starting collector with interval {:?}",
            self.inner.poll_interval
        );
        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => inner.tick().await,
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Collector loop stopped");
        }));
    }

    /// Stop the periodic loop and wait for it to finish
    ///
    /// Idempotent; snapshots already handed out stay valid.
    pub async fn shutdown(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            info!("Stopping collector");
            let _ = self.shutdown_tx.send(true);
            let _ = handle.await;
        }
    }
}
