//! Per-metric rolling windows with count and age bounds
//!
//! The RollingWindowStore keeps a bounded history of validated samples per
//! metric stream. Count bounds are enforced eagerly on push (strict FIFO),
//! age bounds lazily at the latest on access. Readers always get an owned
//! copy of the window, never a reference into mutable storage, so concurrent
//! pushes cannot corrupt an iteration.

use crate::config::StreamConfig;
use crate::types::{Sample, Timestamp};
use chrono::{Duration, Utc};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

struct StreamWindow {
    config: StreamConfig,
    samples: VecDeque<Sample>,
}

impl StreamWindow {
    fn new(config: StreamConfig) -> Self {
        let capacity = config.window_count().min(1024);
        Self {
            config,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        // Strict FIFO count bound, enforced on every push
        while self.samples.len() > self.config.window_count() {
            self.samples.pop_front();
        }
        self.purge_expired(sample.timestamp);
    }

    fn purge_expired(&mut self, now: Timestamp) {
        if let Some(max_age_ms) = self.config.max_window_age_ms {
            let cutoff = now - Duration::milliseconds(max_age_ms as i64);
            while let Some(front) = self.samples.front() {
                if front.timestamp < cutoff {
                    self.samples.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    fn snapshot_at(&mut self, now: Timestamp) -> Vec<Sample> {
        self.purge_expired(now);
        self.samples.iter().copied().collect()
    }
}

/// Store of per-metric rolling windows
///
/// The stream map is guarded by an `RwLock` (registration is rare, lookups
/// are common) and every window by its own mutex, so pushes to different
/// streams never contend and no operation takes a global lock.
pub struct RollingWindowStore {
    streams: RwLock<HashMap<String, Arc<Mutex<StreamWindow>>>>,
}

impl Default for RollingWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingWindowStore {
    /// Create an empty store with no registered streams
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store with the given streams pre-registered
    pub fn with_streams(configs: &HashMap<String, StreamConfig>) -> Self {
        let store = Self::new();
        for (name, config) in configs {
            store.register(name.clone(), config.clone());
        }
        store
    }

    /// Register a stream with tuned window bounds and thresholds
    ///
    /// Explicit registration always wins over the auto-registration default;
    /// re-registering replaces the configuration but keeps existing samples.
    /// A tightened count bound takes effect on the next push, a tightened age
    /// bound on the next access.
    pub fn register(&self, name: String, config: StreamConfig) {
        let mut streams = self.streams.write().unwrap();
        match streams.get(&name) {
            Some(existing) => {
                let mut window = existing.lock().unwrap();
                window.config = config;
            }
            None => {
                debug!("Registering metric stream '{}'", name);
                streams.insert(name, Arc::new(Mutex::new(StreamWindow::new(config))));
            }
        }
    }

    fn stream(&self, name: &str) -> Option<Arc<Mutex<StreamWindow>>> {
        self.streams.read().unwrap().get(name).cloned()
    }

    fn stream_or_register_default(&self, name: &str) -> Arc<Mutex<StreamWindow>> {
        if let Some(stream) = self.stream(name) {
            return stream;
        }
        let mut streams = self.streams.write().unwrap();
        // Double-checked: another pusher may have won the race
        streams
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Auto-registering metric stream '{}' with default window", name);
                Arc::new(Mutex::new(StreamWindow::new(
                    StreamConfig::default_for_unregistered(),
                )))
            })
            .clone()
    }

    /// Append a sample to a stream's window
    ///
    /// Unknown streams are auto-registered with the default window config
    /// (100 samples, no age bound) so producers need no registration step.
    pub fn push(&self, name: &str, sample: Sample) {
        let stream = self.stream_or_register_default(name);
        let mut window = stream.lock().unwrap();
        window.push(sample);
    }

    /// Owned copy of a stream's live window, oldest-first
    ///
    /// Purges age-expired samples before copying so the caller never sees a
    /// sample older than the configured bound relative to `now`. Returns
    /// `None` for streams that were never registered or pushed to.
    pub fn snapshot_at(&self, name: &str, now: Timestamp) -> Option<Vec<Sample>> {
        let stream = self.stream(name)?;
        let mut window = stream.lock().unwrap();
        Some(window.snapshot_at(now))
    }

    /// Owned copy of a stream's live window as of the current time
    pub fn snapshot(&self, name: &str) -> Option<Vec<Sample>> {
        self.snapshot_at(name, Utc::now())
    }

    /// Names of all registered streams, sorted for deterministic iteration
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// The declared value range of a stream, if configured
    pub fn declared_range(&self, name: &str) -> Option<(f64, f64)> {
        let stream = self.stream(name)?;
        let window = stream.lock().unwrap();
        window.config.declared_range()
    }

    /// The stream's configuration, if registered
    pub fn stream_config(&self, name: &str) -> Option<StreamConfig> {
        let stream = self.stream(name)?;
        let window = stream.lock().unwrap();
        Some(window.config.clone())
    }

    /// Number of live samples in a stream's window
    pub fn len(&self, name: &str) -> usize {
        self.snapshot(name).map_or(0, |samples| samples.len())
    }

    /// Whether the store has no registered streams
    pub fn is_empty(&self) -> bool {
        self.streams.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64) -> Sample {
        Sample::new(Utc::now(), value)
    }

    fn counted_config(max: usize) -> StreamConfig {
        StreamConfig {
            max_window_count: Some(max),
            ..StreamConfig::default()
        }
    }

    #[test]
    fn test_push_and_snapshot() {
        let store = RollingWindowStore::new();
        store.register("cpu".to_string(), counted_config(10));

        store.push("cpu", sample(1.0));
        store.push("cpu", sample(2.0));

        let window = store.snapshot("cpu").unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].value, 1.0);
        assert_eq!(window[1].value, 2.0);
    }

    #[test]
    fn test_count_bound_is_strict_fifo() {
        let store = RollingWindowStore::new();
        store.register("cpu".to_string(), counted_config(5));

        for i in 0..6 {
            store.push("cpu", sample(i as f64));
        }

        let window = store.snapshot("cpu").unwrap();
        assert_eq!(window.len(), 5);
        // The oldest sample (0.0) is gone, exactly the newest five remain
        let values: Vec<f64> = window.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_age_bound_purges_on_read() {
        let store = RollingWindowStore::new();
        store.register(
            "latency".to_string(),
            StreamConfig {
                max_window_count: Some(100),
                max_window_age_ms: Some(60_000),
                ..StreamConfig::default()
            },
        );

        let now = Utc::now();
        store.push("latency", Sample::new(now - Duration::milliseconds(120_000), 5.0));
        store.push("latency", Sample::new(now - Duration::milliseconds(30_000), 7.0));

        let window = store.snapshot_at("latency", now).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].value, 7.0);
    }

    #[test]
    fn test_both_bounds_tighter_wins() {
        let store = RollingWindowStore::new();
        store.register(
            "mixed".to_string(),
            StreamConfig {
                max_window_count: Some(3),
                max_window_age_ms: Some(60_000),
                ..StreamConfig::default()
            },
        );

        let now = Utc::now();
        // Four fresh samples: count bound (3) is the tighter one
        for i in 0..4 {
            store.push("mixed", Sample::new(now, i as f64));
        }
        assert_eq!(store.snapshot_at("mixed", now).unwrap().len(), 3);

        // A later read with everything expired: age bound is the tighter one
        let later = now + Duration::milliseconds(120_000);
        assert_eq!(store.snapshot_at("mixed", later).unwrap().len(), 0);
    }

    #[test]
    fn test_unknown_stream_auto_registers_with_defaults() {
        let store = RollingWindowStore::new();
        store.push("surprise", sample(1.0));

        let config = store.stream_config("surprise").unwrap();
        assert_eq!(config.window_count(), 100);
        assert!(config.max_window_age_ms.is_none());
        assert_eq!(store.len("surprise"), 1);
    }

    #[test]
    fn test_explicit_registration_wins_over_default() {
        let store = RollingWindowStore::new();
        store.push("cpu", sample(1.0));
        store.register("cpu".to_string(), counted_config(5));

        // Samples survive reconfiguration, the new bound applies afterwards
        for i in 0..10 {
            store.push("cpu", sample(i as f64));
        }
        assert_eq!(store.len("cpu"), 5);
    }

    #[test]
    fn test_snapshot_is_owned_copy() {
        let store = RollingWindowStore::new();
        store.register("cpu".to_string(), counted_config(10));
        store.push("cpu", sample(1.0));

        let before = store.snapshot("cpu").unwrap();
        store.push("cpu", sample(2.0));

        // The copy taken earlier is unaffected by later pushes
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot("cpu").unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_of_unknown_stream_is_none() {
        let store = RollingWindowStore::new();
        assert!(store.snapshot("missing").is_none());
    }

    #[test]
    fn test_stream_names_sorted() {
        let store = RollingWindowStore::new();
        store.push("b", sample(1.0));
        store.push("a", sample(1.0));
        store.push("c", sample(1.0));
        assert_eq!(store.stream_names(), vec!["a", "b", "c"]);
    }
}
