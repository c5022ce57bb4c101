//! Append-only debug log store with retention and subscriptions
//!
//! The LogStore retains a bounded, ordered history of structured debug events.
//! Retention (count and age) is applied on every append, evicting oldest-first.
//! Subscribers receive new entries through bounded channels so that a stalled
//! consumer can never block an appender.

use crate::config::RetentionPolicy;
use crate::types::{DebugLogEntry, LogLevel, Timestamp};
use chrono::{Duration, Utc};
use log::debug;
use std::collections::VecDeque;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

/// Identifier of a log subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Level matching mode for log queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// Match entries of exactly this level
    Exact(LogLevel),
    /// Match entries of this level or more severe
    AtLeast(LogLevel),
}

impl LevelFilter {
    fn matches(&self, level: LogLevel) -> bool {
        match self {
            LevelFilter::Exact(wanted) => level == *wanted,
            LevelFilter::AtLeast(floor) => level >= *floor,
        }
    }
}

/// Filter applied by [`LogStore::query`]
///
/// All populated fields must match; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Restrict by severity
    pub level: Option<LevelFilter>,
    /// Restrict to an exact category
    pub category: Option<String>,
    /// Only entries at or after this time
    pub since: Option<Timestamp>,
    /// Only entries at or before this time
    pub until: Option<Timestamp>,
}

impl LogFilter {
    fn matches(&self, entry: &DebugLogEntry) -> bool {
        if let Some(level) = &self.level {
            if !level.matches(entry.level) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if entry.category != *category {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: SyncSender<DebugLogEntry>,
}

struct LogStoreInner {
    entries: VecDeque<DebugLogEntry>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    /// Entries dropped because a subscriber queue was full
    dropped_deliveries: u64,
}

/// Retention-bounded store of structured debug events
///
/// Interior mutability lets producers share the store through an `Arc`;
/// appends are serialized by the inner mutex, and queries copy entries out
/// so no caller ever observes a partially-applied append or eviction.
pub struct LogStore {
    inner: Mutex<LogStoreInner>,
    retention: RetentionPolicy,
}

impl LogStore {
    /// Create a log store with the given retention bounds
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            inner: Mutex::new(LogStoreInner {
                entries: VecDeque::with_capacity(retention.max_entries.min(1024)),
                subscribers: Vec::new(),
                next_subscription: 0,
                dropped_deliveries: 0,
            }),
            retention,
        }
    }

    /// Append an entry, apply retention, and notify subscribers
    ///
    /// Eviction is deterministic oldest-first: the store never holds more than
    /// `max_entries` entries, and never an entry older than `max_age_ms`
    /// relative to the append time. Subscriber delivery uses `try_send` on a
    /// bounded queue; entries to a full or disconnected queue are dropped
    /// rather than blocking the appender.
    pub fn append(&self, entry: DebugLogEntry) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.push_back(entry.clone());
        Self::apply_retention(&mut inner.entries, &self.retention, Utc::now());

        // Dispatch after retention so the entry set is settled
        let mut dropped = 0u64;
        inner.subscribers.retain(|sub| match sub.sender.try_send(entry.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        if dropped > 0 {
            inner.dropped_deliveries += dropped;
            debug!("Dropped {} log deliveries to slow subscribers", dropped);
        }
    }

    fn apply_retention(
        entries: &mut VecDeque<DebugLogEntry>,
        retention: &RetentionPolicy,
        now: Timestamp,
    ) {
        while entries.len() > retention.max_entries {
            entries.pop_front();
        }
        if let Some(max_age_ms) = retention.max_age_ms {
            let cutoff = now - Duration::milliseconds(max_age_ms as i64);
            while let Some(front) = entries.front() {
                if front.timestamp < cutoff {
                    entries.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Query entries matching the filter, in insertion order
    pub fn query(&self, filter: &LogFilter) -> Vec<DebugLogEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// The most recent `n` entries, in insertion order
    pub fn recent(&self, n: usize) -> Vec<DebugLogEntry> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.entries.len().saturating_sub(n);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the store currently retains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total deliveries dropped due to full subscriber queues
    pub fn dropped_deliveries(&self) -> u64 {
        self.inner.lock().unwrap().dropped_deliveries
    }

    /// Subscribe to entries appended after this call
    ///
    /// There is no replay of history. The returned receiver is backed by a
    /// bounded queue of `capacity` entries; if the subscriber falls behind,
    /// new entries addressed to it are dropped.
    pub fn subscribe(&self, capacity: usize) -> (SubscriptionId, Receiver<DebugLogEntry>) {
        let (sender, receiver) = sync_channel(capacity.max(1));
        let mut inner = self.inner.lock().unwrap();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push(Subscriber { id, sender });
        (id, receiver)
    }

    /// Remove a subscription; entries already queued remain readable
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.retain(|sub| sub.id != id);
    }

    /// Drop all subscriber registrations, used at shutdown
    pub fn clear_subscribers(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.clear();
    }
}
