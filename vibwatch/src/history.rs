//! Durable, bounded log of severity transitions plus running counters.
//!
//! State lives under three keys of a small key/value store:
//! `vibration_events` (JSON array, newest last, capped at 500),
//! `vibration_counts` (`{normal, alerts, anomalies}`) and `session_start`
//! (epoch millis). Several clients sharing one store race on writes; the last
//! writer wins. Every mutation re-reads the counters right before writing
//! them back to keep that window small, but nothing locks.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use std::{fs, io, process};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::push_capped;
use crate::classifier::{Diagnostics, Transition};
use crate::types::Severity;

pub const EVENTS_KEY: &str = "vibration_events";
pub const COUNTS_KEY: &str = "vibration_counts";
pub const SESSION_KEY: &str = "session_start";

/// Retention cap for stored events.
pub const MAX_EVENTS: usize = 500;

/// Anomaly count at which operators are told to inspect the machine.
pub const URGENT_ANOMALIES: u64 = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history value for {key} could not be encoded: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal string key/value persistence, in the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // write-then-rename so a reader never sees a half-written value
        let path = self.path(key);
        // unique per writer so racing processes never rename each other's file
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".{key}.{}.{n}.tmp", process::id()));
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|source| StoreError::Io { path, source })
    }
}

/// Volatile store, for tests and for running without a writable data dir.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Alert,
    Anomaly,
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Alert => "ALERT",
            EventKind::Anomaly => "ANOMALY",
        }
    }
}

/// One persisted Warning/Critical entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "type", alias = "kind")]
    pub kind: EventKind,
    pub timestamp: i64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub normal: u64,
    #[serde(default)]
    pub alerts: u64,
    #[serde(default)]
    pub anomalies: u64,
}

pub struct EventHistory<S: KeyValueStore> {
    kv: S,
    events: VecDeque<HistoryEvent>,
    counts: Counters,
    session_start: i64,
}

impl<S: KeyValueStore> EventHistory<S> {
    /// Load persisted state; stamps `session_start` with `now_ms` if absent.
    pub fn open(mut kv: S, now_ms: i64) -> Result<Self, StoreError> {
        let events = read_events(&kv)?;
        let counts = read_counts(&kv)?;
        let session_start = match read_session(&kv)? {
            Some(t) => t,
            None => {
                kv.set(SESSION_KEY, &now_ms.to_string())?;
                now_ms
            }
        };
        Ok(Self {
            kv,
            events,
            counts,
            session_start,
        })
    }

    /// Re-read everything, picking up writes from other clients of the store.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.events = read_events(&self.kv)?;
        self.counts = read_counts(&self.kv)?;
        if let Some(t) = read_session(&self.kv)? {
            self.session_start = t;
        }
        Ok(())
    }

    /// Apply a classifier transition. Entering Warning/Critical appends one
    /// event and bumps its counter; returning to Normal only bumps `normal`.
    pub fn record(
        &mut self,
        transition: Transition,
        diag: &Diagnostics,
        now_ms: i64,
    ) -> Result<Option<HistoryEvent>, StoreError> {
        let kind = match transition {
            Transition::Entered(Severity::Critical) => EventKind::Anomaly,
            Transition::Entered(Severity::Warning) => EventKind::Alert,
            Transition::Entered(Severity::Normal) | Transition::BackToNormal => {
                let mut counts = read_counts(&self.kv)?;
                counts.normal += 1;
                write_json(&mut self.kv, COUNTS_KEY, &counts)?;
                self.counts = counts;
                return Ok(None);
            }
        };

        let event = HistoryEvent {
            kind,
            timestamp: now_ms,
            confidence: diag.confidence.unwrap_or(0.0),
            distance: diag.distance.unwrap_or(0.0),
            threshold: diag.threshold.unwrap_or(0.0),
        };

        let mut events = read_events(&self.kv)?;
        push_capped(&mut events, event.clone(), MAX_EVENTS);
        let mut counts = read_counts(&self.kv)?;
        match kind {
            EventKind::Anomaly => counts.anomalies += 1,
            EventKind::Alert => counts.alerts += 1,
        }
        write_json(&mut self.kv, EVENTS_KEY, &events)?;
        write_json(&mut self.kv, COUNTS_KEY, &counts)?;
        debug!(?kind, anomalies = counts.anomalies, alerts = counts.alerts, "history event recorded");

        self.events = events;
        self.counts = counts;
        Ok(Some(event))
    }

    /// Destructive reset of events, counters and session start. Runs only
    /// when `confirm` answers yes; returns whether anything was cleared.
    pub fn clear(
        &mut self,
        now_ms: i64,
        confirm: impl FnOnce() -> bool,
    ) -> Result<bool, StoreError> {
        if !confirm() {
            return Ok(false);
        }
        let counts = Counters::default();
        let events: VecDeque<HistoryEvent> = VecDeque::new();
        write_json(&mut self.kv, EVENTS_KEY, &events)?;
        write_json(&mut self.kv, COUNTS_KEY, &counts)?;
        self.kv.set(SESSION_KEY, &now_ms.to_string())?;
        self.events = events;
        self.counts = counts;
        self.session_start = now_ms;
        Ok(true)
    }

    pub fn counts(&self) -> Counters {
        self.counts
    }

    pub fn events(&self) -> &VecDeque<HistoryEvent> {
        &self.events
    }

    /// Up to `n` most recent events, newest first.
    pub fn recent(&self, n: usize) -> Vec<&HistoryEvent> {
        self.events.iter().rev().take(n).collect()
    }

    pub fn session_start(&self) -> i64 {
        self.session_start
    }

    pub fn elapsed(&self, now_ms: i64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.session_start).max(0) as u64)
    }

    /// Urgent escalation: persistent "inspect the machine" banner.
    pub fn urgent(&self) -> bool {
        self.counts.anomalies >= URGENT_ANOMALIES
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_elapsed(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

// Unreadable JSON degrades to the empty default rather than wedging the store.
fn read_events<S: KeyValueStore>(kv: &S) -> Result<VecDeque<HistoryEvent>, StoreError> {
    let Some(raw) = kv.get(EVENTS_KEY)? else {
        return Ok(VecDeque::new());
    };
    match serde_json::from_str::<VecDeque<HistoryEvent>>(&raw) {
        Ok(mut events) => {
            while events.len() > MAX_EVENTS {
                events.pop_front();
            }
            Ok(events)
        }
        Err(e) => {
            warn!(error = %e, "discarding unreadable {EVENTS_KEY}");
            Ok(VecDeque::new())
        }
    }
}

fn read_counts<S: KeyValueStore>(kv: &S) -> Result<Counters, StoreError> {
    let Some(raw) = kv.get(COUNTS_KEY)? else {
        return Ok(Counters::default());
    };
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "discarding unreadable {COUNTS_KEY}");
        Counters::default()
    }))
}

fn read_session<S: KeyValueStore>(kv: &S) -> Result<Option<i64>, StoreError> {
    Ok(kv.get(SESSION_KEY)?.and_then(|s| s.trim().parse().ok()))
}

fn write_json<S: KeyValueStore, T: Serialize>(
    kv: &mut S,
    key: &'static str,
    value: &T,
) -> Result<(), StoreError> {
    let s = serde_json::to_string(value).map_err(|source| StoreError::Encode { key, source })?;
    kv.set(key, &s)
}
