//! The log sink.
//!
//! The runtime only depends on the narrow [`LogSink`] interface: leveled
//! emission, a minimum-level control and a subscribable event stream.
//! [`Logger`] is the default implementation; it forwards every accepted
//! message to `tracing` and then hands a [`LogEvent`] to each observer.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::service::Service;

// =============================================================================
// LogLevel
// =============================================================================

/// Severity of a log message, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Returns the equivalent `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}' (expected debug, info, warn or error)")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

// =============================================================================
// Events and observers
// =============================================================================

/// A message accepted by a [`LogSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: OffsetDateTime,
}

/// Handle returned by [`LogSink::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback receiving every accepted [`LogEvent`].
pub type LogObserver = Arc<dyn Fn(&LogEvent) + Send + Sync>;

// =============================================================================
// LogSink
// =============================================================================

/// Leveled log emission with a subscribable event stream.
///
/// Registered in the service registry as `dyn LogSink`.
pub trait LogSink: Service {
    /// Emits `message` at `level` if the level passes the current filter.
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Sets the minimum level that is emitted downstream.
    fn set_level(&self, level: LogLevel);

    /// Returns the minimum emitted level.
    fn level(&self) -> LogLevel;

    /// Adds an observer. Observers are called synchronously, in subscription
    /// order, on the emitting thread.
    fn subscribe(&self, observer: LogObserver) -> SubscriptionId;

    /// Removes an observer. Returns `false` if `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

// =============================================================================
// Logger
// =============================================================================

/// Default [`LogSink`] backed by `tracing`.
pub struct Logger {
    level: RwLock<LogLevel>,
    observers: RwLock<Vec<(SubscriptionId, LogObserver)>>,
    next_id: AtomicU64,
}

impl Logger {
    /// Creates a logger emitting [`LogLevel::Info`] and above.
    pub fn new() -> Self {
        Self::with_level(LogLevel::default())
    }

    /// Creates a logger emitting `level` and above.
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level: RwLock::new(level),
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribes a closure.
    pub fn on_log<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(observer))
    }

    /// Returns the number of subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn notify(&self, event: &LogEvent) {
        // Snapshot so observers can log or (un)subscribe without deadlocking.
        let observers: Vec<LogObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::warn!(target: "nvos", "Log observer panicked while handling an event");
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &*self.level.read())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl Service for Logger {}

impl LogSink for Logger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.level() {
            return;
        }

        match level {
            LogLevel::Debug => tracing::debug!(target: "nvos", "{message}"),
            LogLevel::Info => tracing::info!(target: "nvos", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "nvos", "{message}"),
            LogLevel::Error => tracing::error!(target: "nvos", "{message}"),
        }

        let event = LogEvent {
            level,
            message: message.to_owned(),
            timestamp: OffsetDateTime::now_utc(),
        };
        self.notify(&event);
    }

    fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    fn level(&self) -> LogLevel {
        *self.level.read()
    }

    fn subscribe(&self, observer: LogObserver) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }
}
