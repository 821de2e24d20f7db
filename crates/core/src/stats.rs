//! Process-lifetime bot statistics.
//!
//! A single [`BotStats`] is created at startup and shared as `Arc<BotStats>`
//! with every handler, the health endpoint and the keep-alive task. Counters
//! only ever grow; they reset when the process restarts.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug)]
pub struct BotStats {
    started_at: DateTime<Utc>,
    messages_received: AtomicU64,
    commands_processed: AtomicU64,
    errors: AtomicU64,
    last_ping_millis: AtomicI64,
}

impl Default for BotStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BotStats {
    pub fn new() -> Self {
        Self::with_start_time(Utc::now())
    }

    pub fn with_start_time(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            messages_received: AtomicU64::new(0),
            commands_processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_ping_millis: AtomicI64::new(started_at.timestamp_millis()),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ping(&self, at: DateTime<Utc>) {
        self.last_ping_millis.fetch_max(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_ping(&self) -> DateTime<Utc> {
        millis_to_datetime(self.last_ping_millis.load(Ordering::Relaxed), self.started_at)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> StatsSnapshot {
        let uptime_secs = (now - self.started_at).num_seconds().max(0) as u64;
        StatsSnapshot {
            started_at: self.started_at,
            taken_at: now,
            uptime_secs,
            messages_received: self.messages_received.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_ping: self.last_ping(),
        }
    }
}

fn millis_to_datetime(millis: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or(fallback)
}

/// Point-in-time copy of [`BotStats`]; every renderer formats from one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub messages_received: u64,
    pub commands_processed: u64,
    pub errors: u64,
    pub last_ping: DateTime<Utc>,
}

impl StatsSnapshot {
    pub fn uptime_minutes(&self) -> u64 {
        self.uptime_secs / 60
    }

    pub fn uptime_formatted(&self) -> String {
        format_uptime(self.uptime_secs)
    }

    pub fn error_rate(&self) -> ErrorRate {
        ErrorRate::from_counts(self.errors, self.commands_processed)
    }
}

/// `{h}h {m}m {s}s`, hours unbounded.
pub fn format_uptime(uptime_secs: u64) -> String {
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// ISO-8601 UTC with millisecond precision, e.g. `2026-01-01T00:00:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Errors as a percentage of processed commands.
///
/// The denominator is commands processed, so errors raised by plain messages or
/// keep-alive pings still count toward the numerator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ErrorRate {
    NoCommands,
    Percent(f64),
}

impl ErrorRate {
    pub fn from_counts(errors: u64, commands_processed: u64) -> Self {
        if commands_processed == 0 {
            return Self::NoCommands;
        }
        Self::Percent(errors as f64 / commands_processed as f64 * 100.0)
    }

    /// `0` or the percentage with two decimals, without a `%` suffix.
    pub fn display_value(&self) -> String {
        match self {
            Self::NoCommands => "0".to_owned(),
            Self::Percent(value) => format!("{value:.2}"),
        }
    }
}

impl Serialize for ErrorRate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::NoCommands => serializer.serialize_u8(0),
            Self::Percent(_) => serializer.serialize_str(&self.display_value()),
        }
    }
}
