#![forbid(unsafe_code)]

//! Process-wide instrumentation for frame operations.
//!
//! Core operations open an [`OperationGuard`] via [`begin`]. With debug and
//! profiling both disabled the guard records nothing, so results never depend
//! on the toggles below.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_OPERATIONS: AtomicBool = AtomicBool::new(false);
static LOG_PERFORMANCE: AtomicBool = AtomicBool::new(false);
static PROFILES: Mutex<BTreeMap<String, OperationStats>> = Mutex::new(BTreeMap::new());

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (`info`, `debug`, ...).
    pub level: String,
    pub json: bool,
    pub log_operations: bool,
    pub log_performance: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
            log_operations: false,
            log_performance: false,
        }
    }
}

/// Install the global `tracing` subscriber and apply the operation/performance flags.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|err| TelemetryError::InvalidFilter {
            filter: config.level.clone(),
            reason: err.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|_| TelemetryError::AlreadyInitialized)?;

    configure_logging(config);
    Ok(())
}

/// Apply the operation/performance flags without touching the subscriber.
pub fn configure_logging(config: &LoggingConfig) {
    LOG_OPERATIONS.store(config.log_operations, Ordering::Relaxed);
    LOG_PERFORMANCE.store(config.log_performance, Ordering::Relaxed);
}

// ── Toggles ────────────────────────────────────────────────────────────

pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::Relaxed);
}

#[must_use]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

pub fn enable_profiling() {
    PROFILING_ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable_profiling() {
    PROFILING_ENABLED.store(false, Ordering::Relaxed);
}

#[must_use]
pub fn is_profiling_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

// ── Structured events ──────────────────────────────────────────────────

pub fn log_operation(operation: &str, message: &str, context: Option<&str>) {
    if !LOG_OPERATIONS.load(Ordering::Relaxed) {
        return;
    }
    tracing::info!(operation, context = context.unwrap_or(""), "{message}");
}

pub fn log_error(operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(operation, context = context.unwrap_or(""), error, "operation failed");
}

// ── Profiling ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub total_elapsed: Duration,
    pub max_elapsed: Duration,
    pub total_rows: u64,
    pub total_bytes: u64,
}

impl OperationStats {
    #[must_use]
    pub fn mean_elapsed(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total_elapsed / u32::try_from(self.count).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.total_elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_rows as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_operations: u64,
    pub total_elapsed_ms: f64,
    pub total_rows_processed: u64,
    pub total_bytes: u64,
}

fn profiles() -> MutexGuard<'static, BTreeMap<String, OperationStats>> {
    PROFILES.lock().unwrap_or_else(PoisonError::into_inner)
}

#[must_use]
pub fn operation_stats(operation: &str) -> Option<OperationStats> {
    profiles().get(operation).cloned()
}

#[must_use]
pub fn overall_stats() -> OverallStats {
    profiles()
        .values()
        .fold(OverallStats::default(), |mut acc, stats| {
            acc.total_operations += stats.count;
            acc.total_elapsed_ms += stats.total_elapsed.as_secs_f64() * 1000.0;
            acc.total_rows_processed += stats.total_rows;
            acc.total_bytes += stats.total_bytes;
            acc
        })
}

pub fn clear_profiling_data() {
    profiles().clear();
}

/// Human-readable table of the accumulated profiles.
#[must_use]
pub fn profiling_report() -> String {
    let profiles = profiles();
    let mut out = String::from("operation                count   total_ms    mean_ms       rows\n");
    for (name, stats) in profiles.iter() {
        let _ = writeln!(
            out,
            "{name:<24} {:>5} {:>10.3} {:>10.3} {:>10}",
            stats.count,
            stats.total_elapsed.as_secs_f64() * 1000.0,
            stats.mean_elapsed().as_secs_f64() * 1000.0,
            stats.total_rows,
        );
    }
    out
}

fn record(operation: &str, elapsed: Duration, rows: usize, bytes: usize) {
    let mut profiles = profiles();
    let stats = profiles.entry(operation.to_owned()).or_default();
    stats.count += 1;
    stats.total_elapsed += elapsed;
    stats.max_elapsed = stats.max_elapsed.max(elapsed);
    stats.total_rows += rows as u64;
    stats.total_bytes += bytes as u64;
}

/// Scope of one instrumented operation. Records on drop.
#[must_use = "the guard records when dropped"]
pub struct OperationGuard {
    operation: &'static str,
    started: Option<Instant>,
    rows: usize,
    bytes: usize,
}

/// Open an instrumented scope for `operation`.
pub fn begin(operation: &'static str) -> OperationGuard {
    let active = is_debug_enabled()
        || is_profiling_enabled()
        || LOG_PERFORMANCE.load(Ordering::Relaxed);
    OperationGuard {
        operation,
        started: active.then(Instant::now),
        rows: 0,
        bytes: 0,
    }
}

impl OperationGuard {
    pub fn rows(&mut self, rows: usize) -> &mut Self {
        self.rows = rows;
        self
    }

    pub fn bytes(&mut self, bytes: usize) -> &mut Self {
        self.bytes = bytes;
        self
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let Some(started) = self.started else {
            return;
        };
        let elapsed = started.elapsed();

        if is_debug_enabled() {
            tracing::debug!(
                operation = self.operation,
                rows = self.rows,
                bytes = self.bytes,
                elapsed_us = elapsed.as_micros() as u64,
                "operation finished"
            );
        }
        if LOG_PERFORMANCE.load(Ordering::Relaxed) {
            let secs = elapsed.as_secs_f64();
            let rows_per_sec = if secs > 0.0 { self.rows as f64 / secs } else { 0.0 };
            tracing::info!(
                operation = self.operation,
                elapsed_ms = secs * 1000.0,
                rows = self.rows,
                rows_per_sec,
                "performance"
            );
        }
        if is_profiling_enabled() {
            record(self.operation, elapsed, self.rows, self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::{
        LoggingConfig, TelemetryError, begin, clear_profiling_data, configure_logging,
        disable_debug, disable_profiling, enable_debug, enable_profiling, init_logging,
        is_debug_enabled, is_profiling_enabled, log_error, log_operation, operation_stats,
        overall_stats, profiling_report,
    };

    // Toggles are process-wide; serialize the tests that flip them.
    static SERIAL: Mutex<()> = Mutex::new(());

    #[test]
    fn disabled_guard_records_nothing() {
        let _lock = SERIAL.lock().expect("serial");
        disable_profiling();
        clear_profiling_data();
        {
            let mut guard = begin("quiet_op");
            guard.rows(10);
        }
        assert!(operation_stats("quiet_op").is_none());
    }

    #[test]
    fn profiling_accumulates_per_operation() {
        let _lock = SERIAL.lock().expect("serial");
        enable_profiling();
        clear_profiling_data();
        for rows in [3, 4] {
            let mut guard = begin("profiled_op");
            guard.rows(rows).bytes(64);
        }
        disable_profiling();

        let stats = operation_stats("profiled_op").expect("recorded");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_rows, 7);
        assert_eq!(stats.total_bytes, 128);

        let overall = overall_stats();
        assert_eq!(overall.total_operations, 2);
        assert_eq!(overall.total_rows_processed, 7);
        assert!(profiling_report().contains("profiled_op"));

        clear_profiling_data();
        assert_eq!(overall_stats().total_operations, 0);
    }

    #[test]
    fn debug_toggle_round_trips() {
        let _lock = SERIAL.lock().expect("serial");
        enable_debug();
        assert!(is_debug_enabled());
        disable_debug();
        assert!(!is_debug_enabled());
        assert!(!is_profiling_enabled());
    }

    #[test]
    fn second_subscriber_install_is_rejected() {
        let _lock = SERIAL.lock().expect("serial");
        let config = LoggingConfig {
            level: "warn".to_owned(),
            log_operations: true,
            ..LoggingConfig::default()
        };
        // The first install may succeed or find an earlier one; the second never succeeds.
        let _ = init_logging(&config);
        let err = init_logging(&config).expect_err("already installed");
        assert!(matches!(err, TelemetryError::AlreadyInitialized));

        log_operation("install_check", "subscriber in place", Some("unit"));
        log_error("install_check", "simulated failure", None);
        configure_logging(&LoggingConfig::default());
    }

    #[test]
    fn profiling_records_under_operation_name_only_when_enabled() {
        let _lock = SERIAL.lock().expect("serial");
        clear_profiling_data();
        enable_debug();
        enable_profiling();
        {
            let mut guard = begin("named_op");
            guard.rows(5);
        }
        disable_debug();
        disable_profiling();
        {
            let mut guard = begin("named_op");
            guard.rows(50);
        }

        let stats = operation_stats("named_op").expect("recorded");
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_rows, 5);
        assert!(operation_stats("other_op").is_none());
        clear_profiling_data();
    }

    #[test]
    fn logging_config_defaults_from_partial_json() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level":"debug","json":true}"#).expect("config");
        assert_eq!(config.level, "debug");
        assert!(config.json);
        assert!(!config.log_operations);
    }
}
