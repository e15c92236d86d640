//! Leveled log sink used by the pool for lifecycle diagnostics

use parking_lot::Mutex;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A single timestamped log entry
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: SystemTime,
    pub level: LogLevel,
    pub message: String,
}

/// Destination for pool diagnostics
///
/// Implementations must emit synchronously; the pool calls `log` while it
/// holds its lock.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

fn emit(source: &str, level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => tracing::info!(pool = source, "{}", message),
        LogLevel::Warning => tracing::warn!(pool = source, "{}", message),
        LogLevel::Error => tracing::error!(pool = source, "{}", message),
    }
}

/// Logger that forwards every record to `tracing`
#[derive(Debug, Clone)]
pub struct TracingLogger {
    source: String,
}

impl TracingLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("pool")
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        emit(&self.source, level, message);
    }
}

/// Logger that keeps records in memory and also forwards them to `tracing`
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{LogLevel, Logger, MemoryLogger};
///
/// let logger = MemoryLogger::new("buffers");
/// logger.log(LogLevel::Warning, "pool at capacity");
///
/// let records = logger.records();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].level, LogLevel::Warning);
/// assert_eq!(logger.count(LogLevel::Warning), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryLogger {
    source: String,
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Number of records logged at exactly `level`
    pub fn count(&self, level: LogLevel) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|record| record.level == level)
            .count()
    }

    pub fn contains(&self, level: LogLevel, fragment: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|record| record.level == level && record.message.contains(fragment))
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push(LogRecord {
            timestamp: SystemTime::now(),
            level,
            message: message.to_string(),
        });
        emit(&self.source, level, message);
    }
}
