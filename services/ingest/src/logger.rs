//! Logging capability handed to every component instead of a global logger.

use std::cell::RefCell;

pub trait IngestLogger {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to `tracing`; what binaries use.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl IngestLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every event in memory so tests can assert on what was reported.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: RefCell<Vec<LogEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.events.borrow_mut().push(LogEvent {
            level,
            message: message.to_string(),
        });
    }

    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.borrow().clone()
    }

    /// True if any event at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.events
            .borrow()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl IngestLogger for MemoryLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_levels() {
        let logger = MemoryLogger::new();
        logger.info("found sheet 'Dashboard'");
        logger.warn("no expense data");

        assert_eq!(logger.events().len(), 2);
        assert!(logger.contains(LogLevel::Warn, "expense"));
        assert!(!logger.contains(LogLevel::Error, "expense"));
    }
}
