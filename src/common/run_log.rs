// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Immutable, timestamped operator log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Bounded chronological log; the oldest line is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct RunLog {
    target: &'static str,
    capacity: usize,
    lines: Mutex<VecDeque<LogLine>>,
}

pub type SharedRunLog = Arc<RunLog>;

impl RunLog {
    pub fn new(target: &'static str, capacity: usize) -> Self {
        Self {
            target,
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    pub fn shared(target: &'static str, capacity: usize) -> SharedRunLog {
        Arc::new(Self::new(target, capacity))
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!(target: "run_log", log = self.target, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "run_log", log = self.target, "{message}"),
            LogLevel::Error => tracing::error!(target: "run_log", log = self.target, "{message}"),
        }

        let line = LogLine {
            at: Local::now(),
            level,
            message,
        };
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Lines in chronological order.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_at_capacity() {
        let log = RunLog::new("test", 3);
        for i in 0..5 {
            log.info(format!("line {i}"));
        }
        let lines = log.snapshot();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].message, "line 2");
        assert_eq!(lines[2].message, "line 4");
    }

    #[test]
    fn display_prefixes_timestamp() {
        let log = RunLog::new("test", 10);
        log.error("boom");
        let rendered = log.snapshot()[0].to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] boom"));
        assert_eq!(log.snapshot()[0].level, LogLevel::Error);
    }

    #[test]
    fn zero_capacity_still_keeps_latest_line() {
        let log = RunLog::new("test", 0);
        log.info("a");
        log.info("b");
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].message, "b");
    }
}
