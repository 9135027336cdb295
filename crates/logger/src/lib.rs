use std::sync::Mutex;

use anyhow::anyhow;

pub trait Logger: Clone {
    fn log(&self, message: impl Into<String>);
    fn warn(&self, message: impl Into<String>) {
        self.log(format!("warning: {}", message.into()));
    }
    fn error(&self, message: impl Into<String>) {
        self.log(format!("error: {}", message.into()));
    }
}

impl<T: Logger> Logger for &T {
    fn log(&self, message: impl Into<String>) {
        (*self).log(message);
    }
    fn warn(&self, message: impl Into<String>) {
        (*self).warn(message);
    }
    fn error(&self, message: impl Into<String>) {
        (*self).error(message);
    }
}

/// Logger that swallows everything. For callers that only want the
/// structured warnings a graph accumulates.
#[derive(Clone, Copy, Default)]
pub struct NullLogger;
impl Logger for NullLogger {
    fn log(&self, _message: impl Into<String>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Logger that records each message with its severity, so tests can assert
/// on what the analysis reported and at which level.
pub struct MemoryLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, level: Level, message: String) {
        self.entries
            .lock()
            .expect("locking the log entries should not fail!")
            .push((level, message));
    }

    pub fn entries(&self) -> Result<Vec<(Level, String)>, anyhow::Error> {
        self.entries
            .try_lock()
            .map_err(|err| anyhow!("error unlocking MemoryLogger entries: {err}"))
            .map(|entries| entries.clone())
    }

    /// The warning-level messages, in the order they were reported.
    pub fn warnings(&self) -> Result<Vec<String>, anyhow::Error> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, message)| message)
            .collect())
    }
}

impl Logger for &MemoryLogger {
    fn log(&self, message: impl Into<String>) {
        self.record(Level::Info, message.into());
    }
    fn warn(&self, message: impl Into<String>) {
        self.record(Level::Warn, message.into());
    }
    fn error(&self, message: impl Into<String>) {
        self.record(Level::Error, message.into());
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}
