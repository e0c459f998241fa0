//! Injected logging handle.
//!
//! Every component that logs receives a [`Logger`] instead of reaching for a
//! process-wide logger object. The handle forwards to the `log` facade and
//! prefixes each line with the owning peer's label, so several peers running
//! in one process stay distinguishable.

use log::Level;
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Logger {
    label: Arc<str>,
}

impl Logger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Arc::from(label.into()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns a handle for a sub-component, e.g. `host/relay`.
    pub fn scoped(&self, scope: &str) -> Logger {
        Logger::new(format!("{}/{}", self.label, scope))
    }

    pub fn log(&self, level: Level, message: impl Display) {
        log::log!(level, "[{}] {}", self.label, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new("snake")
    }
}
