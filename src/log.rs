//! Injected logging.
//!
//! Every adapter and operation receives a [`Logger`] explicitly instead of
//! consulting a process-wide handler. The default handler forwards to
//! `tracing`, so the binary's subscriber decides what is printed.

use std::fmt;
use std::sync::Arc;

/// Log domain used by the stream relays and the pipeline.
pub const DOMAIN: &str = "image_bridge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Critical,
    Warning,
    Message,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Warning => "warning",
            LogLevel::Message => "message",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives log records from the bridge.
pub trait LogHandler: Send + Sync {
    fn log(&self, domain: &str, level: LogLevel, message: &str);
}

/// Forwards records to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl LogHandler for TracingHandler {
    fn log(&self, domain: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(domain, level = level.as_str(), "{message}")
            }
            LogLevel::Warning => tracing::warn!(domain, "{message}"),
            LogLevel::Message | LogLevel::Info => {
                tracing::info!(domain, level = level.as_str(), "{message}")
            }
            LogLevel::Debug => tracing::debug!(domain, "{message}"),
        }
    }
}

struct DiscardHandler;

impl LogHandler for DiscardHandler {
    fn log(&self, _domain: &str, _level: LogLevel, _message: &str) {}
}

/// Cheaply cloneable handle to a [`LogHandler`].
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn LogHandler>,
}

impl Logger {
    pub fn new(handler: impl LogHandler + 'static) -> Self {
        Logger {
            handler: Arc::new(handler),
        }
    }

    pub fn from_arc(handler: Arc<dyn LogHandler>) -> Self {
        Logger { handler }
    }

    pub fn tracing() -> Self {
        Self::new(TracingHandler)
    }

    /// A logger that drops every record.
    pub fn discard() -> Self {
        Self::new(DiscardHandler)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.handler.log(DOMAIN, level, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}
