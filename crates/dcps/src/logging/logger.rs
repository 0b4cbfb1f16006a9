// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger instance and `log` facade bridge.
//!
//! Library code logs through `log::debug!` and friends; `init_logger` installs
//! a `log::Log` implementation that forwards records to the configured
//! [`Output`].

use super::output::{LogLevel, Output};
use parking_lot::RwLock;
use std::io;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<GlobalLogger> = OnceLock::new();

/// Global logger state: active output and level filter.
pub struct GlobalLogger {
    output: RwLock<Arc<dyn Output>>,
    level_filter: RwLock<LogLevel>,
}

impl GlobalLogger {
    fn write_message(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < *self.level_filter.read() {
            return Ok(());
        }
        self.output.read().write(level, message)
    }

    fn flush_output(&self) -> io::Result<()> {
        self.output.read().flush()
    }
}

impl log::Log for GlobalLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogLevel::from_log(metadata.level()) >= *self.level_filter.read()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("{}", record.args());
        let _ = self.write_message(LogLevel::from_log(record.level()), &message);
    }

    fn flush(&self) {
        let _ = self.flush_output();
    }
}

/// Initialize the global logger with the given output.
///
/// The first call installs the `log` bridge; later calls replace the output
/// and level of the installed logger.
///
/// ```ignore
/// use dcps::logging::{init_logger, ConsoleOutput, LogLevel};
/// init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
/// ```
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        GlobalLogger {
            output: RwLock::new(Arc::clone(&output)),
            level_filter: RwLock::new(level),
        }
    });

    if installed {
        if log::set_logger(logger).is_err() {
            // Another logger owns the facade; keep ours for direct calls.
            return;
        }
    } else {
        *logger.output.write() = output;
        *logger.level_filter.write() = level;
    }
    log::set_max_level(level.to_filter());
}

/// Forward a message to the installed output, if any.
#[inline]
pub(crate) fn log_message(level: LogLevel, message: &str) -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.write_message(level, message),
        None => Ok(()),
    }
}

/// Used by `trace_fn!()`.
#[inline]
#[allow(dead_code)]
pub(crate) fn trace_entry(fn_name: &str) -> io::Result<()> {
    log_message(LogLevel::Debug, &format!("[ENTER:FNC] {}", fn_name))
}

/// Flush the global logger's output. No-op when not initialized.
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.flush_output(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::output::ConsoleOutput;

    #[test]
    fn test_log_message_no_panic() {
        assert!(log_message(LogLevel::Info, "test message").is_ok());
        assert!(flush_logger().is_ok());
    }

    #[test]
    fn test_init_twice_replaces_output() {
        init_logger(Arc::new(ConsoleOutput::new(LogLevel::Warning)), LogLevel::Warning);
        init_logger(Arc::new(ConsoleOutput::new(LogLevel::Error)), LogLevel::Error);
        log::warn!("[logger] filtered out");
        assert!(log_message(LogLevel::Error, "[logger] shown").is_ok());
    }
}
