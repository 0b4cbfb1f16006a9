// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sinks the logger forwards formatted records to.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    /// Fixed-width tag used as the line prefix.
    fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    pub(crate) fn from_log(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }

    pub(crate) fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warning => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// Destination for log lines. Shared across threads by the logger.
pub trait Output: Send + Sync {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

/// Any `Write` behind a lock, dropping lines below `threshold`.
struct Sink<W> {
    threshold: LogLevel,
    target: Mutex<W>,
}

impl<W: Write> Sink<W> {
    fn emit(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level >= self.threshold {
            writeln!(self.target.lock(), "[{}] {}", level.tag(), message)?;
        }
        Ok(())
    }
}

/// Writes to stderr.
pub struct ConsoleOutput(Sink<io::Stderr>);

impl ConsoleOutput {
    pub fn new(threshold: LogLevel) -> Self {
        Self(Sink {
            threshold,
            target: Mutex::new(io::stderr()),
        })
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        self.0.emit(level, message)
    }

    fn flush(&self) -> io::Result<()> {
        self.0.target.lock().flush()
    }
}

/// Writes to a file, replacing any previous content.
pub struct FileOutput(Sink<File>);

impl FileOutput {
    pub fn new(path: impl AsRef<Path>, threshold: LogLevel) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self(Sink {
            threshold,
            target: Mutex::new(file),
        }))
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        self.0.emit(level, message)
    }

    fn flush(&self) -> io::Result<()> {
        self.0.target.lock().flush()
    }
}
