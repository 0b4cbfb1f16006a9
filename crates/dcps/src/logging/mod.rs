// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time configurable logging.
//!
//! The crate logs through the `log` facade with bracketed subsystem tags
//! (`[writer]`, `[discovery]`, `[waitset]`, ...). With the `logging` feature,
//! [`init_logger`] routes those records to a console or file [`Output`].
//! The `trace` feature turns `trace_fn!` into function-entry logging.
//!
//! ```ignore
//! use dcps::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
//! ```

#[cfg(feature = "logging")]
pub mod logger;
#[cfg(feature = "logging")]
mod output;

#[cfg(feature = "logging")]
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

#[cfg(feature = "logging")]
pub use logger::{flush_logger, init_logger};

/// Trace function entry (when `trace` feature enabled).
#[macro_export]
#[cfg(all(feature = "logging", feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        let _ = $crate::logging::logger::trace_entry($fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(all(feature = "logging", feature = "trace")))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
