// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscriber setup for the `uamirror` binary.
//!
//! The library only emits `tracing` records, each tagged with the
//! `component` that produced it (`client`, `browse`, `monitor`, `cache`,
//! `session`). Records go to stderr: stdout carries command output such as
//! `search --format json`, which must stay parseable.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::cli::LogFormat;

// =============================================================================
// Logging Initialization
// =============================================================================

/// Installs the process-wide subscriber.
///
/// `level` comes from `--log-level`, `-q` or `-v`; `RUST_LOG` overrides it,
/// e.g. `RUST_LOG=uamirror::browse=trace` to follow a single traversal.
///
/// ```ignore
/// uamirror_bin::logging::init_logging("debug", LogFormat::Compact);
/// ```
pub fn init_logging(level: &str, format: LogFormat) {
    let ansi = std::io::stderr().is_terminal();

    let layer = match format {
        // Operator at a terminal running `demo` or `validate`.
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(ansi)
            .boxed(),
        // One object per record, fields such as `error_code` kept as keys.
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(ansi)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(layer)
        .init();
}

/// Resolves the filter: `RUST_LOG`, else `level`, else `info` when `level`
/// does not parse.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_does_not_panic() {
        let _ = build_filter("not a level=");
        let _ = build_filter("debug,uamirror=trace");
    }
}
