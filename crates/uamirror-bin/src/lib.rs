// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uamirror-bin
//!
//! Command-line front end for the uamirror client.
//!
//! This crate owns everything process-wide, which the library leaves to its
//! host:
//!
//! - CLI argument parsing with clap
//! - Logging initialization
//! - Exit codes
//! - Command implementations (validate, search, show, demo, version)
//!
//! ## Usage
//!
//! ```bash
//! # Validate a configuration file
//! uamirror -c uamirror.yaml validate
//!
//! # Search the cache file written by the last browse
//! uamirror search motor
//!
//! # Show one cached item as JSON
//! uamirror show "ns=2;s=Line1.Motor.Speed" --format json
//!
//! # Run the client against the built-in simulated controller
//! uamirror demo
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
