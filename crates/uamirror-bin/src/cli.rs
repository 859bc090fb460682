// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `validate`: Validate configuration file
//! - `search`: Search the cache file by browse name
//! - `show`: Show one cached item
//! - `demo`: Run the client against the simulated controller
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uamirror - address-space mirroring client
///
/// Discovers the variables of an industrial controller, mirrors them to a
/// local cache file and keeps them under live monitoring.
#[derive(Parser, Debug)]
#[command(
    name = "uamirror",
    author = "Sylvex <contact@sylvex.io>",
    version = uamirror::VERSION,
    about = "Address-space mirroring and monitoring client",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uamirror.yaml",
        env = "UAMIRROR_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "UAMIRROR_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "UAMIRROR_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate the configuration file
    ///
    /// Parses and validates the configuration without connecting.
    Validate(ValidateArgs),

    /// Search cached items by browse name
    ///
    /// Reads the cache file offline; matching ignores case.
    Search(SearchArgs),

    /// Show one cached item
    Show(ShowArgs),

    /// Run the client against the built-in simulated controller
    ///
    /// Connects, browses, starts monitoring, pushes a few changes and
    /// writes, then prints the events the client produced.
    Demo(DemoArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Location of the cache file to inspect.
#[derive(Args, Debug, Clone, Default)]
pub struct CacheFileArgs {
    /// Cache file (default: the one named by the configuration)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Arguments for the `search` command.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Substring of the browse name
    pub pattern: String,

    #[command(flatten)]
    pub cache: CacheFileArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `show` command.
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Node identifier (e.g. `ns=2;s=Line1.Motor.Speed`)
    pub node_id: String,

    #[command(flatten)]
    pub cache: CacheFileArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `demo` command.
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Directory the demo cache file is written to
    #[arg(long, default_value = "demo-cache")]
    pub cache_dir: PathBuf,

    /// Number of simulated value changes to push
    #[arg(short, long, default_value = "3")]
    pub notifications: u32,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["uamirror", "validate", "--show-config"]);
        if let Commands::Validate(args) = cli.command {
            assert!(args.show_config);
            assert_eq!(args.format, OutputFormat::Text);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from(["uamirror", "search", "motor", "--file", "/tmp/a.json", "-f", "json"]);
        if let Commands::Search(args) = cli.command {
            assert_eq!(args.pattern, "motor");
            assert_eq!(args.cache.file, Some(PathBuf::from("/tmp/a.json")));
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_show_command() {
        let cli = Cli::parse_from(["uamirror", "show", "ns=2;s=Pump"]);
        if let Commands::Show(args) = cli.command {
            assert_eq!(args.node_id, "ns=2;s=Pump");
            assert!(args.cache.file.is_none());
        } else {
            panic!("Expected Show command");
        }
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::parse_from(["uamirror", "demo"]);
        if let Commands::Demo(args) = cli.command {
            assert_eq!(args.notifications, 3);
            assert_eq!(args.cache_dir, PathBuf::from("demo-cache"));
        } else {
            panic!("Expected Demo command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["uamirror", "-c", "/etc/uamirror.toml", "version"]);
        assert_eq!(cli.config, PathBuf::from("/etc/uamirror.toml"));
    }

    #[test]
    fn test_log_flags() {
        let cli = Cli::parse_from(["uamirror", "--log-format", "compact", "-q", "version"]);
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["uamirror", "-v", "version"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }
}
