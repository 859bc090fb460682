// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `validate`: Validate configuration file
//! - `search`: Search the cache file
//! - `show`: Show one cached item
//! - `demo`: Run against the simulated controller
//! - `version`: Show version information

mod demo;
mod inspect;
mod validate;
mod version;

pub use demo::demo;
pub use inspect::{search, show};
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Search(args) => inspect::search(&cli, args),
        Commands::Show(args) => inspect::show(&cli, args),
        Commands::Demo(args) => demo::demo(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}
