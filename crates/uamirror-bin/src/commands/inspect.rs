// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `search` and `show` commands.
//!
//! Both read the cache file offline. A running client deletes and rewrites
//! this file, so what is shown is the state after the last complete browse.

use std::path::PathBuf;

use uamirror::{AddressSpaceCache, DiscoveredItem, NodeId};

use crate::cli::{CacheFileArgs, Cli, OutputFormat, SearchArgs, ShowArgs};
use crate::error::{BinError, BinResult};

/// Executes the `search` command.
pub fn search(cli: &Cli, args: SearchArgs) -> BinResult<()> {
    let items = read_items(cli, &args.cache)?;
    let found = matching(&items, &args.pattern);

    match args.format {
        OutputFormat::Text => {
            if found.is_empty() {
                println!("No item matches '{}'", args.pattern);
            }
            for item in &found {
                println!(
                    "{:<40} {:<24} {:<24} {}",
                    item.node_id.to_string(),
                    item.browse_name,
                    item.data_type.to_string(),
                    item.value
                );
            }
        }
        OutputFormat::Json => print_json(&found)?,
    }
    Ok(())
}

/// Executes the `show` command.
pub fn show(cli: &Cli, args: ShowArgs) -> BinResult<()> {
    let node_id: NodeId = args.node_id.parse()?;
    let items = read_items(cli, &args.cache)?;

    let item = items
        .iter()
        .find(|item| item.node_id == node_id)
        .ok_or_else(|| BinError::not_found(format!("{} is not in the cache", node_id)))?;

    match args.format {
        OutputFormat::Text => {
            println!("Node:       {}", item.node_id);
            println!("Name:       {}", item.browse_name);
            println!("Data type:  {} ({})", item.data_type_id, item.data_type);
            println!("Value:      {}", item.value);
        }
        OutputFormat::Json => print_json(item)?,
    }
    Ok(())
}

fn cache_file(cli: &Cli, args: &CacheFileArgs) -> BinResult<PathBuf> {
    if let Some(file) = &args.file {
        return Ok(file.clone());
    }
    let config = uamirror::load_config(&cli.config).map_err(|e| {
        BinError::from(e).with_context("No --file given and the configuration could not be loaded")
    })?;
    Ok(config.cache.path())
}

fn read_items(cli: &Cli, args: &CacheFileArgs) -> BinResult<Vec<DiscoveredItem>> {
    let path = cache_file(cli, args)?;
    tracing::debug!(path = %path.display(), "Reading cache file");
    Ok(AddressSpaceCache::read_file(path)?)
}

fn matching<'a>(items: &'a [DiscoveredItem], pattern: &str) -> Vec<&'a DiscoveredItem> {
    items.iter().filter(|item| item.name_contains(pattern)).collect()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> BinResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| BinError::runtime(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uamirror::{data_type_ids, Variant};

    fn write_cache(dir: &std::path::Path) -> PathBuf {
        let items = vec![
            DiscoveredItem::new(
                NodeId::string(2, "Line1.Motor.Speed"),
                "Speed",
                NodeId::numeric(0, data_type_ids::INT32),
                Variant::Int32(1450),
            ),
            DiscoveredItem::new(
                NodeId::string(2, "Line1.Running"),
                "Running",
                NodeId::numeric(0, data_type_ids::BOOLEAN),
                Variant::Boolean(true),
            ),
        ];
        let path = dir.join("address_space.json");
        std::fs::write(&path, serde_json::to_string_pretty(&items).unwrap()).unwrap();
        path
    }

    fn cli() -> Cli {
        Cli::parse_from(["uamirror", "-c", "/nonexistent/uamirror.yaml", "version"])
    }

    #[test]
    fn test_matching_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let items = AddressSpaceCache::read_file(write_cache(dir.path())).unwrap();

        let found = matching(&items, "SPE");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].browse_name, "Speed");
        assert_eq!(matching(&items, "n").len(), 1);
    }

    #[test]
    fn test_show_known_and_unknown_node() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_cache(dir.path());
        let args = |node: &str| ShowArgs {
            node_id: node.to_string(),
            cache: CacheFileArgs {
                file: Some(file.clone()),
            },
            format: OutputFormat::Json,
        };

        assert!(show(&cli(), args("ns=2;s=Line1.Running")).is_ok());
        let err = show(&cli(), args("ns=2;s=Line1.Missing")).unwrap_err();
        assert!(matches!(err, BinError::NotFound(_)));
    }

    #[test]
    fn test_search_without_cache_file() {
        let args = SearchArgs {
            pattern: "x".to_string(),
            cache: CacheFileArgs::default(),
            format: OutputFormat::Text,
        };
        let err = search(&cli(), args).unwrap_err();
        assert!(matches!(err, BinError::WithContext { .. }));
    }
}
