// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use uamirror::{Credentials, MirrorConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = uamirror::load_config(config_path)
        .map_err(|e| BinError::Configuration(format!("Configuration validation failed: {}", e)))?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Endpoint: {}", config.endpoint);
            println!("  Identity: {}", identity(&config.credentials));
            println!("  Cache file: {}", config.cache.path().display());
            println!(
                "  Publishing interval: {}",
                humanize(config.subscription.publishing_interval)
            );
            println!(
                "  Sampling interval: {} (queue {})",
                humanize(config.monitoring.sampling_interval),
                config.monitoring.queue_size
            );
            println!("  Roots: {}", config.browse.roots.len());

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": config.endpoint,
                    "identity": identity(&config.credentials),
                    "cache_file": config.cache.path().display().to_string(),
                    "roots": config.browse.roots.len(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).map_err(|e| BinError::runtime(e.to_string()))?
            );
        }
    }

    Ok(())
}

fn collect_warnings(config: &MirrorConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.browse.roots.is_empty() {
        warnings.push("No browse roots configured".to_string());
    }
    if !config.browse.monitor_new_items {
        warnings.push("Newly discovered items are not monitored".to_string());
    }
    if config.monitoring.sampling_interval > config.subscription.publishing_interval {
        warnings.push("Sampling interval is longer than the publishing interval".to_string());
    }
    if let Some(parent) = config.cache.directory.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            warnings.push(format!(
                "Parent of cache directory does not exist: {}",
                parent.display()
            ));
        }
    }

    warnings
}

fn identity(credentials: &Credentials) -> String {
    match credentials {
        Credentials::Anonymous => "anonymous".to_string(),
        Credentials::UserName { username, .. } => format!("user '{}'", username),
    }
}

fn humanize(duration: std::time::Duration) -> String {
    format!("{:?}", duration)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli_for(path: &std::path::Path) -> Cli {
        Cli::parse_from(["uamirror", "-c", path.to_str().unwrap(), "validate"])
    }

    #[test]
    fn test_validate_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uamirror.yaml");
        std::fs::write(&path, "endpoint: opc.tcp://plc:4840\n").unwrap();

        assert!(validate(&cli_for(&path), ValidateArgs::default()).is_ok());
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate(&cli_for(&dir.path().join("absent.yaml")), ValidateArgs::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uamirror.yaml");
        std::fs::write(&path, "endpoint: http://plc:4840\n").unwrap();

        let err = validate(&cli_for(&path), ValidateArgs::default()).unwrap_err();
        assert!(matches!(err, BinError::Configuration(_)));
    }

    #[test]
    fn test_warnings() {
        let mut config = MirrorConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .build()
            .unwrap();
        assert!(collect_warnings(&config).is_empty());

        config.browse.roots.clear();
        config.browse.monitor_new_items = false;
        assert_eq!(collect_warnings(&config).len(), 2);
    }
}
