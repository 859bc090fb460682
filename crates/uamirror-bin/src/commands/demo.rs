// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `demo` command.
//!
//! Runs the complete client against an in-memory controller:
//!
//! ```text
//! Objects
//! └── Line1
//!     ├── Running   Boolean
//!     ├── Motor
//!     │   ├── Speed     Int32
//!     │   └── Setpoint  Float
//!     ├── Recipe    RecipeType (structure)
//!     └── Count     Int16
//! ```

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use uamirror::{
    data_type_ids, ClientFacade, ExtensionObject, MirrorConfig, NodeId, SimulatedNode,
    SimulatedSession, Variant,
};

use crate::cli::{Cli, DemoArgs};
use crate::error::{BinError, BinResult};

const DEMO_ENDPOINT: &str = "opc.tcp://simulated:4840";

fn node(name: &str) -> NodeId {
    NodeId::string(2, name)
}

fn builtin(code: u32) -> NodeId {
    NodeId::numeric(0, code)
}

/// Builds the demo address space.
fn plant() -> SimulatedSession {
    let line = node("Line1");
    let motor = node("Line1.Motor");
    let recipe_type = node("RecipeType");

    let mut recipe = serde_json::Map::new();
    recipe.insert("speed".into(), json!(20));
    recipe.insert("mode".into(), json!("auto"));

    SimulatedSession::new()
        .with_structure(recipe_type.clone(), ["speed", "mode"])
        .with_node(&NodeId::objects_folder(), SimulatedNode::object(line.clone(), "Line1"))
        .with_node(
            &line,
            SimulatedNode::variable(
                node("Line1.Running"),
                "Running",
                builtin(data_type_ids::BOOLEAN),
                Variant::Boolean(false),
            ),
        )
        .with_node(&line, SimulatedNode::object(motor.clone(), "Motor"))
        .with_node(
            &motor,
            SimulatedNode::variable(
                node("Line1.Motor.Speed"),
                "Speed",
                builtin(data_type_ids::INT32),
                Variant::Int32(1450),
            ),
        )
        .with_node(
            &motor,
            SimulatedNode::variable(
                node("Line1.Motor.Setpoint"),
                "Setpoint",
                builtin(data_type_ids::FLOAT),
                Variant::Float(42.0),
            ),
        )
        .with_node(
            &line,
            SimulatedNode::variable(
                node("Line1.Recipe"),
                "Recipe",
                recipe_type.clone(),
                Variant::ExtensionObject(ExtensionObject::new(recipe_type, recipe)),
            ),
        )
        .with_node(
            &line,
            SimulatedNode::variable(
                node("Line1.Count"),
                "Count",
                builtin(data_type_ids::INT16),
                Variant::Int16(0),
            )
            .read_only(),
        )
}

/// Executes the `demo` command.
pub async fn demo(_cli: &Cli, args: DemoArgs) -> BinResult<()> {
    let session = Arc::new(plant());
    let config = MirrorConfig::builder()
        .endpoint(DEMO_ENDPOINT)
        .cache_directory(&args.cache_dir)
        .build()?;
    let client = ClientFacade::new(config, session.clone())?;
    let mut events = client.subscribe_events();

    client
        .connect()
        .await
        .context("connect to the simulated controller")?;

    for (root, result) in client.browse_configured().await {
        let report = result.with_context(|| format!("browse {}", root))?;
        info!(
            root = %report.root,
            visited = report.visited,
            discovered = report.discovered,
            registered = report.registered,
            "Browse complete"
        );
    }

    let monitored = client.start_monitoring().await?;
    info!(monitored, "Monitoring started");

    let speed = node("Line1.Motor.Speed");
    for i in 1..=args.notifications {
        session.notify(&speed, Variant::Int32(1450 + 10 * i as i32));
    }

    // Writes report their own failures on the event bus.
    client.switch_bool_value(&node("Line1.Running")).await;
    client.write(&node("Line1.Motor.Setpoint"), json!("47.5")).await;
    client.write(&node("Line1.Recipe"), json!({ "speed": 30 })).await;
    client.write(&node("Line1.Count"), json!(5)).await;

    client.disconnect().await?;

    println!("Events:");
    for event in events.drain().into_iter().filter(|e| !e.is_log()) {
        let payload = serde_json::to_string(&event).map_err(|e| BinError::runtime(e.to_string()))?;
        println!("  {:<20} {}", event.name(), payload);
    }

    println!();
    println!("Summary:");
    println!("  Cached items:  {}", client.cache().len());
    println!("  Cache file:    {}", client.cache().path().display());
    println!("  Writes sent:   {}", session.writes().len());
    println!("  Notifications: {}", client.monitor().stats().notifications);

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_demo_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["uamirror", "demo"]);
        let args = DemoArgs {
            cache_dir: dir.path().join("cache"),
            notifications: 2,
        };

        demo(&cli, args).await.unwrap();

        let items = uamirror::AddressSpaceCache::read_file(
            dir.path().join("cache").join("address_space.json"),
        )
        .unwrap();
        let names: Vec<_> = items.iter().map(|i| i.browse_name.as_str()).collect();
        assert_eq!(names, ["Running", "Speed", "Setpoint", "Recipe", "Count"]);
    }
}
