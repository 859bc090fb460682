// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uamirror
//!
//! Supervisory client that mirrors the variables of an industrial
//! controller's address space and keeps them under live monitoring.
//!
//! The crate is organised around five components:
//!
//! - **BrowseEngine**: depth-first discovery of variables below a root
//! - **MonitorManager**: registration set and the single data-change subscription
//! - **TypeCoercer**: conversion of proposed write values to wire types
//! - **AddressSpaceCache**: discovered items, persisted as a JSON file
//! - **ClientFacade**: connection lifecycle and the public operations
//!
//! Each component reports through an [`EventEmitter`] onto a shared
//! [`EventBus`]; consumers subscribe to typed [`ClientEvent`]s.
//!
//! The transport is abstracted by the [`Session`] trait. A fully in-memory
//! [`SimulatedSession`] is provided for tests and demonstrations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uamirror::{ClientFacade, MirrorConfig, NodeId, SimulatedSession};
//!
//! let config = MirrorConfig::builder()
//!     .endpoint("opc.tcp://plc:4840")
//!     .build()?;
//! let client = ClientFacade::new(config, Arc::new(SimulatedSession::new()))?;
//!
//! client.connect().await?;
//! client.browse(&NodeId::objects_folder(), true).await?;
//! client.start_monitoring().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod types;

// =============================================================================
// Components
// =============================================================================

pub mod browse;
pub mod cache;
pub mod coercion;
pub mod facade;
pub mod monitor;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::*;
pub use types::*;

pub use browse::{BrowseEngine, BrowseReport, BrowseStatistics};
pub use cache::{AddressSpaceCache, BrowseGuard, Upsert};
pub use coercion::{Coerced, TypeCoercer, WireType, WireValue};
pub use config::{
    load_config, BrowseSettings, CacheSettings, ConfigFormat, ConfigLoader, EventSettings,
    MirrorConfig, MirrorConfigBuilder, MonitoredItemSettings, SubscriptionSettings,
};
pub use events::{ClientEvent, EventBus, EventBusStats, EventEmitter, EventSubscriber, LogLevel};
pub use facade::ClientFacade;
pub use monitor::{ChangeEvent, ChangeSubscriber, MonitorManager, MonitorStats};
pub use session::{
    Credentials, DataChangeNotification, DataValue, ExtensionObject, NodeClass,
    NotificationSink, ReferenceDescription, Session, SessionEvent, SimulatedNode,
    SimulatedSession, StatusCode, TimestampsToReturn, Variant, WriteRecord,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
