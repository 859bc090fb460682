// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session abstraction over the binary protocol stack.
//!
//! The client never talks to the wire directly. Everything it needs from the
//! protocol stack is expressed by the [`Session`] trait: connection and
//! session lifecycle, attribute read/write, reference browsing, subscriptions
//! and construction of typed structure values.
//!
//! Change notifications travel the other way through a [`NotificationSink`]
//! handed to [`Session::monitor_items`]. Sinks are invoked on whatever task
//! the transport uses for publish responses and must never block.

mod simulated;
mod variant;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::broadcast;

use crate::config::{MonitoredItemSettings, SubscriptionSettings};
use crate::error::MirrorResult;
use crate::types::{AttributeId, MonitoredItemSpec, NodeId};

pub use simulated::{SimulatedNode, SimulatedSession, WriteRecord};
pub use variant::{ExtensionObject, Variant};

// =============================================================================
// StatusCode
// =============================================================================

/// Protocol status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: Self = Self(0);
    /// The node id does not refer to a node.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// The attribute is not supported by the node.
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    /// The access level does not allow writing.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// The value supplied has the wrong type.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);

    /// Returns `true` if the status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the status is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.0 & 0x4000_0000 != 0 && self.0 & 0x8000_0000 == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name of well-known codes.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::GOOD => "Good",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            Self::BAD_NOT_WRITABLE => "BadNotWritable",
            Self::BAD_TYPE_MISMATCH => "BadTypeMismatch",
            s if s.is_bad() => "Bad",
            s if s.is_uncertain() => "Uncertain",
            _ => "Good",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// Result of an attribute read.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    /// Value read (Null on bad status).
    pub value: Variant,

    /// Status of the read.
    pub status: StatusCode,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good value stamped now.
    pub fn good(value: Variant) -> Self {
        let now = Utc::now();
        Self {
            value,
            status: StatusCode::GOOD,
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// Creates a bad value.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: Variant::Null,
            status,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }
}

// =============================================================================
// References
// =============================================================================

/// Class of an address-space node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the protocol mask value.
    pub const fn value(&self) -> i32 {
        match self {
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }
}

/// One reference returned by a browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Target node.
    pub node_id: NodeId,

    /// Browse name of the target.
    pub browse_name: String,

    /// Display name of the target.
    pub display_name: String,

    /// Class of the target.
    pub node_class: NodeClass,

    /// `true` for forward references.
    pub is_forward: bool,
}

// =============================================================================
// Credentials & timestamps
// =============================================================================

/// Identity presented when creating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Anonymous identity.
    #[default]
    Anonymous,

    /// User name and password.
    UserName {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
}

/// Timestamps the server returns with notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampsToReturn {
    /// Source timestamp only.
    Source,
    /// Server timestamp only.
    Server,
    /// Both timestamps.
    #[default]
    Both,
    /// No timestamps.
    Neither,
}

// =============================================================================
// Notifications
// =============================================================================

/// A data change pushed by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangeNotification {
    /// Subscription that produced the notification.
    pub subscription_id: u32,

    /// Server handle of the monitored item.
    pub monitored_item_id: u32,

    /// Position of the item in the batch passed to `monitor_items`.
    pub index: usize,

    /// Node that changed.
    pub node_id: NodeId,

    /// New value.
    pub value: DataValue,
}

/// Receiver of data change notifications.
///
/// Called from the transport's notification path; implementations must
/// return promptly and never block.
pub trait NotificationSink: Send + Sync {
    /// Handles one data change.
    fn on_data_change(&self, notification: DataChangeNotification);
}

/// Health and lifecycle notifications of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Keep-alive received.
    KeepAlive,
    /// Connection lost; the transport is reconnecting.
    ConnectionLost {
        /// Reason reported by the transport.
        reason: String,
    },
    /// Connection re-established by the transport.
    ConnectionRestored,
    /// Session closed by the server.
    SessionClosed,
    /// Subscription terminated by the server.
    SubscriptionTerminated {
        /// Terminated subscription.
        subscription_id: u32,
    },
}

// =============================================================================
// Session Trait
// =============================================================================

/// Operations the client needs from the protocol stack.
///
/// Every request suspends the caller until the transport replies. Retry and
/// reconnection with backoff are the implementation's responsibility.
#[async_trait]
pub trait Session: Send + Sync {
    /// Opens the transport connection to `endpoint`.
    async fn connect(&self, endpoint: &str) -> MirrorResult<()>;

    /// Creates and activates a session.
    async fn create_session(&self, credentials: &Credentials) -> MirrorResult<()>;

    /// Returns `true` while a session is open.
    fn is_connected(&self) -> bool;

    /// Reads one attribute of a node.
    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> MirrorResult<DataValue>;

    /// Writes one attribute of a node.
    async fn write(
        &self,
        node_id: &NodeId,
        attribute: AttributeId,
        value: Variant,
    ) -> MirrorResult<StatusCode>;

    /// Lists the references of a node, in server order.
    async fn browse(&self, node_id: &NodeId) -> MirrorResult<Vec<ReferenceDescription>>;

    /// Creates a subscription and returns its handle.
    async fn create_subscription(&self, settings: &SubscriptionSettings) -> MirrorResult<u32>;

    /// Creates monitored items for `items` in one batch.
    ///
    /// Notifications for the batch are delivered to `sink` with `index` set
    /// to the item's position in `items`.
    async fn monitor_items(
        &self,
        subscription_id: u32,
        items: &[MonitoredItemSpec],
        sampling: &MonitoredItemSettings,
        timestamps: TimestampsToReturn,
        sink: Arc<dyn NotificationSink>,
    ) -> MirrorResult<Vec<u32>>;

    /// Terminates a subscription.
    async fn terminate_subscription(&self, subscription_id: u32) -> MirrorResult<()>;

    /// Closes the session.
    async fn close_session(&self) -> MirrorResult<()>;

    /// Closes the transport connection.
    async fn disconnect(&self) -> MirrorResult<()>;

    /// Builds a typed structure value from named fields.
    async fn construct_typed_record(
        &self,
        type_id: &NodeId,
        fields: Map<String, JsonValue>,
    ) -> MirrorResult<Variant>;

    /// Subscribes to transport health events.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classes() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_NOT_WRITABLE.is_bad());
        assert!(StatusCode(0x4000_0000).is_uncertain());
        assert!(!StatusCode(0x4000_0000).is_good());
    }

    #[test]
    fn test_status_code_names() {
        assert_eq!(StatusCode::GOOD.name(), "Good");
        assert_eq!(StatusCode::BAD_ATTRIBUTE_ID_INVALID.name(), "BadAttributeIdInvalid");
        assert_eq!(StatusCode(0x8FFF_0000).name(), "Bad");
        assert_eq!(
            StatusCode::BAD_TYPE_MISMATCH.to_string(),
            "BadTypeMismatch (0x80740000)"
        );
    }

    #[test]
    fn test_data_value_constructors() {
        let good = DataValue::good(Variant::Int32(5));
        assert!(good.status.is_good());
        assert!(good.source_timestamp.is_some());

        let bad = DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(bad.status.is_bad());
        assert!(bad.value.is_null());
    }

    #[test]
    fn test_credentials_serde() {
        let creds: Credentials =
            serde_json::from_str(r#"{"type":"user_name","username":"op","password":"pw"}"#)
                .unwrap();
        assert_eq!(
            creds,
            Credentials::UserName {
                username: "op".into(),
                password: "pw".into()
            }
        );
        assert_eq!(Credentials::default(), Credentials::Anonymous);
    }
}
