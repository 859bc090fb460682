// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data model of the mirror.
//!
//! - **NodeId**: address-space key with parsing and display in the usual
//!   `ns=2;s=Name` text form
//! - **ValueKind**: write-dispatch tag assigned once at discovery time
//! - **DiscoveredItem**: one cached variable of the address space
//! - **MonitoredItemSpec**: registration record of a monitored variable
//!
//! # Examples
//!
//! ```
//! use uamirror::types::NodeId;
//!
//! let node: NodeId = "ns=2;s=Line1.Pump.Running".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//! assert_eq!(node.to_string(), "ns=2;s=Line1.Pump.Running");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{ConfigurationError, MirrorError};
use crate::session::Variant;

// =============================================================================
// NodeId
// =============================================================================

/// Address-space node identifier.
///
/// Equality is structural: two ids are equal when namespace and identifier
/// are equal. Serialized as its text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Namespace index (0 = standard namespace).
    pub namespace_index: u16,

    /// The identifier within the namespace.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// The standard Objects folder (`i=85`).
    pub fn objects_folder() -> Self {
        Self::numeric(0, 85)
    }

    /// Returns the numeric value when this is a standard-namespace numeric id.
    ///
    /// Built-in data type ids live in namespace 0, so this is how a declared
    /// data type is turned into a protocol type code.
    pub fn as_builtin_code(&self) -> Option<u32> {
        match (&self.identifier, self.namespace_index) {
            (NodeIdentifier::Numeric(v), 0) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text form (`ns=2;i=1001`, or `i=85` for namespace 0).
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = MirrorError;

    /// Parses a NodeId from its text form.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=85`, `s=MyNode` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            MirrorError::from(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".into()))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".into()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".into()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid("Empty string identifier".into()));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".into(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_opc_string())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// Identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier (application-specific byte array).
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// Node attributes read or written by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Value attribute.
    #[default]
    Value,
    /// Data type attribute.
    DataType,
}

impl AttributeId {
    /// Returns the protocol numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::Value => 13,
            Self::DataType => 14,
        }
    }
}

// =============================================================================
// Built-in data type ids
// =============================================================================

/// Protocol type codes of the built-in data types used by the coercion table.
pub mod data_type_ids {
    /// Boolean.
    pub const BOOLEAN: u32 = 1;
    /// SByte.
    pub const SBYTE: u32 = 2;
    /// Byte.
    pub const BYTE: u32 = 3;
    /// Int16.
    pub const INT16: u32 = 4;
    /// UInt16.
    pub const UINT16: u32 = 5;
    /// Int32.
    pub const INT32: u32 = 6;
    /// UInt32.
    pub const UINT32: u32 = 7;
    /// Int64.
    pub const INT64: u32 = 8;
    /// UInt64.
    pub const UINT64: u32 = 9;
    /// Float.
    pub const FLOAT: u32 = 10;
    /// Double.
    pub const DOUBLE: u32 = 11;
    /// String.
    pub const STRING: u32 = 12;
    /// DateTime.
    pub const DATE_TIME: u32 = 13;
    /// ByteString.
    pub const BYTE_STRING: u32 = 15;
    /// NodeId.
    pub const NODE_ID: u32 = 17;
    /// Structure (base of all extension objects).
    pub const STRUCTURE: u32 = 22;
}

// =============================================================================
// ValueKind
// =============================================================================

/// Write-dispatch tag of a discovered variable.
///
/// Assigned once when the variable is first read and carried with the cached
/// item and its monitoring registration, so write coercion is a match over
/// this enum instead of an inspection of whatever value happens to be held.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueKind {
    /// Boolean variable.
    Boolean,

    /// Numeric variable with its declared protocol type code.
    Numeric {
        /// Protocol type code (see [`data_type_ids`]).
        #[serde(rename = "typeCode")]
        type_code: u32,
    },

    /// Structured record built from a declared structure type.
    Record {
        /// Declared structure type.
        #[serde(rename = "typeId")]
        type_id: NodeId,
    },

    /// Anything else (strings, arrays, nulls...).
    Other {
        /// Human-readable category.
        category: String,
    },
}

impl ValueKind {
    /// Classifies a value read at discovery time.
    ///
    /// `declared_type` is the node's DataType attribute; numeric variables
    /// take their type code from it when it names a built-in type, and fall
    /// back to the code of the value actually read otherwise.
    pub fn classify(value: &Variant, declared_type: &NodeId) -> Self {
        match value {
            Variant::Boolean(_) => Self::Boolean,
            Variant::ExtensionObject(_) => Self::Record {
                type_id: declared_type.clone(),
            },
            v if v.is_numeric() => Self::Numeric {
                type_code: declared_type
                    .as_builtin_code()
                    .filter(|code| (data_type_ids::SBYTE..=data_type_ids::DOUBLE).contains(code))
                    .unwrap_or_else(|| v.type_code()),
            },
            other => Self::Other {
                category: other.category().to_string(),
            },
        }
    }

    /// Returns a short description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Boolean => "boolean".to_string(),
            Self::Numeric { type_code } => format!("numeric (type code {})", type_code),
            Self::Record { type_id } => format!("record ({})", type_id),
            Self::Other { category } => category.clone(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

// =============================================================================
// DiscoveredItem
// =============================================================================

/// One variable found while browsing, as held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredItem {
    /// Node identifier (primary key).
    pub node_id: NodeId,

    /// Browse name.
    pub browse_name: String,

    /// Declared DataType attribute.
    pub data_type_id: NodeId,

    /// Write-dispatch tag.
    pub data_type: ValueKind,

    /// Value at the time of the last browse.
    pub value: Variant,
}

impl DiscoveredItem {
    /// Creates an item, classifying the value against its declared type.
    pub fn new(
        node_id: NodeId,
        browse_name: impl Into<String>,
        data_type_id: NodeId,
        value: Variant,
    ) -> Self {
        let data_type = ValueKind::classify(&value, &data_type_id);
        Self {
            node_id,
            browse_name: browse_name.into(),
            data_type_id,
            data_type,
            value,
        }
    }

    /// Returns `true` if the browse name contains `pattern`, ignoring case.
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.browse_name
            .to_lowercase()
            .contains(&pattern.to_lowercase())
    }
}

// =============================================================================
// MonitoredItemSpec
// =============================================================================

/// Registration record of a monitored variable.
///
/// `value` is a snapshot taken at registration and is never refreshed; the
/// current value is only known through change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredItemSpec {
    /// Node identifier.
    pub node_id: NodeId,

    /// Monitored attribute (always Value).
    pub attribute_id: AttributeId,

    /// Array index range, `None` for the whole value.
    pub index_range: Option<String>,

    /// Data encoding, `None` for the default encoding.
    pub data_encoding: Option<String>,

    /// Declared DataType attribute.
    pub data_type_id: NodeId,

    /// Write-dispatch tag.
    pub data_type: ValueKind,

    /// Value at registration time.
    pub value: Variant,
}

impl From<&DiscoveredItem> for MonitoredItemSpec {
    fn from(item: &DiscoveredItem) -> Self {
        Self {
            node_id: item.node_id.clone(),
            attribute_id: AttributeId::Value,
            index_range: None,
            data_encoding: None,
            data_type_id: item.data_type_id.clone(),
            data_type: item.data_type.clone(),
            value: item.value.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
