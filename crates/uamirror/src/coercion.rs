// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Write-time type coercion.
//!
//! The protocol describes a value's type on read but expects the caller to
//! send the exact wire type on write. [`TypeCoercer`] replays that type from
//! the [`ValueKind`] tag recorded at discovery:
//!
//! | Kind                 | Wire type         | Conversion                               |
//! |----------------------|-------------------|------------------------------------------|
//! | `Boolean`            | `Boolean`         | passthrough                              |
//! | `Record { type_id }` | `ExtensionObject` | shallow merge into the last known record |
//! | `Numeric { 10 }`     | `Float`           | parse as float                           |
//! | `Numeric { 4 }`      | `Int16`           | parse as integer                         |
//! | `Numeric { 6 }`      | `Int32`           | parse as integer                         |
//! | `Numeric { 8 }`      | `Int64`           | parse as integer                         |
//! | anything else        | -                 | `UnsupportedType`                        |
//!
//! Coercion itself is pure. Records still need the session to encode the
//! structure, which [`Coerced::into_variant`] does as the last step.

use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::error::{CoercionError, MirrorError, MirrorResult};
use crate::session::{Session, Variant};
use crate::types::{data_type_ids, NodeId, ValueKind};

// =============================================================================
// WireType
// =============================================================================

/// Wire types a write can be encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Boolean.
    Boolean,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float,
    /// Structured record.
    ExtensionObject,
}

impl WireType {
    /// Returns the wire type dictated by a value kind, if any.
    pub fn for_kind(kind: &ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Boolean => Some(Self::Boolean),
            ValueKind::Record { .. } => Some(Self::ExtensionObject),
            ValueKind::Numeric { type_code } => match *type_code {
                data_type_ids::FLOAT => Some(Self::Float),
                data_type_ids::INT16 => Some(Self::Int16),
                data_type_ids::INT32 => Some(Self::Int32),
                data_type_ids::INT64 => Some(Self::Int64),
                _ => None,
            },
            ValueKind::Other { .. } => None,
        }
    }

    /// Returns the type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float => "Float",
            Self::ExtensionObject => "ExtensionObject",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Coerced
// =============================================================================

/// Payload of a coerced write.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Ready to send.
    Scalar(Variant),

    /// Record fields still to be encoded by the session.
    Record {
        /// Declared structure type.
        type_id: NodeId,
        /// Merged fields.
        fields: Map<String, JsonValue>,
    },
}

/// Result of a coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    /// Wire type the value is encoded as.
    pub wire_type: WireType,

    /// The coerced payload.
    pub value: WireValue,
}

impl Coerced {
    fn scalar(wire_type: WireType, value: Variant) -> Self {
        Self {
            wire_type,
            value: WireValue::Scalar(value),
        }
    }

    /// Produces the value to hand to [`Session::write`].
    pub async fn into_variant(self, session: &dyn Session) -> MirrorResult<Variant> {
        match self.value {
            WireValue::Scalar(value) => Ok(value),
            WireValue::Record { type_id, fields } => {
                session.construct_typed_record(&type_id, fields).await
            }
        }
    }
}

// =============================================================================
// TypeCoercer
// =============================================================================

/// Converts proposed write values into their wire representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercer;

impl TypeCoercer {
    /// Creates a coercer.
    pub fn new() -> Self {
        Self
    }

    /// Coerces `proposed` for a write to `node_id`.
    ///
    /// `last_known` is the most recent value of the node; records merge the
    /// proposed fields into it.
    pub fn coerce(
        &self,
        node_id: &NodeId,
        kind: &ValueKind,
        proposed: &JsonValue,
        last_known: &Variant,
    ) -> MirrorResult<Coerced> {
        let Some(wire_type) = WireType::for_kind(kind) else {
            return Err(MirrorError::unsupported_type(node_id.to_string(), kind.describe()));
        };

        let coerced = match (wire_type, kind) {
            (WireType::Boolean, _) => match proposed {
                JsonValue::Bool(v) => Coerced::scalar(wire_type, Variant::Boolean(*v)),
                other => return Err(invalid(wire_type, other)),
            },
            (WireType::Float, _) => Coerced::scalar(wire_type, Variant::Float(parse_float(proposed)?)),
            (WireType::Int16, _) => {
                let v = i16::try_from(parse_integer(wire_type, proposed)?)
                    .map_err(|_| invalid(wire_type, proposed))?;
                Coerced::scalar(wire_type, Variant::Int16(v))
            }
            (WireType::Int32, _) => {
                let v = i32::try_from(parse_integer(wire_type, proposed)?)
                    .map_err(|_| invalid(wire_type, proposed))?;
                Coerced::scalar(wire_type, Variant::Int32(v))
            }
            (WireType::Int64, _) => {
                Coerced::scalar(wire_type, Variant::Int64(parse_integer(wire_type, proposed)?))
            }
            (WireType::ExtensionObject, ValueKind::Record { type_id }) => {
                let JsonValue::Object(changes) = proposed else {
                    return Err(invalid(wire_type, proposed));
                };
                let mut fields = last_known
                    .as_record()
                    .map(|record| record.fields.clone())
                    .unwrap_or_default();
                for (name, value) in changes {
                    fields.insert(name.clone(), value.clone());
                }
                Coerced {
                    wire_type,
                    value: WireValue::Record {
                        type_id: type_id.clone(),
                        fields,
                    },
                }
            }
            (WireType::ExtensionObject, _) => {
                return Err(MirrorError::unsupported_type(node_id.to_string(), kind.describe()))
            }
        };

        tracing::trace!(node_id = %node_id, wire_type = %coerced.wire_type, "Value coerced");
        Ok(coerced)
    }
}

fn invalid(wire_type: WireType, input: &JsonValue) -> MirrorError {
    CoercionError::invalid_value(wire_type.as_str(), input.to_string()).into()
}

fn parse_float(input: &JsonValue) -> MirrorResult<f32> {
    let parsed = match input {
        JsonValue::Number(n) => n.as_f64().map(|v| v as f32),
        JsonValue::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(WireType::Float, input))
}

fn parse_integer(wire_type: WireType, input: &JsonValue) -> MirrorResult<i64> {
    let parsed = match input {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(wire_type, input))
}

// =============================================================================
// Tests
// =============================================================================
