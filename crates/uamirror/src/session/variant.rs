// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wire value representation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::types::{data_type_ids, NodeId};

// =============================================================================
// Variant
// =============================================================================

/// A value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// Boolean value.
    Boolean(bool),

    /// Signed byte.
    SByte(i8),

    /// Unsigned byte.
    Byte(u8),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    #[serde(with = "float_repr::single")]
    Float(f32),

    /// 64-bit double.
    #[serde(with = "float_repr::double")]
    Double(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),

    /// Byte string.
    ByteString(Vec<u8>),

    /// Node identifier (e.g. the DataType attribute).
    NodeId(NodeId),

    /// Structured record.
    ExtensionObject(ExtensionObject),

    /// Array of values.
    Array(Vec<Variant>),

    /// Null value.
    #[default]
    Null,
}

/// Float encoding that survives JSON.
///
/// JSON has no literal for NaN or the infinities, so those are written as
/// the strings `"NaN"`, `"inf"` and `"-inf"`. Finite values stay numbers.
mod float_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn label(value: f64) -> &'static str {
        if value.is_nan() {
            "NaN"
        } else if value > 0.0 {
            "inf"
        } else {
            "-inf"
        }
    }

    fn parse<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float '{}'", other))),
            },
        }
    }

    pub(super) mod double {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            if value.is_finite() {
                serializer.serialize_f64(*value)
            } else {
                serializer.serialize_str(super::label(*value))
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            super::parse(deserializer)
        }
    }

    pub(super) mod single {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
            if value.is_finite() {
                serializer.serialize_f32(*value)
            } else {
                serializer.serialize_str(super::label(f64::from(*value)))
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
            super::parse(deserializer).map(|value| value as f32)
        }
    }
}

impl Variant {
    /// Returns `true` for the integer and floating point variants.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SByte(_)
                | Self::Byte(_)
                | Self::Int16(_)
                | Self::UInt16(_)
                | Self::Int32(_)
                | Self::UInt32(_)
                | Self::Int64(_)
                | Self::UInt64(_)
                | Self::Float(_)
                | Self::Double(_)
        )
    }

    /// Returns the built-in protocol type code of this value.
    pub fn type_code(&self) -> u32 {
        match self {
            Self::Boolean(_) => data_type_ids::BOOLEAN,
            Self::SByte(_) => data_type_ids::SBYTE,
            Self::Byte(_) => data_type_ids::BYTE,
            Self::Int16(_) => data_type_ids::INT16,
            Self::UInt16(_) => data_type_ids::UINT16,
            Self::Int32(_) => data_type_ids::INT32,
            Self::UInt32(_) => data_type_ids::UINT32,
            Self::Int64(_) => data_type_ids::INT64,
            Self::UInt64(_) => data_type_ids::UINT64,
            Self::Float(_) => data_type_ids::FLOAT,
            Self::Double(_) => data_type_ids::DOUBLE,
            Self::String(_) => data_type_ids::STRING,
            Self::DateTime(_) => data_type_ids::DATE_TIME,
            Self::ByteString(_) => data_type_ids::BYTE_STRING,
            Self::NodeId(_) => data_type_ids::NODE_ID,
            Self::ExtensionObject(_) => data_type_ids::STRUCTURE,
            Self::Array(_) | Self::Null => 0,
        }
    }

    /// Returns a short name of the runtime category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::ByteString(_) => "bytestring",
            Self::NodeId(_) => "nodeid",
            Self::ExtensionObject(_) => "record",
            Self::Array(_) => "array",
            Self::Null => "null",
            _ => "numeric",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean held by this value, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the record held by this value, if any.
    pub fn as_record(&self) -> Option<&ExtensionObject> {
        match self {
            Self::ExtensionObject(obj) => Some(obj),
            _ => None,
        }
    }

    /// Converts this value to plain JSON for event consumers.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Boolean(v) => JsonValue::from(*v),
            Self::String(v) => JsonValue::from(v.clone()),
            Self::DateTime(v) => JsonValue::from(v.to_rfc3339()),
            Self::ByteString(v) => JsonValue::from(v.clone()),
            Self::NodeId(v) => JsonValue::from(v.to_string()),
            Self::ExtensionObject(obj) => JsonValue::Object(obj.fields.clone()),
            Self::Array(items) => JsonValue::Array(items.iter().map(Variant::to_json).collect()),
            Self::Null => JsonValue::Null,
            Self::Float(v) => JsonValue::from(*v as f64),
            Self::Double(v) => JsonValue::from(*v),
            Self::UInt64(v) => JsonValue::from(*v),
            other => other.as_i64().map(JsonValue::from).unwrap_or(JsonValue::Null),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::ExtensionObject(obj) => write!(f, "{}{{{} fields}}", obj.type_id, obj.fields.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// ExtensionObject
// =============================================================================

/// Structured record of a declared structure type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionObject {
    /// Declared structure type.
    pub type_id: NodeId,

    /// Field values by name, in declaration order.
    pub fields: Map<String, JsonValue>,
}

impl ExtensionObject {
    /// Creates a record.
    pub fn new(type_id: NodeId, fields: Map<String, JsonValue>) -> Self {
        Self { type_id, fields }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_detection() {
        assert!(Variant::Int16(1).is_numeric());
        assert!(Variant::Double(1.0).is_numeric());
        assert!(!Variant::Boolean(true).is_numeric());
        assert!(!Variant::String("1".into()).is_numeric());
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(Variant::Boolean(true).type_code(), 1);
        assert_eq!(Variant::Int16(1).type_code(), 4);
        assert_eq!(Variant::Int32(1).type_code(), 6);
        assert_eq!(Variant::Int64(1).type_code(), 8);
        assert_eq!(Variant::Float(1.0).type_code(), 10);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Variant::Boolean(true).as_bool(), Some(true));
        assert_eq!(Variant::Int32(0).as_bool(), None);
        assert_eq!(Variant::UInt16(7).as_i64(), Some(7));
        assert_eq!(Variant::Float(2.5).as_f64(), Some(2.5));
        assert!(Variant::Null.is_null());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Variant::Int32(42)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Int32", "value": 42}));

        let back: Variant = serde_json::from_value(json).unwrap();
        assert_eq!(back, Variant::Int32(42));

        let null = serde_json::to_value(Variant::Null).unwrap();
        assert_eq!(null, serde_json::json!({"type": "Null"}));
    }

    #[test]
    fn test_non_finite_floats_are_strings() {
        let json = serde_json::to_value(Variant::Double(f64::NEG_INFINITY)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Double", "value": "-inf"}));
        let json = serde_json::to_value(Variant::Float(f32::NAN)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Float", "value": "NaN"}));

        let back: Variant = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Variant::Float(v) if v.is_nan()));
        let finite: Variant =
            serde_json::from_value(serde_json::json!({"type": "Double", "value": 0.5})).unwrap();
        assert_eq!(finite, Variant::Double(0.5));

        let bad = serde_json::from_value::<Variant>(serde_json::json!({"type": "Double", "value": "fast"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_to_json() {
        let mut fields = Map::new();
        fields.insert("speed".into(), JsonValue::from(12));
        let record = Variant::ExtensionObject(ExtensionObject::new(NodeId::numeric(3, 3001), fields));
        assert_eq!(record.to_json(), serde_json::json!({"speed": 12}));
        assert_eq!(Variant::Int16(-3).to_json(), serde_json::json!(-3));
    }
}
