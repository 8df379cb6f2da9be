// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types shared by the field and inventory sides of the bridge.
//!
//! - [`Variant`]: tagged union of the primitive wire types a node can hold
//! - [`NodeValue`]: a timestamped value observed on (or destined for) a node
//! - [`NodeIdentifier`]: opaque string naming a node, compared exactly

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque node identifier. Equality is exact string match.
pub type NodeIdentifier = String;

// =============================================================================
// Variant
// =============================================================================

/// A primitive value as carried on the field protocol.
///
/// Values leaving the inventory are decoded into a `Variant` at the boundary
/// (see [`Variant::from_json`]) so later stages never inspect raw JSON.
///
/// # Examples
///
/// ```
/// use bridge_core::types::Variant;
///
/// let v = Variant::from_json(&serde_json::json!(42));
/// assert_eq!(v, Variant::Int32(42));
/// assert_eq!(v.as_i64(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// Boolean value.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Absent value.
    Null,
}

impl Variant {
    /// Decodes a generic JSON scalar.
    ///
    /// Numbers become the narrowest of `Int32`, `Int64`, `UInt64` or `Double`
    /// that holds them. Arrays and objects are kept as their raw JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Variant::Null,
            Json::Bool(b) => Variant::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Variant::Int32(small),
                        Err(_) => Variant::Int64(i),
                    }
                } else if let Some(u) = n.as_u64() {
                    Variant::UInt64(u)
                } else {
                    Variant::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Variant::String(s.clone()),
            other => Variant::String(other.to_string()),
        }
    }

    /// Encodes this value as plain JSON for the inventory.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Variant::Boolean(v) => json!(*v),
            Variant::SByte(v) => json!(*v),
            Variant::Byte(v) => json!(*v),
            Variant::Int16(v) => json!(*v),
            Variant::UInt16(v) => json!(*v),
            Variant::Int32(v) => json!(*v),
            Variant::UInt32(v) => json!(*v),
            Variant::Int64(v) => json!(*v),
            Variant::UInt64(v) => json!(*v),
            Variant::Float(v) => json!(*v),
            Variant::Double(v) => json!(*v),
            Variant::String(v) => json!(v),
            Variant::DateTime(v) => json!(v.to_rfc3339()),
            Variant::Null => serde_json::Value::Null,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Boolean(_) => "Boolean",
            Variant::SByte(_) => "SByte",
            Variant::Byte(_) => "Byte",
            Variant::Int16(_) => "Int16",
            Variant::UInt16(_) => "UInt16",
            Variant::Int32(_) => "Int32",
            Variant::UInt32(_) => "UInt32",
            Variant::Int64(_) => "Int64",
            Variant::UInt64(_) => "UInt64",
            Variant::Float(_) => "Float",
            Variant::Double(_) => "Double",
            Variant::String(_) => "String",
            Variant::DateTime(_) => "DateTime",
            Variant::Null => "Null",
        }
    }

    /// Returns `true` if this is [`Variant::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Returns `true` for integer and float variants.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Variant::SByte(_)
                | Variant::Byte(_)
                | Variant::Int16(_)
                | Variant::UInt16(_)
                | Variant::Int32(_)
                | Variant::UInt32(_)
                | Variant::Int64(_)
                | Variant::UInt64(_)
                | Variant::Float(_)
                | Variant::Double(_)
        )
    }

    /// Returns the value as a bool when it is one.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens any integer or boolean to `i64`. Floats truncate toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Boolean(v) => Some(i64::from(*v)),
            Variant::SByte(v) => Some(i64::from(*v)),
            Variant::Byte(v) => Some(i64::from(*v)),
            Variant::Int16(v) => Some(i64::from(*v)),
            Variant::UInt16(v) => Some(i64::from(*v)),
            Variant::Int32(v) => Some(i64::from(*v)),
            Variant::UInt32(v) => Some(i64::from(*v)),
            Variant::Int64(v) => Some(*v),
            Variant::UInt64(v) => Some(*v as i64),
            Variant::Float(v) => Some(*v as i64),
            Variant::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Widens any numeric or boolean to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Variant::SByte(v) => Some(f64::from(*v)),
            Variant::Byte(v) => Some(f64::from(*v)),
            Variant::Int16(v) => Some(f64::from(*v)),
            Variant::UInt16(v) => Some(f64::from(*v)),
            Variant::Int32(v) => Some(f64::from(*v)),
            Variant::UInt32(v) => Some(f64::from(*v)),
            Variant::Int64(v) => Some(*v as f64),
            Variant::UInt64(v) => Some(*v as f64),
            Variant::Float(v) => Some(f64::from(*v)),
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice when it is one.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => write!(f, "{}", v),
            Variant::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Variant::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Boolean(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int64(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

// =============================================================================
// NodeValue
// =============================================================================

/// A value observed on a node at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeValue {
    /// Node the value belongs to.
    pub node_id: NodeIdentifier,
    /// The value.
    pub value: Variant,
    /// When the bridge observed the value.
    pub timestamp: DateTime<Utc>,
}

impl NodeValue {
    /// Creates a node value stamped with the current time.
    pub fn now(node_id: impl Into<NodeIdentifier>, value: Variant) -> Self {
        Self {
            node_id: node_id.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} => {}",
            self.timestamp.format("%H:%M:%S"),
            self.node_id,
            self.value
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
