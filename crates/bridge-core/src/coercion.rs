// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value coercion onto a node's declared wire type.
//!
//! Commands arrive from the inventory as generic JSON scalars. Before a
//! write, the target node's DataType attribute is read and mapped to a
//! [`DataTypeHint`]; [`coerce`] then converts the inbound [`Variant`] to
//! that concrete type.
//!
//! | Source     | Target integer      | Target float | Target Boolean  | Target String |
//! |------------|---------------------|--------------|-----------------|---------------|
//! | Boolean    | 1 / 0               | 1.0 / 0.0    | as is           | "true"/"false"|
//! | Integer    | `as` cast (wraps)   | `as` cast    | `!= 0`          | decimal text  |
//! | Float      | `as` cast (saturates)| `as` cast   | `!= 0.0`        | decimal text  |
//! | String     | parsed              | parsed       | "true"/"false"  | as is         |
//!
//! Values that cannot be converted are passed through unchanged; the server
//! then rejects the write with a bad status.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::Variant;

// =============================================================================
// DataTypeHint
// =============================================================================

/// The built-in wire type declared by a node.
///
/// Discriminants are the namespace-0 numeric identifiers of the built-in
/// DataType nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataTypeHint {
    /// Boolean (i=1).
    Boolean,
    /// SByte (i=2).
    SByte,
    /// Byte (i=3).
    Byte,
    /// Int16 (i=4).
    Int16,
    /// UInt16 (i=5).
    UInt16,
    /// Int32 (i=6).
    Int32,
    /// UInt32 (i=7).
    UInt32,
    /// Int64 (i=8).
    Int64,
    /// UInt64 (i=9).
    UInt64,
    /// Float (i=10).
    Float,
    /// Double (i=11).
    Double,
    /// String (i=12).
    String,
    /// DateTime (i=13).
    DateTime,
    /// Untyped; values pass through unconverted.
    BaseDataType,
}

impl DataTypeHint {
    /// Maps a namespace-0 DataType identifier to a hint.
    pub fn from_type_id(id: u32) -> Self {
        match id {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            _ => Self::BaseDataType,
        }
    }

    /// Returns the namespace-0 identifier, or 24 for `BaseDataType`.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::BaseDataType => 24,
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::BaseDataType => "BaseDataType",
        }
    }
}

impl fmt::Display for DataTypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// coerce
// =============================================================================

/// Converts `value` to the wire type named by `hint`.
///
/// `Null` is never coerced. Unmapped hints and inconvertible values are
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use bridge_core::coercion::{coerce, DataTypeHint};
/// use bridge_core::types::Variant;
///
/// assert_eq!(coerce(Variant::Int32(42), DataTypeHint::Int32), Variant::Int32(42));
/// assert_eq!(coerce(Variant::Int32(1), DataTypeHint::Boolean), Variant::Boolean(true));
/// assert_eq!(coerce(Variant::Null, DataTypeHint::Double), Variant::Null);
/// ```
pub fn coerce(value: Variant, hint: DataTypeHint) -> Variant {
    if value.is_null() {
        return value;
    }

    let converted = match hint {
        DataTypeHint::BaseDataType => return value,
        DataTypeHint::Boolean => to_bool(&value).map(Variant::Boolean),
        DataTypeHint::SByte => to_int(&value).map(|v| Variant::SByte(v as i8)),
        DataTypeHint::Byte => to_int(&value).map(|v| Variant::Byte(v as u8)),
        DataTypeHint::Int16 => to_int(&value).map(|v| Variant::Int16(v as i16)),
        DataTypeHint::UInt16 => to_int(&value).map(|v| Variant::UInt16(v as u16)),
        DataTypeHint::Int32 => to_int(&value).map(|v| Variant::Int32(v as i32)),
        DataTypeHint::UInt32 => to_int(&value).map(|v| Variant::UInt32(v as u32)),
        DataTypeHint::Int64 => to_int(&value).map(Variant::Int64),
        DataTypeHint::UInt64 => to_uint64(&value).map(Variant::UInt64),
        DataTypeHint::Float => to_float(&value).map(|v| Variant::Float(v as f32)),
        DataTypeHint::Double => to_float(&value).map(Variant::Double),
        DataTypeHint::String => Some(Variant::String(value.to_string())),
        DataTypeHint::DateTime => to_datetime(&value).map(Variant::DateTime),
    };

    match converted {
        Some(v) => v,
        None => {
            debug!(
                from = value.type_name(),
                to = hint.name(),
                value = %value,
                "Value not convertible, passing through"
            );
            value
        }
    }
}

fn to_bool(value: &Variant) -> Option<bool> {
    match value {
        Variant::Boolean(b) => Some(*b),
        Variant::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Variant::Float(f) => Some(*f != 0.0),
        Variant::Double(d) => Some(*d != 0.0),
        other => other.as_i64().map(|v| v != 0),
    }
}

fn to_int(value: &Variant) -> Option<i64> {
    match value {
        Variant::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Variant::DateTime(_) => None,
        other => other.as_i64(),
    }
}

fn to_uint64(value: &Variant) -> Option<u64> {
    match value {
        Variant::UInt64(v) => Some(*v),
        Variant::Float(f) => Some(*f as u64),
        Variant::Double(d) => Some(*d as u64),
        Variant::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as u64))
        }
        other => to_int(other).map(|v| v as u64),
    }
}

fn to_float(value: &Variant) -> Option<f64> {
    match value {
        Variant::String(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    }
}

fn to_datetime(value: &Variant) -> Option<DateTime<Utc>> {
    match value {
        Variant::DateTime(dt) => Some(*dt),
        Variant::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
