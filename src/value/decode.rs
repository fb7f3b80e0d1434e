//! Decoding wire values back into native types
//!
//! Used lazily by result accessors: a field is only converted when the
//! caller asks for it, and only into the type the caller names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{Blob, DocumentReference, GeoPoint};
use super::wire::WireValue;

/// Conversion from a wire value into a native type.
///
/// Returns `None` when the wire value has a different type; integers widen
/// to `f64`, nothing narrows.
pub trait FromWireValue: Sized {
    fn from_wire(value: &WireValue) -> Option<Self>;
}

impl FromWireValue for WireValue {
    fn from_wire(value: &WireValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromWireValue for bool {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromWireValue for i64 {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromWireValue for f64 {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromWireValue for String {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromWireValue for DateTime<Utc> {
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl FromWireValue for GeoPoint {
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::GeoPoint(point) => Some(*point),
            _ => None,
        }
    }
}

impl FromWireValue for Blob {
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Bytes(blob) => Some(blob.clone()),
            _ => None,
        }
    }
}

impl FromWireValue for DocumentReference {
    fn from_wire(value: &WireValue) -> Option<Self> {
        match value {
            WireValue::Reference(path) => DocumentReference::from_resource_name(path).ok(),
            _ => None,
        }
    }
}

impl FromWireValue for serde_json::Value {
    fn from_wire(value: &WireValue) -> Option<Self> {
        Some(value.to_json())
    }
}

impl<T: FromWireValue> FromWireValue for Vec<T> {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value.as_array()?.iter().map(T::from_wire).collect()
    }
}

impl<T: FromWireValue> FromWireValue for BTreeMap<String, T> {
    fn from_wire(value: &WireValue) -> Option<Self> {
        value
            .as_map()?
            .iter()
            .map(|(k, v)| T::from_wire(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl<T: FromWireValue> FromWireValue for Option<T> {
    fn from_wire(value: &WireValue) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_wire(value).map(Some)
        }
    }
}
