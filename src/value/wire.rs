//! Generic wire value model
//!
//! The type-tagged unit exchanged with the remote execution engine. Every
//! constant, field reference, function call and nested pipeline ends up as
//! a `WireValue`. Maps are ordered (`BTreeMap`) so that two structurally
//! equal trees always render to identical bytes.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::types::{Blob, DocumentReference, GeoPoint};
use crate::errors::{BuildError, BuildResult};

/// A single serialized value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    #[serde(rename = "null_value")]
    Null,
    #[serde(rename = "boolean_value")]
    Boolean(bool),
    #[serde(rename = "integer_value")]
    Integer(i64),
    /// NaN and the infinities travel as `"NaN"`, `"Infinity"`, `"-Infinity"`
    #[serde(rename = "double_value")]
    Double(#[serde(with = "double_format")] f64),
    #[serde(rename = "timestamp_value")]
    Timestamp(DateTime<Utc>),
    #[serde(rename = "string_value")]
    String(String),
    #[serde(rename = "bytes_value")]
    Bytes(Blob),
    /// Database-rooted document or collection path (`/users/alice`)
    #[serde(rename = "reference_value")]
    Reference(String),
    #[serde(rename = "geo_point_value")]
    GeoPoint(GeoPoint),
    #[serde(rename = "array_value")]
    Array(Vec<WireValue>),
    #[serde(rename = "map_value")]
    Map(BTreeMap<String, WireValue>),
    /// Dotted path into the current row
    #[serde(rename = "field_reference_value")]
    FieldReference(String),
    /// Operator application with ordered arguments
    #[serde(rename = "function_value")]
    Function { name: String, args: Vec<WireValue> },
    /// Nested, independent pipeline (join, union)
    #[serde(rename = "pipeline_value")]
    Pipeline(Vec<WireStage>),
}

/// Serialized pipeline stage: `{name, args, options}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireStage {
    pub name: String,
    pub args: Vec<WireValue>,
    pub options: BTreeMap<String, WireValue>,
}

impl WireStage {
    /// Creates a stage with positional arguments and no options
    pub fn new(name: impl Into<String>, args: Vec<WireValue>) -> Self {
        Self {
            name: name.into(),
            args,
            options: BTreeMap::new(),
        }
    }

    /// Adds a named option
    pub fn with_option(mut self, key: impl Into<String>, value: WireValue) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

impl WireValue {
    /// Builds a function value
    pub fn function(name: impl Into<String>, args: Vec<WireValue>) -> Self {
        WireValue::Function {
            name: name.into(),
            args,
        }
    }

    /// Name of the value-type bucket, in the engine's cross-type ordering
    pub fn type_order(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Boolean(_) => "boolean",
            WireValue::Integer(_) | WireValue::Double(_) => "number",
            WireValue::Timestamp(_) => "timestamp",
            WireValue::String(_) => "string",
            WireValue::Bytes(_) => "bytes",
            WireValue::Reference(_) => "reference",
            WireValue::GeoPoint(_) => "geo_point",
            WireValue::Array(_) => "array",
            WireValue::Map(_) => "map",
            WireValue::FieldReference(_) => "field_reference",
            WireValue::Function { .. } => "function",
            WireValue::Pipeline(_) => "pipeline",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Double(d) => Some(*d),
            WireValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            WireValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Plain JSON rendering for display and debugging.
    ///
    /// Lossy: bytes become base64 strings, timestamps RFC 3339 strings,
    /// non-finite doubles their textual name.
    pub fn to_json(&self) -> Json {
        match self {
            WireValue::Null => Json::Null,
            WireValue::Boolean(b) => Json::Bool(*b),
            WireValue::Integer(i) => Json::from(*i),
            WireValue::Double(d) => match double_format::non_finite_name(*d) {
                Some(name) => Json::String(name.to_string()),
                None => serde_json::Number::from_f64(*d)
                    .map(Json::Number)
                    .unwrap_or(Json::Null),
            },
            WireValue::Timestamp(ts) => {
                Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            WireValue::String(s) => Json::String(s.clone()),
            WireValue::Bytes(blob) => Json::String(blob.to_base64()),
            WireValue::Reference(path) => Json::String(path.clone()),
            WireValue::GeoPoint(point) => serde_json::json!({
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
            WireValue::Array(values) => Json::Array(values.iter().map(|v| v.to_json()).collect()),
            WireValue::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            WireValue::FieldReference(path) => serde_json::json!({ "field": path }),
            WireValue::Function { name, args } => serde_json::json!({
                "function": name,
                "args": args.iter().map(|a| a.to_json()).collect::<Vec<_>>(),
            }),
            WireValue::Pipeline(stages) => serde_json::to_value(stages).unwrap_or(Json::Null),
        }
    }
}

macro_rules! wire_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for WireValue {
                fn from(v: $t) -> Self {
                    WireValue::Integer(i64::from(v))
                }
            }
        )*
    };
}

wire_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Boolean(v)
    }
}

impl From<f32> for WireValue {
    fn from(v: f32) -> Self {
        WireValue::Double(f64::from(v))
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::Double(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::String(v.to_string())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::String(v)
    }
}

impl From<&String> for WireValue {
    fn from(v: &String) -> Self {
        WireValue::String(v.clone())
    }
}

impl From<DateTime<Utc>> for WireValue {
    fn from(v: DateTime<Utc>) -> Self {
        WireValue::Timestamp(v)
    }
}

impl From<GeoPoint> for WireValue {
    fn from(v: GeoPoint) -> Self {
        WireValue::GeoPoint(v)
    }
}

impl From<Blob> for WireValue {
    fn from(v: Blob) -> Self {
        WireValue::Bytes(v)
    }
}

impl From<DocumentReference> for WireValue {
    fn from(v: DocumentReference) -> Self {
        WireValue::Reference(v.absolute_path())
    }
}

impl<T: Into<WireValue>> From<Option<T>> for WireValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(WireValue::Null)
    }
}

impl<T: Into<WireValue>> From<Vec<T>> for WireValue {
    fn from(v: Vec<T>) -> Self {
        WireValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<WireValue>> From<BTreeMap<String, T>> for WireValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        WireValue::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<WireValue>> From<HashMap<String, T>> for WireValue {
    fn from(v: HashMap<String, T>) -> Self {
        WireValue::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl TryFrom<u64> for WireValue {
    type Error = BuildError;

    fn try_from(v: u64) -> BuildResult<Self> {
        i64::try_from(v).map(WireValue::Integer).map_err(|_| {
            BuildError::serialization(format!("Integer {} does not fit in a signed 64-bit value", v))
        })
    }
}

impl TryFrom<usize> for WireValue {
    type Error = BuildError;

    fn try_from(v: usize) -> BuildResult<Self> {
        WireValue::try_from(v as u64)
    }
}

impl TryFrom<Json> for WireValue {
    type Error = BuildError;

    fn try_from(v: Json) -> BuildResult<Self> {
        Ok(match v {
            Json::Null => WireValue::Null,
            Json::Bool(b) => WireValue::Boolean(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    WireValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    WireValue::try_from(u)?
                } else {
                    match n.as_f64() {
                        Some(f) => WireValue::Double(f),
                        None => {
                            return Err(BuildError::serialization(format!(
                                "Number {} has no wire representation",
                                n
                            )))
                        }
                    }
                }
            }
            Json::String(s) => WireValue::String(s),
            Json::Array(values) => WireValue::Array(
                values
                    .into_iter()
                    .map(WireValue::try_from)
                    .collect::<BuildResult<Vec<_>>>()?,
            ),
            Json::Object(map) => WireValue::Map(
                map.into_iter()
                    .map(|(k, v)| WireValue::try_from(v).map(|v| (k, v)))
                    .collect::<BuildResult<BTreeMap<_, _>>>()?,
            ),
        })
    }
}

/// Serde form of doubles that keeps non-finite values distinct
mod double_format {
    use serde::de::{self, Deserialize, Deserializer};
    use serde::Serializer;

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    pub(super) fn non_finite_name(value: f64) -> Option<&'static str> {
        if value.is_nan() {
            Some(NAN)
        } else if value == f64::INFINITY {
            Some(INFINITY)
        } else if value == f64::NEG_INFINITY {
            Some(NEG_INFINITY)
        } else {
            None
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match non_finite_name(*value) {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_f64(*value),
        }
    }

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid double: {:?}", other))),
            },
        }
    }
}
