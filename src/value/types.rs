//! Native types that have a dedicated wire representation

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{BuildError, BuildResult};

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a geo point, rejecting coordinates outside the valid range
    pub fn new(latitude: f64, longitude: f64) -> BuildResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(BuildError::invalid_argument(format!(
                "Latitude must be in [-90, 90], got {}",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(BuildError::invalid_argument(format!(
                "Longitude must be in [-180, 180], got {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Opaque binary payload
///
/// Serialized as standard base64 in JSON renderings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the base64 rendering used on the JSON wire
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Blob)
            .map_err(serde::de::Error::custom)
    }
}

/// Splits a slash separated path into segments, rejecting empty segments
pub(crate) fn split_path(path: &str) -> BuildResult<Vec<&str>> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(BuildError::invalid_path(path, "path is empty"));
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(BuildError::invalid_path(path, "path contains an empty segment"));
    }
    Ok(segments)
}

/// Path to a single document, relative to the database root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentReference {
    path: String,
}

impl DocumentReference {
    /// Creates a reference from `collection/doc[/collection/doc...]`.
    ///
    /// A leading `/` is accepted and dropped.
    pub fn new(path: &str) -> BuildResult<Self> {
        let segments = split_path(path)?;
        if segments.len() % 2 != 0 {
            return Err(BuildError::invalid_path(
                path,
                "document paths need an even number of segments",
            ));
        }
        Ok(Self {
            path: segments.join("/"),
        })
    }

    /// Parses a fully qualified resource name
    /// (`projects/p/databases/d/documents/users/alice`) or a plain path.
    pub fn from_resource_name(name: &str) -> BuildResult<Self> {
        match name.find("/documents/") {
            Some(idx) => Self::new(&name[idx + "/documents/".len()..]),
            None => Self::new(name),
        }
    }

    /// Path without the leading slash
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Database-rooted path, as carried by reference values
    pub fn absolute_path(&self) -> String {
        format!("/{}", self.path)
    }

    /// Last path segment
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path of the collection containing this document
    pub fn parent_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
