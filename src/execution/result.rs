//! Decoded rows
//!
//! A `PipelineResult` is built from exactly one row payload and never
//! changes afterwards. Field values stay in wire form until an accessor asks
//! for a native type.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{ExecutionError, ExecutionResult};
use super::transport::RowPayload;
use crate::pipeline::Pipeline;
use crate::value::{Blob, DocumentReference, FromWireValue, GeoPoint, WireValue};

/// Shared by every result of one execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    /// Identifies the execution in log events
    pub execution_id: Uuid,
    /// Database resource name the pipeline ran against
    pub database: String,
    pub submitted_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub(crate) fn new(database: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            database: database.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// One row returned by a pipeline
#[derive(Debug, Clone)]
pub struct PipelineResult {
    reference: Option<DocumentReference>,
    fields: Option<BTreeMap<String, WireValue>>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
    execution_time: Option<DateTime<Utc>>,
    context: Arc<ExecutionContext>,
}

impl PipelineResult {
    /// Decodes a row payload
    pub(crate) fn decode(
        payload: RowPayload,
        execution_time: Option<DateTime<Utc>>,
        context: Arc<ExecutionContext>,
    ) -> ExecutionResult<Self> {
        let reference = match payload.name.as_deref() {
            None | Some("") => None,
            Some(name) => Some(
                DocumentReference::from_resource_name(name)
                    .map_err(|e| ExecutionError::Decode(e.message().to_string()))?,
            ),
        };
        Ok(Self {
            reference,
            fields: payload.fields,
            create_time: payload.create_time,
            update_time: payload.update_time,
            execution_time,
            context,
        })
    }

    /// Document id of the source row, if the row maps to a document
    pub fn id(&self) -> Option<&str> {
        self.reference.as_ref().map(DocumentReference::id)
    }

    pub fn reference(&self) -> Option<&DocumentReference> {
        self.reference.as_ref()
    }

    /// `false` for point lookups of missing documents
    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, WireValue>> {
        self.fields.as_ref()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_value(path).is_some()
    }

    /// Raw value at a field name or dotted path.
    ///
    /// An exact top-level key wins over path traversal, so aliases
    /// containing dots stay addressable.
    pub fn get_value(&self, path: &str) -> Option<&WireValue> {
        let fields = self.fields.as_ref()?;
        if let Some(value) = fields.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Value at `path` converted to `T`; `None` when absent or of another type
    pub fn get<T: FromWireValue>(&self, path: &str) -> Option<T> {
        self.get_value(path).and_then(T::from_wire)
    }

    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path)
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)
    }

    pub fn get_timestamp(&self, path: &str) -> Option<DateTime<Utc>> {
        self.get(path)
    }

    pub fn get_geo_point(&self, path: &str) -> Option<GeoPoint> {
        self.get(path)
    }

    pub fn get_blob(&self, path: &str) -> Option<Blob> {
        self.get(path)
    }

    pub fn get_reference(&self, path: &str) -> Option<DocumentReference> {
        self.get(path)
    }

    /// Plain JSON view of all fields; `None` when the document does not exist
    pub fn data(&self) -> Option<serde_json::Value> {
        self.fields.as_ref().map(|fields| {
            serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            )
        })
    }

    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<DateTime<Utc>> {
        self.update_time
    }

    /// Time at which the engine produced this row's response
    pub fn execution_time(&self) -> Option<DateTime<Utc>> {
        self.execution_time
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

impl PartialEq for PipelineResult {
    /// Rows are equal when they carry the same document and values,
    /// regardless of which execution produced them
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
            && self.fields == other.fields
            && self.create_time == other.create_time
            && self.update_time == other.update_time
    }
}

/// All rows of a completed execution
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    results: Vec<PipelineResult>,
    execution_time: Option<DateTime<Utc>>,
    pipeline: Pipeline,
}

impl PipelineSnapshot {
    pub(crate) fn new(
        results: Vec<PipelineResult>,
        execution_time: Option<DateTime<Utc>>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            results,
            execution_time,
            pipeline,
        }
    }

    /// Rows in delivery order
    pub fn results(&self) -> &[PipelineResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PipelineResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PipelineResult> {
        self.results.iter()
    }

    /// Execution time of the first response
    pub fn execution_time(&self) -> Option<DateTime<Utc>> {
        self.execution_time
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl IntoIterator for PipelineSnapshot {
    type Item = PipelineResult;
    type IntoIter = std::vec::IntoIter<PipelineResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a PipelineSnapshot {
    type Item = &'a PipelineResult;
    type IntoIter = std::slice::Iter<'a, PipelineResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PipelineResult {
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), WireValue::from("Paris"));
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), WireValue::from("Ada"));
        fields.insert("age".to_string(), WireValue::from(36));
        fields.insert("address".to_string(), WireValue::Map(address));
        fields.insert("o.total".to_string(), WireValue::from(9.5));

        let payload = RowPayload {
            name: Some("projects/p/databases/(default)/documents/users/ada".into()),
            fields: Some(fields),
            ..Default::default()
        };
        PipelineResult::decode(payload, None, Arc::new(ExecutionContext::new("db"))).unwrap()
    }

    #[test]
    fn test_identity_from_resource_name() {
        let result = row();
        assert_eq!(result.id(), Some("ada"));
        assert_eq!(result.reference().unwrap().path(), "users/ada");
    }

    #[test]
    fn test_nested_and_dotted_lookup() {
        let result = row();
        assert_eq!(result.get_string("address.city").as_deref(), Some("Paris"));
        assert_eq!(result.get_f64("o.total"), Some(9.5));
        assert_eq!(result.get_f64("age"), Some(36.0));
        assert!(result.get_i64("name").is_none());
        assert!(!result.contains("address.zip"));
    }

    #[test]
    fn test_missing_document() {
        let payload = RowPayload {
            name: Some("projects/p/databases/d/documents/users/ghost".into()),
            ..Default::default()
        };
        let result =
            PipelineResult::decode(payload, None, Arc::new(ExecutionContext::new("db"))).unwrap();
        assert!(!result.exists());
        assert!(result.data().is_none());
    }

    #[test]
    fn test_malformed_name_is_decode_error() {
        let payload = RowPayload {
            name: Some("projects/p/databases/d/documents/users".into()),
            ..Default::default()
        };
        let err = PipelineResult::decode(payload, None, Arc::new(ExecutionContext::new("db")))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Decode(_)));
    }
}
