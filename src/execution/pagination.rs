//! Paginated execution
//!
//! Pagination is not a stage: page size, orderings, offset and cursors
//! travel as execution options next to the serialized pipeline. A cursor
//! snapshots the ordering values of a previously returned row.

use std::collections::BTreeMap;

use crate::errors::{BuildError, BuildResult};
use crate::expr::{Expr, Ordering};
use crate::pipeline::Pipeline;
use crate::serializer::serialize_ordering;
use crate::value::WireValue;

use super::result::PipelineResult;
use super::Executable;

/// Execution option key carrying the pagination parameters
pub const PAGINATION_OPTION: &str = "pagination";

/// Position in a sorted scan: one value per ordering
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    values: Vec<WireValue>,
    inclusive: bool,
}

impl Cursor {
    /// Cursor that includes the row at its position
    pub fn at(values: Vec<WireValue>) -> Self {
        Self {
            values,
            inclusive: true,
        }
    }

    /// Cursor that excludes the row at its position
    pub fn after(values: Vec<WireValue>) -> Self {
        Self {
            values,
            inclusive: false,
        }
    }

    pub fn values(&self) -> &[WireValue] {
        &self.values
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    fn to_wire(&self) -> WireValue {
        let mut map = BTreeMap::new();
        map.insert("values".to_string(), WireValue::Array(self.values.clone()));
        map.insert("inclusive".to_string(), WireValue::Boolean(self.inclusive));
        WireValue::Map(map)
    }
}

/// Scan direction of a page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

impl PageDirection {
    pub fn name(&self) -> &'static str {
        match self {
            PageDirection::Forward => "forward",
            PageDirection::Backward => "backward",
        }
    }
}

/// Pipeline plus page size, orderings, offset and cursors
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatingPipeline {
    pipeline: Pipeline,
    page_size: i64,
    orderings: Vec<Ordering>,
    offset: Option<i64>,
    start: Option<Cursor>,
    end: Option<Cursor>,
}

impl PaginatingPipeline {
    /// Callers supply orderings that make row order deterministic,
    /// including a tie-breaker
    pub(crate) fn new(
        pipeline: Pipeline,
        page_size: i64,
        orderings: Vec<Ordering>,
    ) -> BuildResult<Self> {
        if page_size <= 0 {
            return Err(BuildError::invalid_argument(format!(
                "page size must be positive, got {}",
                page_size
            )));
        }
        if orderings.is_empty() {
            return Err(BuildError::invalid_argument(
                "pagination needs at least one ordering",
            ));
        }
        Ok(Self {
            pipeline,
            page_size,
            orderings,
            offset: None,
            start: None,
            end: None,
        })
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    pub fn start_cursor(&self) -> Option<&Cursor> {
        self.start.as_ref()
    }

    pub fn end_cursor(&self) -> Option<&Cursor> {
        self.end.as_ref()
    }

    /// Skips `offset` rows after the start cursor
    pub fn offset(&self, offset: i64) -> BuildResult<Self> {
        if offset < 0 {
            return Err(BuildError::negative_value("offset", offset));
        }
        let mut next = self.clone();
        next.offset = Some(offset);
        Ok(next)
    }

    pub fn start_at(&self, result: &PipelineResult) -> BuildResult<Self> {
        self.with_start_cursor(Cursor::at(self.cursor_values(result)?))
    }

    pub fn start_after(&self, result: &PipelineResult) -> BuildResult<Self> {
        self.with_start_cursor(Cursor::after(self.cursor_values(result)?))
    }

    pub fn end_at(&self, result: &PipelineResult) -> BuildResult<Self> {
        self.with_end_cursor(Cursor::at(self.cursor_values(result)?))
    }

    pub fn end_before(&self, result: &PipelineResult) -> BuildResult<Self> {
        self.with_end_cursor(Cursor::after(self.cursor_values(result)?))
    }

    pub fn with_start_cursor(&self, cursor: Cursor) -> BuildResult<Self> {
        self.check_cursor(&cursor)?;
        let mut next = self.clone();
        next.start = Some(cursor);
        Ok(next)
    }

    pub fn with_end_cursor(&self, cursor: Cursor) -> BuildResult<Self> {
        self.check_cursor(&cursor)?;
        let mut next = self.clone();
        next.end = Some(cursor);
        Ok(next)
    }

    /// Request for the first page, scanning forward
    pub fn first_page(&self) -> PageRequest {
        PageRequest {
            paginating: self.clone(),
            direction: PageDirection::Forward,
        }
    }

    /// Request for the last page, scanning backward
    pub fn last_page(&self) -> PageRequest {
        PageRequest {
            paginating: self.clone(),
            direction: PageDirection::Backward,
        }
    }

    fn check_cursor(&self, cursor: &Cursor) -> BuildResult<()> {
        if cursor.values.len() > self.orderings.len() {
            return Err(BuildError::invalid_cursor(format!(
                "cursor has {} values but only {} orderings",
                cursor.values.len(),
                self.orderings.len()
            )));
        }
        if cursor.values.is_empty() {
            return Err(BuildError::invalid_cursor("cursor has no values"));
        }
        Ok(())
    }

    /// Values of `result` at every ordering expression
    fn cursor_values(&self, result: &PipelineResult) -> BuildResult<Vec<WireValue>> {
        self.orderings
            .iter()
            .map(|ordering| match ordering.expr() {
                Expr::Field(field) if field.is_document_id() => result
                    .reference()
                    .map(|r| WireValue::Reference(r.absolute_path()))
                    .ok_or_else(|| {
                        BuildError::invalid_cursor("result has no document name to resume from")
                    }),
                Expr::Field(field) => result.get_value(field.path()).cloned().ok_or_else(|| {
                    BuildError::invalid_cursor(format!(
                        "result has no value for ordering field '{}'",
                        field.path()
                    ))
                    .with_field(field.path())
                }),
                other => Err(BuildError::invalid_cursor(format!(
                    "cursor values can only be read for field orderings, got {}",
                    other
                ))),
            })
            .collect()
    }

    fn to_wire(&self, direction: PageDirection) -> WireValue {
        let mut map = BTreeMap::new();
        map.insert("page_size".to_string(), WireValue::Integer(self.page_size));
        map.insert(
            "orderings".to_string(),
            WireValue::Array(self.orderings.iter().map(serialize_ordering).collect()),
        );
        map.insert(
            "direction".to_string(),
            WireValue::String(direction.name().to_string()),
        );
        if let Some(offset) = self.offset {
            map.insert("offset".to_string(), WireValue::Integer(offset));
        }
        if let Some(start) = &self.start {
            map.insert("start_cursor".to_string(), start.to_wire());
        }
        if let Some(end) = &self.end {
            map.insert("end_cursor".to_string(), end.to_wire());
        }
        WireValue::Map(map)
    }
}

/// One page of a paginated pipeline, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    paginating: PaginatingPipeline,
    direction: PageDirection,
}

impl PageRequest {
    pub fn direction(&self) -> PageDirection {
        self.direction
    }

    pub fn paginating(&self) -> &PaginatingPipeline {
        &self.paginating
    }
}

impl Executable for PageRequest {
    fn pipeline(&self) -> &Pipeline {
        &self.paginating.pipeline
    }

    fn execution_options(&self) -> BuildResult<BTreeMap<String, WireValue>> {
        let mut options = BTreeMap::new();
        options.insert(
            PAGINATION_OPTION.to_string(),
            self.paginating.to_wire(self.direction),
        );
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::BuildErrorCode;
    use crate::execution::result::ExecutionContext;
    use crate::execution::transport::RowPayload;
    use crate::expr::{field, ExprMethods, Field};
    use crate::pipeline::PipelineSource;

    fn paginating() -> PaginatingPipeline {
        PipelineSource::collection("orders")
            .unwrap()
            .paginate(
                20,
                [
                    field("ts").descending(),
                    Field::document_id().ascending(),
                ],
            )
            .unwrap()
    }

    fn result() -> PipelineResult {
        let mut fields = BTreeMap::new();
        fields.insert("ts".to_string(), WireValue::Integer(1700));
        let payload = RowPayload {
            name: Some("projects/p/databases/d/documents/orders/o1".into()),
            fields: Some(fields),
            ..Default::default()
        };
        PipelineResult::decode(payload, None, Arc::new(ExecutionContext::new("d"))).unwrap()
    }

    #[test]
    fn test_page_size_and_orderings_required() {
        let p = PipelineSource::collection("orders").unwrap();
        assert!(p.paginate(0, [field("ts").ascending()]).is_err());
        assert!(p.paginate(10, Vec::new()).is_err());
    }

    #[test]
    fn test_start_after_reads_ordering_values() {
        let next = paginating().start_after(&result()).unwrap();
        let cursor = next.start_cursor().unwrap();
        assert!(!cursor.is_inclusive());
        assert_eq!(
            cursor.values(),
            &[
                WireValue::Integer(1700),
                WireValue::Reference("/orders/o1".into())
            ]
        );
    }

    #[test]
    fn test_cursor_requires_field_orderings() {
        let p = PipelineSource::collection("orders")
            .unwrap()
            .paginate(5, [field("a").add(1).ascending()])
            .unwrap();
        let err = p.start_at(&result()).unwrap_err();
        assert_eq!(err.code(), BuildErrorCode::InvalidCursor);
    }

    #[test]
    fn test_cursor_longer_than_orderings_rejected() {
        let cursor = Cursor::at(vec![WireValue::Integer(1); 3]);
        assert!(paginating().with_end_cursor(cursor).is_err());
    }

    #[test]
    fn test_options_carry_pagination() {
        let request = paginating().offset(5).unwrap().last_page();
        let options = request.execution_options().unwrap();
        let pagination = options[PAGINATION_OPTION].as_map().unwrap();
        assert_eq!(pagination["page_size"], WireValue::Integer(20));
        assert_eq!(pagination["offset"], WireValue::Integer(5));
        assert_eq!(pagination["direction"], WireValue::String("backward".into()));
        assert!(!pagination.contains_key("start_cursor"));
        assert_eq!(request.pipeline().len(), 1);
    }
}
