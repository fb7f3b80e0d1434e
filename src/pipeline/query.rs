//! Classic structured query conversion
//!
//! Translates a filter/order/limit query into an equivalent pipeline. Query
//! semantics that pipelines do not apply implicitly are made explicit:
//! every compared or ordered field must exist, and results are tie-broken on
//! the document name. Constructs with no pipeline equivalent fail loudly
//! instead of being dropped.

use crate::errors::{BuildError, BuildResult};
use crate::expr::{
    and, array_contains, array_contains_any, count_all, eq_any, equal, exists, greater_than,
    greater_than_or_equal, is_nan, is_not_nan, is_not_null, is_null, less_than,
    less_than_or_equal, not, or, AggregatorTarget, BooleanExpr, Direction, ExprMethods, Field,
    Ordering,
};
use crate::value::WireValue;

use super::{Pipeline, PipelineSource};

/// Where a structured query reads from
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Collection(String),
    CollectionGroup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperator {
    Unspecified,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    ArrayContains,
    In,
    ArrayContainsAny,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Unspecified,
    IsNan,
    IsNull,
    IsNotNan,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOperator {
    Unspecified,
    And,
    Or,
}

/// Filter tree of a structured query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Field {
        field: String,
        op: FieldOperator,
        value: WireValue,
    },
    Unary {
        field: String,
        op: UnaryOperator,
    },
    Composite {
        op: CompositeOperator,
        filters: Vec<QueryFilter>,
    },
}

impl QueryFilter {
    pub fn field(field: impl Into<String>, op: FieldOperator, value: impl Into<WireValue>) -> Self {
        QueryFilter::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn unary(field: impl Into<String>, op: UnaryOperator) -> Self {
        QueryFilter::Unary {
            field: field.into(),
            op,
        }
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::Composite {
            op: CompositeOperator::And,
            filters,
        }
    }

    pub fn or(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::Composite {
            op: CompositeOperator::Or,
            filters,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOrder {
    pub field: String,
    pub direction: Direction,
}

impl QueryOrder {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOperator {
    Sum,
    Count,
    Average,
    Other(String),
}

/// Aggregation requested on top of a structured query
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateField {
    pub operator: AggregateOperator,
    /// Empty for `count`
    pub field_path: String,
    pub alias: String,
}

impl AggregateField {
    pub fn sum(field_path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            operator: AggregateOperator::Sum,
            field_path: field_path.into(),
            alias: alias.into(),
        }
    }

    pub fn average(field_path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            operator: AggregateOperator::Average,
            field_path: field_path.into(),
            alias: alias.into(),
        }
    }

    pub fn count(alias: impl Into<String>) -> Self {
        Self {
            operator: AggregateOperator::Count,
            field_path: String::new(),
            alias: alias.into(),
        }
    }
}

/// Filter/order/limit query over one collection or collection group
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    pub source: QuerySource,
    pub filter: Option<QueryFilter>,
    pub order_by: Vec<QueryOrder>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// When non-empty the query yields a single aggregated row
    pub aggregations: Vec<AggregateField>,
}

impl StructuredQuery {
    pub fn collection(path: impl Into<String>) -> Self {
        Self::from_source(QuerySource::Collection(path.into()))
    }

    pub fn collection_group(id: impl Into<String>) -> Self {
        Self::from_source(QuerySource::CollectionGroup(id.into()))
    }

    fn from_source(source: QuerySource) -> Self {
        Self {
            source,
            filter: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
            aggregations: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: QueryOrder) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn aggregate(mut self, field: AggregateField) -> Self {
        self.aggregations.push(field);
        self
    }
}

/// Builds the pipeline equivalent of `query`
pub(crate) fn to_pipeline(query: &StructuredQuery) -> BuildResult<Pipeline> {
    let mut pipeline = match &query.source {
        QuerySource::Collection(path) => PipelineSource::collection(path)?,
        QuerySource::CollectionGroup(id) => PipelineSource::collection_group(id)?,
    };

    if let Some(filter) = &query.filter {
        pipeline = pipeline.filter(to_boolean_expr(filter)?);
    }

    if !query.order_by.is_empty() {
        let mut conditions = query
            .order_by
            .iter()
            .filter(|o| o.field != crate::expr::DOCUMENT_ID)
            .map(|o| exists(o.field.as_str()));
        if let Some(first) = conditions.next() {
            pipeline = pipeline.filter(and(first, conditions.collect::<Vec<_>>()));
        }
    }

    pipeline = pipeline.sort(orderings_with_tie_breaker(&query.order_by))?;

    if let Some(offset) = query.offset {
        pipeline = pipeline.offset(offset)?;
    }
    if let Some(limit) = query.limit {
        pipeline = pipeline.limit(limit)?;
    }

    if !query.aggregations.is_empty() {
        let mut existence = query.aggregations.iter().filter_map(to_exists_expr);
        if let Some(first) = existence.next() {
            pipeline = pipeline.filter(and(first, existence.collect::<Vec<_>>()));
        }
        let targets = query
            .aggregations
            .iter()
            .map(to_aggregator_target)
            .collect::<BuildResult<Vec<_>>>()?;
        pipeline = pipeline.aggregate(targets)?;
    }

    Ok(pipeline)
}

/// Explicit orderings followed by the document name, in the direction of the
/// last explicit ordering
fn orderings_with_tie_breaker(order_by: &[QueryOrder]) -> Vec<Ordering> {
    let mut orderings: Vec<Ordering> = order_by
        .iter()
        .map(|o| Ordering::new(Field::of(o.field.as_str()), o.direction))
        .collect();
    if !order_by.iter().any(|o| o.field == crate::expr::DOCUMENT_ID) {
        let direction = order_by
            .last()
            .map(|o| o.direction)
            .unwrap_or(Direction::Ascending);
        orderings.push(Ordering::new(Field::document_id(), direction));
    }
    orderings
}

/// Converts a query filter, wrapping every field condition with an
/// existence check
pub(crate) fn to_boolean_expr(filter: &QueryFilter) -> BuildResult<BooleanExpr> {
    match filter {
        QueryFilter::Field { field, op, value } => {
            let f = Field::of(field.as_str());
            let condition = match op {
                FieldOperator::LessThan => less_than(f.clone(), value.clone()),
                FieldOperator::LessThanOrEqual => less_than_or_equal(f.clone(), value.clone()),
                FieldOperator::GreaterThan => greater_than(f.clone(), value.clone()),
                FieldOperator::GreaterThanOrEqual => {
                    greater_than_or_equal(f.clone(), value.clone())
                }
                FieldOperator::Equal => equal(f.clone(), value.clone()),
                FieldOperator::NotEqual => not(equal(f.clone(), value.clone())),
                FieldOperator::ArrayContains => array_contains(f.clone(), value.clone()),
                FieldOperator::In => eq_any(f.clone(), array_values(field, value)?),
                FieldOperator::ArrayContainsAny => {
                    array_contains_any(f.clone(), array_values(field, value)?)
                }
                FieldOperator::NotIn => not(eq_any(f.clone(), array_values(field, value)?)),
                FieldOperator::Unspecified => {
                    return Err(BuildError::unsupported(format!("{:?}", op)).with_field(field))
                }
            };
            Ok(and(f.exists(), [condition]))
        }
        QueryFilter::Unary { field, op } => {
            let f = Field::of(field.as_str());
            let condition = match op {
                UnaryOperator::IsNan => is_nan(f.clone()),
                UnaryOperator::IsNull => is_null(f.clone()),
                UnaryOperator::IsNotNan => is_not_nan(f.clone()),
                UnaryOperator::IsNotNull => is_not_null(f.clone()),
                UnaryOperator::Unspecified => {
                    return Err(BuildError::unsupported(format!("{:?}", op)).with_field(field))
                }
            };
            Ok(and(f.exists(), [condition]))
        }
        QueryFilter::Composite { op, filters } => {
            let mut converted = filters
                .iter()
                .map(to_boolean_expr)
                .collect::<BuildResult<Vec<_>>>()?
                .into_iter();
            let first = converted
                .next()
                .ok_or_else(|| BuildError::unsupported(format!("empty {:?} filter", op)))?;
            match op {
                CompositeOperator::And => Ok(and(first, converted)),
                CompositeOperator::Or => Ok(or(first, converted)),
                CompositeOperator::Unspecified => Err(BuildError::unsupported(format!("{:?}", op))),
            }
        }
    }
}

fn array_values(field: &str, value: &WireValue) -> BuildResult<Vec<WireValue>> {
    value.as_array().map(<[WireValue]>::to_vec).ok_or_else(|| {
        BuildError::invalid_argument(format!(
            "membership filter on '{}' needs an array value",
            field
        ))
        .with_field(field)
    })
}

/// Converts a query aggregation into an aggregate stage target
pub(crate) fn to_aggregator_target(field: &AggregateField) -> BuildResult<AggregatorTarget> {
    let path = Field::of(field.field_path.as_str());
    match &field.operator {
        AggregateOperator::Sum => Ok(path.sum().alias(field.alias.as_str())),
        AggregateOperator::Count => Ok(count_all().alias(field.alias.as_str())),
        AggregateOperator::Average => Ok(path.avg().alias(field.alias.as_str())),
        AggregateOperator::Other(name) => Err(BuildError::unsupported(name.as_str())),
    }
}

/// Existence check for the aggregated field, `None` for `count`
pub(crate) fn to_exists_expr(field: &AggregateField) -> Option<BooleanExpr> {
    if field.field_path.is_empty() {
        None
    } else {
        Some(exists(field.field_path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BuildErrorCode;
    use crate::stage::Stage;

    #[test]
    fn test_comparison_wrapped_in_exists() {
        let filter = QueryFilter::field("rating", FieldOperator::GreaterThan, 3);
        let cond = to_boolean_expr(&filter).unwrap();
        assert_eq!(
            cond.to_string(),
            "and(exists(rating), greater_than(rating, 3))"
        );
    }

    #[test]
    fn test_not_in_is_negated_eq_any() {
        let filter = QueryFilter::field(
            "city",
            FieldOperator::NotIn,
            WireValue::from(vec!["SF", "LA"]),
        );
        let cond = to_boolean_expr(&filter).unwrap();
        assert_eq!(
            cond.to_string(),
            "and(exists(city), not(eq_any(city, [\"SF\", \"LA\"])))"
        );
    }

    #[test]
    fn test_unspecified_operator_fails_loudly() {
        let filter = QueryFilter::field("a", FieldOperator::Unspecified, 1);
        let err = to_boolean_expr(&filter).unwrap_err();
        assert_eq!(err.code(), BuildErrorCode::UnsupportedOperation);

        let empty = QueryFilter::and(vec![]);
        assert!(to_boolean_expr(&empty).is_err());
    }

    #[test]
    fn test_membership_requires_array() {
        let filter = QueryFilter::field("a", FieldOperator::In, 1);
        assert_eq!(
            to_boolean_expr(&filter).unwrap_err().code(),
            BuildErrorCode::InvalidArgument
        );
    }

    #[test]
    fn test_unsupported_aggregate() {
        let field = AggregateField {
            operator: AggregateOperator::Other("median".into()),
            field_path: "x".into(),
            alias: "m".into(),
        };
        assert!(to_aggregator_target(&field).is_err());
        assert!(to_exists_expr(&AggregateField::count("n")).is_none());
    }

    #[test]
    fn test_full_query_conversion() {
        let query = StructuredQuery::collection("restaurants")
            .with_filter(QueryFilter::field("city", FieldOperator::Equal, "SF"))
            .order_by(QueryOrder::descending("rating"))
            .with_limit(5);
        let pipeline = to_pipeline(&query).unwrap();
        let names: Vec<&str> = pipeline.stages().iter().map(Stage::name).collect();
        assert_eq!(names, ["collection", "filter", "filter", "sort", "limit"]);

        match &pipeline.stages()[3] {
            Stage::Sort { orderings, .. } => {
                assert_eq!(orderings.len(), 2);
                assert_eq!(orderings[1].direction(), Direction::Descending);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
