//! Stage algebra
//!
//! One variant per pipeline step. A stage owns everything it needs; joins
//! and unions hold an independent nested `Pipeline` value, never a link
//! back to the pipeline containing them.
//!
//! Constructors validate their input and return `BuildResult`, so an
//! invalid stage can never be appended to a pipeline.

mod options;

pub use options::{
    DistanceMeasure, JoinCondition, JoinKind, MergeMode, SampleSize, SortDensity, SortTruncation,
};

use std::collections::BTreeMap;

use crate::errors::{BuildError, BuildResult};
use crate::expr::{
    resolve_selectables, Accumulator, AggregatorTarget, BooleanExpr, Expr, Field, Ordering,
    Selectable,
};
use crate::pipeline::Pipeline;
use crate::value::{split_path, DocumentReference};

/// A single pipeline step
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// All documents of one collection (relative path, odd segment count)
    Collection { path: String },
    /// All collections with this id, at any depth
    CollectionGroup { collection_id: String },
    Database,
    /// Explicit point reads
    Documents(Vec<DocumentReference>),
    Select(BTreeMap<String, Expr>),
    AddFields(BTreeMap<String, Expr>),
    RemoveFields(Vec<Field>),
    Filter(BooleanExpr),
    Offset(i64),
    Limit(i64),
    Sort {
        orderings: Vec<Ordering>,
        density: SortDensity,
        truncation: SortTruncation,
    },
    Aggregate {
        accumulators: BTreeMap<String, Accumulator>,
        groups: BTreeMap<String, Expr>,
    },
    Distinct(BTreeMap<String, Expr>),
    FindNearest {
        field: Field,
        vector: Vec<f64>,
        measure: DistanceMeasure,
        options: FindNearestOptions,
    },
    Join {
        kind: JoinKind,
        condition: Option<JoinCondition>,
        left_alias: Option<String>,
        right_alias: Option<String>,
        right: Box<Pipeline>,
    },
    Unnest {
        field: Field,
        alias: String,
        options: UnnestOptions,
    },
    Union(Box<Pipeline>),
    Sample(SampleSize),
    Replace { expr: Expr, mode: MergeMode },
    Generic(GenericStage),
}

/// Optional parameters of a nearest-neighbour search
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindNearestOptions {
    pub limit: Option<i64>,
    /// Output field receiving each row's computed distance
    pub distance_field: Option<Field>,
}

impl FindNearestOptions {
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_distance_field(mut self, field: impl Into<Field>) -> Self {
        self.distance_field = Some(field.into());
        self
    }
}

/// Optional parameters of an unnest stage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnnestOptions {
    pub mode: MergeMode,
    /// Output field receiving the element's array index
    pub index_field: Option<String>,
}

impl UnnestOptions {
    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_index_field(mut self, field: impl Into<String>) -> Self {
        self.index_field = Some(field.into());
        self
    }
}

/// Argument of a generic stage
#[derive(Debug, Clone, PartialEq)]
pub enum GenericArg {
    Expr(Expr),
    /// Plain JSON value, encoded when the stage is serialized
    Json(serde_json::Value),
    Pipeline(Pipeline),
}

/// Stage the client does not model; name and arguments are sent as given
#[derive(Debug, Clone, PartialEq)]
pub struct GenericStage {
    name: String,
    args: Vec<GenericArg>,
    options: BTreeMap<String, GenericArg>,
}

impl GenericStage {
    pub fn new(name: impl Into<String>) -> BuildResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BuildError::invalid_argument("stage name must not be empty"));
        }
        Ok(Self {
            name,
            args: Vec::new(),
            options: BTreeMap::new(),
        })
    }

    pub fn arg(mut self, arg: impl Into<Expr>) -> Self {
        self.args.push(GenericArg::Expr(arg.into()));
        self
    }

    pub fn json_arg(mut self, value: serde_json::Value) -> Self {
        self.args.push(GenericArg::Json(value));
        self
    }

    pub fn pipeline_arg(mut self, pipeline: Pipeline) -> Self {
        self.args.push(GenericArg::Pipeline(pipeline));
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.options.insert(key.into(), GenericArg::Expr(value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[GenericArg] {
        &self.args
    }

    pub fn options(&self) -> &BTreeMap<String, GenericArg> {
        &self.options
    }
}

impl Stage {
    /// Wire name of the stage
    pub fn name(&self) -> &str {
        match self {
            Stage::Collection { .. } => "collection",
            Stage::CollectionGroup { .. } => "collection_group",
            Stage::Database => "database",
            Stage::Documents(_) => "documents",
            Stage::Select(_) => "select",
            Stage::AddFields(_) => "add_fields",
            Stage::RemoveFields(_) => "remove_fields",
            Stage::Filter(_) => "filter",
            Stage::Offset(_) => "offset",
            Stage::Limit(_) => "limit",
            Stage::Sort { .. } => "sort",
            Stage::Aggregate { .. } => "aggregate",
            Stage::Distinct(_) => "distinct",
            Stage::FindNearest { .. } => "find_nearest",
            Stage::Join { kind, .. } => kind.stage_name(),
            Stage::Unnest { .. } => "unnest",
            Stage::Union(_) => "union",
            Stage::Sample(_) => "sample",
            Stage::Replace { .. } => "replace_with",
            Stage::Generic(g) => g.name(),
        }
    }

    /// Whether the stage produces rows from storage rather than transforming input
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Stage::Collection { .. }
                | Stage::CollectionGroup { .. }
                | Stage::Database
                | Stage::Documents(_)
        )
    }

    pub fn collection(path: &str) -> BuildResult<Stage> {
        if path.starts_with('/') {
            return Err(BuildError::invalid_path(
                path,
                "collection path must be relative to the database root",
            ));
        }
        let segments = split_path(path)?;
        if segments.len() % 2 == 0 {
            return Err(BuildError::invalid_path(
                path,
                "a collection path has an odd number of segments",
            ));
        }
        Ok(Stage::Collection {
            path: segments.join("/"),
        })
    }

    pub fn collection_group(collection_id: &str) -> BuildResult<Stage> {
        if collection_id.is_empty() {
            return Err(BuildError::invalid_path(
                collection_id,
                "collection id must not be empty",
            ));
        }
        if collection_id.contains('/') {
            return Err(BuildError::invalid_path(
                collection_id,
                "collection id must not contain '/'",
            ));
        }
        Ok(Stage::CollectionGroup {
            collection_id: collection_id.to_string(),
        })
    }

    pub fn documents<I, S>(paths: I) -> BuildResult<Stage>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let docs = paths
            .into_iter()
            .map(|p| DocumentReference::new(p.as_ref()))
            .collect::<BuildResult<Vec<_>>>()?;
        Stage::document_refs(docs)
    }

    pub fn document_refs(docs: Vec<DocumentReference>) -> BuildResult<Stage> {
        if docs.is_empty() {
            return Err(BuildError::invalid_argument(
                "documents stage needs at least one document",
            ));
        }
        Ok(Stage::Documents(docs))
    }

    pub fn select<I, S>(selections: I) -> BuildResult<Stage>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        let map = non_empty(resolve_selectables(selections)?, "select")?;
        Ok(Stage::Select(map))
    }

    pub fn add_fields<I, S>(selections: I) -> BuildResult<Stage>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        let map = non_empty(resolve_selectables(selections)?, "add_fields")?;
        Ok(Stage::AddFields(map))
    }

    pub fn remove_fields<I, F>(fields: I) -> BuildResult<Stage>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let fields: Vec<Field> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(BuildError::invalid_argument(
                "remove_fields needs at least one field",
            ));
        }
        Ok(Stage::RemoveFields(fields))
    }

    pub fn filter(condition: BooleanExpr) -> Stage {
        Stage::Filter(condition)
    }

    pub fn offset(offset: i64) -> BuildResult<Stage> {
        if offset < 0 {
            return Err(BuildError::negative_value("offset", offset));
        }
        Ok(Stage::Offset(offset))
    }

    pub fn limit(limit: i64) -> BuildResult<Stage> {
        if limit < 0 {
            return Err(BuildError::negative_value("limit", limit));
        }
        Ok(Stage::Limit(limit))
    }

    pub fn sort(
        orderings: Vec<Ordering>,
        density: SortDensity,
        truncation: SortTruncation,
    ) -> BuildResult<Stage> {
        if orderings.is_empty() {
            return Err(BuildError::invalid_argument("sort needs at least one ordering"));
        }
        Ok(Stage::Sort {
            orderings,
            density,
            truncation,
        })
    }

    /// Aggregates over `groups`, or over the whole input when `groups` is empty
    pub fn aggregate(
        targets: Vec<AggregatorTarget>,
        groups: BTreeMap<String, Expr>,
    ) -> BuildResult<Stage> {
        if targets.is_empty() {
            return Err(BuildError::invalid_argument(
                "aggregate needs at least one accumulator; use distinct for group values only",
            ));
        }
        let mut accumulators = BTreeMap::new();
        for target in targets {
            let alias = target.alias().to_string();
            if groups.contains_key(&alias) || accumulators.contains_key(&alias) {
                return Err(BuildError::duplicate_field(alias));
            }
            accumulators.insert(alias, target.accumulator().clone());
        }
        Ok(Stage::Aggregate {
            accumulators,
            groups,
        })
    }

    pub fn distinct<I, S>(groups: I) -> BuildResult<Stage>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        let map = non_empty(resolve_selectables(groups)?, "distinct")?;
        Ok(Stage::Distinct(map))
    }

    pub fn find_nearest(
        field: impl Into<Field>,
        vector: &[f64],
        measure: DistanceMeasure,
        options: FindNearestOptions,
    ) -> BuildResult<Stage> {
        if vector.is_empty() {
            return Err(BuildError::invalid_argument("query vector must not be empty"));
        }
        if let Some(limit) = options.limit {
            if limit < 0 {
                return Err(BuildError::negative_value("find_nearest limit", limit));
            }
        }
        Ok(Stage::FindNearest {
            field: field.into(),
            vector: vector.to_vec(),
            measure,
            options,
        })
    }

    pub(crate) fn join(
        kind: JoinKind,
        condition: Option<JoinCondition>,
        left_alias: Option<String>,
        right_alias: Option<String>,
        right: Pipeline,
    ) -> BuildResult<Stage> {
        match (&kind, &condition) {
            (JoinKind::Cross, Some(_)) => {
                return Err(BuildError::invalid_argument("cross join takes no condition"))
            }
            (JoinKind::Cross, None) => {}
            (_, None) => {
                return Err(BuildError::invalid_argument(format!(
                    "{} join needs a condition",
                    kind.name()
                )))
            }
            (_, Some(JoinCondition::Using(fields))) if fields.is_empty() => {
                return Err(BuildError::invalid_argument(
                    "join using needs at least one field",
                ))
            }
            _ => {}
        }
        if right.is_empty() {
            return Err(BuildError::invalid_argument(
                "right-hand side of a join must have a source stage",
            ));
        }
        Ok(Stage::Join {
            kind,
            condition,
            left_alias,
            right_alias,
            right: Box::new(right),
        })
    }

    pub fn unnest(
        field: impl Into<Field>,
        alias: impl Into<String>,
        options: UnnestOptions,
    ) -> BuildResult<Stage> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(BuildError::invalid_argument("unnest alias must not be empty"));
        }
        Ok(Stage::Unnest {
            field: field.into(),
            alias,
            options,
        })
    }

    pub fn union(other: Pipeline) -> BuildResult<Stage> {
        if other.is_empty() {
            return Err(BuildError::invalid_argument(
                "union needs a pipeline with a source stage",
            ));
        }
        Ok(Stage::Union(Box::new(other)))
    }

    pub fn sample(size: SampleSize) -> Stage {
        Stage::Sample(size)
    }

    /// Replaces each row with the map produced by `expr`
    pub fn replace(expr: impl Into<Expr>, mode: MergeMode) -> Stage {
        Stage::Replace {
            expr: expr.into(),
            mode,
        }
    }
}

fn non_empty(map: BTreeMap<String, Expr>, stage: &str) -> BuildResult<BTreeMap<String, Expr>> {
    if map.is_empty() {
        return Err(BuildError::invalid_argument(format!(
            "{} needs at least one field",
            stage
        )));
    }
    Ok(map)
}
