//! Immutable pipeline builder
//!
//! A `Pipeline` is an append-only sequence of stages. Every builder method
//! borrows the receiver, copies its stage list with exactly one new stage
//! appended and returns the result, so earlier pipeline values stay valid
//! and unchanged. Stage lists are shared behind an `Arc`, which makes clones
//! cheap and pipelines safe to read from any thread.

mod grouping;
mod joining;
mod query;
mod source;

pub use grouping::GroupingPipeline;
pub use joining::JoiningPipeline;
pub use query::{
    AggregateField, AggregateOperator, CompositeOperator, FieldOperator, QueryFilter,
    QueryOrder, QuerySource, StructuredQuery, UnaryOperator,
};
pub use source::PipelineSource;

use std::fmt;
use std::sync::Arc;

use crate::errors::{BuildError, BuildResult};
use crate::execution::PaginatingPipeline;
use crate::expr::{AggregatorTarget, BooleanExpr, Expr, Field, Ordering, Selectable};
use crate::stage::{
    DistanceMeasure, FindNearestOptions, GenericStage, JoinKind, MergeMode, SampleSize,
    SortDensity, SortTruncation, Stage, UnnestOptions,
};

/// Ordered, immutable sequence of stages
#[derive(Clone, PartialEq)]
pub struct Pipeline {
    name: Option<String>,
    stages: Arc<[Stage]>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            name: None,
            stages: Arc::from(Vec::new()),
        }
    }
}

impl Pipeline {
    /// Starts a pipeline from a source stage
    pub(crate) fn from_source(source: Stage) -> Self {
        Self {
            name: None,
            stages: Arc::from(vec![source]),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Display name, when one was given
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Same stages under a display name
    pub fn with_name(&self, name: impl Into<String>) -> Pipeline {
        Pipeline {
            name: Some(name.into()),
            stages: Arc::clone(&self.stages),
        }
    }

    /// Copy of this pipeline with `stage` appended
    pub fn append(&self, stage: Stage) -> Pipeline {
        let mut stages = Vec::with_capacity(self.stages.len() + 1);
        stages.extend(self.stages.iter().cloned());
        stages.push(stage);
        Pipeline {
            name: self.name.clone(),
            stages: Arc::from(stages),
        }
    }

    /// Projects exactly the given columns
    pub fn select<I, S>(&self, selections: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        Ok(self.append(Stage::select(selections)?))
    }

    /// Adds or overwrites columns, keeping the existing ones
    pub fn add_fields<I, S>(&self, selections: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        Ok(self.append(Stage::add_fields(selections)?))
    }

    pub fn remove_fields<I, F>(&self, fields: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Ok(self.append(Stage::remove_fields(fields)?))
    }

    pub fn filter(&self, condition: BooleanExpr) -> Pipeline {
        self.append(Stage::filter(condition))
    }

    /// Filters on an arbitrary expression, rejecting one that cannot be a condition
    pub fn filter_expr(&self, condition: Expr) -> BuildResult<Pipeline> {
        Ok(self.filter(BooleanExpr::try_from(condition)?))
    }

    pub fn offset(&self, offset: i64) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::offset(offset)?))
    }

    pub fn limit(&self, limit: i64) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::limit(limit)?))
    }

    pub fn sort<I>(&self, orderings: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = Ordering>,
    {
        self.sort_with(orderings, SortDensity::default(), SortTruncation::default())
    }

    /// Sorts with explicit server hints
    pub fn sort_with<I>(
        &self,
        orderings: I,
        density: SortDensity,
        truncation: SortTruncation,
    ) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = Ordering>,
    {
        let stage = Stage::sort(orderings.into_iter().collect(), density, truncation)?;
        Ok(self.append(stage))
    }

    /// Aggregates over the whole input
    pub fn aggregate<I>(&self, targets: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = AggregatorTarget>,
    {
        let stage = Stage::aggregate(targets.into_iter().collect(), Default::default())?;
        Ok(self.append(stage))
    }

    /// First half of a grouped aggregation; complete it with `aggregate`
    pub fn group<I, S>(&self, by: I) -> BuildResult<GroupingPipeline>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        GroupingPipeline::new(self.clone(), by)
    }

    pub fn distinct<I, S>(&self, groups: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        Ok(self.append(Stage::distinct(groups)?))
    }

    pub fn find_nearest(
        &self,
        field: impl Into<Field>,
        vector: &[f64],
        measure: DistanceMeasure,
        options: FindNearestOptions,
    ) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::find_nearest(field, vector, measure, options)?))
    }

    /// First half of a join; complete it with `on` or `using`
    pub fn join(&self, right: &Pipeline, kind: JoinKind) -> JoiningPipeline {
        JoiningPipeline::new(self.clone(), right.clone(), kind)
    }

    pub fn inner_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::Inner)
    }

    pub fn left_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::Left)
    }

    pub fn right_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::Right)
    }

    pub fn full_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::Full)
    }

    /// Keeps left rows with at least one match on the right
    pub fn semi_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::LeftSemi)
    }

    /// Keeps left rows with no match on the right
    pub fn anti_join(&self, right: &Pipeline) -> JoiningPipeline {
        self.join(right, JoinKind::LeftAntiSemi)
    }

    /// Cartesian product; the only join without a condition
    pub fn cross_join(&self, right: &Pipeline) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::join(JoinKind::Cross, None, None, None, right.clone())?))
    }

    /// One output row per element of the array `field`, bound to `alias`
    pub fn unnest(&self, field: impl Into<Field>, alias: impl Into<String>) -> BuildResult<Pipeline> {
        self.unnest_with(field, alias, UnnestOptions::default())
    }

    pub fn unnest_with(
        &self,
        field: impl Into<Field>,
        alias: impl Into<String>,
        options: UnnestOptions,
    ) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::unnest(field, alias, options)?))
    }

    pub fn union(&self, other: &Pipeline) -> BuildResult<Pipeline> {
        Ok(self.append(Stage::union(other.clone())?))
    }

    pub fn sample(&self, size: SampleSize) -> Pipeline {
        self.append(Stage::sample(size))
    }

    pub fn replace(&self, expr: impl Into<Expr>, mode: MergeMode) -> Pipeline {
        self.append(Stage::replace(expr, mode))
    }

    /// Appends a stage the client does not model
    pub fn generic_stage(&self, stage: GenericStage) -> Pipeline {
        self.append(Stage::Generic(stage))
    }

    /// Wraps the pipeline for page-by-page execution
    pub fn paginate<I>(&self, page_size: i64, orderings: I) -> BuildResult<PaginatingPipeline>
    where
        I: IntoIterator<Item = Ordering>,
    {
        PaginatingPipeline::new(self.clone(), page_size, orderings.into_iter().collect())
    }

    /// Checks the pipeline can be submitted: it must start with a source stage
    /// and contain no other source stage
    pub(crate) fn validate(&self) -> BuildResult<()> {
        let first = self
            .stages
            .first()
            .ok_or_else(|| BuildError::invalid_argument("pipeline has no stages"))?;
        if !first.is_source() {
            return Err(BuildError::invalid_argument(format!(
                "pipeline must start with a source stage, found '{}'",
                first.name()
            )));
        }
        if let Some(stage) = self.stages[1..].iter().find(|s| s.is_source()) {
            return Err(BuildError::invalid_argument(format!(
                "source stage '{}' may only appear first",
                stage.name()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field(
                "stages",
                &self.stages.iter().map(Stage::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", stage.name())?;
        }
        Ok(())
    }
}
