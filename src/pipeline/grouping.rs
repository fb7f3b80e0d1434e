//! Two-phase grouped aggregation

use std::collections::BTreeMap;

use crate::errors::{BuildError, BuildResult};
use crate::expr::{resolve_selectables, AggregatorTarget, Expr, Selectable};
use crate::stage::Stage;

use super::Pipeline;

/// A pipeline waiting for its accumulators.
///
/// Not executable: only `aggregate` turns it back into a `Pipeline`.
#[derive(Debug, Clone)]
pub struct GroupingPipeline {
    base: Pipeline,
    groups: BTreeMap<String, Expr>,
}

impl GroupingPipeline {
    pub(crate) fn new<I, S>(base: Pipeline, by: I) -> BuildResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Selectable,
    {
        let groups = resolve_selectables(by)?;
        if groups.is_empty() {
            return Err(BuildError::invalid_argument(
                "group needs at least one grouping key",
            ));
        }
        Ok(Self { base, groups })
    }

    pub fn groups(&self) -> &BTreeMap<String, Expr> {
        &self.groups
    }

    /// Completes the grouping with one accumulator per output column
    pub fn aggregate<I>(&self, targets: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = AggregatorTarget>,
    {
        let stage = Stage::aggregate(targets.into_iter().collect(), self.groups.clone())?;
        Ok(self.base.append(stage))
    }
}
