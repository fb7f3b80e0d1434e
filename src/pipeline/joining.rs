//! Two-phase join construction

use crate::errors::BuildResult;
use crate::expr::{BooleanExpr, Field};
use crate::stage::{JoinCondition, JoinKind, Stage};

use super::Pipeline;

/// A join waiting for its condition.
///
/// Not executable: `on` or `using` produce the joined `Pipeline`.
#[derive(Debug, Clone)]
pub struct JoiningPipeline {
    left: Pipeline,
    right: Pipeline,
    kind: JoinKind,
    left_alias: Option<String>,
    right_alias: Option<String>,
}

impl JoiningPipeline {
    pub(crate) fn new(left: Pipeline, right: Pipeline, kind: JoinKind) -> Self {
        Self {
            left,
            right,
            kind,
            left_alias: None,
            right_alias: None,
        }
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    /// Names under which each side's columns are exposed to the condition
    pub fn with_aliases(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_alias = Some(left.into());
        self.right_alias = Some(right.into());
        self
    }

    pub fn on(self, condition: BooleanExpr) -> BuildResult<Pipeline> {
        self.complete(JoinCondition::On(condition))
    }

    /// Joins on equality of same-named fields
    pub fn using<I, F>(self, fields: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        self.complete(JoinCondition::Using(fields))
    }

    fn complete(self, condition: JoinCondition) -> BuildResult<Pipeline> {
        let stage = Stage::join(
            self.kind,
            Some(condition),
            self.left_alias,
            self.right_alias,
            self.right,
        )?;
        Ok(self.left.append(stage))
    }
}
