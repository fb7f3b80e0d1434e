//! Stage parameter enums
//!
//! Each enum encodes as its lower-cased canonical name. The open enum
//! `DistanceMeasure` carries a verbatim name for measures unknown to the
//! client.

use crate::errors::{BuildError, BuildResult};
use crate::expr::{BooleanExpr, Field};

/// Server hint for how densely sorted output must be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDensity {
    #[default]
    Unspecified,
    Required,
}

impl SortDensity {
    pub fn name(&self) -> &'static str {
        match self {
            SortDensity::Unspecified => "unspecified",
            SortDensity::Required => "required",
        }
    }
}

/// Server hint controlling whether sort keys may be truncated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortTruncation {
    #[default]
    Unspecified,
    Disabled,
}

impl SortTruncation {
    pub fn name(&self) -> &'static str {
        match self {
            SortTruncation::Unspecified => "unspecified",
            SortTruncation::Disabled => "disabled",
        }
    }
}

/// Vector distance measure for nearest-neighbour search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistanceMeasure {
    Euclidean,
    Cosine,
    DotProduct,
    /// Measure name sent verbatim
    Generic(String),
}

impl DistanceMeasure {
    pub fn name(&self) -> &str {
        match self {
            DistanceMeasure::Euclidean => "euclidean",
            DistanceMeasure::Cosine => "cosine",
            DistanceMeasure::DotProduct => "dot_product",
            DistanceMeasure::Generic(name) => name,
        }
    }
}

/// Join flavour; semi and anti kinds keep only one side's columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Cross,
    Inner,
    Full,
    Left,
    Right,
    LeftSemi,
    RightSemi,
    LeftAntiSemi,
    RightAntiSemi,
}

impl JoinKind {
    pub fn name(&self) -> &'static str {
        match self {
            JoinKind::Cross => "cross",
            JoinKind::Inner => "inner",
            JoinKind::Full => "full",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::LeftSemi => "left_semi",
            JoinKind::RightSemi => "right_semi",
            JoinKind::LeftAntiSemi => "left_anti_semi",
            JoinKind::RightAntiSemi => "right_anti_semi",
        }
    }

    pub fn is_semi(&self) -> bool {
        matches!(
            self,
            JoinKind::LeftSemi | JoinKind::RightSemi | JoinKind::LeftAntiSemi | JoinKind::RightAntiSemi
        )
    }

    /// Stage name the kind serializes under
    pub fn stage_name(&self) -> &'static str {
        if self.is_semi() {
            "semi_join"
        } else {
            "join"
        }
    }
}

/// How a join matches rows
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(BooleanExpr),
    /// Equality on same-named fields of both sides
    Using(Vec<Field>),
}

/// How nested values combine with the parent row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    FullReplace,
    MergePreferNested,
    MergePreferParent,
}

impl MergeMode {
    pub fn name(&self) -> &'static str {
        match self {
            MergeMode::FullReplace => "full_replace",
            MergeMode::MergePreferNested => "merge_prefer_nest",
            MergeMode::MergePreferParent => "merge_prefer_parent",
        }
    }
}

/// Sample size: an absolute row count or a percentage of the input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSize {
    Documents(i64),
    Percent(f64),
}

impl SampleSize {
    pub fn documents(count: i64) -> BuildResult<Self> {
        if count < 0 {
            return Err(BuildError::negative_value("sample size", count));
        }
        Ok(SampleSize::Documents(count))
    }

    pub fn percent(percent: f64) -> BuildResult<Self> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(BuildError::invalid_argument(format!(
                "sample percentage must be within [0, 100], got {}",
                percent
            )));
        }
        Ok(SampleSize::Percent(percent))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            SampleSize::Documents(_) => "documents",
            SampleSize::Percent(_) => "percent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semi_join_stage_name() {
        assert_eq!(JoinKind::Inner.stage_name(), "join");
        assert_eq!(JoinKind::LeftAntiSemi.stage_name(), "semi_join");
        assert_eq!(JoinKind::LeftAntiSemi.name(), "left_anti_semi");
    }

    #[test]
    fn test_generic_measure_is_verbatim() {
        assert_eq!(DistanceMeasure::Generic("manhattan".into()).name(), "manhattan");
        assert_eq!(DistanceMeasure::DotProduct.name(), "dot_product");
    }

    #[test]
    fn test_sample_validation() {
        assert!(SampleSize::documents(-1).is_err());
        assert!(SampleSize::percent(150.0).is_err());
        assert_eq!(SampleSize::percent(12.5).unwrap().mode(), "percent");
    }
}
