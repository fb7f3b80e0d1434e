//! Accumulators and aggregate output targets

use super::{Expr, Selectable};

/// Reduction applied by an accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccumulatorKind {
    Sum,
    Average,
    Count,
    CountIf,
    Minimum,
    Maximum,
}

impl AccumulatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            AccumulatorKind::Sum => "sum",
            AccumulatorKind::Average => "average",
            AccumulatorKind::Count => "count",
            AccumulatorKind::CountIf => "count_if",
            AccumulatorKind::Minimum => "minimum",
            AccumulatorKind::Maximum => "maximum",
        }
    }
}

/// Reduces many rows into one value.
///
/// Accumulators are plain values: `distinct` consumes and returns, and
/// `alias` moves the accumulator into the target it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    kind: AccumulatorKind,
    arg: Option<Box<Expr>>,
    distinct: bool,
}

impl Accumulator {
    pub(crate) fn new(kind: AccumulatorKind, arg: Option<Expr>) -> Self {
        Self {
            kind,
            arg: arg.map(Box::new),
            distinct: false,
        }
    }

    /// Only consider distinct input values
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn kind(&self) -> AccumulatorKind {
        self.kind
    }

    pub fn arg(&self) -> Option<&Expr> {
        self.arg.as_deref()
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Wire function name, `_distinct` suffixed when distinct
    pub fn name(&self) -> String {
        if self.distinct {
            format!("{}_distinct", self.kind.name())
        } else {
            self.kind.name().to_string()
        }
    }

    /// Names the accumulator's output column
    pub fn alias(self, name: impl Into<String>) -> AggregatorTarget {
        AggregatorTarget {
            accumulator: self,
            alias: name.into(),
        }
    }
}

impl From<Accumulator> for Expr {
    fn from(acc: Accumulator) -> Self {
        Expr::Aggregate(acc)
    }
}

/// Accumulator bound to an output field of an aggregate stage
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorTarget {
    accumulator: Accumulator,
    alias: String,
}

impl AggregatorTarget {
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Selectable for AggregatorTarget {
    fn columns(&self) -> Vec<(String, Expr)> {
        vec![(self.alias.clone(), Expr::Aggregate(self.accumulator.clone()))]
    }
}
