//! Sort orderings

use super::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }

    pub fn reversed(&self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// Expression plus direction, used by sort stages and pagination
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    expr: Expr,
    direction: Direction,
}

impl Ordering {
    pub fn new(expr: impl Into<Expr>, direction: Direction) -> Self {
        Self {
            expr: expr.into(),
            direction,
        }
    }

    pub fn ascending(expr: impl Into<Expr>) -> Self {
        Self::new(expr, Direction::Ascending)
    }

    pub fn descending(expr: impl Into<Expr>) -> Self {
        Self::new(expr, Direction::Descending)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Same expression, opposite direction
    pub fn reversed(&self) -> Ordering {
        Ordering {
            expr: self.expr.clone(),
            direction: self.direction.reversed(),
        }
    }
}
