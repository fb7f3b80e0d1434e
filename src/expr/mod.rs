//! Expression algebra
//!
//! A closed tree of value- and predicate-producing nodes over row fields
//! and literals:
//!
//! - `Constant`: opaque wire value
//! - `Field`: dotted path into the current row
//! - `List`: ordered expressions used as a single argument
//! - `Function`: operator with a fixed, ordered parameter list
//! - `Aggregate`: accumulator (only meaningful inside an aggregate stage)
//!
//! Native scalars convert into `Constant` nodes through `From`, so
//! operators accept literals and expressions interchangeably.

mod aggregate;
mod boolean;
mod functions;
mod methods;
mod ops;
mod ordering;
mod selectable;

pub use aggregate::{AccumulatorKind, Accumulator, AggregatorTarget};
pub use boolean::BooleanExpr;
pub use functions::*;
pub use methods::ExprMethods;
pub use ops::Op;
pub use ordering::{Direction, Ordering};
pub use selectable::{resolve_selectables, AliasedExpr, Fields, Selectable, Selection};

use std::fmt;

use chrono::{DateTime, Utc};

use crate::value::{Blob, DocumentReference, GeoPoint, WireValue};

/// Reserved path addressing a row's document name
pub const DOCUMENT_ID: &str = "__name__";

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(WireValue),
    Field(Field),
    List(Vec<Expr>),
    Function(FunctionExpr),
    Aggregate(Accumulator),
}

impl Expr {
    /// Wraps any encodable native value
    pub fn constant(value: impl Into<WireValue>) -> Self {
        Expr::Constant(value.into())
    }

    /// Field reference from a dotted path
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(Field::of(path))
    }

    /// Ordered list of expressions
    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::List(items.into_iter().map(Into::into).collect())
    }

    /// Constant vector of doubles, as used by nearest-neighbour search
    pub fn vector(values: &[f64]) -> Self {
        Expr::Constant(WireValue::Array(
            values.iter().copied().map(WireValue::Double).collect(),
        ))
    }

    /// Calls an operator unknown to this client; the name is sent verbatim
    pub fn generic_function<I, E>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Function(FunctionExpr::new(
            Op::Generic(name.into()),
            args.into_iter().map(Into::into).collect(),
        ))
    }

    /// Whether this node can stand as a condition.
    ///
    /// Field references pass because a field may hold a boolean.
    pub fn is_boolean_capable(&self) -> bool {
        match self {
            Expr::Constant(WireValue::Boolean(_)) => true,
            Expr::Field(_) => true,
            Expr::Function(f) => f.op().is_boolean(),
            _ => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(value) => write!(f, "{}", value.to_json()),
            Expr::Field(field) => write!(f, "{}", field.path()),
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Function(func) => {
                write!(f, "{}(", func.name())?;
                for (i, param) in func.params().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
            Expr::Aggregate(acc) => write!(f, "{}(..)", acc.name()),
        }
    }
}

/// Reference to a (possibly nested) row field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    path: String,
}

impl Field {
    pub fn of(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The row's document name
    pub fn document_id() -> Self {
        Self::of(DOCUMENT_ID)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_document_id(&self) -> bool {
        self.path == DOCUMENT_ID
    }

    /// Dot separated segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}

impl From<&str> for Field {
    fn from(path: &str) -> Self {
        Field::of(path)
    }
}

impl From<String> for Field {
    fn from(path: String) -> Self {
        Field::of(path)
    }
}

/// Operator application; constructed only through the typed helpers so the
/// parameter list always matches the operator
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    op: Op,
    params: Vec<Expr>,
}

impl FunctionExpr {
    pub(crate) fn new(op: Op, params: Vec<Expr>) -> Self {
        Self { op, params }
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Canonical wire name
    pub fn name(&self) -> &str {
        self.op.name()
    }

    pub fn params(&self) -> &[Expr] {
        &self.params
    }
}

impl From<Field> for Expr {
    fn from(field: Field) -> Self {
        Expr::Field(field)
    }
}

impl From<FunctionExpr> for Expr {
    fn from(func: FunctionExpr) -> Self {
        Expr::Function(func)
    }
}

impl From<WireValue> for Expr {
    fn from(value: WireValue) -> Self {
        Expr::Constant(value)
    }
}

macro_rules! expr_from_native {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    Expr::Constant(WireValue::from(v))
                }
            }
        )*
    };
}

expr_from_native!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    DateTime<Utc>,
    GeoPoint,
    Blob,
    DocumentReference
);
