//! Condition expressions

use std::fmt;

use crate::errors::{BuildError, BuildResult};
use crate::value::WireValue;

use super::{Expr, Field, FunctionExpr, Op};

/// An expression statically known to be usable as a condition.
///
/// Filter stages, join conditions and `count_if` accept only this type, so a
/// non-boolean expression is rejected when the condition is built.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpr(Expr);

impl BooleanExpr {
    /// Wraps an operator result; callers guarantee the operator is boolean
    pub(crate) fn from_function(op: Op, params: Vec<Expr>) -> Self {
        BooleanExpr(Expr::Function(FunctionExpr::new(op, params)))
    }

    /// Vendor condition the client cannot classify.
    ///
    /// The caller vouches that the server evaluates it to a boolean.
    pub fn generic<I, E>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        BooleanExpr(Expr::generic_function(name, args))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }
}

impl TryFrom<Expr> for BooleanExpr {
    type Error = BuildError;

    fn try_from(expr: Expr) -> BuildResult<Self> {
        if expr.is_boolean_capable() {
            Ok(BooleanExpr(expr))
        } else {
            Err(BuildError::not_boolean(expr.to_string()))
        }
    }
}

impl From<Field> for BooleanExpr {
    fn from(field: Field) -> Self {
        BooleanExpr(Expr::Field(field))
    }
}

impl From<bool> for BooleanExpr {
    fn from(value: bool) -> Self {
        BooleanExpr(Expr::Constant(WireValue::Boolean(value)))
    }
}

impl From<BooleanExpr> for Expr {
    fn from(cond: BooleanExpr) -> Self {
        cond.0
    }
}

impl fmt::Display for BooleanExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BuildErrorCode;

    #[test]
    fn test_rejects_arithmetic() {
        let sum = Expr::Function(FunctionExpr::new(
            Op::Add,
            vec![Expr::field("a"), Expr::from(1)],
        ));
        let err = BooleanExpr::try_from(sum).unwrap_err();
        assert_eq!(err.code(), BuildErrorCode::NotBoolean);
        assert!(err.message().contains("add(a, 1)"));
    }

    #[test]
    fn test_rejects_non_boolean_constant() {
        assert!(BooleanExpr::try_from(Expr::from("yes")).is_err());
    }

    #[test]
    fn test_accepts_field_and_comparison() {
        assert!(BooleanExpr::try_from(Expr::field("active")).is_ok());
        let cmp = Expr::Function(FunctionExpr::new(
            Op::Equal,
            vec![Expr::field("a"), Expr::from(1)],
        ));
        assert!(BooleanExpr::try_from(cmp).is_ok());
    }

    #[test]
    fn test_generic_condition_is_trusted() {
        let cond = BooleanExpr::generic("vendor_match", [Expr::field("a")]);
        assert_eq!(cond.to_string(), "vendor_match(a)");
    }
}
