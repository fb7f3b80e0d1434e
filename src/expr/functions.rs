//! Free-function operator constructors
//!
//! Each constructor fixes the operator's parameter order. The left operand
//! accepts an expression or a bare field name, which is wrapped into a field
//! reference.

use super::{Accumulator, AccumulatorKind, BooleanExpr, Expr, Field, FunctionExpr, Op};

/// Values accepted in left-operand position
pub trait LeftOperand {
    fn into_operand(self) -> Expr;
}

impl LeftOperand for &str {
    fn into_operand(self) -> Expr {
        Expr::field(self)
    }
}

impl LeftOperand for String {
    fn into_operand(self) -> Expr {
        Expr::field(self)
    }
}

impl LeftOperand for &String {
    fn into_operand(self) -> Expr {
        Expr::field(self.as_str())
    }
}

impl LeftOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

impl LeftOperand for Field {
    fn into_operand(self) -> Expr {
        Expr::Field(self)
    }
}

impl LeftOperand for FunctionExpr {
    fn into_operand(self) -> Expr {
        Expr::Function(self)
    }
}

impl LeftOperand for BooleanExpr {
    fn into_operand(self) -> Expr {
        self.into_expr()
    }
}

/// Field reference constructor
pub fn field(path: impl Into<String>) -> Field {
    Field::of(path)
}

/// Constant node from any encodable value
pub fn constant(value: impl Into<crate::value::WireValue>) -> Expr {
    Expr::constant(value)
}

fn call(op: Op, params: Vec<Expr>) -> Expr {
    Expr::Function(FunctionExpr::new(op, params))
}

fn collect<I, E>(items: I) -> Vec<Expr>
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    items.into_iter().map(Into::into).collect()
}

macro_rules! comparison {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(left: impl LeftOperand, right: impl Into<Expr>) -> BooleanExpr {
                BooleanExpr::from_function(Op::$op, vec![left.into_operand(), right.into()])
            }
        )*
    };
}

macro_rules! predicate {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(operand: impl LeftOperand) -> BooleanExpr {
                BooleanExpr::from_function(Op::$op, vec![operand.into_operand()])
            }
        )*
    };
}

macro_rules! unary {
    ($($name:ident => $op:ident;)*) => {
        $(
            pub fn $name(operand: impl LeftOperand) -> Expr {
                call(Op::$op, vec![operand.into_operand()])
            }
        )*
    };
}

macro_rules! binary {
    ($($name:ident => $op:ident;)*) => {
        $(
            pub fn $name(left: impl LeftOperand, right: impl Into<Expr>) -> Expr {
                call(Op::$op, vec![left.into_operand(), right.into()])
            }
        )*
    };
}

comparison! {
    equal => Equal;
    not_equal => NotEqual;
    greater_than => GreaterThan;
    greater_than_or_equal => GreaterThanOrEqual;
    less_than => LessThan;
    less_than_or_equal => LessThanOrEqual;
    /// True when the array operand holds `element`
    array_contains => ArrayContains;
    starts_with => StartsWith;
    ends_with => EndsWith;
    string_contains => StringContains;
    /// SQL-style pattern match (`%` and `_`)
    like => Like;
    regex_contains => RegexContains;
    regex_match => RegexMatch;
}

predicate! {
    /// True when the field is present in the row, even if null
    exists => Exists;
    is_nan => IsNan;
    is_null => IsNull;
}

unary! {
    array_length => ArrayLength;
    array_reverse => ArrayReverse;
    char_length => CharLength;
    to_lower => ToLower;
    to_upper => ToUpper;
    trim => Trim;
    reverse => Reverse;
    vector_length => VectorLength;
    unix_seconds_to_timestamp => UnixSecondsToTimestamp;
    timestamp_to_unix_seconds => TimestampToUnixSeconds;
}

binary! {
    add => Add;
    subtract => Subtract;
    multiply => Multiply;
    divide => Divide;
    modulo => Mod;
    logical_maximum => LogicalMaximum;
    logical_minimum => LogicalMinimum;
    cosine_distance => CosineDistance;
    dot_product => DotProduct;
    euclidean_distance => EuclideanDistance;
}

/// Membership test: `left` equals any of `values`
pub fn eq_any<I, E>(left: impl LeftOperand, values: I) -> BooleanExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    BooleanExpr::from_function(Op::EqAny, vec![left.into_operand(), Expr::list(values)])
}

/// Negated membership, encoded as `not(eq_any(..))`
pub fn not_eq_any<I, E>(left: impl LeftOperand, values: I) -> BooleanExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    not(eq_any(left, values))
}

pub fn array_contains_all<I, E>(array: impl LeftOperand, values: I) -> BooleanExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    BooleanExpr::from_function(
        Op::ArrayContainsAll,
        vec![array.into_operand(), Expr::list(values)],
    )
}

pub fn array_contains_any<I, E>(array: impl LeftOperand, values: I) -> BooleanExpr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    BooleanExpr::from_function(
        Op::ArrayContainsAny,
        vec![array.into_operand(), Expr::list(values)],
    )
}

pub fn is_not_nan(operand: impl LeftOperand) -> BooleanExpr {
    not(is_nan(operand))
}

pub fn is_not_null(operand: impl LeftOperand) -> BooleanExpr {
    not(is_null(operand))
}

/// Conjunction of at least one condition
pub fn and<I>(first: BooleanExpr, rest: I) -> BooleanExpr
where
    I: IntoIterator<Item = BooleanExpr>,
{
    variadic(Op::And, first, rest)
}

/// Disjunction of at least one condition
pub fn or<I>(first: BooleanExpr, rest: I) -> BooleanExpr
where
    I: IntoIterator<Item = BooleanExpr>,
{
    variadic(Op::Or, first, rest)
}

pub fn xor<I>(first: BooleanExpr, rest: I) -> BooleanExpr
where
    I: IntoIterator<Item = BooleanExpr>,
{
    variadic(Op::Xor, first, rest)
}

fn variadic<I>(op: Op, first: BooleanExpr, rest: I) -> BooleanExpr
where
    I: IntoIterator<Item = BooleanExpr>,
{
    let params = std::iter::once(first)
        .chain(rest)
        .map(BooleanExpr::into_expr)
        .collect();
    BooleanExpr::from_function(op, params)
}

pub fn not(condition: BooleanExpr) -> BooleanExpr {
    BooleanExpr::from_function(Op::Not, vec![condition.into_expr()])
}

/// `then` when `condition` holds, otherwise `otherwise`
pub fn cond(condition: BooleanExpr, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    call(
        Op::Conditional,
        vec![condition.into_expr(), then.into(), otherwise.into()],
    )
}

pub fn array_concat<I, E>(array: impl LeftOperand, others: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    let mut params = vec![array.into_operand()];
    params.extend(collect(others));
    call(Op::ArrayConcat, params)
}

pub fn string_concat<I, E>(first: impl LeftOperand, others: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    let mut params = vec![first.into_operand()];
    params.extend(collect(others));
    call(Op::StringConcat, params)
}

/// Value stored under `key` in a map-valued operand
pub fn map_get(map: impl LeftOperand, key: &str) -> Expr {
    call(Op::MapGet, vec![map.into_operand(), Expr::from(key)])
}

/// Shifts a timestamp by `amount` of `unit` (e.g. "day", "second")
pub fn timestamp_add(
    timestamp: impl LeftOperand,
    unit: impl Into<Expr>,
    amount: impl Into<Expr>,
) -> Expr {
    call(
        Op::TimestampAdd,
        vec![timestamp.into_operand(), unit.into(), amount.into()],
    )
}

pub fn timestamp_sub(
    timestamp: impl LeftOperand,
    unit: impl Into<Expr>,
    amount: impl Into<Expr>,
) -> Expr {
    call(
        Op::TimestampSub,
        vec![timestamp.into_operand(), unit.into(), amount.into()],
    )
}

// Accumulators

pub fn sum(operand: impl LeftOperand) -> Accumulator {
    Accumulator::new(AccumulatorKind::Sum, Some(operand.into_operand()))
}

pub fn avg(operand: impl LeftOperand) -> Accumulator {
    Accumulator::new(AccumulatorKind::Average, Some(operand.into_operand()))
}

/// Counts rows where `operand` is present and not null
pub fn count(operand: impl LeftOperand) -> Accumulator {
    Accumulator::new(AccumulatorKind::Count, Some(operand.into_operand()))
}

/// Counts input rows; encodes with no parameters
pub fn count_all() -> Accumulator {
    Accumulator::new(AccumulatorKind::Count, None)
}

pub fn count_if(condition: BooleanExpr) -> Accumulator {
    Accumulator::new(AccumulatorKind::CountIf, Some(condition.into_expr()))
}

pub fn minimum(operand: impl LeftOperand) -> Accumulator {
    Accumulator::new(AccumulatorKind::Minimum, Some(operand.into_operand()))
}

pub fn maximum(operand: impl LeftOperand) -> Accumulator {
    Accumulator::new(AccumulatorKind::Maximum, Some(operand.into_operand()))
}
