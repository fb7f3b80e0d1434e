//! Instance-style operator syntax
//!
//! `field("rating").greater_than(3)` builds the same tree as
//! `greater_than("rating", 3)`.

use super::functions as f;
use super::{
    Accumulator, AliasedExpr, BooleanExpr, Expr, Field, FunctionExpr, LeftOperand, Ordering,
};

/// Operators available on every expression-like value
pub trait ExprMethods: LeftOperand + Into<Expr> + Sized {
    fn equal(self, other: impl Into<Expr>) -> BooleanExpr {
        f::equal(self, other)
    }

    fn not_equal(self, other: impl Into<Expr>) -> BooleanExpr {
        f::not_equal(self, other)
    }

    fn greater_than(self, other: impl Into<Expr>) -> BooleanExpr {
        f::greater_than(self, other)
    }

    fn greater_than_or_equal(self, other: impl Into<Expr>) -> BooleanExpr {
        f::greater_than_or_equal(self, other)
    }

    fn less_than(self, other: impl Into<Expr>) -> BooleanExpr {
        f::less_than(self, other)
    }

    fn less_than_or_equal(self, other: impl Into<Expr>) -> BooleanExpr {
        f::less_than_or_equal(self, other)
    }

    fn eq_any<I, E>(self, values: I) -> BooleanExpr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::eq_any(self, values)
    }

    fn not_eq_any<I, E>(self, values: I) -> BooleanExpr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::not_eq_any(self, values)
    }

    fn exists(self) -> BooleanExpr {
        f::exists(self)
    }

    fn is_nan(self) -> BooleanExpr {
        f::is_nan(self)
    }

    fn is_not_nan(self) -> BooleanExpr {
        f::is_not_nan(self)
    }

    fn is_null(self) -> BooleanExpr {
        f::is_null(self)
    }

    fn is_not_null(self) -> BooleanExpr {
        f::is_not_null(self)
    }

    fn array_contains(self, element: impl Into<Expr>) -> BooleanExpr {
        f::array_contains(self, element)
    }

    fn array_contains_all<I, E>(self, values: I) -> BooleanExpr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::array_contains_all(self, values)
    }

    fn array_contains_any<I, E>(self, values: I) -> BooleanExpr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::array_contains_any(self, values)
    }

    fn array_length(self) -> Expr {
        f::array_length(self)
    }

    fn array_reverse(self) -> Expr {
        f::array_reverse(self)
    }

    fn array_concat<I, E>(self, others: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::array_concat(self, others)
    }

    fn add(self, other: impl Into<Expr>) -> Expr {
        f::add(self, other)
    }

    fn subtract(self, other: impl Into<Expr>) -> Expr {
        f::subtract(self, other)
    }

    fn multiply(self, other: impl Into<Expr>) -> Expr {
        f::multiply(self, other)
    }

    fn divide(self, other: impl Into<Expr>) -> Expr {
        f::divide(self, other)
    }

    fn modulo(self, other: impl Into<Expr>) -> Expr {
        f::modulo(self, other)
    }

    fn logical_maximum(self, other: impl Into<Expr>) -> Expr {
        f::logical_maximum(self, other)
    }

    fn logical_minimum(self, other: impl Into<Expr>) -> Expr {
        f::logical_minimum(self, other)
    }

    fn char_length(self) -> Expr {
        f::char_length(self)
    }

    fn to_lower(self) -> Expr {
        f::to_lower(self)
    }

    fn to_upper(self) -> Expr {
        f::to_upper(self)
    }

    fn trim(self) -> Expr {
        f::trim(self)
    }

    fn reverse(self) -> Expr {
        f::reverse(self)
    }

    fn string_concat<I, E>(self, others: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        f::string_concat(self, others)
    }

    fn starts_with(self, prefix: impl Into<Expr>) -> BooleanExpr {
        f::starts_with(self, prefix)
    }

    fn ends_with(self, suffix: impl Into<Expr>) -> BooleanExpr {
        f::ends_with(self, suffix)
    }

    fn string_contains(self, substring: impl Into<Expr>) -> BooleanExpr {
        f::string_contains(self, substring)
    }

    fn like(self, pattern: impl Into<Expr>) -> BooleanExpr {
        f::like(self, pattern)
    }

    fn regex_contains(self, pattern: impl Into<Expr>) -> BooleanExpr {
        f::regex_contains(self, pattern)
    }

    fn regex_match(self, pattern: impl Into<Expr>) -> BooleanExpr {
        f::regex_match(self, pattern)
    }

    fn map_get(self, key: &str) -> Expr {
        f::map_get(self, key)
    }

    fn cosine_distance(self, other: impl Into<Expr>) -> Expr {
        f::cosine_distance(self, other)
    }

    fn dot_product(self, other: impl Into<Expr>) -> Expr {
        f::dot_product(self, other)
    }

    fn euclidean_distance(self, other: impl Into<Expr>) -> Expr {
        f::euclidean_distance(self, other)
    }

    fn vector_length(self) -> Expr {
        f::vector_length(self)
    }

    fn timestamp_add(self, unit: impl Into<Expr>, amount: impl Into<Expr>) -> Expr {
        f::timestamp_add(self, unit, amount)
    }

    fn timestamp_sub(self, unit: impl Into<Expr>, amount: impl Into<Expr>) -> Expr {
        f::timestamp_sub(self, unit, amount)
    }

    fn unix_seconds_to_timestamp(self) -> Expr {
        f::unix_seconds_to_timestamp(self)
    }

    fn timestamp_to_unix_seconds(self) -> Expr {
        f::timestamp_to_unix_seconds(self)
    }

    fn sum(self) -> Accumulator {
        f::sum(self)
    }

    fn avg(self) -> Accumulator {
        f::avg(self)
    }

    fn count(self) -> Accumulator {
        f::count(self)
    }

    fn minimum(self) -> Accumulator {
        f::minimum(self)
    }

    fn maximum(self) -> Accumulator {
        f::maximum(self)
    }

    fn alias(self, name: impl Into<String>) -> AliasedExpr {
        AliasedExpr::new(self, name)
    }

    fn ascending(self) -> Ordering {
        Ordering::ascending(self)
    }

    fn descending(self) -> Ordering {
        Ordering::descending(self)
    }
}

impl ExprMethods for Expr {}
impl ExprMethods for Field {}
impl ExprMethods for FunctionExpr {}
impl ExprMethods for BooleanExpr {}

impl BooleanExpr {
    pub fn and(self, other: BooleanExpr) -> BooleanExpr {
        f::and(self, [other])
    }

    pub fn or(self, other: BooleanExpr) -> BooleanExpr {
        f::or(self, [other])
    }

    pub fn xor(self, other: BooleanExpr) -> BooleanExpr {
        f::xor(self, [other])
    }

    pub fn not(self) -> BooleanExpr {
        f::not(self)
    }

    /// Counts rows satisfying this condition
    pub fn count_if(self) -> Accumulator {
        f::count_if(self)
    }

    /// Selects `then` or `otherwise` on this condition
    pub fn cond(self, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
        f::cond(self, then, otherwise)
    }
}
