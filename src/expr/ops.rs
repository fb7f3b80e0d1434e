//! Operator vocabulary
//!
//! Each operator owns exactly one canonical wire name. Constructors in
//! `functions` fix the parameter order; the pair (name, params) is the
//! serialization contract.

use std::fmt;

/// Function operators understood by the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Membership; `not in` is expressed as `not(eq_any(..))`
    EqAny,

    // Logic
    And,
    Or,
    Xor,
    Not,
    Conditional,
    LogicalMaximum,
    LogicalMinimum,

    // Predicates
    Exists,
    IsNan,
    IsNull,

    // Arrays
    ArrayContains,
    ArrayContainsAll,
    ArrayContainsAny,
    ArrayLength,
    ArrayConcat,
    ArrayReverse,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,

    // Strings
    CharLength,
    ToLower,
    ToUpper,
    Trim,
    StringConcat,
    StartsWith,
    EndsWith,
    StringContains,
    Like,
    RegexContains,
    RegexMatch,
    Reverse,

    // Maps
    MapGet,

    // Vectors
    CosineDistance,
    DotProduct,
    EuclideanDistance,
    VectorLength,

    // Timestamps
    TimestampAdd,
    TimestampSub,
    UnixSecondsToTimestamp,
    TimestampToUnixSeconds,

    /// Forward-compatible escape hatch: the name is sent verbatim
    Generic(String),
}

impl Op {
    /// Canonical wire name
    pub fn name(&self) -> &str {
        match self {
            Op::Equal => "equal",
            Op::NotEqual => "not_equal",
            Op::GreaterThan => "greater_than",
            Op::GreaterThanOrEqual => "greater_than_or_equal",
            Op::LessThan => "less_than",
            Op::LessThanOrEqual => "less_than_or_equal",
            Op::EqAny => "eq_any",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Not => "not",
            Op::Conditional => "conditional",
            Op::LogicalMaximum => "logical_maximum",
            Op::LogicalMinimum => "logical_minimum",
            Op::Exists => "exists",
            Op::IsNan => "is_nan",
            Op::IsNull => "is_null",
            Op::ArrayContains => "array_contains",
            Op::ArrayContainsAll => "array_contains_all",
            Op::ArrayContainsAny => "array_contains_any",
            Op::ArrayLength => "array_length",
            Op::ArrayConcat => "array_concat",
            Op::ArrayReverse => "array_reverse",
            Op::Add => "add",
            Op::Subtract => "subtract",
            Op::Multiply => "multiply",
            Op::Divide => "divide",
            Op::Mod => "mod",
            Op::CharLength => "char_length",
            Op::ToLower => "to_lower",
            Op::ToUpper => "to_upper",
            Op::Trim => "trim",
            Op::StringConcat => "string_concat",
            Op::StartsWith => "starts_with",
            Op::EndsWith => "ends_with",
            Op::StringContains => "string_contains",
            Op::Like => "like",
            Op::RegexContains => "regex_contains",
            Op::RegexMatch => "regex_match",
            Op::Reverse => "reverse",
            Op::MapGet => "map_get",
            Op::CosineDistance => "cosine_distance",
            Op::DotProduct => "dot_product",
            Op::EuclideanDistance => "euclidean_distance",
            Op::VectorLength => "vector_length",
            Op::TimestampAdd => "timestamp_add",
            Op::TimestampSub => "timestamp_sub",
            Op::UnixSecondsToTimestamp => "unix_seconds_to_timestamp",
            Op::TimestampToUnixSeconds => "timestamp_to_unix_seconds",
            Op::Generic(name) => name,
        }
    }

    /// Whether the operator always yields a boolean.
    ///
    /// Generic operators are unknown to the client and report `false`.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Op::Equal
                | Op::NotEqual
                | Op::GreaterThan
                | Op::GreaterThanOrEqual
                | Op::LessThan
                | Op::LessThanOrEqual
                | Op::EqAny
                | Op::And
                | Op::Or
                | Op::Xor
                | Op::Not
                | Op::Exists
                | Op::IsNan
                | Op::IsNull
                | Op::ArrayContains
                | Op::ArrayContainsAll
                | Op::ArrayContainsAny
                | Op::StartsWith
                | Op::EndsWith
                | Op::StringContains
                | Op::Like
                | Op::RegexContains
                | Op::RegexMatch
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
