//! Build-time error types
//!
//! Every failure raised while constructing, converting or serializing a
//! pipeline is reported synchronously, before any network call.
//!
//! Error codes:
//! - DOCPIPE_INVALID_ARGUMENT (REJECT)
//! - DOCPIPE_INVALID_PATH (REJECT)
//! - DOCPIPE_DUPLICATE_FIELD (REJECT)
//! - DOCPIPE_NOT_BOOLEAN (REJECT)
//! - DOCPIPE_NEGATIVE_VALUE (REJECT)
//! - DOCPIPE_UNSUPPORTED_OPERATION (REJECT)
//! - DOCPIPE_SERIALIZATION (REJECT)
//! - DOCPIPE_INVALID_CURSOR (REJECT)

use std::fmt;

/// Severity levels for build errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The pipeline is rejected; the caller has to fix its construction
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Error categories for pipeline construction and serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorCode {
    /// An argument is outside the accepted domain
    InvalidArgument,
    /// A collection, collection id or document path is malformed
    InvalidPath,
    /// Two projections resolve to the same output name
    DuplicateField,
    /// A non-boolean expression was used where a condition is required
    NotBoolean,
    /// Offset or limit below zero
    NegativeValue,
    /// A query construct has no pipeline equivalent
    UnsupportedOperation,
    /// A value cannot be represented on the wire
    Serialization,
    /// A cursor does not line up with the pagination orderings
    InvalidCursor,
}

impl BuildErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            BuildErrorCode::InvalidArgument => "DOCPIPE_INVALID_ARGUMENT",
            BuildErrorCode::InvalidPath => "DOCPIPE_INVALID_PATH",
            BuildErrorCode::DuplicateField => "DOCPIPE_DUPLICATE_FIELD",
            BuildErrorCode::NotBoolean => "DOCPIPE_NOT_BOOLEAN",
            BuildErrorCode::NegativeValue => "DOCPIPE_NEGATIVE_VALUE",
            BuildErrorCode::UnsupportedOperation => "DOCPIPE_UNSUPPORTED_OPERATION",
            BuildErrorCode::Serialization => "DOCPIPE_SERIALIZATION",
            BuildErrorCode::InvalidCursor => "DOCPIPE_INVALID_CURSOR",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for BuildErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Construction, conversion or serialization failure with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    code: BuildErrorCode,
    message: String,
    field: Option<String>,
}

impl BuildError {
    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self {
            code: BuildErrorCode::InvalidArgument,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            code: BuildErrorCode::InvalidPath,
            message: format!("Invalid path '{}': {}", p, reason.into()),
            field: Some(p),
        }
    }

    /// Create a duplicate output field error
    pub fn duplicate_field(field: impl Into<String>) -> Self {
        let f = field.into();
        Self {
            code: BuildErrorCode::DuplicateField,
            message: format!("Output field '{}' is produced more than once", f),
            field: Some(f),
        }
    }

    /// Create a not-boolean error
    pub fn not_boolean(description: impl Into<String>) -> Self {
        Self {
            code: BuildErrorCode::NotBoolean,
            message: format!("Expression {} does not produce a boolean", description.into()),
            field: None,
        }
    }

    /// Create a negative value error for offset/limit style arguments
    pub fn negative_value(argument: &str, value: i64) -> Self {
        Self {
            code: BuildErrorCode::NegativeValue,
            message: format!("{} must be non-negative, got {}", argument, value),
            field: None,
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self {
            code: BuildErrorCode::UnsupportedOperation,
            message: format!("Unsupported operator: {}", operation.into()),
            field: None,
        }
    }

    /// Create a serialization error
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self {
            code: BuildErrorCode::Serialization,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an invalid cursor error
    pub fn invalid_cursor(reason: impl Into<String>) -> Self {
        Self {
            code: BuildErrorCode::InvalidCursor,
            message: reason.into(),
            field: None,
        }
    }

    /// Attach the field the error refers to
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> BuildErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the field name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for BuildError {}

/// Result type for pipeline construction and serialization
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            BuildErrorCode::InvalidPath.code(),
            "DOCPIPE_INVALID_PATH"
        );
        assert_eq!(
            BuildErrorCode::UnsupportedOperation.code(),
            "DOCPIPE_UNSUPPORTED_OPERATION"
        );
        assert_eq!(
            BuildErrorCode::Serialization.code(),
            "DOCPIPE_SERIALIZATION"
        );
    }

    #[test]
    fn test_all_codes_reject() {
        let err = BuildError::negative_value("limit", -1);
        assert_eq!(err.severity(), Severity::Reject);
        assert_eq!(err.code(), BuildErrorCode::NegativeValue);
    }

    #[test]
    fn test_error_display() {
        let err = BuildError::duplicate_field("total");
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] DOCPIPE_DUPLICATE_FIELD"));
        assert!(display.contains("total"));
        assert_eq!(err.field(), Some("total"));
    }
}
