//! Error types for rv-plan

use thiserror::Error;

/// Planning error type
///
/// Every variant is terminal for the statement being planned; the first one
/// raised is the one reported.
#[derive(Error, Debug)]
pub enum PlanError {
    /// P001: Variable not bound by any enclosing scope
    #[error("[P001] Unknown variable: '{name}'")]
    UnresolvedVariable { name: String },

    /// P002: Unqualified variable matches fields of several tables
    #[error("[P002] Ambiguous variable '{name}', could be any of: {candidates}")]
    AmbiguousVariable { name: String, candidates: String },

    /// P003: Expression type incompatible with its context
    #[error("[P003] Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// P004: Invalid argument to a function, aggregate, or table valued function
    #[error("[P004] Malformed argument for '{function}': {message}")]
    MalformedArgument { function: String, message: String },

    /// P005: Datasource lookup failed
    #[error("[P005] Couldn't create datasource '{name}': {message}")]
    UnknownDatasource { name: String, message: String },

    /// P006: No function registered under this name
    #[error("[P006] Unknown function '{name}'")]
    UnknownFunction { name: String },

    /// P007: No aggregate registered under this name
    #[error("[P007] Unknown aggregate '{name}'")]
    UnknownAggregate { name: String },

    /// P008: No table valued function registered under this name
    #[error("[P008] Unknown table valued function '{name}'")]
    UnknownTableValuedFunction { name: String },

    /// P009: SQL construct outside the supported surface
    #[error("[P009] Unsupported SQL construct: {construct}")]
    UnsupportedConstruct { construct: String },

    /// P010: SQL parse error
    #[error("[P010] SQL parse error: {0}")]
    SqlParse(String),
}

/// Result type alias for PlanError
pub type PlanResult<T> = Result<T, PlanError>;
