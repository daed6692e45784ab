use crate::symbolic::expression::ExpressionError;
use thiserror::Error;

/// Error types for the partrafo library.
#[derive(Error, Debug)]
pub enum TrafoError {
    /// Substitution arguments of one template call have inconsistent lengths.
    #[error("Template length mismatch: '{placeholder}' has {found} values, expected {expected}")]
    TemplateLengthMismatch {
        placeholder: String,
        expected: usize,
        found: usize,
    },

    /// The equation template is malformed or expands to an invalid name.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// `branch` was applied to a trafo that is already condition-specific.
    #[error("Trafo is already branched; specialise conditions with a conditioned insert")]
    AlreadyBranched,

    /// Condition-indexed operands do not line up.
    #[error("Condition mismatch: {0}")]
    ConditionMismatch(String),

    /// Both operands of a union define the same condition.
    #[error("Duplicate condition: {0}")]
    DuplicateCondition(String),

    /// The implicit solve did not reach its tolerance.
    #[error("No convergence after {iterations} steps (residual {residual_norm:.3e}): {message}")]
    NoConvergence {
        iterations: usize,
        residual_norm: f64,
        message: String,
    },

    /// A referenced symbol, column or condition is absent where it is required.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Expression parsing or evaluation failed.
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for partrafo operations.
pub type Result<T> = std::result::Result<T, TrafoError>;
