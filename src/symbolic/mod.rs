//! # Symbolic layer
//!
//! Expressions, ordered equation vectors and `lhs ~ rhs` templates. This is the
//! boundary to the symbolic backend: everything above it only needs variable
//! extraction, simultaneous substitution, evaluation and differentiation.

pub mod eqnvec;
pub mod expression;
pub mod template;

// Re-export key types
pub use eqnvec::EquationVector;
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use template::{Resolved, Template};
