//! # partrafo
//!
//! `partrafo` builds parameter transformations symbolically and evaluates
//! them numerically with derivatives.
//!
//! The library provides:
//! - Symbolic Trafos built with the verbs `define`, `insert` and `branch`
//! - Condition grids with predicates for condition-specific edits
//! - Explicit and implicit (root-finding) evaluation with Jacobians
//! - Composition of transformations with prediction and objective functions
//!
//! ## Basic Usage
//!
//! ```
//! use partrafo::{EvalMode, ParVec, Substitutions, Trafos, P};
//!
//! let trafos = Trafos::new()
//!     .define("x ~ x", &Substitutions::new().values("x", ["k", "K"]))
//!     .unwrap()
//!     .insert("x ~ exp(x)", &Substitutions::new().current_symbols("x", &[]))
//!     .unwrap();
//!
//! let p = P(&trafos, EvalMode::Explicit).unwrap();
//! let out = p.apply(&ParVec::from_pairs(&[("k", 0.0), ("K", 0.0)])).unwrap();
//! assert_eq!(out.get("k"), Some(1.0));
//! assert_eq!(out.deriv().unwrap().get("k", "k"), Some(1.0));
//! ```

// Public modules
pub mod error;

// Symbolic layer
pub mod symbolic;

// Conditions and Trafos
pub mod conditions;
pub mod trafo;

// Numeric evaluation
pub mod solver;
pub mod transform;

// Functions composed with transformations
pub mod objective;
pub mod prediction;

pub mod utils;

// Re-exports for convenience
pub use conditions::{CellValue, ConditionGrid, ConditionMap, Predicate};
pub use error::{Result, TrafoError};
pub use objective::{ObjectiveFn, ObjectiveFunction, ObjectiveValue};
pub use prediction::{PredictionFn, PredictionFunction};
pub use trafo::{
    branch, define, insert, EvalMode, SubstArg, Substitutions, Trafo, TrafoList, Trafos,
};
pub use transform::{compile, ImplicitOptions, ParVec, ParameterTransformation, TransformKind, P};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
