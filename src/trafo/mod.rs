//! # Trafos
//!
//! Symbolic parameter transformations and the verbs that build them.
//!
//! ```
//! use partrafo::conditions::{ConditionGrid, Predicate};
//! use partrafo::trafo::{Substitutions, Trafos};
//!
//! let grid = ConditionGrid::new(&["drug"])
//!     .with_row(Some("ctrl"), vec!["none".into()])
//!     .unwrap()
//!     .with_row(Some("treated"), vec!["A".into()])
//!     .unwrap();
//!
//! let trafos = Trafos::new()
//!     .define("x ~ x", &Substitutions::new().values("x", ["k1", "k2"]))
//!     .unwrap()
//!     .branch(&grid)
//!     .unwrap()
//!     .insert_where(
//!         "x ~ x_drug",
//!         &Substitutions::new().value("x", "k1").column("drug", "drug"),
//!         &Predicate::ne("drug", "none"),
//!     )
//!     .unwrap();
//!
//! assert_eq!(trafos.conditions(), vec!["ctrl", "treated"]);
//! assert_eq!(trafos.outer_parameters(), vec!["k1", "k2", "k1_A"]);
//! ```

#[allow(clippy::module_inception)]
pub mod trafo;
pub mod verbs;

pub use trafo::{EvalMode, Trafo, TrafoList, Trafos};
pub use verbs::{branch, define, insert, SubstArg, Substitutions};
