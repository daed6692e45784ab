//! # Conditions
//!
//! Experimental conditions: the typed condition grid, predicates over its
//! rows, and condition-indexed collections.

pub mod grid;
pub mod map;
pub mod predicate;

pub use grid::{CellValue, ConditionGrid};
pub use map::ConditionMap;
pub use predicate::Predicate;
