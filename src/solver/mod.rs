//! # Root finding
//!
//! Damped Newton iteration used to evaluate implicit transformations.

pub mod config;
pub mod convergence;
pub mod newton;

pub use config::{DiffMethod, NewtonConfig};
pub use convergence::SolveStatus;
pub use newton::{NewtonResult, NewtonSolver, ResidualSystem};
