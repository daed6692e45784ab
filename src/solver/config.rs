//! Configuration options for the damped Newton solver.

use serde::{Deserialize, Serialize};

/// Method for calculating the Jacobian of the residual system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// Evaluate symbolic partial derivatives of the residual expressions
    #[default]
    Symbolic,

    /// Use forward finite differences
    FiniteDifference,
}

/// Configuration options for the damped Newton solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Maximum number of Newton iterations. Default: 100
    pub max_iterations: usize,

    /// Convergence threshold on the residual max-norm. Default: 1e-10
    pub tolerance: f64,

    /// Factor applied to the step length when a step is rejected. Default: 0.5
    pub damping_factor: f64,

    /// Smallest step length tried before giving up. Default: 1e-8
    pub min_step: f64,

    /// Method to use for calculating the Jacobian. Default: Symbolic
    pub diff_method: DiffMethod,

    /// Relative step for finite differences. Default: 1e-8
    pub fd_epsilon: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            damping_factor: 0.5,
            min_step: 1e-8,
            diff_method: DiffMethod::default(),
            fd_epsilon: crate::utils::finite_difference::DEFAULT_EPSILON,
        }
    }
}

impl NewtonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_damping_factor(mut self, factor: f64) -> Self {
        self.damping_factor = factor;
        self
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    pub fn with_diff_method(mut self, method: DiffMethod) -> Self {
        self.diff_method = method;
        self
    }

    pub fn with_fd_epsilon(mut self, epsilon: f64) -> Self {
        self.fd_epsilon = epsilon;
        self
    }
}
