//! Damped Newton iteration for square nonlinear systems.
//!
//! Solves `R(x) = 0` by Newton steps `J δ = -R`, shortening each step by the
//! configured damping factor until the sum of squared residuals decreases.

use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{Result, TrafoError};
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::config::{DiffMethod, NewtonConfig};
use super::convergence::{max_norm, merit, SolveStatus};

/// A square system of residual equations.
pub trait ResidualSystem {
    /// Number of unknowns, equal to the number of residuals.
    fn dimension(&self) -> usize;

    /// Evaluate the residuals at `x`.
    fn residuals(&self, x: &Array1<f64>) -> Result<Array1<f64>>;

    /// Jacobian of the residuals at `x`.
    ///
    /// The default uses forward finite differences.
    fn jacobian(&self, x: &Array1<f64>) -> Result<Array2<f64>> {
        finite_difference::jacobian(|p| self.residuals(p), x, None)
    }

    /// Whether [`jacobian`](Self::jacobian) is exact.
    fn has_custom_jacobian(&self) -> bool {
        false
    }
}

/// Result of a successful Newton solve.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// The root
    pub x: Array1<f64>,

    /// Residuals at the root
    pub residuals: Array1<f64>,

    /// Max-norm of the residuals at the root
    pub residual_norm: f64,

    /// Number of Newton steps taken
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    pub status: SolveStatus,
}

impl fmt::Display for NewtonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Newton Result:")?;
        writeln!(f, "  Status: {}", self.status.description())?;
        writeln!(f, "  Residual norm: {:.6e}", self.residual_norm)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Solution: {:?}", self.x)?;
        Ok(())
    }
}

/// Damped Newton solver.
#[derive(Debug, Clone, Default)]
pub struct NewtonSolver {
    config: NewtonConfig,
}

impl NewtonSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: NewtonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn with_diff_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Solve `system(x) = 0` starting from `x0`.
    ///
    /// # Errors
    ///
    /// * `TrafoError::NoConvergence` if the residual max-norm does not drop
    ///   below the tolerance within the iteration budget, or the iteration
    ///   stalls on a singular Jacobian, a failed line search or a non-finite
    ///   residual
    /// * `TrafoError::DimensionMismatch` if `x0` does not match the system
    pub fn solve(&self, system: &dyn ResidualSystem, x0: &Array1<f64>) -> Result<NewtonResult> {
        let n = system.dimension();
        if x0.len() != n {
            return Err(TrafoError::DimensionMismatch(format!(
                "Initial guess has {} entries, system has {} unknowns",
                x0.len(),
                n
            )));
        }

        let mut x = x0.clone();
        let mut r = system.residuals(&x)?;
        let mut func_evals = 1;
        let mut norm = max_norm(&r);
        let mut iterations = 0;

        let status = loop {
            if !norm.is_finite() {
                break SolveStatus::NumericalError;
            }
            if norm < self.config.tolerance {
                break SolveStatus::Converged;
            }
            if iterations >= self.config.max_iterations {
                break SolveStatus::MaxIterationsReached;
            }

            let jac = self.jacobian(system, &x)?;
            let rhs = -ndarray_vec_to_nalgebra(&r);
            let Some(delta) = ndarray_to_nalgebra(&jac).lu().solve(&rhs) else {
                break SolveStatus::SingularJacobian;
            };
            let delta = nalgebra_vec_to_ndarray(&delta);
            if delta.iter().any(|d| !d.is_finite()) {
                break SolveStatus::SingularJacobian;
            }

            let current = merit(&r);
            let mut step = 1.0;
            let accepted = loop {
                let candidate = &x + &(&delta * step);
                func_evals += 1;
                match system.residuals(&candidate) {
                    Ok(r_new) if merit(&r_new) < current => break Some((candidate, r_new)),
                    Ok(_) => {}
                    Err(e) => debug!("Newton: rejected step {:.3e}: {}", step, e),
                }
                step *= self.config.damping_factor;
                if step < self.config.min_step {
                    break None;
                }
            };

            let Some((x_new, r_new)) = accepted else {
                warn!(
                    "Newton: no damped step reduced the residual at iteration {}",
                    iterations
                );
                break SolveStatus::LineSearchFailed;
            };
            if step < 1.0 {
                debug!("Newton: damped step length {:.3e}", step);
            }

            x = x_new;
            r = r_new;
            norm = max_norm(&r);
            iterations += 1;
            debug!("Newton iteration {}: residual {:.6e}", iterations, norm);
        };

        if !status.is_converged() {
            warn!("Newton: {} (residual {:.3e})", status.description(), norm);
            return Err(TrafoError::NoConvergence {
                iterations,
                residual_norm: norm,
                message: status.description().to_string(),
            });
        }

        info!(
            "Newton converged in {} iterations (residual {:.3e})",
            iterations, norm
        );
        Ok(NewtonResult {
            x,
            residuals: r,
            residual_norm: norm,
            iterations,
            func_evals,
            status,
        })
    }

    fn jacobian(&self, system: &dyn ResidualSystem, x: &Array1<f64>) -> Result<Array2<f64>> {
        match self.config.diff_method {
            DiffMethod::Symbolic if system.has_custom_jacobian() => system.jacobian(x),
            _ => finite_difference::jacobian(
                |p| system.residuals(p),
                x,
                Some(self.config.fd_epsilon),
            ),
        }
    }
}
