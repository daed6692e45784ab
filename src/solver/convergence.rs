//! Termination states of the Newton iteration.

use ndarray::Array1;

/// Possible states of a Newton solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The residual max-norm dropped below the tolerance.
    Converged,

    /// The iteration budget was exhausted.
    MaxIterationsReached,

    /// The Jacobian could not be factorized.
    SingularJacobian,

    /// No damped step reduced the residual.
    LineSearchFailed,

    /// The residual contains NaN or infinite entries.
    NumericalError,
}

impl SolveStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }

    /// Returns a description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            SolveStatus::Converged => "Converged: residual below tolerance",
            SolveStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            SolveStatus::SingularJacobian => "Terminated: singular Jacobian",
            SolveStatus::LineSearchFailed => "Terminated: no damped step reduced the residual",
            SolveStatus::NumericalError => "Terminated: non-finite residual",
        }
    }
}

/// Largest absolute entry; NaN entries make the norm NaN.
pub fn max_norm(residuals: &Array1<f64>) -> f64 {
    if residuals.iter().any(|r| r.is_nan()) {
        return f64::NAN;
    }
    residuals.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()))
}

/// Half the sum of squares, the merit function of the line search.
pub fn merit(residuals: &Array1<f64>) -> f64 {
    0.5 * residuals.iter().map(|r| r * r).sum::<f64>()
}
