//! Finite difference methods for numerical differentiation.
//!
//! Used by the Newton solver when symbolic Jacobians are switched off and by
//! objective terms whose model is only available numerically.

use crate::error::{Result, TrafoError};
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Step for one coordinate, scaled to the magnitude of the coordinate
fn step(x: f64, eps: f64) -> f64 {
    if x.abs() > 1.0 {
        x.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian of a vector function using forward finite differences.
///
/// `J[i, j] = ∂f_i/∂x_j`. The function is evaluated once at `params` and once
/// per coordinate.
///
/// # Arguments
///
/// * `f` - The vector function to differentiate
/// * `params` - The point at which to evaluate the Jacobian
/// * `epsilon` - The relative step size (optional)
pub fn jacobian<F>(f: F, params: &Array1<f64>, epsilon: Option<f64>) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let f0 = f(params)?;
    let mut jac = Array2::zeros((f0.len(), params.len()));

    for j in 0..params.len() {
        let h = step(params[j], eps);
        let mut shifted = params.clone();
        shifted[j] += h;

        let f1 = f(&shifted)?;
        if f1.len() != f0.len() {
            return Err(TrafoError::DimensionMismatch(format!(
                "Expected {} function values, got {}",
                f0.len(),
                f1.len()
            )));
        }
        for i in 0..f0.len() {
            jac[[i, j]] = (f1[i] - f0[i]) / h;
        }
    }

    Ok(jac)
}

/// Compute the gradient of a scalar function using central finite differences.
///
/// # Arguments
///
/// * `f` - The function to differentiate
/// * `params` - The point at which to evaluate the gradient
/// * `epsilon` - The relative step size (optional)
pub fn gradient<F>(f: F, params: &Array1<f64>, epsilon: Option<f64>) -> Result<Array1<f64>>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let mut grad = Array1::zeros(params.len());

    for j in 0..params.len() {
        let h = step(params[j], eps);
        let mut forward = params.clone();
        forward[j] += h;
        let mut backward = params.clone();
        backward[j] -= h;

        grad[j] = (f(&forward)? - f(&backward)?) / (2.0 * h);
    }

    Ok(grad)
}
