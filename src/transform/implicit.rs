//! Implicit evaluation.
//!
//! The right-hand sides are residuals `R(x, p)` in the inner unknowns `x` and
//! the caller's binding `p`. Inner values are the root of `R(., p) = 0`,
//! found with the damped Newton solver. The result holds the solved inner
//! values followed by every other symbol the caller passed in.

use crate::error::{Result, TrafoError};
use crate::solver::{NewtonConfig, NewtonSolver, ResidualSystem};
use crate::symbolic::{EquationVector, Expression};
use crate::transform::explicit::symbolic_jacobian;
use crate::transform::parvec::{Deriv, ParVec};
use crate::transform::Transform;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};
use indexmap::IndexMap;
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Compile-time settings of implicit transformations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplicitOptions {
    /// Initial guesses for unknowns the caller does not bind
    pub guesses: IndexMap<String, f64>,

    pub newton: NewtonConfig,
}

impl ImplicitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guess(mut self, name: &str, value: f64) -> Self {
        self.guesses.insert(name.to_string(), value);
        self
    }

    pub fn with_newton(mut self, config: NewtonConfig) -> Self {
        self.newton = config;
        self
    }
}

/// Compiled implicit transformation
#[derive(Debug, Clone)]
pub struct ImplicitTransform {
    residuals: Vec<Expression>,
    unknowns: Vec<String>,
    outer: Vec<String>,
    /// `d R_i / d x_j`
    jacobian: Option<Vec<Vec<Expression>>>,
    options: ImplicitOptions,
}

/// Residual system at a fixed caller binding
struct Bound<'a> {
    transform: &'a ImplicitTransform,
    binding: ParVec,
}

impl Bound<'_> {
    fn context(&self, x: &Array1<f64>) -> ParVec {
        let mut ctx = self.binding.clone();
        for (name, value) in self.transform.unknowns.iter().zip(x.iter()) {
            ctx.insert(name, *value);
        }
        ctx
    }
}

impl ResidualSystem for Bound<'_> {
    fn dimension(&self) -> usize {
        self.transform.unknowns.len()
    }

    fn residuals(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.transform.residuals_at(&self.context(x))
    }

    fn jacobian(&self, x: &Array1<f64>) -> Result<Array2<f64>> {
        let ctx = self.context(x);
        let symbolic = match &self.transform.jacobian {
            Some(rows) => evaluate_matrix(rows, &ctx).ok(),
            None => None,
        };
        match symbolic {
            Some(jac) => Ok(jac),
            None => finite_difference::jacobian(|p| self.residuals(p), x, None),
        }
    }

    fn has_custom_jacobian(&self) -> bool {
        self.transform.jacobian.is_some()
    }
}

fn evaluate_matrix(rows: &[Vec<Expression>], ctx: &ParVec) -> Result<Array2<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    let mut out = Array2::zeros((rows.len(), ncols));
    for (i, row) in rows.iter().enumerate() {
        for (j, d) in row.iter().enumerate() {
            out[[i, j]] = d.evaluate(ctx)?;
        }
    }
    Ok(out)
}

impl ImplicitTransform {
    pub fn new(equations: &EquationVector, options: ImplicitOptions) -> Self {
        let unknowns: Vec<String> = equations.names().into_iter().map(String::from).collect();
        let outer = equations
            .symbols()
            .into_iter()
            .filter(|s| !equations.contains(s))
            .collect();
        let jacobian = symbolic_jacobian(equations, &unknowns).ok();

        Self {
            residuals: equations.iter().map(|(_, e)| e.clone()).collect(),
            unknowns,
            outer,
            jacobian,
            options,
        }
    }

    fn residuals_at(&self, ctx: &ParVec) -> Result<Array1<f64>> {
        self.residuals
            .iter()
            .map(|r| r.evaluate(ctx).map_err(TrafoError::from))
            .collect()
    }

    /// Starting point: caller binding, then compile-time guess, then 1
    fn initial_guess(&self, pars: &ParVec) -> Array1<f64> {
        self.unknowns
            .iter()
            .map(|name| {
                pars.get(name)
                    .or_else(|| self.options.guesses.get(name).copied())
                    .unwrap_or(1.0)
            })
            .collect()
    }

    /// `d R / d p` for the listed caller symbols
    fn parameter_jacobian(&self, ctx: &ParVec, symbols: &[String]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.residuals.len(), symbols.len()));
        for (j, symbol) in symbols.iter().enumerate() {
            if !self.outer.contains(symbol) {
                continue;
            }
            for (i, r) in self.residuals.iter().enumerate() {
                let symbolic = r.derivative(symbol).and_then(|d| d.evaluate(ctx));
                out[[i, j]] = match symbolic {
                    Ok(value) => value,
                    Err(_) => {
                        let x0 = ndarray::arr1(&[ctx.get(symbol).unwrap_or(0.0)]);
                        finite_difference::jacobian(
                            |x| {
                                let mut shifted = ctx.clone();
                                shifted.insert(symbol, x[0]);
                                Ok(ndarray::arr1(&[r.evaluate(&shifted)?]))
                            },
                            &x0,
                            None,
                        )
                        .map_or(f64::NAN, |fd| fd[[0, 0]])
                    }
                };
            }
        }
        Ok(out)
    }

    /// Implicit-function theorem: `dx/dp = -(dR/dx)^-1 dR/dp`
    fn sensitivities(
        &self,
        system: &Bound<'_>,
        root: &Array1<f64>,
        passed: &[String],
    ) -> Result<Array2<f64>> {
        let ctx = system.context(root);
        let dr_dx = system.jacobian(root)?;
        let dr_dp = self.parameter_jacobian(&ctx, passed)?;

        let lu = ndarray_to_nalgebra(&dr_dx).lu();
        let rhs = -ndarray_to_nalgebra(&dr_dp);
        let dx_dp = lu.solve(&rhs).ok_or_else(|| TrafoError::NoConvergence {
            iterations: 0,
            residual_norm: 0.0,
            message: "singular Jacobian at the root".to_string(),
        })?;
        Ok(nalgebra_to_ndarray(&dx_dp))
    }
}

impl Transform for ImplicitTransform {
    fn apply(&self, pars: &ParVec) -> Result<ParVec> {
        pars.require(&self.outer)?;

        let passed: Vec<String> = pars
            .names()
            .into_iter()
            .filter(|n| !self.unknowns.contains(n))
            .collect();
        let binding: ParVec = passed
            .iter()
            .map(|n| (n.clone(), pars.get(n).unwrap_or_default()))
            .collect();

        let system = Bound {
            transform: self,
            binding,
        };
        let x0 = self.initial_guess(pars);
        debug!("implicit: solving for {:?} from {:?}", self.unknowns, x0);

        let solver = NewtonSolver::with_config(self.options.newton.clone());
        let result = solver.solve(&system, &x0)?;

        // rows: solved unknowns, then passed-through symbols
        let n = self.unknowns.len();
        let m = passed.len();
        let mut local = Array2::<f64>::zeros((n + m, m));
        if m > 0 {
            let dx_dp = self.sensitivities(&system, &result.x, &passed)?;
            local.slice_mut(ndarray::s![..n, ..]).assign(&dx_dp);
        }
        local.slice_mut(ndarray::s![n.., ..]).assign(&Array2::eye(m));

        let rows: Vec<String> = self.unknowns.iter().chain(passed.iter()).cloned().collect();
        let local = Deriv::new(rows, passed.clone(), local)?;

        let mut out: ParVec = self
            .unknowns
            .iter()
            .cloned()
            .zip(result.x.iter().copied())
            .collect();
        for name in &passed {
            out.insert(name, pars.get(name).unwrap_or_default());
        }
        Ok(out.with_deriv(pars.lift(local)))
    }

    fn inner_parameters(&self) -> Vec<String> {
        self.unknowns.clone()
    }

    fn outer_parameters(&self) -> Vec<String> {
        self.outer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DiffMethod;
    use approx::assert_relative_eq;

    fn linear() -> EquationVector {
        EquationVector::parse_pairs(&[("X", "X + Y - 2*a"), ("Y", "X - Y - 2*b")]).unwrap()
    }

    #[test]
    fn solves_and_passes_outer_through() {
        let t = ImplicitTransform::new(&linear(), ImplicitOptions::default());
        let out = t.apply(&ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)])).unwrap();

        assert_relative_eq!(out.get("X").unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(out.get("Y").unwrap(), 1.0, epsilon = 1e-9);
        assert_eq!(out.get("a"), Some(3.0));
        assert_eq!(out.get("b"), Some(2.0));
        assert_eq!(out.names(), vec!["X", "Y", "a", "b"]);
    }

    #[test]
    fn sensitivities_follow_the_implicit_function_theorem() {
        let t = ImplicitTransform::new(&linear(), ImplicitOptions::default());
        let out = t.apply(&ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)])).unwrap();
        let d = out.deriv().unwrap();

        // X = a + b, Y = a - b
        assert_relative_eq!(d.get("X", "a").unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(d.get("X", "b").unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(d.get("Y", "b").unwrap(), -1.0, epsilon = 1e-9);
        assert_eq!(d.get("a", "a"), Some(1.0));
        assert_eq!(d.get("a", "b"), Some(0.0));
    }

    #[test]
    fn nonlinear_with_guess_and_finite_differences() {
        let eqs = EquationVector::parse_pairs(&[("x", "x^2 - c")]).unwrap();
        let options = ImplicitOptions::new()
            .with_guess("x", 3.0)
            .with_newton(NewtonConfig::new().with_diff_method(DiffMethod::FiniteDifference));
        let t = ImplicitTransform::new(&eqs, options);
        let out = t.apply(&ParVec::from_pairs(&[("c", 4.0)])).unwrap();

        assert_relative_eq!(out.get("x").unwrap(), 2.0, epsilon = 1e-8);
        // dx/dc = 1 / (2x)
        assert_relative_eq!(out.deriv().unwrap().get("x", "c").unwrap(), 0.25, epsilon = 1e-5);
    }

    #[test]
    fn caller_binding_overrides_guess() {
        let eqs = EquationVector::parse_pairs(&[("x", "x^2 - c")]).unwrap();
        let t = ImplicitTransform::new(&eqs, ImplicitOptions::new().with_guess("x", 3.0));
        let out = t
            .apply(&ParVec::from_pairs(&[("c", 4.0), ("x", -3.0)]))
            .unwrap();
        assert_relative_eq!(out.get("x").unwrap(), -2.0, epsilon = 1e-8);
        assert_eq!(out.names(), vec!["x", "c"]);
    }

    #[test]
    fn singular_parameter_derivative_falls_back() {
        let eqs = EquationVector::parse_pairs(&[("x", "x - abs(k)")]).unwrap();
        let t = ImplicitTransform::new(&eqs, ImplicitOptions::default());
        let out = t.apply(&ParVec::from_pairs(&[("k", 0.0)])).unwrap();

        assert_relative_eq!(out.get("x").unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(out.deriv().unwrap().get("x", "k").unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn no_root_is_reported() {
        let eqs = EquationVector::parse_pairs(&[("x", "x^2 + c")]).unwrap();
        let options =
            ImplicitOptions::new().with_newton(NewtonConfig::new().with_max_iterations(25));
        let t = ImplicitTransform::new(&eqs, options);
        let err = t.apply(&ParVec::from_pairs(&[("c", 1.0)])).unwrap_err();
        assert!(matches!(err, TrafoError::NoConvergence { .. }));
    }
}
