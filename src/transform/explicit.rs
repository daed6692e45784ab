//! Explicit evaluation: every inner value is its right-hand side evaluated at
//! the caller's binding.

use crate::error::{Result, TrafoError};
use crate::symbolic::{EquationVector, Expression, ExpressionError};
use crate::transform::parvec::{Deriv, ParVec};
use crate::transform::Transform;
use crate::utils::finite_difference;
use log::debug;
use ndarray::{Array1, Array2};

/// Compiled explicit transformation
#[derive(Debug, Clone)]
pub struct ExplicitTransform {
    equations: EquationVector,
    inner: Vec<String>,
    outer: Vec<String>,
    /// `d rhs_i / d outer_j`; `None` when some right-hand side has no
    /// symbolic derivative
    derivatives: Option<Vec<Vec<Expression>>>,
}

impl ExplicitTransform {
    pub fn new(equations: &EquationVector) -> Self {
        let inner: Vec<String> = equations.names().into_iter().map(String::from).collect();
        let outer = equations.symbols();
        let derivatives = symbolic_jacobian(equations, &outer).ok();

        Self {
            equations: equations.clone(),
            inner,
            outer,
            derivatives,
        }
    }

    fn evaluate(&self, pars: &ParVec) -> Result<Array1<f64>> {
        self.equations
            .iter()
            .map(|(_, expr)| expr.evaluate(pars).map_err(TrafoError::from))
            .collect()
    }

    /// Symbolic Jacobian at `pars`. Entries whose derivative cannot be
    /// evaluated there (e.g. `sqrt` at 0) are taken from finite differences.
    fn local_jacobian(&self, pars: &ParVec) -> Result<Array2<f64>> {
        let Some(rows) = &self.derivatives else {
            return self.fd_jacobian(pars);
        };

        let mut jac = Array2::zeros((self.inner.len(), self.outer.len()));
        let mut failed = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            for (j, d) in row.iter().enumerate() {
                match d.evaluate(pars) {
                    Ok(value) => jac[[i, j]] = value,
                    Err(e) => {
                        debug!(
                            "d{}/d{} not evaluable symbolically ({}), using finite differences",
                            self.inner[i], self.outer[j], e
                        );
                        failed.push((i, j));
                    }
                }
            }
        }

        if !failed.is_empty() {
            let fd = self
                .fd_jacobian(pars)
                .unwrap_or_else(|_| Array2::from_elem(jac.dim(), f64::NAN));
            for (i, j) in failed {
                jac[[i, j]] = fd[[i, j]];
            }
        }
        Ok(jac)
    }

    fn fd_jacobian(&self, pars: &ParVec) -> Result<Array2<f64>> {
        let base = pars.to_array(&self.outer)?;
        finite_difference::jacobian(
            |x| {
                let mut shifted = pars.without_deriv();
                for (name, value) in self.outer.iter().zip(x.iter()) {
                    shifted.insert(name, *value);
                }
                self.evaluate(&shifted)
            },
            &base,
            None,
        )
    }
}

pub(crate) fn symbolic_jacobian(
    equations: &EquationVector,
    symbols: &[String],
) -> std::result::Result<Vec<Vec<Expression>>, ExpressionError> {
    equations
        .iter()
        .map(|(_, expr)| {
            symbols
                .iter()
                .map(|s| expr.derivative(s))
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .collect()
}

impl Transform for ExplicitTransform {
    fn apply(&self, pars: &ParVec) -> Result<ParVec> {
        pars.require(&self.outer)?;

        let values = self.evaluate(pars)?;
        let local = Deriv::new(
            self.inner.clone(),
            self.outer.clone(),
            self.local_jacobian(pars)?,
        )?;

        let out: ParVec = self.inner.iter().cloned().zip(values.iter().copied()).collect();
        Ok(out.with_deriv(pars.lift(local)))
    }

    fn inner_parameters(&self) -> Vec<String> {
        self.inner.clone()
    }

    fn outer_parameters(&self) -> Vec<String> {
        self.outer.clone()
    }
}
