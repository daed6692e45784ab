//! Gaussian prior / L2 constraint `sum(((p - mu) / sigma)^2)`.

use crate::error::{Result, TrafoError};
use crate::objective::{ObjectiveFunction, ObjectiveValue};
use crate::transform::ParVec;
use indexmap::IndexMap;
use ndarray::{Array1, Array2};

/// Quadratic penalty around a center with per-parameter widths
#[derive(Debug, Clone, PartialEq)]
pub struct Prior {
    terms: IndexMap<String, (f64, f64)>,
}

impl Prior {
    /// ```
    /// use partrafo::objective::{ObjectiveFn, Prior};
    /// use partrafo::transform::ParVec;
    ///
    /// let prior = ObjectiveFn::new(Prior::new(&[("k", 0.0)], 2.0).unwrap());
    /// let v = prior.evaluate(&ParVec::from_pairs(&[("k", 4.0)])).unwrap();
    /// assert_eq!(v.value, 4.0);
    /// ```
    pub fn new(center: &[(&str, f64)], sigma: f64) -> Result<Self> {
        let sigmas: Vec<(&str, f64)> = center.iter().map(|(n, _)| (*n, sigma)).collect();
        Self::with_sigmas(center, &sigmas)
    }

    /// Prior with individual widths; every centered parameter needs a width
    pub fn with_sigmas(center: &[(&str, f64)], sigma: &[(&str, f64)]) -> Result<Self> {
        let mut terms = IndexMap::with_capacity(center.len());
        for (name, mu) in center {
            let s = sigma
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| *s)
                .ok_or_else(|| TrafoError::UnknownSymbol(format!("no sigma for '{}'", name)))?;
            if !(s > 0.0) {
                return Err(TrafoError::InvalidInput(format!(
                    "sigma for '{}' must be positive, got {}",
                    name, s
                )));
            }
            terms.insert(name.to_string(), (*mu, s));
        }
        Ok(Self { terms })
    }
}

impl ObjectiveFunction for Prior {
    fn evaluate(&self, pars: &ParVec, _condition: Option<&str>) -> Result<ObjectiveValue> {
        let n = self.terms.len();
        let mut value = 0.0;
        let mut gradient = Array1::zeros(n);
        let mut hessian = Array2::zeros((n, n));

        for (i, (name, (mu, sigma))) in self.terms.iter().enumerate() {
            let p = pars
                .get(name)
                .ok_or_else(|| TrafoError::UnknownSymbol(format!("prior parameter '{}'", name)))?;
            let z = (p - mu) / sigma;
            value += z * z;
            gradient[i] = 2.0 * z / sigma;
            hessian[[i, i]] = 2.0 / (sigma * sigma);
        }

        Ok(ObjectiveValue {
            value,
            names: self.terms.keys().cloned().collect(),
            gradient: Some(gradient),
            hessian: Some(hessian),
        })
    }
}
