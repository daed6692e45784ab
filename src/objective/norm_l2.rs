//! Weighted least-squares data fit.
//!
//! `value = sum(((prediction - data) / sigma)^2)` per condition. Gradient and
//! Gauss-Newton Hessian come from a forward-difference Jacobian of the
//! weighted residuals with respect to every bound parameter.

use crate::conditions::ConditionMap;
use crate::error::{Result, TrafoError};
use crate::objective::{ObjectiveFunction, ObjectiveValue};
use crate::prediction::PredictionFn;
use crate::transform::ParVec;
use crate::utils::finite_difference;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// One measurement of one observable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub time: f64,
    pub value: f64,
    pub sigma: f64,
}

impl DataPoint {
    pub fn new(name: &str, time: f64, value: f64, sigma: f64) -> Self {
        Self {
            name: name.to_string(),
            time,
            value,
            sigma,
        }
    }
}

/// Data-fit term of a prediction function against per-condition data
#[derive(Debug, Clone)]
pub struct NormL2 {
    data: ConditionMap<Vec<DataPoint>>,
    model: PredictionFn,
}

impl NormL2 {
    pub fn new(data: ConditionMap<Vec<DataPoint>>, model: PredictionFn) -> Result<Self> {
        for (condition, points) in &data {
            if let Some(bad) = points.iter().find(|p| !(p.sigma > 0.0)) {
                return Err(TrafoError::InvalidInput(format!(
                    "non-positive sigma {} for '{}' in condition '{}'",
                    bad.sigma, bad.name, condition
                )));
            }
        }
        Ok(Self { data, model })
    }

    fn residuals(
        &self,
        points: &[DataPoint],
        times: &[f64],
        pars: &ParVec,
        condition: &str,
    ) -> Result<Array1<f64>> {
        let prediction = self.model.predict(times, pars, Some(condition))?;
        points
            .iter()
            .map(|p| {
                let predicted = prediction.value(&p.name, p.time).ok_or_else(|| {
                    TrafoError::UnknownSymbol(format!(
                        "observable '{}' is not predicted in condition '{}'",
                        p.name, condition
                    ))
                })?;
                Ok((predicted - p.value) / p.sigma)
            })
            .collect()
    }
}

impl ObjectiveFunction for NormL2 {
    fn evaluate(&self, pars: &ParVec, condition: Option<&str>) -> Result<ObjectiveValue> {
        let condition = condition.ok_or_else(|| {
            TrafoError::ConditionMismatch("the data fit is evaluated per condition".to_string())
        })?;
        let points = self.data.get(condition).ok_or_else(|| {
            TrafoError::ConditionMismatch(format!("no data for condition '{}'", condition))
        })?;

        let mut times: Vec<f64> = points.iter().map(|p| p.time).collect();
        times.sort_by(f64::total_cmp);
        times.dedup();

        let pars = pars.without_deriv();
        let names = pars.names();
        let residuals = self.residuals(points, &times, &pars, condition)?;
        let jac = finite_difference::jacobian(
            |x| self.residuals(points, &times, &pars.with_values(x)?, condition),
            &pars.to_array(&names)?,
            None,
        )?;

        Ok(ObjectiveValue {
            value: residuals.dot(&residuals),
            names,
            gradient: Some(2.0 * jac.t().dot(&residuals)),
            hessian: Some(2.0 * jac.t().dot(&jac)),
        })
    }

    fn conditions(&self) -> Option<Vec<String>> {
        Some(self.data.conditions().into_iter().map(String::from).collect())
    }
}
