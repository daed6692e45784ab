//! Prediction functions.
//!
//! A prediction function maps a parameter binding and a set of time points to
//! observable trajectories. Simulating a dynamical model is the job of an
//! external integrator; this module only defines the boundary, a closed-form
//! implementation, and composition with parameter transformations.

use crate::conditions::ConditionMap;
use crate::error::{Result, TrafoError};
use crate::symbolic::{EquationVector, EvaluationContext};
use crate::transform::compose::composed_conditions;
use crate::transform::{ParVec, ParameterTransformation};
use ndarray::{Array1, Array2};
use std::fmt;
use std::ops::Mul;
use std::sync::Arc;

/// Observable trajectories at a set of time points
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Time points
    pub times: Array1<f64>,

    /// Observable names, one per column of `values`
    pub names: Vec<String>,

    /// `values[[i, j]]` is observable `j` at `times[i]`
    pub values: Array2<f64>,
}

impl Prediction {
    pub fn new(times: Array1<f64>, names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (times.len(), names.len()) {
            return Err(TrafoError::DimensionMismatch(format!(
                "Prediction values are {:?}, expected ({}, {})",
                values.dim(),
                times.len(),
                names.len()
            )));
        }
        Ok(Self {
            times,
            names,
            values,
        })
    }

    /// Value of `name` at time point `time`, matched exactly
    pub fn value(&self, name: &str, time: f64) -> Option<f64> {
        let j = self.names.iter().position(|n| n == name)?;
        let i = self.times.iter().position(|t| *t == time)?;
        Some(self.values[[i, j]])
    }

    /// Trajectory of one observable
    pub fn observable(&self, name: &str) -> Option<Array1<f64>> {
        let j = self.names.iter().position(|n| n == name)?;
        Some(self.values.column(j).to_owned())
    }
}

/// A function from parameters to observable trajectories
pub trait PredictionFunction: Send + Sync + fmt::Debug {
    /// Evaluate at `times` for one condition (or none, for a
    /// condition-agnostic function)
    fn predict(&self, times: &[f64], pars: &ParVec, condition: Option<&str>) -> Result<Prediction>;

    /// Conditions served; `None` for a condition-agnostic function
    fn conditions(&self) -> Option<Vec<String>> {
        None
    }
}

/// Shared handle to a prediction function
#[derive(Debug, Clone)]
pub struct PredictionFn(Arc<dyn PredictionFunction>);

impl PredictionFn {
    pub fn new(f: impl PredictionFunction + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn predict(
        &self,
        times: &[f64],
        pars: &ParVec,
        condition: Option<&str>,
    ) -> Result<Prediction> {
        self.0.predict(times, pars, condition)
    }

    pub fn conditions(&self) -> Option<Vec<String>> {
        self.0.conditions()
    }

    /// Predict every condition served, or the listed ones
    pub fn predict_all(
        &self,
        times: &[f64],
        pars: &ParVec,
        conditions: Option<&[String]>,
    ) -> Result<ConditionMap<Prediction>> {
        let requested = match (conditions, self.conditions()) {
            (Some(list), _) => list.to_vec(),
            (None, Some(own)) => own,
            (None, None) => {
                return Err(TrafoError::ConditionMismatch(
                    "a condition-agnostic prediction needs explicit conditions".to_string(),
                ))
            }
        };
        requested
            .into_iter()
            .map(|c| {
                let prediction = self.predict(times, pars, Some(&c))?;
                Ok((c, prediction))
            })
            .collect()
    }
}

/// Observables given in closed form as expressions of time and parameters
#[derive(Debug, Clone)]
pub struct ExpressionPrediction {
    observables: EquationVector,
    time: String,
}

impl ExpressionPrediction {
    /// `time` names the symbol bound to the time point
    ///
    /// ```
    /// use partrafo::prediction::{ExpressionPrediction, PredictionFunction};
    /// use partrafo::symbolic::EquationVector;
    /// use partrafo::transform::ParVec;
    ///
    /// let obs = EquationVector::parse_pairs(&[("A", "A0 * exp(-k * t)")]).unwrap();
    /// let model = ExpressionPrediction::new(obs, "t");
    /// let pred = model
    ///     .predict(&[0.0, 1.0], &ParVec::from_pairs(&[("A0", 2.0), ("k", 0.0)]), None)
    ///     .unwrap();
    /// assert_eq!(pred.value("A", 1.0), Some(2.0));
    /// ```
    pub fn new(observables: EquationVector, time: &str) -> Self {
        Self {
            observables,
            time: time.to_string(),
        }
    }

    /// Parameters the observables depend on
    pub fn parameters(&self) -> Vec<String> {
        self.observables
            .symbols()
            .into_iter()
            .filter(|s| *s != self.time)
            .collect()
    }
}

impl PredictionFunction for ExpressionPrediction {
    fn predict(
        &self,
        times: &[f64],
        pars: &ParVec,
        _condition: Option<&str>,
    ) -> Result<Prediction> {
        if let Some(missing) = self.parameters().iter().find(|p| !pars.has_variable(p)) {
            return Err(TrafoError::UnknownSymbol(format!(
                "observable parameter '{}' is not bound",
                missing
            )));
        }

        let names: Vec<String> = self.observables.names().into_iter().map(String::from).collect();
        let mut values = Array2::zeros((times.len(), names.len()));
        let mut ctx = pars.without_deriv();
        for (i, t) in times.iter().enumerate() {
            ctx.insert(&self.time, *t);
            for (j, (_, expr)) in self.observables.iter().enumerate() {
                values[[i, j]] = expr.evaluate(&ctx)?;
            }
        }
        Prediction::new(Array1::from(times.to_vec()), names, values)
    }
}

/// Prediction evaluated on the output of a parameter transformation
#[derive(Debug, Clone)]
struct ComposedPrediction {
    model: PredictionFn,
    trafo: ParameterTransformation,
    conditions: Option<Vec<String>>,
}

impl PredictionFunction for ComposedPrediction {
    fn predict(&self, times: &[f64], pars: &ParVec, condition: Option<&str>) -> Result<Prediction> {
        if let (Some(list), Some(c)) = (&self.conditions, condition) {
            if !list.iter().any(|l| l == c) {
                return Err(TrafoError::ConditionMismatch(format!(
                    "unknown condition '{}'",
                    c
                )));
            }
        }
        let inner = self.trafo.transform_for(condition)?.apply(pars)?;
        self.model.predict(times, &inner, condition)
    }

    fn conditions(&self) -> Option<Vec<String>> {
        self.conditions.clone()
    }
}

impl Mul<&ParameterTransformation> for &PredictionFn {
    type Output = Result<PredictionFn>;

    fn mul(self, rhs: &ParameterTransformation) -> Self::Output {
        let trafo_conditions = rhs
            .conditions()
            .map(|list| list.into_iter().map(String::from).collect());
        let conditions = composed_conditions(self.conditions(), trafo_conditions)?;
        Ok(PredictionFn::new(ComposedPrediction {
            model: self.clone(),
            trafo: rhs.clone(),
            conditions,
        }))
    }
}

impl Mul<ParameterTransformation> for PredictionFn {
    type Output = Result<PredictionFn>;

    fn mul(self, rhs: ParameterTransformation) -> Self::Output {
        &self * &rhs
    }
}
