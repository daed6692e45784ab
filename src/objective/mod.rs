//! # Objective functions
//!
//! An objective function maps a parameter binding to a scalar value with
//! optional gradient and Hessian. `obj * p` evaluates the objective on the
//! output of a parameter transformation and chains the derivatives back to
//! the transformation's input symbols, summing over conditions. `a + b`
//! evaluates both objectives at the same point and adds the results.

pub mod norm_l2;
pub mod prior;

pub use norm_l2::{DataPoint, NormL2};
pub use prior::Prior;

use crate::error::{Result, TrafoError};
use crate::transform::compose::composed_conditions;
use crate::transform::{ParVec, ParameterTransformation};
use indexmap::IndexSet;
use log::debug;
use ndarray::{Array1, Array2};
use std::fmt;
use std::ops::{Add, Mul};
use std::sync::Arc;

/// Value of an objective with optional derivatives
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveValue {
    pub value: f64,

    /// Parameter names indexing `gradient` and `hessian`
    pub names: Vec<String>,

    pub gradient: Option<Array1<f64>>,
    pub hessian: Option<Array2<f64>>,
}

impl ObjectiveValue {
    /// Zero objective without parameters
    pub fn zero() -> Self {
        Self {
            value: 0.0,
            names: Vec::new(),
            gradient: Some(Array1::zeros(0)),
            hessian: Some(Array2::zeros((0, 0))),
        }
    }

    /// Gradient entry for one parameter
    pub fn gradient_of(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == name)?;
        self.gradient.as_ref().map(|g| g[i])
    }

    /// Hessian entry for one pair of parameters
    pub fn hessian_of(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == row)?;
        let j = self.names.iter().position(|n| n == col)?;
        self.hessian.as_ref().map(|h| h[[i, j]])
    }

    /// Re-index onto `names`; parameters not present get zero entries
    fn embed(&self, names: &[String]) -> (Option<Array1<f64>>, Option<Array2<f64>>) {
        let index: Vec<Option<usize>> = names
            .iter()
            .map(|n| self.names.iter().position(|m| m == n))
            .collect();

        let gradient = self.gradient.as_ref().map(|g| {
            Array1::from_shape_fn(names.len(), |i| index[i].map_or(0.0, |k| g[k]))
        });
        let hessian = self.hessian.as_ref().map(|h| {
            Array2::from_shape_fn((names.len(), names.len()), |(i, j)| {
                match (index[i], index[j]) {
                    (Some(k), Some(l)) => h[[k, l]],
                    _ => 0.0,
                }
            })
        });
        (gradient, hessian)
    }
}

impl Add for ObjectiveValue {
    type Output = ObjectiveValue;

    /// Sum values; gradients and Hessians are summed by parameter name over
    /// the union of names when both operands carry them
    fn add(self, rhs: ObjectiveValue) -> ObjectiveValue {
        let names: Vec<String> = self
            .names
            .iter()
            .chain(rhs.names.iter())
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let (g1, h1) = self.embed(&names);
        let (g2, h2) = rhs.embed(&names);

        ObjectiveValue {
            value: self.value + rhs.value,
            gradient: g1.zip(g2).map(|(a, b)| a + b),
            hessian: h1.zip(h2).map(|(a, b)| a + b),
            names,
        }
    }
}

impl fmt::Display for ObjectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "value: {:.6e}", self.value)?;
        if let Some(g) = &self.gradient {
            for (name, v) in self.names.iter().zip(g.iter()) {
                writeln!(f, "  d/d{}: {:.6e}", name, v)?;
            }
        }
        Ok(())
    }
}

/// A scalar objective of a parameter binding
pub trait ObjectiveFunction: Send + Sync + fmt::Debug {
    /// Evaluate for one condition, or condition-agnostically
    fn evaluate(&self, pars: &ParVec, condition: Option<&str>) -> Result<ObjectiveValue>;

    /// Conditions contributing to the total; `None` for a condition-agnostic
    /// objective
    fn conditions(&self) -> Option<Vec<String>> {
        None
    }
}

/// Shared handle to an objective function
#[derive(Debug, Clone)]
pub struct ObjectiveFn(Arc<dyn ObjectiveFunction>);

impl ObjectiveFn {
    pub fn new(f: impl ObjectiveFunction + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Total objective: the sum over all conditions, or the single
    /// condition-agnostic evaluation
    pub fn evaluate(&self, pars: &ParVec) -> Result<ObjectiveValue> {
        match self.0.conditions() {
            None => self.0.evaluate(pars, None),
            Some(conditions) => conditions
                .iter()
                .try_fold(ObjectiveValue::zero(), |acc, c| {
                    Ok(acc + self.0.evaluate(pars, Some(c.as_str()))?)
                }),
        }
    }

    /// Contribution of one condition
    pub fn evaluate_condition(&self, pars: &ParVec, condition: &str) -> Result<ObjectiveValue> {
        self.0.evaluate(pars, Some(condition))
    }

    pub fn conditions(&self) -> Option<Vec<String>> {
        self.0.conditions()
    }
}

/// Objective evaluated on the output of a parameter transformation
#[derive(Debug)]
struct ComposedObjective {
    objective: ObjectiveFn,
    trafo: ParameterTransformation,
    conditions: Option<Vec<String>>,
}

impl ComposedObjective {
    fn evaluate_one(&self, pars: &ParVec, condition: Option<&str>) -> Result<ObjectiveValue> {
        let inner = self.trafo.transform_for(condition)?.apply(pars)?;
        let value = match condition {
            Some(c) if self.objective.conditions().is_some() => {
                self.objective.evaluate_condition(&inner, c)?
            }
            _ => self.objective.evaluate(&inner)?,
        };

        let Some(deriv) = inner.deriv() else {
            return Ok(value);
        };
        let jac = deriv.select_rows(&value.names);
        let gradient = value.gradient.as_ref().map(|g| jac.t().dot(g));
        let hessian = value.hessian.as_ref().map(|h| jac.t().dot(h).dot(&jac));
        debug!(
            "objective{}: {:.6e}",
            condition.map(|c| format!(" [{}]", c)).unwrap_or_default(),
            value.value
        );

        Ok(ObjectiveValue {
            value: value.value,
            names: deriv.cols().to_vec(),
            gradient,
            hessian,
        })
    }
}

impl ObjectiveFunction for ComposedObjective {
    fn evaluate(&self, pars: &ParVec, condition: Option<&str>) -> Result<ObjectiveValue> {
        if let (Some(list), Some(c)) = (&self.conditions, condition) {
            if !list.iter().any(|l| l == c) {
                return Err(TrafoError::ConditionMismatch(format!(
                    "unknown condition '{}'",
                    c
                )));
            }
        }
        self.evaluate_one(pars, condition)
    }

    fn conditions(&self) -> Option<Vec<String>> {
        self.conditions.clone()
    }
}

impl Mul<&ParameterTransformation> for &ObjectiveFn {
    type Output = Result<ObjectiveFn>;

    fn mul(self, rhs: &ParameterTransformation) -> Self::Output {
        let trafo_conditions = rhs
            .conditions()
            .map(|list| list.into_iter().map(String::from).collect());
        let conditions = composed_conditions(self.conditions(), trafo_conditions)?;
        Ok(ObjectiveFn::new(ComposedObjective {
            objective: self.clone(),
            trafo: rhs.clone(),
            conditions,
        }))
    }
}

impl Mul<ParameterTransformation> for ObjectiveFn {
    type Output = Result<ObjectiveFn>;

    fn mul(self, rhs: ParameterTransformation) -> Self::Output {
        &self * &rhs
    }
}

/// Two objectives evaluated at the same point and added
#[derive(Debug)]
struct SumObjective {
    left: ObjectiveFn,
    right: ObjectiveFn,
}

impl ObjectiveFunction for SumObjective {
    fn evaluate(&self, pars: &ParVec, _condition: Option<&str>) -> Result<ObjectiveValue> {
        Ok(self.left.evaluate(pars)? + self.right.evaluate(pars)?)
    }
}

impl Add for ObjectiveFn {
    type Output = ObjectiveFn;

    fn add(self, rhs: ObjectiveFn) -> ObjectiveFn {
        ObjectiveFn::new(SumObjective {
            left: self,
            right: rhs,
        })
    }
}

impl Add for &ObjectiveFn {
    type Output = ObjectiveFn;

    fn add(self, rhs: &ObjectiveFn) -> ObjectiveFn {
        self.clone() + rhs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn value(names: &[&str], v: f64, g: Array1<f64>, h: Array2<f64>) -> ObjectiveValue {
        ObjectiveValue {
            value: v,
            names: names.iter().map(|s| s.to_string()).collect(),
            gradient: Some(g),
            hessian: Some(h),
        }
    }

    #[test]
    fn sum_aligns_by_name() {
        let a = value(&["x", "y"], 1.0, array![1.0, 2.0], array![[1.0, 0.0], [0.0, 1.0]]);
        let b = value(&["y", "z"], 2.0, array![10.0, 20.0], array![[2.0, 3.0], [3.0, 4.0]]);
        let s = a + b;

        assert_eq!(s.names, vec!["x", "y", "z"]);
        assert_relative_eq!(s.value, 3.0);
        assert_eq!(s.gradient, Some(array![1.0, 12.0, 20.0]));
        assert_eq!(s.hessian_of("y", "y"), Some(3.0));
        assert_eq!(s.hessian_of("y", "z"), Some(3.0));
        assert_eq!(s.hessian_of("x", "z"), Some(0.0));
    }

    #[test]
    fn sum_drops_gradient_when_one_side_lacks_it() {
        let a = value(&["x"], 1.0, array![1.0], array![[1.0]]);
        let mut b = value(&["x"], 1.0, array![1.0], array![[1.0]]);
        b.gradient = None;
        let s = a + b;
        assert!(s.gradient.is_none());
        assert!(s.hessian.is_some());
    }

    #[test]
    fn zero_is_neutral() {
        let a = value(&["x"], 1.5, array![2.0], array![[4.0]]);
        assert_eq!(ObjectiveValue::zero() + a.clone(), a);
    }
}
