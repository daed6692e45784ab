//! Composition (`*`) and union (`+`) of parameter transformations.
//!
//! `g * f` pipes the output of `f` into `g`. Two per-condition operands must
//! have the same conditions; a condition-agnostic operand is broadcast to the
//! conditions of the other. `a + b` joins the conditions of two per-condition
//! functions and rejects shared conditions.

use crate::error::{Result, TrafoError};
use crate::transform::parvec::ParVec;
use crate::transform::{Branches, ParameterTransformation, Transform, TransformKind};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::ops::{Add, Mul};
use std::sync::Arc;

/// `outer(inner(pars))`
#[derive(Debug, Clone)]
pub struct Composed {
    outer: Arc<dyn Transform>,
    inner: Arc<dyn Transform>,
}

impl Composed {
    pub fn new(outer: Arc<dyn Transform>, inner: Arc<dyn Transform>) -> Self {
        Self { outer, inner }
    }
}

impl Transform for Composed {
    fn apply(&self, pars: &ParVec) -> Result<ParVec> {
        self.outer.apply(&self.inner.apply(pars)?)
    }

    fn inner_parameters(&self) -> Vec<String> {
        self.outer.inner_parameters()
    }

    fn outer_parameters(&self) -> Vec<String> {
        self.inner.outer_parameters()
    }
}

/// Conditions of a composition of two operands.
///
/// `None` stands for a condition-agnostic operand. The result is `None` only
/// when both operands are condition-agnostic.
pub fn composed_conditions(
    left: Option<Vec<String>>,
    right: Option<Vec<String>>,
) -> Result<Option<Vec<String>>> {
    match (left, right) {
        (None, None) => Ok(None),
        (Some(c), None) | (None, Some(c)) => Ok(Some(c)),
        (Some(l), Some(r)) => {
            let lset: HashSet<&String> = l.iter().collect();
            let rset: HashSet<&String> = r.iter().collect();
            if lset != rset {
                let mut only: Vec<&str> = lset
                    .symmetric_difference(&rset)
                    .map(|s| s.as_str())
                    .collect();
                only.sort_unstable();
                return Err(TrafoError::ConditionMismatch(format!(
                    "conditions present in only one operand: {:?}",
                    only
                )));
            }
            Ok(Some(l))
        }
    }
}

fn owned_conditions(p: &ParameterTransformation) -> Option<Vec<String>> {
    p.conditions()
        .map(|list| list.into_iter().map(String::from).collect())
}

impl Mul<&ParameterTransformation> for &ParameterTransformation {
    type Output = Result<ParameterTransformation>;

    fn mul(self, rhs: &ParameterTransformation) -> Self::Output {
        match composed_conditions(owned_conditions(self), owned_conditions(rhs))? {
            None => {
                let outer = self.transform_for(None)?;
                let inner = rhs.transform_for(None)?;
                Ok(ParameterTransformation::global(
                    TransformKind::Composite,
                    Arc::new(Composed::new(outer, inner)),
                ))
            }
            Some(conditions) => {
                let mut branches: IndexMap<String, Arc<dyn Transform>> = IndexMap::new();
                for c in conditions {
                    let outer = self.transform_for(Some(&c))?;
                    let inner = rhs.transform_for(Some(&c))?;
                    branches.insert(c, Arc::new(Composed::new(outer, inner)));
                }
                Ok(ParameterTransformation::per_condition(
                    TransformKind::Composite,
                    branches,
                ))
            }
        }
    }
}

impl Mul for ParameterTransformation {
    type Output = Result<ParameterTransformation>;

    fn mul(self, rhs: ParameterTransformation) -> Self::Output {
        &self * &rhs
    }
}

impl Add for ParameterTransformation {
    type Output = Result<ParameterTransformation>;

    fn add(self, rhs: ParameterTransformation) -> Self::Output {
        let kind = if self.kind() == rhs.kind() {
            self.kind()
        } else {
            TransformKind::Composite
        };

        match (self.branches(), rhs.branches()) {
            (Branches::PerCondition(left), Branches::PerCondition(right)) => {
                let mut branches = left.clone();
                for (c, t) in right {
                    if branches.contains_key(c) {
                        return Err(TrafoError::DuplicateCondition(c.clone()));
                    }
                    branches.insert(c.clone(), Arc::clone(t));
                }
                Ok(ParameterTransformation::per_condition(kind, branches))
            }
            _ => Err(TrafoError::ConditionMismatch(
                "only per-condition transformations can be joined with '+'".to_string(),
            )),
        }
    }
}
