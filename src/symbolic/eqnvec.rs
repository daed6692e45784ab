//! Ordered equation vectors
//!
//! An [`EquationVector`] maps left-hand names to right-hand expressions. Names
//! are unique; insertion order is kept for display and for the order in which
//! inner parameters are reported.

use crate::symbolic::expression::{Expression, ExpressionError};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Ordered mapping from names to expressions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquationVector {
    equations: IndexMap<String, Expression>,
}

impl EquationVector {
    /// Create an empty equation vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, expression text)` pairs; later names overwrite earlier ones
    ///
    /// ```
    /// use partrafo::symbolic::EquationVector;
    ///
    /// let eqs = EquationVector::parse_pairs(&[("X", "a + b"), ("Y", "a - b")]).unwrap();
    /// assert_eq!(eqs.names(), vec!["X", "Y"]);
    /// ```
    pub fn parse_pairs(pairs: &[(&str, &str)]) -> Result<Self, ExpressionError> {
        let mut eqs = Self::new();
        for (name, text) in pairs {
            eqs.set(name, Expression::parse(text)?);
        }
        Ok(eqs)
    }

    /// Insert or overwrite an equation. Overwriting keeps the original position.
    pub fn set(&mut self, name: &str, expr: Expression) {
        self.equations.insert(name.to_string(), expr);
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.equations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.equations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Left-hand names in order
    pub fn names(&self) -> Vec<&str> {
        self.equations.keys().map(|k| k.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Expression)> {
        self.equations.iter()
    }

    /// Union of right-hand-side symbols in order of first appearance
    pub fn symbols(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for expr in self.equations.values() {
            seen.extend(expr.variables());
        }
        seen.into_iter().collect()
    }

    /// Substitute symbols on every right-hand side simultaneously.
    ///
    /// Returns the rewritten vector together with the targets that did not
    /// occur on any right-hand side.
    pub fn substitute(&self, mapping: &HashMap<String, Expression>) -> (Self, Vec<String>) {
        let unmatched = mapping
            .keys()
            .filter(|target| {
                !self
                    .equations
                    .values()
                    .any(|expr| expr.contains_variable(target))
            })
            .cloned()
            .collect();

        let equations = self
            .equations
            .iter()
            .map(|(name, expr)| (name.clone(), expr.substitute(mapping)))
            .collect();

        (Self { equations }, unmatched)
    }
}

impl fmt::Display for EquationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.equations.keys().map(|k| k.len()).max().unwrap_or(0);
        for (name, expr) in &self.equations {
            writeln!(f, "{:>width$} = {}", name, expr, width = width)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Expression)> for EquationVector {
    fn from_iter<T: IntoIterator<Item = (String, Expression)>>(iter: T) -> Self {
        Self {
            equations: iter.into_iter().collect(),
        }
    }
}
