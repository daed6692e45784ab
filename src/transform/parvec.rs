//! Parameter vectors with attached derivatives
//!
//! A [`ParVec`] is an ordered `name -> value` binding. Values produced by a
//! transformation carry a [`Deriv`]: the Jacobian of the produced values with
//! respect to the symbols the caller passed in.

use crate::error::{Result, TrafoError};
use crate::symbolic::{EvaluationContext, ExpressionError};
use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use std::fmt;

/// Jacobian with named rows (produced values) and columns (input symbols)
#[derive(Debug, Clone, PartialEq)]
pub struct Deriv {
    rows: Vec<String>,
    cols: Vec<String>,
    matrix: Array2<f64>,
}

impl Deriv {
    pub fn new(rows: Vec<String>, cols: Vec<String>, matrix: Array2<f64>) -> Result<Self> {
        if matrix.dim() != (rows.len(), cols.len()) {
            return Err(TrafoError::DimensionMismatch(format!(
                "Jacobian is {:?}, expected ({}, {})",
                matrix.dim(),
                rows.len(),
                cols.len()
            )));
        }
        Ok(Self { rows, cols, matrix })
    }

    /// `d name / d name` for every listed name
    pub fn identity(names: &[String]) -> Self {
        Self {
            rows: names.to_vec(),
            cols: names.to_vec(),
            matrix: Array2::eye(names.len()),
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Single entry `d row / d col`
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.cols.iter().position(|c| c == col)?;
        Some(self.matrix[[i, j]])
    }

    /// Chain rule: `self` is `d out / d mid`, `inner` is `d mid / d in`.
    ///
    /// Mid symbols that are not rows of `inner` are constants with respect to
    /// the inputs and contribute nothing.
    pub fn chain(&self, inner: &Deriv) -> Deriv {
        let mut mid = Array2::zeros((self.cols.len(), inner.cols.len()));
        for (j, name) in self.cols.iter().enumerate() {
            if let Some(k) = inner.rows.iter().position(|r| r == name) {
                mid.row_mut(j).assign(&inner.matrix.row(k));
            }
        }
        Deriv {
            rows: self.rows.clone(),
            cols: inner.cols.clone(),
            matrix: self.matrix.dot(&mid),
        }
    }

    /// Rows for `names` in that order; absent names give zero rows
    pub fn select_rows(&self, names: &[String]) -> Array2<f64> {
        let mut out = Array2::zeros((names.len(), self.cols.len()));
        for (i, name) in names.iter().enumerate() {
            if let Some(k) = self.rows.iter().position(|r| r == name) {
                out.row_mut(i).assign(&self.matrix.row(k));
            }
        }
        out
    }
}

/// Named parameter values with an optional Jacobian
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParVec {
    values: IndexMap<String, f64>,
    deriv: Option<Deriv>,
}

impl ParVec {
    pub fn new() -> Self {
        Self::default()
    }

    /// ```
    /// use partrafo::transform::ParVec;
    ///
    /// let pars = ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)]);
    /// assert_eq!(pars.get("b"), Some(2.0));
    /// assert!(pars.deriv().is_none());
    /// ```
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    pub fn with_deriv(mut self, deriv: Deriv) -> Self {
        self.deriv = Some(deriv);
        self
    }

    pub fn without_deriv(&self) -> Self {
        Self {
            values: self.values.clone(),
            deriv: None,
        }
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.values.iter()
    }

    pub fn values(&self) -> &IndexMap<String, f64> {
        &self.values
    }

    pub fn deriv(&self) -> Option<&Deriv> {
        self.deriv.as_ref()
    }

    /// Values of `names` in that order
    pub fn to_array(&self, names: &[String]) -> Result<Array1<f64>> {
        names
            .iter()
            .map(|n| {
                self.get(n)
                    .ok_or_else(|| TrafoError::UnknownSymbol(format!("parameter '{}'", n)))
            })
            .collect()
    }

    /// Same names, new values
    pub fn with_values(&self, values: &Array1<f64>) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(TrafoError::DimensionMismatch(format!(
                "Expected {} values, got {}",
                self.values.len(),
                values.len()
            )));
        }
        Ok(self
            .values
            .keys()
            .cloned()
            .zip(values.iter().copied())
            .collect())
    }

    /// Express a Jacobian taken w.r.t. this vector's symbols in terms of the
    /// symbols this vector itself was derived from
    pub(crate) fn lift(&self, local: Deriv) -> Deriv {
        match &self.deriv {
            Some(d) => local.chain(d),
            None => local.chain(&Deriv::identity(&self.names())),
        }
    }

    /// Error unless every listed symbol is bound
    pub(crate) fn require(&self, names: &[String]) -> Result<()> {
        match names.iter().find(|n| !self.contains(n)) {
            Some(missing) => Err(TrafoError::UnknownSymbol(format!(
                "outer parameter '{}' is not bound",
                missing
            ))),
            None => Ok(()),
        }
    }
}

impl FromIterator<(String, f64)> for ParVec {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
            deriv: None,
        }
    }
}

impl EvaluationContext for ParVec {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        self.values.get_variable(name)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn variable_names(&self) -> Vec<String> {
        self.names()
    }
}

impl fmt::Display for ParVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.values.keys().map(|k| k.len()).max().unwrap_or(0);
        for (name, value) in &self.values {
            writeln!(f, "{:>width$} = {}", name, value, width = width)?;
        }
        Ok(())
    }
}
