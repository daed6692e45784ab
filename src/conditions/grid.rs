//! Condition grids
//!
//! A [`ConditionGrid`] is a typed table with one row per experimental
//! condition. Row names are the condition identifiers reused as keys of
//! condition-indexed collections.

use crate::error::{Result, TrafoError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of a condition grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Indicator value
    Bool(bool),

    /// Numeric covariate
    Number(f64),

    /// Categorical covariate, or a name/expression to splice into equations
    Text(String),
}

impl CellValue {
    /// Text used when the cell is substituted into an equation
    pub fn substitution_text(&self) -> String {
        match self {
            Self::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Numeric view of the cell; numeric text is accepted
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Loose equality: same-kind cells compare by value, mixed kinds by text
    pub fn matches(&self, other: &CellValue) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (a, b) => a.to_string() == b.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Table of per-condition covariates and indicators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGrid {
    columns: Vec<String>,
    rows: IndexMap<String, Vec<CellValue>>,
}

impl ConditionGrid {
    /// Create an empty grid with the given column names
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: IndexMap::new(),
        }
    }

    /// Append a row.
    ///
    /// Without an explicit name the condition is named by joining the cell
    /// values with `_`. Duplicate condition names are rejected.
    pub fn add_row(&mut self, name: Option<&str>, values: Vec<CellValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(TrafoError::DimensionMismatch(format!(
                "Expected {} cells per row, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("_"),
        };

        if self.rows.contains_key(&name) {
            return Err(TrafoError::DuplicateCondition(name));
        }
        self.rows.insert(name, values);
        Ok(())
    }

    /// Builder-style [`add_row`](Self::add_row)
    ///
    /// ```
    /// use partrafo::conditions::ConditionGrid;
    ///
    /// let grid = ConditionGrid::new(&["drug", "dose"])
    ///     .with_row(None, vec!["A".into(), 1.0.into()])
    ///     .unwrap()
    ///     .with_row(Some("control"), vec!["none".into(), 0.0.into()])
    ///     .unwrap();
    /// assert_eq!(grid.conditions(), vec!["A_1", "control"]);
    /// ```
    pub fn with_row(mut self, name: Option<&str>, values: Vec<CellValue>) -> Result<Self> {
        self.add_row(name, values)?;
        Ok(self)
    }

    /// Condition identifiers in row order
    pub fn conditions(&self) -> Vec<&str> {
        self.rows.keys().map(|k| k.as_str()).collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn contains(&self, condition: &str) -> bool {
        self.rows.contains_key(condition)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by condition and column name
    pub fn value(&self, condition: &str, column: &str) -> Result<&CellValue> {
        let row = self
            .rows
            .get(condition)
            .ok_or_else(|| TrafoError::UnknownSymbol(format!("condition '{}'", condition)))?;
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| TrafoError::UnknownSymbol(format!("grid column '{}'", column)))?;
        Ok(&row[index])
    }

    /// Serialize the grid to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a grid from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ConditionGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "condition\t{}", self.columns.join("\t"))?;
        for (name, row) in &self.rows {
            let cells = row.iter().map(|c| c.to_string()).collect::<Vec<_>>();
            writeln!(f, "{}\t{}", name, cells.join("\t"))?;
        }
        Ok(())
    }
}
