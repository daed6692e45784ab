//! Row predicates
//!
//! A [`Predicate`] selects rows of a [`ConditionGrid`]. It is evaluated
//! against one named row at a time and gates conditioned edits.

use crate::conditions::grid::{CellValue, ConditionGrid};
use crate::error::{Result, TrafoError};
use serde::{Deserialize, Serialize};

/// Boolean expression over the columns of a condition grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every row
    Always,

    /// Column equals value
    Eq(String, CellValue),

    /// Column differs from value
    Ne(String, CellValue),

    /// Column is numerically less than value
    Lt(String, f64),

    /// Column is numerically less than or equal to value
    Le(String, f64),

    /// Column is numerically greater than value
    Gt(String, f64),

    /// Column is numerically greater than or equal to value
    Ge(String, f64),

    /// Indicator column is set
    IsTrue(String),

    /// Column equals one of the values
    In(String, Vec<CellValue>),

    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<CellValue>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    pub fn ne(column: &str, value: impl Into<CellValue>) -> Self {
        Self::Ne(column.to_string(), value.into())
    }

    pub fn lt(column: &str, value: f64) -> Self {
        Self::Lt(column.to_string(), value)
    }

    pub fn le(column: &str, value: f64) -> Self {
        Self::Le(column.to_string(), value)
    }

    pub fn gt(column: &str, value: f64) -> Self {
        Self::Gt(column.to_string(), value)
    }

    pub fn ge(column: &str, value: f64) -> Self {
        Self::Ge(column.to_string(), value)
    }

    pub fn is_true(column: &str) -> Self {
        Self::IsTrue(column.to_string())
    }

    pub fn one_of<V: Into<CellValue>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::All(mut terms) => {
                terms.push(other);
                Self::All(terms)
            }
            first => Self::All(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Any(mut terms) => {
                terms.push(other);
                Self::Any(terms)
            }
            first => Self::Any(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate the predicate on the grid row named `condition`
    pub fn evaluate(&self, grid: &ConditionGrid, condition: &str) -> Result<bool> {
        match self {
            Self::Always => Ok(true),
            Self::Eq(column, value) => Ok(grid.value(condition, column)?.matches(value)),
            Self::Ne(column, value) => Ok(!grid.value(condition, column)?.matches(value)),
            Self::Lt(column, value) => Ok(numeric(grid, condition, column)? < *value),
            Self::Le(column, value) => Ok(numeric(grid, condition, column)? <= *value),
            Self::Gt(column, value) => Ok(numeric(grid, condition, column)? > *value),
            Self::Ge(column, value) => Ok(numeric(grid, condition, column)? >= *value),
            Self::IsTrue(column) => match grid.value(condition, column)? {
                CellValue::Bool(b) => Ok(*b),
                CellValue::Number(n) => Ok(*n != 0.0),
                CellValue::Text(s) => Err(TrafoError::InvalidInput(format!(
                    "column '{}' holds text '{}', not an indicator",
                    column, s
                ))),
            },
            Self::In(column, values) => {
                let cell = grid.value(condition, column)?;
                Ok(values.iter().any(|v| cell.matches(v)))
            }
            Self::Not(inner) => Ok(!inner.evaluate(grid, condition)?),
            Self::All(terms) => {
                for term in terms {
                    if !term.evaluate(grid, condition)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(terms) => {
                for term in terms {
                    if term.evaluate(grid, condition)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn numeric(grid: &ConditionGrid, condition: &str, column: &str) -> Result<f64> {
    let cell = grid.value(condition, column)?;
    cell.as_number().ok_or_else(|| {
        TrafoError::InvalidInput(format!(
            "column '{}' holds '{}', which cannot be compared to a number",
            column, cell
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ConditionGrid {
        ConditionGrid::new(&["drug", "dose", "treated"])
            .with_row(Some("c1"), vec!["A".into(), 0.0.into(), false.into()])
            .unwrap()
            .with_row(Some("c2"), vec!["A".into(), 5.0.into(), true.into()])
            .unwrap()
            .with_row(Some("c3"), vec!["B".into(), 10.0.into(), true.into()])
            .unwrap()
    }

    fn selected(p: &Predicate) -> Vec<String> {
        let grid = grid();
        grid.conditions()
            .into_iter()
            .filter(|c| p.evaluate(&grid, c).unwrap())
            .map(String::from)
            .collect()
    }

    #[test]
    fn equality_and_membership() {
        assert_eq!(selected(&Predicate::eq("drug", "A")), vec!["c1", "c2"]);
        assert_eq!(selected(&Predicate::ne("drug", "A")), vec!["c3"]);
        assert_eq!(selected(&Predicate::one_of("dose", [0.0, 10.0])), vec!["c1", "c3"]);
    }

    #[test]
    fn numeric_comparisons() {
        assert_eq!(selected(&Predicate::gt("dose", 0.0)), vec!["c2", "c3"]);
        assert_eq!(selected(&Predicate::le("dose", 5.0)), vec!["c1", "c2"]);
    }

    #[test]
    fn combinators() {
        let p = Predicate::is_true("treated").and(Predicate::eq("drug", "A"));
        assert_eq!(selected(&p), vec!["c2"]);
        let p = Predicate::eq("drug", "B").or(Predicate::lt("dose", 1.0));
        assert_eq!(selected(&p), vec!["c1", "c3"]);
        assert_eq!(selected(&Predicate::is_true("treated").not()), vec!["c1"]);
        assert_eq!(selected(&Predicate::Always).len(), 3);
    }

    #[test]
    fn errors() {
        let grid = grid();
        assert!(matches!(
            Predicate::eq("volume", 1.0).evaluate(&grid, "c1"),
            Err(TrafoError::UnknownSymbol(_))
        ));
        assert!(matches!(
            Predicate::gt("drug", 1.0).evaluate(&grid, "c1"),
            Err(TrafoError::InvalidInput(_))
        ));
    }
}
