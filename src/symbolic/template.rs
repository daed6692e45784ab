//! Equation templates
//!
//! A template is the text `"<lhs> ~ <rhs>"`. Placeholders are symbols of the
//! template that are named by a substitution argument. Expansion zips the
//! argument vectors position by position and yields one concrete
//! `(name, expression)` pair per position.

use crate::error::{Result, TrafoError};
use crate::symbolic::expression::{is_identifier, Expression};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A substitution argument after per-condition resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// One value, repeated at every position
    Scalar(String),

    /// One value per position
    Vector(Vec<String>),
}

/// A parsed `lhs ~ rhs` template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    lhs: String,
    rhs: Expression,
}

impl Template {
    /// Parse template text of the form `"lhs ~ rhs"`
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split('~');
        let (Some(lhs), Some(rhs), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TrafoError::InvalidTemplate(format!(
                "expected exactly one '~' in '{}'",
                text
            )));
        };

        let lhs = lhs.trim();
        if !is_identifier(lhs) {
            return Err(TrafoError::InvalidTemplate(format!(
                "left-hand side '{}' is not a symbol",
                lhs
            )));
        }

        Ok(Self {
            lhs: lhs.to_string(),
            rhs: Expression::parse(rhs)?,
        })
    }

    pub fn lhs(&self) -> &str {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }

    /// Expand the template against resolved arguments.
    ///
    /// Vector arguments must all have the same length; scalars broadcast. With
    /// no vector argument the template expands to exactly one pair.
    pub fn expand(&self, args: &IndexMap<String, Resolved>) -> Result<Vec<(String, Expression)>> {
        let positions = expansion_length(args)?;

        let mut parsed: HashMap<&str, Expression> = HashMap::new();
        for value in args.values().flat_map(|arg| match arg {
            Resolved::Scalar(v) => std::slice::from_ref(v).iter(),
            Resolved::Vector(vs) => vs.iter(),
        }) {
            if !parsed.contains_key(value.as_str()) {
                parsed.insert(value.as_str(), Expression::parse(value)?);
            }
        }

        let rhs_symbols = self.rhs.variables();
        let mut pairs = Vec::with_capacity(positions);
        for i in 0..positions {
            let values: HashMap<&str, &str> = args
                .iter()
                .map(|(placeholder, arg)| {
                    let value = match arg {
                        Resolved::Scalar(v) => v.as_str(),
                        Resolved::Vector(vs) => vs[i].as_str(),
                    };
                    (placeholder.as_str(), value)
                })
                .collect();

            let name = match rename(&self.lhs, &values, &parsed)? {
                Some(expr) => match expr.as_symbol() {
                    Some(symbol) => symbol.to_string(),
                    None => {
                        return Err(TrafoError::InvalidTemplate(format!(
                            "left-hand side '{}' expands to '{}', which is not a symbol",
                            self.lhs, expr
                        )))
                    }
                },
                None => self.lhs.clone(),
            };

            let mut mapping = HashMap::new();
            for symbol in &rhs_symbols {
                if let Some(expr) = rename(symbol, &values, &parsed)? {
                    mapping.insert(symbol.clone(), expr);
                }
            }

            pairs.push((name, self.rhs.substitute(&mapping)));
        }

        Ok(pairs)
    }
}

fn expansion_length(args: &IndexMap<String, Resolved>) -> Result<usize> {
    let mut length: Option<(usize, &str)> = None;
    for (placeholder, arg) in args {
        let Resolved::Vector(values) = arg else {
            continue;
        };
        match length {
            None => length = Some((values.len(), placeholder.as_str())),
            Some((expected, _)) if expected != values.len() => {
                return Err(TrafoError::TemplateLengthMismatch {
                    placeholder: placeholder.clone(),
                    expected,
                    found: values.len(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(length.map_or(1, |(n, _)| n))
}

fn is_token(text: &str) -> bool {
    is_identifier(text) || (!text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Rewrite one template symbol.
///
/// A symbol equal to a placeholder becomes the placeholder's expression. A
/// symbol with a placeholder as one of its `_`-separated segments has that
/// segment replaced by the value text.
fn rename(
    symbol: &str,
    values: &HashMap<&str, &str>,
    parsed: &HashMap<&str, Expression>,
) -> Result<Option<Expression>> {
    if let Some(value) = values.get(symbol) {
        return Ok(parsed.get(value).cloned());
    }

    if !symbol.contains('_') {
        return Ok(None);
    }

    let mut changed = false;
    let mut segments = Vec::new();
    for segment in symbol.split('_') {
        match values.get(segment) {
            Some(value) if !segment.is_empty() => {
                if !is_token(value) {
                    return Err(TrafoError::InvalidTemplate(format!(
                        "cannot splice '{}' into symbol '{}'",
                        value, symbol
                    )));
                }
                segments.push(*value);
                changed = true;
            }
            _ => segments.push(segment),
        }
    }

    if !changed {
        return Ok(None);
    }

    let name = segments.join("_");
    if !is_identifier(&name) {
        return Err(TrafoError::InvalidTemplate(format!(
            "symbol '{}' expands to invalid name '{}'",
            symbol, name
        )));
    }
    Ok(Some(Expression::Variable(name)))
}
