//! Editing verbs
//!
//! `define` appends equations, `insert` rewrites symbols on the right-hand
//! sides and `branch` widens a single Trafo to one Trafo per condition. All
//! three return new values and leave their input untouched.

use crate::conditions::{ConditionGrid, Predicate};
use crate::error::{Result, TrafoError};
use crate::symbolic::{Resolved, Template};
use crate::trafo::trafo::{Trafo, TrafoList, Trafos};
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

/// A substitution argument of `define` or `insert`
#[derive(Debug, Clone, PartialEq)]
pub enum SubstArg {
    /// One name or expression, used at every expansion position
    Value(String),

    /// One name or expression per expansion position
    Values(Vec<String>),

    /// Grid column, resolved per condition
    Column(String),

    /// Symbols on the right-hand sides of the Trafo being edited, except the
    /// listed ones
    CurrentSymbols { except: Vec<String> },
}

/// Named substitution arguments of one verb call
///
/// ```
/// use partrafo::trafo::Substitutions;
///
/// let subs = Substitutions::new()
///     .values("x", ["k1", "k2"])
///     .column("cond", "drug");
/// assert_eq!(subs.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions {
    args: IndexMap<String, SubstArg>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, placeholder: &str, arg: SubstArg) -> Self {
        self.args.insert(placeholder.to_string(), arg);
        self
    }

    pub fn value(self, placeholder: &str, value: impl Into<String>) -> Self {
        self.with(placeholder, SubstArg::Value(value.into()))
    }

    pub fn values<S: Into<String>>(
        self,
        placeholder: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with(placeholder, SubstArg::Values(values))
    }

    pub fn column(self, placeholder: &str, column: &str) -> Self {
        self.with(placeholder, SubstArg::Column(column.to_string()))
    }

    pub fn current_symbols(self, placeholder: &str, except: &[&str]) -> Self {
        let except = except.iter().map(|s| s.to_string()).collect();
        self.with(placeholder, SubstArg::CurrentSymbols { except })
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Resolve every argument against the Trafo being edited and, inside a
    /// TrafoList, the grid row of its condition
    fn resolve(
        &self,
        trafo: &Trafo,
        row: Option<(&ConditionGrid, &str)>,
    ) -> Result<IndexMap<String, Resolved>> {
        let mut resolved = IndexMap::with_capacity(self.args.len());
        for (placeholder, arg) in &self.args {
            let value = match arg {
                SubstArg::Value(v) => Resolved::Scalar(v.clone()),
                SubstArg::Values(vs) => Resolved::Vector(vs.clone()),
                SubstArg::Column(column) => {
                    let (grid, condition) = row.ok_or_else(|| {
                        TrafoError::UnknownSymbol(format!(
                            "column '{}' referenced outside a branched trafo",
                            column
                        ))
                    })?;
                    Resolved::Scalar(grid.value(condition, column)?.substitution_text())
                }
                SubstArg::CurrentSymbols { except } => {
                    let symbols = trafo.current_symbols();
                    if let Some(missing) = except.iter().find(|e| !symbols.contains(e)) {
                        return Err(TrafoError::UnknownSymbol(format!(
                            "'{}' is not a current symbol",
                            missing
                        )));
                    }
                    Resolved::Vector(
                        symbols
                            .into_iter()
                            .filter(|s| !except.contains(s))
                            .collect(),
                    )
                }
            };
            resolved.insert(placeholder.clone(), value);
        }
        Ok(resolved)
    }
}

/// Append (or overwrite by name) the expanded equations of `template`
pub fn define(base: &Trafos, template: &str, subs: &Substitutions) -> Result<Trafos> {
    let template = Template::parse(template)?;
    match base {
        Trafos::Single(trafo) => Ok(Trafos::Single(define_one(trafo, &template, subs, None)?)),
        Trafos::Branched(list) => {
            let grid = list.grid();
            list.try_map(|condition, trafo| {
                define_one(trafo, &template, subs, Some((grid, condition)))
            })
            .map(Trafos::Branched)
        }
    }
}

fn define_one(
    trafo: &Trafo,
    template: &Template,
    subs: &Substitutions,
    row: Option<(&ConditionGrid, &str)>,
) -> Result<Trafo> {
    let pairs = template.expand(&subs.resolve(trafo, row)?)?;
    let mut out = trafo.clone();
    if !pairs.is_empty() {
        let equations = out.equations_mut();
        for (name, expr) in pairs {
            equations.set(&name, expr);
        }
    }
    Ok(out)
}

/// Substitute the expanded `target -> replacement` pairs of `template` on
/// every right-hand side.
///
/// Inside a TrafoList, rows for which `condition` evaluates false keep their
/// Trafo unchanged. Targets that occur nowhere are skipped.
pub fn insert(
    base: &Trafos,
    template: &str,
    subs: &Substitutions,
    condition: Option<&Predicate>,
) -> Result<Trafos> {
    let template = Template::parse(template)?;
    match base {
        Trafos::Single(trafo) => {
            if matches!(condition, Some(p) if *p != Predicate::Always) {
                return Err(TrafoError::ConditionMismatch(
                    "a conditioned insert needs a branched trafo".to_string(),
                ));
            }
            Ok(Trafos::Single(insert_one(trafo, &template, subs, None)?))
        }
        Trafos::Branched(list) => {
            let grid = list.grid();
            list.try_map(|name, trafo| {
                if let Some(predicate) = condition {
                    if !predicate.evaluate(grid, name)? {
                        return Ok(trafo.clone());
                    }
                }
                insert_one(trafo, &template, subs, Some((grid, name)))
            })
            .map(Trafos::Branched)
        }
    }
}

fn insert_one(
    trafo: &Trafo,
    template: &Template,
    subs: &Substitutions,
    row: Option<(&ConditionGrid, &str)>,
) -> Result<Trafo> {
    let pairs = template.expand(&subs.resolve(trafo, row)?)?;

    // duplicate targets: the last pair wins
    let mapping: HashMap<_, _> = pairs.into_iter().collect();
    if mapping.is_empty() {
        return Ok(trafo.clone());
    }

    let (equations, unmatched) = trafo.equations().substitute(&mapping);
    for target in &unmatched {
        debug!(
            "insert: '{}' does not occur{}, nothing replaced",
            target,
            row.map(|(_, c)| format!(" in condition '{}'", c))
                .unwrap_or_default()
        );
    }
    if unmatched.len() == mapping.len() {
        return Ok(trafo.clone());
    }
    Ok(trafo.replace_equations(equations))
}

/// Widen a single Trafo to one shared copy per grid row
pub fn branch(base: &Trafos, grid: &ConditionGrid) -> Result<Trafos> {
    match base {
        Trafos::Branched(_) => Err(TrafoError::AlreadyBranched),
        Trafos::Single(trafo) => {
            let trafos = grid
                .conditions()
                .into_iter()
                .map(|c| (c.to_string(), trafo.clone()))
                .collect();
            debug!("branch: {} conditions", grid.len());
            Ok(Trafos::Branched(TrafoList::new(grid.clone(), trafos)?))
        }
    }
}

impl Trafos {
    /// Method form of [`define`]
    pub fn define(&self, template: &str, subs: &Substitutions) -> Result<Trafos> {
        define(self, template, subs)
    }

    /// Method form of [`insert`] without a row predicate
    pub fn insert(&self, template: &str, subs: &Substitutions) -> Result<Trafos> {
        insert(self, template, subs, None)
    }

    /// Method form of [`insert`] restricted to rows matching `condition`
    pub fn insert_where(
        &self,
        template: &str,
        subs: &Substitutions,
        condition: &Predicate,
    ) -> Result<Trafos> {
        insert(self, template, subs, Some(condition))
    }

    /// Method form of [`branch`]
    pub fn branch(&self, grid: &ConditionGrid) -> Result<Trafos> {
        branch(self, grid)
    }
}
