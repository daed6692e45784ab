//! Trafo data model
//!
//! A [`Trafo`] is one symbolic mapping from outer to inner parameters. A
//! [`TrafoList`] holds one Trafo per experimental condition together with the
//! condition grid it was branched on. [`Trafos`] is either of the two and is
//! what the editing verbs accept and return.
//!
//! Values are persistent. Equation storage is shared through `Arc` and
//! cloned on write, so an edit never changes a previously obtained value.

use crate::conditions::ConditionGrid;
use crate::error::{Result, TrafoError};
use crate::symbolic::{EquationVector, Expression};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the right-hand sides of a Trafo are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EvalMode {
    /// Each inner value is its right-hand side evaluated at the outer values
    #[default]
    Explicit,

    /// Right-hand sides are residuals; inner values are the root
    Implicit,
}

/// One symbolic outer-to-inner mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trafo {
    equations: Arc<EquationVector>,
    #[serde(default)]
    mode: EvalMode,
}

impl Default for Trafo {
    fn default() -> Self {
        Self::new()
    }
}

impl Trafo {
    /// Create an empty explicit Trafo
    pub fn new() -> Self {
        Self {
            equations: Arc::new(EquationVector::new()),
            mode: EvalMode::Explicit,
        }
    }

    pub fn from_equations(equations: EquationVector) -> Self {
        Self {
            equations: Arc::new(equations),
            mode: EvalMode::Explicit,
        }
    }

    /// Same equations, different evaluation mode
    pub fn with_mode(&self, mode: EvalMode) -> Self {
        Self {
            equations: Arc::clone(&self.equations),
            mode,
        }
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn equations(&self) -> &EquationVector {
        &self.equations
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.equations.get(name)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Produced parameter names, in equation order
    pub fn inner_parameters(&self) -> Vec<String> {
        self.equations.names().into_iter().map(String::from).collect()
    }

    /// Parameters the Trafo takes as input.
    ///
    /// In explicit mode every right-hand-side symbol is an input, including a
    /// symbol that shares its name with an inner parameter (`x = 2*x` reads
    /// the outer `x`). In implicit mode inner names are the unknowns of the
    /// residual system and are excluded.
    pub fn outer_parameters(&self) -> Vec<String> {
        let symbols = self.equations.symbols();
        match self.mode {
            EvalMode::Explicit => symbols,
            EvalMode::Implicit => symbols
                .into_iter()
                .filter(|s| !self.equations.contains(s))
                .collect(),
        }
    }

    /// Symbols currently present on the right-hand sides
    pub fn current_symbols(&self) -> Vec<String> {
        self.equations.symbols()
    }

    /// Whether two Trafos share the same equation storage
    pub fn shares_storage(&self, other: &Trafo) -> bool {
        Arc::ptr_eq(&self.equations, &other.equations)
    }

    /// Copy-on-write access to the equations
    pub(crate) fn equations_mut(&mut self) -> &mut EquationVector {
        Arc::make_mut(&mut self.equations)
    }

    pub(crate) fn replace_equations(&self, equations: EquationVector) -> Self {
        Self {
            equations: Arc::new(equations),
            mode: self.mode,
        }
    }
}

impl fmt::Display for Trafo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mode == EvalMode::Implicit {
            writeln!(f, "# implicit: right-hand sides are set to zero")?;
        }
        write!(f, "{}", self.equations)
    }
}

/// One Trafo per condition, keyed by the rows of the attached grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrafoList")]
pub struct TrafoList {
    trafos: IndexMap<String, Trafo>,
    grid: ConditionGrid,
}

/// Unchecked serialized form; deserialization goes through [`TrafoList::new`]
#[derive(Deserialize)]
struct RawTrafoList {
    trafos: IndexMap<String, Trafo>,
    grid: ConditionGrid,
}

impl TryFrom<RawTrafoList> for TrafoList {
    type Error = TrafoError;

    fn try_from(raw: RawTrafoList) -> Result<Self> {
        TrafoList::new(raw.grid, raw.trafos)
    }
}

impl TrafoList {
    /// Build from a grid and one Trafo per grid row, in row order
    pub fn new(grid: ConditionGrid, trafos: IndexMap<String, Trafo>) -> Result<Self> {
        let rows = grid.conditions();
        let keys: Vec<&str> = trafos.keys().map(|k| k.as_str()).collect();
        if rows != keys {
            return Err(TrafoError::ConditionMismatch(format!(
                "trafo conditions {:?} do not match grid rows {:?}",
                keys, rows
            )));
        }
        Ok(Self { trafos, grid })
    }

    pub fn grid(&self) -> &ConditionGrid {
        &self.grid
    }

    /// Condition names in grid order
    pub fn conditions(&self) -> Vec<&str> {
        self.trafos.keys().map(|k| k.as_str()).collect()
    }

    pub fn get(&self, condition: &str) -> Option<&Trafo> {
        self.trafos.get(condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Trafo)> {
        self.trafos.iter()
    }

    pub fn len(&self) -> usize {
        self.trafos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trafos.is_empty()
    }

    /// Union of inner parameters over all conditions
    pub fn inner_parameters(&self) -> Vec<String> {
        union(self.trafos.values().map(Trafo::inner_parameters))
    }

    /// Union of outer parameters over all conditions
    pub fn outer_parameters(&self) -> Vec<String> {
        union(self.trafos.values().map(Trafo::outer_parameters))
    }

    /// Rebuild with one Trafo per condition produced by `f`
    pub(crate) fn try_map<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str, &Trafo) -> Result<Trafo>,
    {
        let mut trafos = IndexMap::with_capacity(self.trafos.len());
        for (condition, trafo) in &self.trafos {
            trafos.insert(condition.clone(), f(condition, trafo)?);
        }
        Ok(Self {
            trafos,
            grid: self.grid.clone(),
        })
    }
}

impl fmt::Display for TrafoList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (condition, trafo) in &self.trafos {
            writeln!(f, "[{}]", condition)?;
            write!(f, "{}", trafo)?;
        }
        Ok(())
    }
}

fn union(lists: impl Iterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = IndexSet::new();
    for list in lists {
        seen.extend(list);
    }
    seen.into_iter().collect()
}

/// A single Trafo or a condition-indexed TrafoList
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trafos {
    Single(Trafo),
    Branched(TrafoList),
}

impl Default for Trafos {
    fn default() -> Self {
        Self::Single(Trafo::new())
    }
}

impl From<Trafo> for Trafos {
    fn from(trafo: Trafo) -> Self {
        Self::Single(trafo)
    }
}

impl From<TrafoList> for Trafos {
    fn from(list: TrafoList) -> Self {
        Self::Branched(list)
    }
}

impl From<EquationVector> for Trafos {
    fn from(equations: EquationVector) -> Self {
        Self::Single(Trafo::from_equations(equations))
    }
}

impl Trafos {
    /// Empty single Trafo, the starting point for `define`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_branched(&self) -> bool {
        matches!(self, Self::Branched(_))
    }

    pub fn as_single(&self) -> Option<&Trafo> {
        match self {
            Self::Single(t) => Some(t),
            Self::Branched(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&TrafoList> {
        match self {
            Self::Single(_) => None,
            Self::Branched(l) => Some(l),
        }
    }

    /// Set the evaluation mode of every contained Trafo
    pub fn with_mode(&self, mode: EvalMode) -> Self {
        match self {
            Self::Single(t) => Self::Single(t.with_mode(mode)),
            Self::Branched(l) => Self::Branched(TrafoList {
                trafos: l
                    .trafos
                    .iter()
                    .map(|(c, t)| (c.clone(), t.with_mode(mode)))
                    .collect(),
                grid: l.grid.clone(),
            }),
        }
    }

    /// Condition names; empty for a single Trafo
    pub fn conditions(&self) -> Vec<&str> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Branched(l) => l.conditions(),
        }
    }

    pub fn inner_parameters(&self) -> Vec<String> {
        match self {
            Self::Single(t) => t.inner_parameters(),
            Self::Branched(l) => l.inner_parameters(),
        }
    }

    pub fn outer_parameters(&self) -> Vec<String> {
        match self {
            Self::Single(t) => t.outer_parameters(),
            Self::Branched(l) => l.outer_parameters(),
        }
    }

    /// Current right-hand-side symbols, per condition for a TrafoList
    pub fn current_symbols(&self, condition: Option<&str>) -> Result<Vec<String>> {
        match (self, condition) {
            (Self::Single(t), None) => Ok(t.current_symbols()),
            (Self::Single(_), Some(c)) => Err(TrafoError::ConditionMismatch(format!(
                "single trafo has no condition '{}'",
                c
            ))),
            (Self::Branched(l), Some(c)) => l
                .get(c)
                .map(Trafo::current_symbols)
                .ok_or_else(|| TrafoError::ConditionMismatch(format!("unknown condition '{}'", c))),
            (Self::Branched(l), None) => Ok(union(l.trafos.values().map(Trafo::current_symbols))),
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for Trafos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(t) => write!(f, "{}", t),
            Self::Branched(l) => write!(f, "{}", l),
        }
    }
}
