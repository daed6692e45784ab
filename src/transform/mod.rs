//! # Parameter transformation functions
//!
//! [`P`] compiles a [`Trafos`] value into a numeric
//! [`ParameterTransformation`]: one condition-agnostic function for a single
//! Trafo, one function per condition for a TrafoList.
//!
//! ```
//! use partrafo::symbolic::EquationVector;
//! use partrafo::trafo::{EvalMode, Trafos};
//! use partrafo::transform::{ParVec, P};
//!
//! let eqs = EquationVector::parse_pairs(&[("X", "a + b"), ("Y", "a - b")]).unwrap();
//! let p = P(&Trafos::from(eqs), EvalMode::Explicit).unwrap();
//! let out = p.apply(&ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)])).unwrap();
//! assert_eq!(out.get("X"), Some(5.0));
//! assert_eq!(out.get("Y"), Some(1.0));
//! ```

pub mod compose;
pub mod explicit;
pub mod implicit;
pub mod parvec;

pub use explicit::ExplicitTransform;
pub use implicit::{ImplicitOptions, ImplicitTransform};
pub use parvec::{Deriv, ParVec};

use crate::conditions::ConditionMap;
use crate::error::{Result, TrafoError};
use crate::trafo::{EvalMode, Trafo, Trafos};
use crate::utils::parallel::try_par_map;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A compiled outer-to-inner mapping
///
/// Implementations are pure; concurrent calls need no locking.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Evaluate at `pars`. The result carries the Jacobian with respect to
    /// the symbols `pars` was derived from.
    fn apply(&self, pars: &ParVec) -> Result<ParVec>;

    fn inner_parameters(&self) -> Vec<String>;

    fn outer_parameters(&self) -> Vec<String>;
}

/// Evaluation procedure of a compiled function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    Explicit,
    Implicit,

    /// Built by composition, union or from Trafos of mixed modes
    Composite,
}

impl From<EvalMode> for TransformKind {
    fn from(mode: EvalMode) -> Self {
        match mode {
            EvalMode::Explicit => Self::Explicit,
            EvalMode::Implicit => Self::Implicit,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Branches {
    Global(Arc<dyn Transform>),
    PerCondition(IndexMap<String, Arc<dyn Transform>>),
}

/// Numeric parameter transformation, condition-agnostic or per condition
#[derive(Debug, Clone)]
pub struct ParameterTransformation {
    kind: TransformKind,
    branches: Branches,
}

/// Compile `trafos` with the given evaluation method
#[allow(non_snake_case)]
pub fn P(trafos: &Trafos, method: EvalMode) -> Result<ParameterTransformation> {
    compile(trafos, Some(method), &ImplicitOptions::default())
}

/// Compile `trafos`.
///
/// `method` overrides the evaluation mode stored on each Trafo; `options`
/// configures implicit solves.
pub fn compile(
    trafos: &Trafos,
    method: Option<EvalMode>,
    options: &ImplicitOptions,
) -> Result<ParameterTransformation> {
    let build = |trafo: &Trafo| -> (EvalMode, Arc<dyn Transform>) {
        let mode = method.unwrap_or(trafo.mode());
        let transform: Arc<dyn Transform> = match mode {
            EvalMode::Explicit => Arc::new(ExplicitTransform::new(trafo.equations())),
            EvalMode::Implicit => {
                Arc::new(ImplicitTransform::new(trafo.equations(), options.clone()))
            }
        };
        (mode, transform)
    };

    match trafos {
        Trafos::Single(trafo) => {
            let (mode, transform) = build(trafo);
            Ok(ParameterTransformation::global(mode.into(), transform))
        }
        Trafos::Branched(list) => {
            let mut modes = IndexSet::new();
            let mut branches = IndexMap::with_capacity(list.len());
            for (condition, trafo) in list.iter() {
                let (mode, transform) = build(trafo);
                modes.insert(mode);
                branches.insert(condition.clone(), transform);
            }
            let kind = match modes.len() {
                1 => modes[0].into(),
                0 => method.unwrap_or_default().into(),
                _ => TransformKind::Composite,
            };
            debug!("compiled {} conditions as {:?}", branches.len(), kind);
            Ok(ParameterTransformation::per_condition(kind, branches))
        }
    }
}

impl Trafos {
    /// Compile using the evaluation mode stored on each Trafo
    pub fn compile(&self) -> Result<ParameterTransformation> {
        compile(self, None, &ImplicitOptions::default())
    }
}

impl ParameterTransformation {
    /// Condition-agnostic function
    pub fn global(kind: TransformKind, transform: Arc<dyn Transform>) -> Self {
        Self {
            kind,
            branches: Branches::Global(transform),
        }
    }

    /// One function per condition
    pub fn per_condition(
        kind: TransformKind,
        branches: IndexMap<String, Arc<dyn Transform>>,
    ) -> Self {
        Self {
            kind,
            branches: Branches::PerCondition(branches),
        }
    }

    pub(crate) fn branches(&self) -> &Branches {
        &self.branches
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn is_global(&self) -> bool {
        matches!(self.branches, Branches::Global(_))
    }

    /// Condition names; `None` for a condition-agnostic function
    pub fn conditions(&self) -> Option<Vec<&str>> {
        match &self.branches {
            Branches::Global(_) => None,
            Branches::PerCondition(map) => Some(map.keys().map(|k| k.as_str()).collect()),
        }
    }

    pub fn inner_parameters(&self) -> Vec<String> {
        self.collect_names(|t| t.inner_parameters())
    }

    pub fn outer_parameters(&self) -> Vec<String> {
        self.collect_names(|t| t.outer_parameters())
    }

    fn collect_names(&self, f: impl Fn(&dyn Transform) -> Vec<String>) -> Vec<String> {
        match &self.branches {
            Branches::Global(t) => f(t.as_ref()),
            Branches::PerCondition(map) => {
                let mut seen = IndexSet::new();
                for t in map.values() {
                    seen.extend(f(t.as_ref()));
                }
                seen.into_iter().collect()
            }
        }
    }

    /// The function that serves `condition`; a global function serves every
    /// condition
    pub fn transform_for(&self, condition: Option<&str>) -> Result<Arc<dyn Transform>> {
        match (&self.branches, condition) {
            (Branches::Global(t), _) => Ok(Arc::clone(t)),
            (Branches::PerCondition(map), Some(c)) => map.get(c).cloned().ok_or_else(|| {
                TrafoError::ConditionMismatch(format!("unknown condition '{}'", c))
            }),
            (Branches::PerCondition(_), None) => Err(TrafoError::ConditionMismatch(
                "a condition is required for a per-condition transformation".to_string(),
            )),
        }
    }

    /// Evaluate a condition-agnostic function
    pub fn apply(&self, pars: &ParVec) -> Result<ParVec> {
        self.transform_for(None)?.apply(pars)
    }

    /// Evaluate per condition.
    ///
    /// `conditions` selects a subset; `None` means every condition of the
    /// function. A global function needs an explicit list and is broadcast
    /// to it.
    pub fn call(
        &self,
        pars: &ParVec,
        conditions: Option<&[String]>,
    ) -> Result<ConditionMap<ParVec>> {
        self.requested(conditions)?
            .into_iter()
            .map(|c| {
                let out = self.transform_for(Some(&c))?.apply(pars)?;
                Ok((c, out))
            })
            .collect()
    }

    /// [`call`](Self::call) with conditions evaluated in parallel
    pub fn call_parallel(
        &self,
        pars: &ParVec,
        conditions: Option<&[String]>,
    ) -> Result<ConditionMap<ParVec>> {
        let requested = self.requested(conditions)?;
        let outputs = try_par_map(&requested, |c| self.transform_for(Some(c))?.apply(pars))?;
        Ok(requested.into_iter().zip(outputs).collect())
    }

    fn requested(&self, conditions: Option<&[String]>) -> Result<Vec<String>> {
        match (&self.branches, conditions) {
            (Branches::Global(_), None) => Err(TrafoError::ConditionMismatch(
                "a condition-agnostic transformation needs explicit conditions".to_string(),
            )),
            (Branches::Global(_), Some(list)) => Ok(list.to_vec()),
            (Branches::PerCondition(map), None) => Ok(map.keys().cloned().collect()),
            (Branches::PerCondition(map), Some(list)) => {
                if let Some(unknown) = list.iter().find(|c| !map.contains_key(*c)) {
                    return Err(TrafoError::ConditionMismatch(format!(
                        "unknown condition '{}'",
                        unknown
                    )));
                }
                Ok(list.to_vec())
            }
        }
    }
}
