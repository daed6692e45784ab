//! Condition-indexed collections
//!
//! [`ConditionMap`] is the ordered `condition -> value` container used for
//! per-condition results, data and predictions. `+` forms the union of two
//! maps and rejects shared conditions.

use crate::error::{Result, TrafoError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Ordered mapping from condition names to values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionMap<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for ConditionMap<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T> ConditionMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for that condition
    pub fn insert(&mut self, condition: &str, value: T) -> Option<T> {
        self.entries.insert(condition.to_string(), value)
    }

    pub fn get(&self, condition: &str) -> Option<&T> {
        self.entries.get(condition)
    }

    pub fn contains(&self, condition: &str) -> bool {
        self.entries.contains_key(condition)
    }

    /// Condition names in order
    pub fn conditions(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Union of two maps; a condition present in both is an error
    pub fn union(mut self, other: ConditionMap<T>) -> Result<Self> {
        for (condition, value) in other.entries {
            if self.entries.contains_key(&condition) {
                return Err(TrafoError::DuplicateCondition(condition));
            }
            self.entries.insert(condition, value);
        }
        Ok(self)
    }

    /// Transform every value, keeping the condition order
    pub fn map<U, F>(self, mut f: F) -> ConditionMap<U>
    where
        F: FnMut(&str, T) -> U,
    {
        ConditionMap {
            entries: self
                .entries
                .into_iter()
                .map(|(k, v)| {
                    let u = f(&k, v);
                    (k, u)
                })
                .collect(),
        }
    }

    /// Fallible [`map`](Self::map); stops at the first error
    pub fn try_map<U, F>(self, mut f: F) -> Result<ConditionMap<U>>
    where
        F: FnMut(&str, T) -> Result<U>,
    {
        let mut entries = IndexMap::with_capacity(self.entries.len());
        for (k, v) in self.entries {
            let u = f(&k, v)?;
            entries.insert(k, u);
        }
        Ok(ConditionMap { entries })
    }
}

impl<T: Clone> ConditionMap<T> {
    /// Restrict the map to the listed conditions, in the listed order
    pub fn subset(&self, conditions: &[String]) -> Result<Self> {
        conditions
            .iter()
            .map(|c| {
                self.entries
                    .get(c)
                    .map(|v| (c.clone(), v.clone()))
                    .ok_or_else(|| {
                        TrafoError::ConditionMismatch(format!("unknown condition '{}'", c))
                    })
            })
            .collect()
    }
}

impl<T> Add for ConditionMap<T> {
    type Output = Result<ConditionMap<T>>;

    fn add(self, rhs: ConditionMap<T>) -> Self::Output {
        self.union(rhs)
    }
}

impl<T> FromIterator<(String, T)> for ConditionMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for ConditionMap<T> {
    type Item = (String, T);
    type IntoIter = indexmap::map::IntoIter<String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ConditionMap<T> {
    type Item = (&'a String, &'a T);
    type IntoIter = indexmap::map::Iter<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
