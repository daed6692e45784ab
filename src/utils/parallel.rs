//! Parallel evaluation helpers.
//!
//! Conditions are independent and side-effect free, so per-condition work
//! is spread over the rayon thread pool.

use rayon::prelude::*;

use crate::error::Result;

/// Apply a fallible function to every item in parallel.
///
/// The output keeps the input order. The first error encountered is
/// returned.
pub fn try_par_map<T, U, F>(items: &[T], f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Sync + Send,
{
    items.par_iter().map(f).collect()
}
