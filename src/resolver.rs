//! Work-set resolution: which identifiers still need a fetch of a given kind.

use std::collections::{BTreeSet, HashSet};

use crate::domain::Isbn;

/// Returns every identifier of `all` that is not in `completed`, ascending and
/// without duplicates. The ordering is stable across runs so an interrupted
/// pass always leaves a completed prefix behind.
pub fn pending<A, C>(all: A, completed: C) -> Vec<Isbn>
where
    A: IntoIterator<Item = Isbn>,
    C: IntoIterator<Item = Isbn>,
{
    let completed: HashSet<Isbn> = completed.into_iter().collect();
    all.into_iter()
        .filter(|isbn| !completed.contains(isbn))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
