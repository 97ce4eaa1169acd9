use std::{collections::HashSet, hash::Hash};

use crate::Position;

/// Remembers which coordinates have been entered during a run.
///
/// There is no removal: once a coordinate is marked it is never explored
/// again, which is what bounds the search on cyclic mazes.
#[derive(Debug, Clone)]
pub struct GridMemory<C = Position> {
    visited: HashSet<C>,
}

impl<C: Eq + Hash> GridMemory<C> {
    pub fn new() -> Self {
        GridMemory {
            visited: HashSet::new(),
        }
    }

    /// Marks `coord` as visited. Returns `false` if it already was.
    pub fn mark_visited(&mut self, coord: C) -> bool {
        self.visited.insert(coord)
    }

    pub fn is_visited(&self, coord: &C) -> bool {
        self.visited.contains(coord)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

impl<C: Eq + Hash> Default for GridMemory<C> {
    fn default() -> Self {
        Self::new()
    }
}
