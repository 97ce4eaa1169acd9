use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// A fixed-size 2D grid addressed by [`Position`].
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Positions with negative or too large components are simply outside the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid filled with clones of `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn filled(width: usize, height: usize, value: T) -> Self
    where
        T: Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![value; size],
        }
    }

    /// Builds a grid from rows of equal length.
    ///
    /// Returns `None` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        Some(Grid {
            width,
            height,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Converts a position to a flat vector index, or `None` when outside the grid.
    #[inline]
    fn index_of(&self, position: Position) -> Option<usize> {
        let x = usize::try_from(position.x).ok()?;
        let y = usize::try_from(position.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        self.index_of(position).map(|index| &self.cells[index])
    }

    /// Returns an iterator that yields `(position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let position = Position::new((index % width) as i64, (index / width) as i64);
            (position, cell)
        })
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, position: Position) -> &Self::Output {
        match self.index_of(position) {
            Some(index) => &self.cells[index],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, position: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.index_of(position) {
            Some(index) => &mut self.cells[index],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, width, height
            ),
        }
    }
}
