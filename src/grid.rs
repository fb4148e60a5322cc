//! Occupancy grid for agents and food.

use ndarray::{s, Array3, ArrayView3};
use serde::{Deserialize, Serialize};

/// Grid coordinate `(x, y)`
pub type Pos = (usize, usize);

/// Kinds of object that occupy a grid layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Agent,
    Food,
}

impl ObjectType {
    /// Layer index in the occupancy volume
    #[inline]
    pub fn index(self) -> usize {
        match self {
            ObjectType::Agent => 0,
            ObjectType::Food => 1,
        }
    }
}

/// Boolean occupancy volume indexed by `(x, y, object type)`
#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Array3<bool>,
}

impl Grid {
    /// Create an empty grid with `num_obj_types` layers
    pub fn new(width: usize, height: usize, num_obj_types: usize) -> Self {
        Self {
            width,
            height,
            cells: Array3::from_elem((width, height, num_obj_types), false),
        }
    }

    /// Clear every layer
    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    /// Mark `pos` as occupied by `obj`
    #[inline]
    pub fn place(&mut self, obj: ObjectType, pos: Pos) {
        self.cells[[pos.0, pos.1, obj.index()]] = true;
    }

    /// Clear the `obj` occupancy at `pos`
    #[inline]
    pub fn remove(&mut self, obj: ObjectType, pos: Pos) {
        self.cells[[pos.0, pos.1, obj.index()]] = false;
    }

    /// Check whether `obj` occupies `pos`
    #[inline]
    pub fn exists(&self, obj: ObjectType, pos: Pos) -> bool {
        self.cells[[pos.0, pos.1, obj.index()]]
    }

    /// Check signed coordinates against the grid bounds
    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Number of cells occupied by `obj`
    pub fn count(&self, obj: ObjectType) -> usize {
        self.cells
            .slice(s![.., .., obj.index()])
            .iter()
            .filter(|&&occupied| occupied)
            .count()
    }

    /// Read-only view of the occupancy volume
    pub fn view(&self) -> ArrayView3<'_, bool> {
        self.cells.view()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn num_obj_types(&self) -> usize {
        self.cells.shape()[2]
    }

    /// Every cell in the grid, row-major over `y`
    pub fn positions(&self) -> Vec<Pos> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .collect()
    }
}
