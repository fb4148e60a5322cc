//! Egocentric observation windows.

use crate::grid::{Grid, Pos};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

/// Square window of shape `(2r + 1, 2r + 1, num_obj_types)` centered on an agent.
///
/// Cells outside the grid are zero. The window is an owned snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    data: Array3<f32>,
}

impl Observation {
    /// An all-zero window
    pub fn zeros(sight_len: usize, num_obj_types: usize) -> Self {
        let width = 2 * sight_len + 1;
        Self {
            data: Array3::zeros((width, width, num_obj_types)),
        }
    }

    /// Copy the window around `pos` out of `grid`.
    pub fn from_grid(grid: &Grid, pos: Pos, sight_len: usize) -> Self {
        let mut obs = Self::zeros(sight_len, grid.num_obj_types());

        let x = pos.0 as i64;
        let y = pos.1 as i64;
        let r = sight_len as i64;
        let width = grid.width() as i64;
        let height = grid.height() as i64;

        let sight_left = x - r;
        let sight_right = x + r;
        let sight_bottom = y - r;
        let sight_top = y + r;

        // Padding on the low side is where the in-bounds block lands
        let pad_left = (-sight_left).max(0);
        let pad_bottom = (-sight_bottom).max(0);

        let left = sight_left.max(0);
        let right = sight_right.min(width - 1);
        let bottom = sight_bottom.max(0);
        let top = sight_top.min(height - 1);
        if left > right || bottom > top {
            return obs;
        }

        let x_len = (right - left + 1) as usize;
        let y_len = (top - bottom + 1) as usize;
        let (pad_left, pad_bottom) = (pad_left as usize, pad_bottom as usize);
        let (left, bottom) = (left as usize, bottom as usize);

        let source = grid
            .view()
            .slice_move(s![left..left + x_len, bottom..bottom + y_len, ..]);
        obs.data
            .slice_mut(s![pad_left..pad_left + x_len, pad_bottom..pad_bottom + y_len, ..])
            .zip_mut_with(&source, |cell, &occupied| {
                *cell = if occupied { 1.0 } else { 0.0 };
            });

        obs
    }

    /// Window side length
    #[inline]
    pub fn width(&self) -> usize {
        self.data.shape()[0]
    }

    /// Value at window offset `(i, j)` for layer `layer`
    #[inline]
    pub fn get(&self, i: usize, j: usize, layer: usize) -> f32 {
        self.data[[i, j, layer]]
    }

    /// Total number of values in the window
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major flattening used as reward network input
    pub fn flatten(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.data
    }
}

impl Serialize for Observation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let shape = self.data.shape();
        let data: Vec<f32> = self.data.iter().copied().collect();

        let mut state = serializer.serialize_struct("Observation", 2)?;
        state.serialize_field("shape", &[shape[0], shape[1], shape[2]])?;
        state.serialize_field("data", &data)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Observation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ObservationData {
            shape: [usize; 3],
            data: Vec<f32>,
        }

        let raw = ObservationData::deserialize(deserializer)?;
        let data = Array3::from_shape_vec((raw.shape[0], raw.shape[1], raw.shape[2]), raw.data)
            .map_err(serde::de::Error::custom)?;
        Ok(Observation { data })
    }
}
