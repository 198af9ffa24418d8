//! Generic grid for raster site data (elevation samples, cell lookups)

use serde::{Deserialize, Serialize};

use crate::core::types::Coord;

/// Generic 2D grid with configurable cell size
///
/// Cell `(x, y)` covers `[origin + x * cell_size, origin + (x + 1) * cell_size)`
/// on each axis; values are taken to sit at cell centers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid<T: Clone + Default> {
    pub width: usize,
    pub height: usize,
    pub cell_size: f64,
    pub origin: [f64; 2],
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize, cell_size: f64, origin: [f64; 2]) -> Self {
        Self {
            width,
            height,
            cell_size,
            origin,
            data: vec![T::default(); width * height],
        }
    }

    /// Build a grid from row-major values; `None` if the length doesn't match
    pub fn from_rows(
        width: usize,
        height: usize,
        cell_size: f64,
        origin: [f64; 2],
        data: Vec<T>,
    ) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            cell_size,
            origin,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            Some(&self.data[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Convert world position to cell coordinates, clamped to the grid
    #[inline]
    pub fn world_to_cell(&self, pos: Coord) -> (usize, usize) {
        let x = ((pos.x - self.origin[0]) / self.cell_size).floor() as i64;
        let y = ((pos.y - self.origin[1]) / self.cell_size).floor() as i64;
        (
            x.clamp(0, self.width as i64 - 1) as usize,
            y.clamp(0, self.height as i64 - 1) as usize,
        )
    }

    /// Sample grid at world position
    pub fn sample(&self, pos: Coord) -> Option<&T> {
        let (x, y) = self.world_to_cell(pos);
        self.get(x, y)
    }

    /// Cell center in world coordinates
    pub fn cell_center(&self, x: usize, y: usize) -> Coord {
        Coord {
            x: self.origin[0] + (x as f64 + 0.5) * self.cell_size,
            y: self.origin[1] + (y as f64 + 0.5) * self.cell_size,
        }
    }

    /// True if the position lies within the grid's extent
    pub fn covers(&self, pos: Coord) -> bool {
        let max_x = self.origin[0] + self.width as f64 * self.cell_size;
        let max_y = self.origin[1] + self.height as f64 * self.cell_size;
        pos.x >= self.origin[0] && pos.x <= max_x && pos.y >= self.origin[1] && pos.y <= max_y
    }
}

impl Grid<f64> {
    /// Bilinear interpolation between cell centers, clamped at the edges
    pub fn sample_bilinear(&self, pos: Coord) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let fx = ((pos.x - self.origin[0]) / self.cell_size - 0.5)
            .clamp(0.0, (self.width - 1) as f64);
        let fy = ((pos.y - self.origin[1]) / self.cell_size - 0.5)
            .clamp(0.0, (self.height - 1) as f64);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let v00 = *self.get(x0, y0)?;
        let v10 = *self.get(x1, y0)?;
        let v01 = *self.get(x0, y1)?;
        let v11 = *self.get(x1, y1)?;
        let bottom = v00 + (v10 - v00) * tx;
        let top = v01 + (v11 - v01) * tx;
        Some(bottom + (top - bottom) * ty)
    }

    /// Slope magnitude in percent from central differences at a position
    pub fn slope_percent_at(&self, pos: Coord) -> Option<f64> {
        let h = self.cell_size;
        let dzdx = (self.sample_bilinear(Coord { x: pos.x + h, y: pos.y })?
            - self.sample_bilinear(Coord { x: pos.x - h, y: pos.y })?)
            / (2.0 * h);
        let dzdy = (self.sample_bilinear(Coord { x: pos.x, y: pos.y + h })?
            - self.sample_bilinear(Coord { x: pos.x, y: pos.y - h })?)
            / (2.0 * h);
        Some((dzdx * dzdx + dzdy * dzdy).sqrt() * 100.0)
    }
}
