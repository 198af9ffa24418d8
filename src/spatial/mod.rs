//! Raster grids, footprint geometry and input geometry validation

pub mod geometry;
pub mod grid;
pub mod validation;

pub use grid::Grid;
