//! Parcel boundary

use geo::{BoundingRect, Contains, Coord, Polygon, Rect};

use crate::core::error::{LayoutError, Result};
use crate::spatial::geometry::{rect_diagonal, ring_to_polygon};
use crate::spatial::validation::GeometricValidator;

/// The property boundary every asset must sit inside
#[derive(Debug, Clone)]
pub struct PropertyBoundary {
    polygon: Polygon<f64>,
    bounds: Rect<f64>,
}

impl PropertyBoundary {
    /// Validate and wrap a parcel polygon
    pub fn new(polygon: Polygon<f64>) -> Result<Self> {
        GeometricValidator::require_valid("property boundary", &polygon)?;
        let bounds = polygon
            .bounding_rect()
            .ok_or_else(|| LayoutError::geometry("property boundary", "empty polygon"))?;
        Ok(Self { polygon, bounds })
    }

    pub fn from_ring(ring: &[[f64; 2]]) -> Result<Self> {
        Self::new(ring_to_polygon(ring))
    }

    /// Axis-aligned rectangular parcel, convenient for tests and demos
    pub fn rectangle(min: [f64; 2], max: [f64; 2]) -> Result<Self> {
        Self::from_ring(&[min, [max[0], min[1]], max, [min[0], max[1]]])
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// Length of the bounding-box diagonal; the site's normalization scale
    pub fn diagonal(&self) -> f64 {
        rect_diagonal(&self.bounds)
    }

    pub fn contains_footprint(&self, footprint: &Polygon<f64>) -> bool {
        self.polygon.contains(footprint)
    }

    pub fn contains_point(&self, point: Coord) -> bool {
        self.polygon.contains(&point)
    }
}
