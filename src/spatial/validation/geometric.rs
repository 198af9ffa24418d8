//! Geometric validation: vertex count, finiteness, area, simplicity

use super::ValidationError;
use crate::core::error::{LayoutError, Result};
use geo::{Area, Coord, LineString, Polygon};

pub struct GeometricValidator;

impl GeometricValidator {
    /// Validate a polygon; ring 0 is the exterior, 1.. are holes
    pub fn validate_polygon(polygon: &Polygon<f64>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for (ring_index, ring) in rings.enumerate() {
            errors.extend(Self::validate_ring(ring_index, ring));
        }

        if errors.is_empty() && polygon.unsigned_area() <= f64::EPSILON {
            errors.push(ValidationError::ZeroArea);
        }

        errors
    }

    /// Validate and convert the first problem into an `InputGeometry` error
    pub fn require_valid(subject: &str, polygon: &Polygon<f64>) -> Result<()> {
        match Self::validate_polygon(polygon).into_iter().next() {
            None => Ok(()),
            Some(error) => Err(LayoutError::geometry(subject, error.to_string())),
        }
    }

    fn validate_ring(ring_index: usize, ring: &LineString<f64>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let coords = Self::open_ring(ring);

        if let Some(bad) = coords.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
            errors.push(ValidationError::NonFiniteCoordinate {
                ring: ring_index,
                coordinate: [bad.x, bad.y],
            });
            return errors;
        }

        if coords.len() < 3 {
            errors.push(ValidationError::InsufficientVertices {
                ring: ring_index,
                count: coords.len(),
                minimum: 3,
            });
            return errors; // Can't do further checks
        }

        if Self::is_self_intersecting(&coords) {
            errors.push(ValidationError::SelfIntersecting {
                ring: ring_index,
                description: "ring edges cross each other".into(),
            });
        }

        errors
    }

    /// Ring vertices without the closing duplicate and without repeated points
    fn open_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
        let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
        for c in &ring.0 {
            if coords.last() != Some(c) {
                coords.push(*c);
            }
        }
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        coords
    }

    /// Check if ring edges intersect each other (excluding adjacent edges)
    fn is_self_intersecting(coords: &[Coord<f64>]) -> bool {
        let n = coords.len();
        if n < 4 {
            return false; // Triangle can't self-intersect
        }

        for i in 0..n {
            let a1 = coords[i];
            let a2 = coords[(i + 1) % n];

            for j in (i + 2)..n {
                // Skip adjacent edges
                if j == (i + n - 1) % n {
                    continue;
                }

                let b1 = coords[j];
                let b2 = coords[(j + 1) % n];

                if Self::segments_intersect(a1, a2, b1, b2) {
                    return true;
                }
            }
        }
        false
    }

    /// Check if two line segments intersect, including collinear overlap
    fn segments_intersect(a1: Coord<f64>, a2: Coord<f64>, b1: Coord<f64>, b2: Coord<f64>) -> bool {
        let d1 = Self::cross(b1, b2, a1);
        let d2 = Self::cross(b1, b2, a2);
        let d3 = Self::cross(a1, a2, b1);
        let d4 = Self::cross(a1, a2, b2);

        if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
            && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
        {
            return true;
        }

        (d1 == 0.0 && Self::on_segment(b1, b2, a1))
            || (d2 == 0.0 && Self::on_segment(b1, b2, a2))
            || (d3 == 0.0 && Self::on_segment(a1, a2, b1))
            || (d4 == 0.0 && Self::on_segment(a1, a2, b2))
    }

    fn cross(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }

    fn on_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
        p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
    }
}
