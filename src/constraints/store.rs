//! Constraint storage with a lazily built R-tree
//!
//! Constraints live in a flat arena; the R-tree stores arena indices, not
//! references, so the index has no ownership ties to the geometry. The tree is
//! built on the first query after any membership change. Mutation needs
//! `&mut self`, so during a run the store is read-only and concurrent queries
//! need no locking.

use std::sync::OnceLock;

use ahash::AHashMap;
use geo::{BoundingRect, Coord, Intersects, Polygon, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use super::constraint::{ClearanceRule, Constraint};
use crate::core::error::{LayoutError, Result};
use crate::core::types::ConstraintId;
use crate::spatial::geometry::polygon_distance;
use crate::spatial::validation::GeometricValidator;

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, usize>;

#[derive(Debug, Clone)]
struct SpatialIndex {
    tree: RTree<IndexEntry>,
    /// Inside-edge constraints (property lines) apply everywhere, including
    /// far outside their own bounding box, so they bypass the tree
    always_checked: Vec<usize>,
    max_setback: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    constraints: Vec<Constraint>,
    by_id: AHashMap<ConstraintId, usize>,
    index: OnceLock<SpatialIndex>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, validating every constraint
    pub fn from_constraints(constraints: impl IntoIterator<Item = Constraint>) -> Result<Self> {
        let mut store = Self::new();
        for constraint in constraints {
            store.insert(constraint)?;
        }
        Ok(store)
    }

    /// Add a constraint; malformed geometry and duplicate ids are rejected here,
    /// never during search
    pub fn insert(&mut self, constraint: Constraint) -> Result<()> {
        GeometricValidator::require_valid(&format!("constraint {}", constraint.id), &constraint.geometry)?;
        if let Some(setback) = constraint.setback_distance {
            if !setback.is_finite() || setback < 0.0 {
                return Err(LayoutError::geometry(
                    format!("constraint {}", constraint.id),
                    format!("setback_distance must be non-negative, got {setback}"),
                ));
            }
        }
        if self.by_id.contains_key(&constraint.id) {
            return Err(LayoutError::DuplicateConstraint(constraint.id.to_string()));
        }

        self.by_id.insert(constraint.id.clone(), self.constraints.len());
        self.constraints.push(constraint);
        self.index = OnceLock::new();
        Ok(())
    }

    pub fn remove(&mut self, id: &ConstraintId) -> Option<Constraint> {
        let slot = self.by_id.remove(id)?;
        let removed = self.constraints.swap_remove(slot);
        if let Some(moved) = self.constraints.get(slot) {
            self.by_id.insert(moved.id.clone(), slot);
        }
        self.index = OnceLock::new();
        Some(removed)
    }

    pub fn get(&self, id: &ConstraintId) -> Option<&Constraint> {
        self.by_id.get(id).map(|&i| &self.constraints[i])
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Largest explicit setback among spatially indexed constraints
    pub fn max_setback(&self) -> f64 {
        self.index().max_setback
    }

    fn index(&self) -> &SpatialIndex {
        self.index.get_or_init(|| {
            let mut entries = Vec::with_capacity(self.constraints.len());
            let mut always_checked = Vec::new();
            let mut max_setback: f64 = 0.0;

            for (i, c) in self.constraints.iter().enumerate() {
                if c.constraint_type.clearance_rule() == ClearanceRule::InsideEdge {
                    always_checked.push(i);
                    continue;
                }
                max_setback = max_setback.max(c.setback_distance.unwrap_or(0.0));
                if let Some(rect) = c.geometry.bounding_rect() {
                    let bounds = Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    );
                    entries.push(GeomWithData::new(bounds, i));
                }
            }

            tracing::debug!(
                indexed = entries.len(),
                always_checked = always_checked.len(),
                "Built constraint index"
            );

            SpatialIndex {
                tree: RTree::bulk_load(entries),
                always_checked,
                max_setback,
            }
        })
    }

    /// Arena indices whose envelopes come within `margin` of `rect`, plus every
    /// inside-edge constraint; sorted for deterministic iteration
    fn candidates(&self, rect: Rect<f64>, margin: f64) -> Vec<usize> {
        let index = self.index();
        let envelope = AABB::from_corners(
            [rect.min().x - margin, rect.min().y - margin],
            [rect.max().x + margin, rect.max().y + margin],
        );
        let mut found: Vec<usize> = index
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .chain(index.always_checked.iter().copied())
            .collect();
        found.sort_unstable();
        found
    }

    /// Constraints whose geometry overlaps `geometry`
    pub fn query_overlapping(&self, geometry: &Polygon<f64>) -> Vec<&Constraint> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        self.candidates(rect, 0.0)
            .into_iter()
            .map(|i| &self.constraints[i])
            .filter(|c| c.geometry.intersects(geometry))
            .collect()
    }

    /// Constraints whose geometry is within `distance` of `geometry`
    pub fn query_within_distance(&self, geometry: &Polygon<f64>, distance: f64) -> Vec<&Constraint> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        self.candidates(rect, distance)
            .into_iter()
            .map(|i| &self.constraints[i])
            .filter(|c| polygon_distance(geometry, &c.geometry) <= distance)
            .collect()
    }

    /// Constraints whose geometry covers a point
    pub fn query_point(&self, point: Coord) -> Vec<&Constraint> {
        self.candidates(Rect::new(point, point), 0.0)
            .into_iter()
            .map(|i| &self.constraints[i])
            .filter(|c| c.geometry.intersects(&point))
            .collect()
    }

    /// Constraints a footprint violates under each constraint's clearance rule
    pub fn violated_by(&self, footprint: &Polygon<f64>, min_spacing: f64) -> Vec<&Constraint> {
        let Some(rect) = footprint.bounding_rect() else {
            return Vec::new();
        };
        let margin = self.max_setback().max(min_spacing);
        self.candidates(rect, margin)
            .into_iter()
            .map(|i| &self.constraints[i])
            .filter(|c| c.is_violated_by(footprint, min_spacing))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::constraint::{ConstraintType, Severity};
    use crate::spatial::geometry::{rectangle_footprint, ring_to_polygon};

    fn square(id: &str, min: [f64; 2], size: f64, kind: ConstraintType) -> Constraint {
        let [x, y] = min;
        Constraint::new(
            id,
            kind,
            ring_to_polygon(&[[x, y], [x + size, y], [x + size, y + size], [x, y + size]]),
        )
    }

    fn grid_store() -> ConstraintStore {
        // 10 x 10 ponds of 5 x 5 on a 20-unit pitch
        let mut constraints = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                constraints.push(square(
                    &format!("pond-{i}-{j}"),
                    [i as f64 * 20.0, j as f64 * 20.0],
                    5.0,
                    ConstraintType::Water,
                ));
            }
        }
        ConstraintStore::from_constraints(constraints).unwrap()
    }

    #[test]
    fn test_query_overlapping_is_exact() {
        let store = grid_store();
        // Envelope overlaps pond-1-1 at its corner; the triangle itself does not
        let probe = ring_to_polygon(&[[24.0, 27.0], [27.0, 24.0], [27.0, 27.0]]);
        assert!(store.query_overlapping(&probe).is_empty());

        let probe = rectangle_footprint(Coord { x: 22.0, y: 22.0 }, 2.0, 2.0, 0.0);
        let hits = store.query_overlapping(&probe);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "pond-1-1");
    }

    #[test]
    fn test_query_point() {
        let store = grid_store();
        assert_eq!(store.query_point(Coord { x: 41.0, y: 61.0 }).len(), 1);
        assert!(store.query_point(Coord { x: 10.0, y: 10.0 }).is_empty());
    }

    #[test]
    fn test_query_within_distance() {
        let store = grid_store();
        let probe = rectangle_footprint(Coord { x: 12.5, y: 2.5 }, 1.0, 1.0, 0.0);
        // 7 units to pond-0-0, 7 units to pond-1-0
        assert!(store.query_within_distance(&probe, 6.0).is_empty());
        assert_eq!(store.query_within_distance(&probe, 7.5).len(), 2);
    }

    #[test]
    fn test_index_rebuilt_after_membership_change() {
        let mut store = grid_store();
        let probe = rectangle_footprint(Coord { x: 2.0, y: 2.0 }, 1.0, 1.0, 0.0);
        assert_eq!(store.query_overlapping(&probe).len(), 1);

        let removed = store.remove(&ConstraintId::new("pond-0-0")).unwrap();
        assert_eq!(removed.id.as_str(), "pond-0-0");
        assert!(store.query_overlapping(&probe).is_empty());
        assert_eq!(store.len(), 99);
        // The element swapped into the freed slot is still addressable
        assert!(store.get(&ConstraintId::new("pond-9-9")).is_some());

        store.insert(removed).unwrap();
        assert_eq!(store.query_overlapping(&probe).len(), 1);
    }

    #[test]
    fn test_duplicate_and_malformed_rejected() {
        let mut store = grid_store();
        let dup = square("pond-3-3", [0.0, 0.0], 1.0, ConstraintType::Water);
        assert!(matches!(store.insert(dup), Err(LayoutError::DuplicateConstraint(_))));

        let bowtie = Constraint::new(
            "bowtie",
            ConstraintType::Wetland,
            ring_to_polygon(&[[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]]),
        );
        assert!(matches!(store.insert(bowtie), Err(LayoutError::InputGeometry { .. })));
    }

    #[test]
    fn test_violated_by_uses_setback_margin() {
        let mut store = ConstraintStore::new();
        store
            .insert(square("creek", [0.0, 0.0], 10.0, ConstraintType::Water).with_setback(25.0))
            .unwrap();
        store
            .insert(
                square("flood", [100.0, 0.0], 10.0, ConstraintType::Floodplain)
                    .with_severity(Severity::Warning),
            )
            .unwrap();
        let footprint = rectangle_footprint(Coord { x: 30.0, y: 5.0 }, 4.0, 4.0, 0.0);
        let hits = store.violated_by(&footprint, 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "creek");
    }

    #[test]
    fn test_property_line_checked_far_outside() {
        let store = ConstraintStore::from_constraints([square(
            "lot",
            [0.0, 0.0],
            50.0,
            ConstraintType::PropertyLine,
        )])
        .unwrap();
        let footprint = rectangle_footprint(Coord { x: 500.0, y: 500.0 }, 4.0, 4.0, 0.0);
        assert_eq!(store.violated_by(&footprint, 0.0).len(), 1);
    }
}
