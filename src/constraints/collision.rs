//! Placement validity against constraints, the parcel and other assets

use geo::{BoundingRect, Intersects, Polygon, Rect};
use serde::{Deserialize, Serialize};

use super::constraint::{ConstraintType, Priority, Severity};
use super::store::ConstraintStore;
use crate::core::types::{AssetId, ConstraintId};
use crate::site::{PlacedAsset, PropertyBoundary};
use crate::spatial::geometry::polygon_distance;

/// What an asset violates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Constraint {
        constraint_id: ConstraintId,
        constraint_type: ConstraintType,
        severity: Severity,
        priority: Priority,
    },
    /// Closer than the minimum spacing to another asset (or overlapping it)
    Spacing {
        other: AssetId,
        distance: f64,
        required: f64,
    },
    OutsideBoundary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub asset_id: AssetId,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn severity(&self) -> Severity {
        match &self.kind {
            ViolationKind::Constraint { severity, .. } => *severity,
            ViolationKind::Spacing { .. } | ViolationKind::OutsideBoundary => Severity::Blocking,
        }
    }

    pub fn priority(&self) -> Priority {
        match &self.kind {
            ViolationKind::Constraint { priority, .. } => *priority,
            ViolationKind::Spacing { .. } => Priority::High,
            ViolationKind::OutsideBoundary => Priority::Critical,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity() == Severity::Blocking
    }
}

/// Result of checking one footprint during seeding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementCheck {
    pub blocking: Vec<ConstraintId>,
    pub soft: Vec<ConstraintId>,
    pub outside_boundary: bool,
    pub spacing_conflicts: usize,
}

impl PlacementCheck {
    pub fn is_valid(&self) -> bool {
        self.blocking.is_empty() && !self.outside_boundary && self.spacing_conflicts == 0
    }
}

/// Read-only collision model shared by the optimizer's workers
#[derive(Debug, Clone, Copy)]
pub struct CollisionValidator<'a> {
    store: &'a ConstraintStore,
    boundary: &'a PropertyBoundary,
    min_spacing: f64,
}

impl<'a> CollisionValidator<'a> {
    pub fn new(store: &'a ConstraintStore, boundary: &'a PropertyBoundary, min_spacing: f64) -> Self {
        Self {
            store,
            boundary,
            min_spacing,
        }
    }

    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    pub fn boundary(&self) -> &PropertyBoundary {
        self.boundary
    }

    /// Check a footprint against constraints and the parcel.
    ///
    /// Valid means no BLOCKING constraint is violated and the footprint is
    /// inside the parcel. The returned ids cover every violated constraint,
    /// soft ones included, for scoring.
    pub fn is_position_valid(&self, footprint: &Polygon<f64>) -> (bool, Vec<ConstraintId>) {
        let check = self.check_footprint(footprint, &[]);
        let valid = check.is_valid();
        let mut ids = check.blocking;
        ids.extend(check.soft);
        (valid, ids)
    }

    /// Check a footprint against constraints, the parcel and already placed footprints
    pub fn check_footprint(&self, footprint: &Polygon<f64>, others: &[&Polygon<f64>]) -> PlacementCheck {
        let mut check = PlacementCheck {
            outside_boundary: !self.boundary.contains_footprint(footprint),
            ..Default::default()
        };
        for constraint in self.store.violated_by(footprint, self.min_spacing) {
            if constraint.is_blocking() {
                check.blocking.push(constraint.id.clone());
            } else {
                check.soft.push(constraint.id.clone());
            }
        }
        check.spacing_conflicts = others
            .iter()
            .filter(|other| self.spacing_shortfall(footprint, other).is_some())
            .count();
        check
    }

    /// All violations of an arrangement; a spacing conflict is reported once,
    /// on the later asset of the pair
    pub fn check_arrangement(&self, assets: &[PlacedAsset]) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (i, asset) in assets.iter().enumerate() {
            let footprint = asset.footprint();
            if !self.boundary.contains_footprint(footprint) {
                violations.push(Violation {
                    asset_id: asset.id().clone(),
                    kind: ViolationKind::OutsideBoundary,
                });
            }

            for constraint in self.store.violated_by(footprint, self.min_spacing) {
                violations.push(Violation {
                    asset_id: asset.id().clone(),
                    kind: ViolationKind::Constraint {
                        constraint_id: constraint.id.clone(),
                        constraint_type: constraint.constraint_type,
                        severity: constraint.severity,
                        priority: constraint.priority,
                    },
                });
            }

            for other in &assets[..i] {
                if let Some(distance) = self.spacing_shortfall(footprint, other.footprint()) {
                    violations.push(Violation {
                        asset_id: asset.id().clone(),
                        kind: ViolationKind::Spacing {
                            other: other.id().clone(),
                            distance,
                            required: self.min_spacing,
                        },
                    });
                }
            }
        }

        violations
    }

    /// `Some(distance)` when two footprints overlap or sit closer than the minimum spacing
    fn spacing_shortfall(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> Option<f64> {
        let (Some(ra), Some(rb)) = (a.bounding_rect(), b.bounding_rect()) else {
            return None;
        };
        if rect_gap(&ra, &rb) > self.min_spacing {
            return None;
        }
        if a.intersects(b) {
            return Some(0.0);
        }
        let distance = polygon_distance(a, b);
        (distance < self.min_spacing).then_some(distance)
    }
}

/// Lower bound on the distance between two shapes from their bounding boxes
fn rect_gap(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let dx = (b.min().x - a.max().x).max(a.min().x - b.max().x).max(0.0);
    let dy = (b.min().y - a.max().y).max(a.min().y - b.max().y).max(0.0);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::site::AssetSpec;
    use crate::spatial::geometry::{rectangle_footprint, ring_to_polygon};
    use geo::Coord;

    fn setup() -> (ConstraintStore, PropertyBoundary) {
        let boundary = PropertyBoundary::rectangle([0.0, 0.0], [100.0, 100.0]).unwrap();
        let store = ConstraintStore::from_constraints([
            Constraint::new(
                "pond",
                ConstraintType::Water,
                ring_to_polygon(&[[60.0, 60.0], [80.0, 60.0], [80.0, 80.0], [60.0, 80.0]]),
            ),
            Constraint::new(
                "flood",
                ConstraintType::Floodplain,
                ring_to_polygon(&[[0.0, 0.0], [30.0, 0.0], [30.0, 30.0], [0.0, 30.0]]),
            ),
        ])
        .unwrap();
        (store, boundary)
    }

    #[test]
    fn test_blocking_invalidates_soft_does_not() {
        let (store, boundary) = setup();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);

        let in_pond = rectangle_footprint(Coord { x: 70.0, y: 70.0 }, 4.0, 4.0, 0.0);
        let (valid, ids) = validator.is_position_valid(&in_pond);
        assert!(!valid);
        assert_eq!(ids, vec![ConstraintId::new("pond")]);

        let in_flood = rectangle_footprint(Coord { x: 15.0, y: 15.0 }, 4.0, 4.0, 0.0);
        let (valid, ids) = validator.is_position_valid(&in_flood);
        assert!(valid);
        assert_eq!(ids, vec![ConstraintId::new("flood")]);
    }

    #[test]
    fn test_outside_parcel_invalid() {
        let (store, boundary) = setup();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let off_site = rectangle_footprint(Coord { x: 99.0, y: 50.0 }, 4.0, 4.0, 0.0);
        assert!(!validator.is_position_valid(&off_site).0);
    }

    #[test]
    fn test_spacing_between_assets() {
        let (store, boundary) = setup();
        let validator = CollisionValidator::new(&store, &boundary, 5.0);
        let spec = AssetSpec::new("shed", 2, 10.0, 10.0);
        let a = spec.place(0, Coord { x: 40.0, y: 40.0 }, 0.0);
        let close = spec.place(1, Coord { x: 53.0, y: 40.0 }, 0.0); // 3 apart
        let far = spec.place(1, Coord { x: 56.0, y: 40.0 }, 0.0); // 6 apart

        let violations = validator.check_arrangement(&[a.clone(), close]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].is_blocking());
        match &violations[0].kind {
            ViolationKind::Spacing { other, distance, required } => {
                assert_eq!(other.as_str(), "shed-0");
                assert!((distance - 3.0).abs() < 1e-9);
                assert_eq!(*required, 5.0);
            }
            other => panic!("unexpected violation {other:?}"),
        }

        assert!(validator.check_arrangement(&[a, far]).is_empty());
    }

    #[test]
    fn test_check_footprint_counts_conflicts() {
        let (store, boundary) = setup();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let placed = rectangle_footprint(Coord { x: 40.0, y: 40.0 }, 10.0, 10.0, 0.0);
        let overlapping = rectangle_footprint(Coord { x: 45.0, y: 40.0 }, 10.0, 10.0, 0.0);
        let check = validator.check_footprint(&overlapping, &[&placed]);
        assert_eq!(check.spacing_conflicts, 1);
        assert!(!check.is_valid());
    }

    #[test]
    fn test_violation_serializes_flat() {
        let v = Violation {
            asset_id: AssetId::new("shed-0"),
            kind: ViolationKind::OutsideBoundary,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "outside_boundary");
        assert_eq!(json["asset_id"], "shed-0");
    }
}
