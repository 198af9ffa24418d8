//! Constraint data model
//!
//! Constraint kinds are a tagged enum with one dispatch function per
//! behavior (clearance rule, road blocking, defaults) instead of a trait
//! hierarchy; adding a kind means extending the exhaustive matches below.

use geo::{Contains, Intersects, Polygon};
use serde::{Deserialize, Serialize};

use crate::core::types::ConstraintId;
use crate::spatial::geometry::{distance_to_ring, polygon_distance};

/// Source feature a constraint was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    PropertyLine,
    Road,
    Water,
    Wetland,
    Floodplain,
    Utility,
    SteepSlope,
    Easement,
    Regulatory,
    UserDefined,
}

/// How a footprint is tested against a constraint geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearanceRule {
    /// Footprint must lie inside the geometry, at least the clearance from its edge
    InsideEdge,
    /// Footprint must stay out of the geometry, at least the clearance away
    Exclusion,
}

impl ConstraintType {
    pub fn clearance_rule(&self) -> ClearanceRule {
        match self {
            ConstraintType::PropertyLine => ClearanceRule::InsideEdge,
            ConstraintType::Road
            | ConstraintType::Water
            | ConstraintType::Wetland
            | ConstraintType::Floodplain
            | ConstraintType::Utility
            | ConstraintType::SteepSlope
            | ConstraintType::Easement
            | ConstraintType::Regulatory
            | ConstraintType::UserDefined => ClearanceRule::Exclusion,
        }
    }

    /// Whether roads may not be built through the geometry at a given severity
    ///
    /// Setbacks restrict buildings, not access roads: the entrance itself
    /// usually sits in the property-line setback.
    pub fn blocks_roads(&self, severity: Severity) -> bool {
        match self {
            ConstraintType::Water | ConstraintType::Wetland => true,
            ConstraintType::Regulatory | ConstraintType::UserDefined => {
                severity == Severity::Blocking
            }
            ConstraintType::PropertyLine
            | ConstraintType::Road
            | ConstraintType::Floodplain
            | ConstraintType::Utility
            | ConstraintType::SteepSlope
            | ConstraintType::Easement => false,
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ConstraintType::PropertyLine
            | ConstraintType::Road
            | ConstraintType::Water
            | ConstraintType::Wetland
            | ConstraintType::Utility
            | ConstraintType::Easement
            | ConstraintType::Regulatory => Severity::Blocking,
            ConstraintType::Floodplain | ConstraintType::SteepSlope => Severity::Warning,
            ConstraintType::UserDefined => Severity::Preference,
        }
    }

    pub fn default_priority(&self) -> Priority {
        match self {
            ConstraintType::PropertyLine | ConstraintType::Water | ConstraintType::Wetland => {
                Priority::Critical
            }
            ConstraintType::Road | ConstraintType::Utility | ConstraintType::Regulatory => {
                Priority::High
            }
            ConstraintType::Floodplain | ConstraintType::Easement | ConstraintType::SteepSlope => {
                Priority::Medium
            }
            ConstraintType::UserDefined => Priority::Low,
        }
    }
}

/// How strongly a constraint binds; only `Blocking` invalidates a placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
    Preference,
}

impl Severity {
    /// Base penalty of one soft violation; `Blocking` is scored separately
    pub fn soft_penalty(&self) -> f64 {
        match self {
            Severity::Blocking => 0.0,
            Severity::Warning => 1.0,
            Severity::Preference => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Penalty multiplier
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Critical => 2.0,
            Priority::High => 1.5,
            Priority::Medium => 1.0,
            Priority::Low => 0.5,
        }
    }
}

/// A geometric restriction on asset placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub constraint_type: ConstraintType,
    pub severity: Severity,
    pub priority: Priority,
    pub geometry: Polygon<f64>,
    #[serde(default)]
    pub setback_distance: Option<f64>,
}

impl Constraint {
    /// Constraint with the type's default severity and priority
    pub fn new(id: impl Into<String>, constraint_type: ConstraintType, geometry: Polygon<f64>) -> Self {
        Self {
            id: ConstraintId::new(id),
            constraint_type,
            severity: constraint_type.default_severity(),
            priority: constraint_type.default_priority(),
            geometry,
            setback_distance: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_setback(mut self, distance: f64) -> Self {
        self.setback_distance = Some(distance);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }

    /// Required clearance: own setback, else the configured minimum spacing
    pub fn clearance(&self, min_spacing: f64) -> f64 {
        self.setback_distance.unwrap_or(min_spacing)
    }

    /// Whether a footprint violates this constraint
    pub fn is_violated_by(&self, footprint: &Polygon<f64>, min_spacing: f64) -> bool {
        let clearance = self.clearance(min_spacing);
        match self.constraint_type.clearance_rule() {
            ClearanceRule::InsideEdge => {
                !self.geometry.contains(footprint)
                    || distance_to_ring(footprint, &self.geometry) < clearance
            }
            ClearanceRule::Exclusion => {
                footprint.intersects(&self.geometry)
                    || polygon_distance(footprint, &self.geometry) < clearance
            }
        }
    }

    /// Whether roads must route around this constraint
    pub fn blocks_roads(&self) -> bool {
        self.constraint_type.blocks_roads(self.severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::geometry::{rectangle_footprint, ring_to_polygon};
    use geo::Coord;

    fn square(min: f64, max: f64) -> Polygon<f64> {
        ring_to_polygon(&[[min, min], [max, min], [max, max], [min, max]])
    }

    #[test]
    fn test_defaults_by_type() {
        let c = Constraint::new("w", ConstraintType::Wetland, square(0.0, 1.0));
        assert_eq!(c.severity, Severity::Blocking);
        assert_eq!(c.priority, Priority::Critical);
        assert!(c.blocks_roads());

        let f = Constraint::new("f", ConstraintType::Floodplain, square(0.0, 1.0));
        assert_eq!(f.severity, Severity::Warning);
        assert!(!f.blocks_roads());
    }

    #[test]
    fn test_exclusion_with_setback() {
        let water = Constraint::new("pond", ConstraintType::Water, square(0.0, 10.0)).with_setback(5.0);
        let near = rectangle_footprint(Coord { x: 17.0, y: 5.0 }, 6.0, 6.0, 0.0); // 4 from the pond
        let far = rectangle_footprint(Coord { x: 19.0, y: 5.0 }, 6.0, 6.0, 0.0); // 6 from the pond
        assert!(water.is_violated_by(&near, 0.0));
        assert!(!water.is_violated_by(&far, 0.0));
    }

    #[test]
    fn test_exclusion_falls_back_to_min_spacing() {
        let zone = Constraint::new("z", ConstraintType::Regulatory, square(0.0, 10.0));
        let footprint = rectangle_footprint(Coord { x: 15.0, y: 5.0 }, 6.0, 6.0, 0.0); // 2 away
        assert!(!zone.is_violated_by(&footprint, 0.0));
        assert!(zone.is_violated_by(&footprint, 3.0));
    }

    #[test]
    fn test_property_line_setback() {
        let parcel = Constraint::new("lot", ConstraintType::PropertyLine, square(0.0, 100.0))
            .with_setback(10.0);
        let centered = rectangle_footprint(Coord { x: 50.0, y: 50.0 }, 50.0, 50.0, 0.0);
        let crowding = rectangle_footprint(Coord { x: 30.0, y: 50.0 }, 50.0, 50.0, 0.0);
        let outside = rectangle_footprint(Coord { x: 120.0, y: 50.0 }, 10.0, 10.0, 0.0);
        assert!(!parcel.is_violated_by(&centered, 0.0));
        assert!(parcel.is_violated_by(&crowding, 0.0));
        assert!(parcel.is_violated_by(&outside, 0.0));
    }
}
