//! JSON schema for a complete site description
//!
//! Produced by the parsing, terrain and constraint-sourcing collaborators and
//! consumed by the layout runner. Rings are `[x, y]` arrays; every polygon is
//! validated when the request is converted into engine inputs.

use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};

use super::{AssetSpec, BuildableZone, PropertyBoundary, TerrainModel};
use crate::constraints::{Constraint, ConstraintStore, ConstraintType, Priority, Severity};
use crate::core::error::{LayoutError, Result};
use crate::spatial::Grid;

pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: String,
    pub ring: Ring,
    #[serde(default)]
    pub holes: Vec<Ring>,
    #[serde(default)]
    pub mean_slope_percent: f64,
    #[serde(default)]
    pub mean_elevation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub id: String,
    pub constraint_type: ConstraintType,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub ring: Ring,
    #[serde(default)]
    pub holes: Vec<Ring>,
    #[serde(default)]
    pub setback_distance: Option<f64>,
}

/// Row-major elevation samples at cell centers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationRecord {
    pub origin: [f64; 2],
    pub cell_size: f64,
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRequest {
    pub boundary: Ring,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
    #[serde(default)]
    pub constraints: Vec<ConstraintRecord>,
    pub assets: Vec<AssetSpec>,
    #[serde(default)]
    pub elevation: Option<ElevationRecord>,
    /// Overrides the configured entrance when present
    #[serde(default)]
    pub entrance: Option<[f64; 2]>,
}

/// Validated engine inputs
#[derive(Debug, Clone)]
pub struct SiteInput {
    pub boundary: PropertyBoundary,
    pub terrain: TerrainModel,
    pub constraints: ConstraintStore,
    pub assets: Vec<AssetSpec>,
}

fn polygon_from(ring: &[[f64; 2]], holes: &[Ring]) -> Polygon<f64> {
    let to_line = |r: &[[f64; 2]]| LineString::from(r.iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>());
    Polygon::new(to_line(ring), holes.iter().map(|h| to_line(h)).collect())
}

impl SiteRequest {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Validate geometry and build engine inputs; malformed input is refused
    pub fn into_site(self) -> Result<SiteInput> {
        let boundary = PropertyBoundary::new(polygon_from(&self.boundary, &[]))?;

        let zones = self
            .zones
            .iter()
            .map(|z| BuildableZone {
                id: z.id.clone(),
                polygon: polygon_from(&z.ring, &z.holes),
                mean_slope_percent: z.mean_slope_percent,
                mean_elevation: z.mean_elevation,
            })
            .collect();
        let mut terrain = TerrainModel::new(zones)?;

        if let Some(e) = self.elevation {
            if !e.cell_size.is_finite() || e.cell_size <= 0.0 {
                return Err(LayoutError::geometry("elevation raster", "cell_size must be positive"));
            }
            let raster = Grid::from_rows(e.width, e.height, e.cell_size, e.origin, e.values)
                .ok_or_else(|| {
                    LayoutError::geometry("elevation raster", "values length must equal width * height")
                })?;
            terrain = terrain.with_elevation(raster);
        }

        let mut constraints = ConstraintStore::new();
        for record in self.constraints {
            let mut constraint = Constraint::new(
                record.id,
                record.constraint_type,
                polygon_from(&record.ring, &record.holes),
            );
            if let Some(severity) = record.severity {
                constraint.severity = severity;
            }
            if let Some(priority) = record.priority {
                constraint.priority = priority;
            }
            constraint.setback_distance = record.setback_distance;
            constraints.insert(constraint)?;
        }

        for spec in &self.assets {
            spec.validate()?;
        }

        Ok(SiteInput {
            boundary,
            terrain,
            constraints,
            assets: self.assets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ConstraintId;

    const REQUEST: &str = r#"{
        "boundary": [[0, 0], [200, 0], [200, 150], [0, 150]],
        "zones": [
            {"id": "north", "ring": [[0, 75], [200, 75], [200, 150], [0, 150]],
             "mean_slope_percent": 3.0, "mean_elevation": 110.0}
        ],
        "constraints": [
            {"id": "lot", "constraint_type": "property_line",
             "ring": [[0, 0], [200, 0], [200, 150], [0, 150]], "setback_distance": 10},
            {"id": "creek", "constraint_type": "water", "severity": "blocking",
             "ring": [[90, 0], [110, 0], [110, 40], [90, 40]], "setback_distance": 15}
        ],
        "assets": [
            {"asset_type": "warehouse", "count": 2, "width": 40, "length": 60},
            {"asset_type": "yard", "width": 30, "length": 30, "rotation_step_deg": 0}
        ],
        "elevation": {"origin": [0, 0], "cell_size": 50, "width": 4, "height": 3,
                      "values": [100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111]}
    }"#;

    #[test]
    fn test_parse_and_build() {
        let site = SiteRequest::from_json(REQUEST).unwrap().into_site().unwrap();
        assert_eq!(site.constraints.len(), 2);
        assert_eq!(site.terrain.zones().len(), 1);
        assert!(site.terrain.elevation_raster().is_some());
        assert_eq!(site.assets[0].count, 2);
        assert_eq!(site.assets[1].count, 1);
        assert_eq!(site.assets[1].rotation_step_deg, 0.0);

        let creek = site.constraints.get(&ConstraintId::new("creek")).unwrap();
        assert_eq!(creek.setback_distance, Some(15.0));
        assert_eq!(creek.priority, Priority::Critical);
    }

    #[test]
    fn test_bad_raster_rejected() {
        let mut request = SiteRequest::from_json(REQUEST).unwrap();
        if let Some(e) = request.elevation.as_mut() {
            e.values.pop();
        }
        assert!(matches!(request.into_site(), Err(LayoutError::InputGeometry { .. })));
    }

    #[test]
    fn test_self_intersecting_constraint_rejected() {
        let mut request = SiteRequest::from_json(REQUEST).unwrap();
        request.constraints[1].ring = vec![[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]];
        assert!(matches!(request.into_site(), Err(LayoutError::InputGeometry { .. })));
    }
}
