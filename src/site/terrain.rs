//! Terrain data supplied by the terrain collaborator
//!
//! Buildable zones carry per-zone mean slope and elevation. An optional
//! elevation raster gives finer detail; when present it takes precedence for
//! elevation and slope lookups inside its extent.

use geo::{Contains, Coord, Polygon};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::spatial::validation::GeometricValidator;
use crate::spatial::Grid;

/// Contiguous region meeting the slope/elevation criteria for building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildableZone {
    pub id: String,
    pub polygon: Polygon<f64>,
    pub mean_slope_percent: f64,
    pub mean_elevation: f64,
}

/// Read-only terrain view used by fitness scoring and the navigation graph
#[derive(Debug, Clone, Default)]
pub struct TerrainModel {
    zones: Vec<BuildableZone>,
    elevation: Option<Grid<f64>>,
}

impl TerrainModel {
    /// Terrain with no zones and no raster: everything is flat and buildable
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn new(zones: Vec<BuildableZone>) -> Result<Self> {
        for zone in &zones {
            GeometricValidator::require_valid(&format!("buildable zone {}", zone.id), &zone.polygon)?;
        }
        Ok(Self {
            zones,
            elevation: None,
        })
    }

    pub fn with_elevation(mut self, raster: Grid<f64>) -> Self {
        self.elevation = Some(raster);
        self
    }

    pub fn zones(&self) -> &[BuildableZone] {
        &self.zones
    }

    pub fn elevation_raster(&self) -> Option<&Grid<f64>> {
        self.elevation.as_ref()
    }

    /// True when any terrain information was supplied
    pub fn has_data(&self) -> bool {
        !self.zones.is_empty() || self.elevation.is_some()
    }

    /// First zone containing the point
    pub fn zone_at(&self, point: Coord) -> Option<&BuildableZone> {
        self.zones.iter().find(|z| z.polygon.contains(&point))
    }

    /// Whether a point is buildable; with no zones supplied, everything is
    pub fn is_buildable(&self, point: Coord) -> bool {
        self.zones.is_empty() || self.zone_at(point).is_some()
    }

    /// Elevation: raster, then containing zone mean, then 0
    pub fn elevation_at(&self, point: Coord) -> f64 {
        if let Some(z) = self
            .elevation
            .as_ref()
            .filter(|raster| raster.covers(point))
            .and_then(|raster| raster.sample_bilinear(point))
        {
            return z;
        }
        self.zone_at(point).map(|z| z.mean_elevation).unwrap_or(0.0)
    }

    /// Local slope in percent, `None` where no terrain information applies
    pub fn slope_at(&self, point: Coord) -> Option<f64> {
        if let Some(slope) = self
            .elevation
            .as_ref()
            .filter(|raster| raster.covers(point))
            .and_then(|raster| raster.slope_percent_at(point))
        {
            return Some(slope);
        }
        self.zone_at(point).map(|z| z.mean_slope_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::geometry::ring_to_polygon;

    fn zone(id: &str, ring: &[[f64; 2]], slope: f64, elevation: f64) -> BuildableZone {
        BuildableZone {
            id: id.into(),
            polygon: ring_to_polygon(ring),
            mean_slope_percent: slope,
            mean_elevation: elevation,
        }
    }

    #[test]
    fn test_flat_terrain() {
        let terrain = TerrainModel::flat();
        let p = Coord { x: 3.0, y: 4.0 };
        assert!(!terrain.has_data());
        assert!(terrain.is_buildable(p));
        assert_eq!(terrain.elevation_at(p), 0.0);
        assert_eq!(terrain.slope_at(p), None);
    }

    #[test]
    fn test_zone_lookup() {
        let terrain = TerrainModel::new(vec![zone(
            "pad",
            &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            2.5,
            100.0,
        )])
        .unwrap();
        let inside = Coord { x: 5.0, y: 5.0 };
        let outside = Coord { x: 50.0, y: 5.0 };
        assert_eq!(terrain.slope_at(inside), Some(2.5));
        assert_eq!(terrain.elevation_at(inside), 100.0);
        assert!(!terrain.is_buildable(outside));
        assert_eq!(terrain.slope_at(outside), None);
    }

    #[test]
    fn test_raster_takes_precedence() {
        let raster = Grid::from_rows(2, 1, 10.0, [0.0, 0.0], vec![0.0, 10.0]).unwrap();
        let terrain = TerrainModel::new(vec![zone(
            "pad",
            &[[0.0, 0.0], [20.0, 0.0], [20.0, 10.0], [0.0, 10.0]],
            0.0,
            500.0,
        )])
        .unwrap()
        .with_elevation(raster);
        let z = terrain.elevation_at(Coord { x: 10.0, y: 5.0 });
        assert!((z - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_zone_rejected() {
        let result = TerrainModel::new(vec![zone(
            "bad",
            &[[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]],
            0.0,
            0.0,
        )]);
        assert!(result.is_err());
    }
}
