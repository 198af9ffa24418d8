//! Cut and fill estimate for the selected layout
//!
//! Only run once per result; the optimizer uses the cheap slope proxy instead.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::core::types::AssetId;
use crate::site::{PlacedAsset, TerrainModel};

/// Samples per footprint axis when no raster sets the spacing
const DEFAULT_SAMPLES_PER_AXIS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEarthwork {
    pub asset_id: AssetId,
    /// Finished pad elevation
    pub pad_elevation: f64,
    /// Volume removed above the pad
    pub cut: f64,
    /// Volume added below the pad
    pub fill: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarthworkSummary {
    pub assets: Vec<AssetEarthwork>,
    pub total_cut: f64,
    pub total_fill: f64,
}

impl EarthworkSummary {
    /// Positive when the site exports material
    pub fn net(&self) -> f64 {
        self.total_cut - self.total_fill
    }
}

pub trait EarthworkEstimator: Send + Sync {
    fn estimate(&self, terrain: &TerrainModel, assets: &[PlacedAsset]) -> EarthworkSummary;
}

/// Flat pad at the mean ground elevation under each footprint
#[derive(Debug, Clone, Copy, Default)]
pub struct PadGradingEstimator {
    /// Sample spacing; defaults to the raster cell size, or an eighth of
    /// the footprint without a raster
    pub sample_spacing: Option<f64>,
}

impl PadGradingEstimator {
    fn samples_for(&self, terrain: &TerrainModel, extent: f64) -> usize {
        let spacing = self
            .sample_spacing
            .or_else(|| terrain.elevation_raster().map(|r| r.cell_size))
            .filter(|s| *s > 0.0);
        match spacing {
            Some(s) => ((extent / s).ceil() as usize).clamp(1, 256),
            None => DEFAULT_SAMPLES_PER_AXIS,
        }
    }

    fn asset(&self, terrain: &TerrainModel, asset: &PlacedAsset) -> AssetEarthwork {
        let nx = self.samples_for(terrain, asset.width());
        let ny = self.samples_for(terrain, asset.length());
        let (sx, sy) = (asset.width() / nx as f64, asset.length() / ny as f64);
        let (sin, cos) = asset.rotation().to_radians().sin_cos();
        let center = asset.position();

        let mut heights = Vec::with_capacity(nx * ny);
        for i in 0..nx {
            for j in 0..ny {
                let lx = -asset.width() / 2.0 + (i as f64 + 0.5) * sx;
                let ly = -asset.length() / 2.0 + (j as f64 + 0.5) * sy;
                let p = Coord {
                    x: center.x + lx * cos - ly * sin,
                    y: center.y + lx * sin + ly * cos,
                };
                heights.push(terrain.elevation_at(p));
            }
        }

        let pad = heights.iter().sum::<f64>() / heights.len() as f64;
        let cell_area = sx * sy;
        let (mut cut, mut fill) = (0.0, 0.0);
        for z in heights {
            if z > pad {
                cut += (z - pad) * cell_area;
            } else {
                fill += (pad - z) * cell_area;
            }
        }
        AssetEarthwork {
            asset_id: asset.id().clone(),
            pad_elevation: pad,
            cut,
            fill,
        }
    }
}

impl EarthworkEstimator for PadGradingEstimator {
    fn estimate(&self, terrain: &TerrainModel, assets: &[PlacedAsset]) -> EarthworkSummary {
        let assets: Vec<AssetEarthwork> = assets.iter().map(|a| self.asset(terrain, a)).collect();
        EarthworkSummary {
            total_cut: assets.iter().map(|a| a.cut).sum(),
            total_fill: assets.iter().map(|a| a.fill).sum(),
            assets,
        }
    }
}
