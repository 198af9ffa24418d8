//! Requested and placed assets

use geo::{Centroid, Coord, Polygon};
use serde::{Deserialize, Serialize};

use crate::core::error::{LayoutError, Result};
use crate::core::types::AssetId;
use crate::spatial::geometry::rectangle_footprint;

fn default_count() -> usize {
    1
}

fn default_rotation_step() -> f64 {
    90.0
}

/// A request for `count` assets of one type with a rectangular footprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub asset_type: String,
    #[serde(default = "default_count")]
    pub count: usize,
    /// Footprint extent along x before rotation
    pub width: f64,
    /// Footprint extent along y before rotation
    pub length: f64,
    #[serde(default)]
    pub height: Option<f64>,
    /// Rotation granularity in degrees; 0 allows any rotation
    #[serde(default = "default_rotation_step")]
    pub rotation_step_deg: f64,
}

impl AssetSpec {
    pub fn new(asset_type: impl Into<String>, count: usize, width: f64, length: f64) -> Self {
        Self {
            asset_type: asset_type.into(),
            count,
            width,
            length,
            height: None,
            rotation_step_deg: default_rotation_step(),
        }
    }

    pub fn with_rotation_step(mut self, step_deg: f64) -> Self {
        self.rotation_step_deg = step_deg;
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.asset_type.is_empty() {
            return Err(LayoutError::Configuration("asset_type must not be empty".into()));
        }
        if !(self.width.is_finite() && self.width > 0.0 && self.length.is_finite() && self.length > 0.0)
        {
            return Err(LayoutError::Configuration(format!(
                "asset '{}' must have positive dimensions, got {} x {}",
                self.asset_type, self.width, self.length
            )));
        }
        if !self.rotation_step_deg.is_finite() || self.rotation_step_deg < 0.0 {
            return Err(LayoutError::Configuration(format!(
                "asset '{}' rotation_step_deg must be non-negative",
                self.asset_type
            )));
        }
        Ok(())
    }

    /// Snap a rotation to this spec's granularity, normalized to [0, 360)
    pub fn snap_rotation(&self, rotation_deg: f64) -> f64 {
        let snapped = if self.rotation_step_deg > 0.0 {
            (rotation_deg / self.rotation_step_deg).round() * self.rotation_step_deg
        } else {
            rotation_deg
        };
        normalize_degrees(snapped)
    }

    /// Place the `index`-th instance of this spec
    pub fn place(&self, index: usize, position: Coord, rotation_deg: f64) -> PlacedAsset {
        self.place_as(AssetId::for_slot(&self.asset_type, index), position, rotation_deg)
    }

    /// Place an instance of this spec under an explicit id
    pub fn place_as(&self, id: AssetId, position: Coord, rotation_deg: f64) -> PlacedAsset {
        PlacedAsset::new(
            id,
            &self.asset_type,
            self.width,
            self.length,
            position,
            self.snap_rotation(rotation_deg),
        )
        .with_height(self.height)
    }
}

/// Normalize an angle in degrees to [0, 360)
pub fn normalize_degrees(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// One slot of a candidate layout: which spec it instantiates and its id
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSlot {
    pub id: AssetId,
    pub spec_index: usize,
}

/// Expand requests into ordered slots; crossover aligns candidates by slot index
pub fn expand_slots(specs: &[AssetSpec]) -> Vec<AssetSlot> {
    specs
        .iter()
        .enumerate()
        .flat_map(|(spec_index, spec)| {
            (0..spec.count).map(move |i| AssetSlot {
                id: AssetId::for_slot(&spec.asset_type, i),
                spec_index,
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct PlacedAssetRecord {
    id: AssetId,
    asset_type: String,
    width: f64,
    length: f64,
    #[serde(default)]
    height: Option<f64>,
    position: [f64; 2],
    #[serde(default)]
    rotation: f64,
}

impl From<PlacedAssetRecord> for PlacedAsset {
    fn from(r: PlacedAssetRecord) -> Self {
        PlacedAsset::new(
            r.id,
            &r.asset_type,
            r.width,
            r.length,
            Coord {
                x: r.position[0],
                y: r.position[1],
            },
            r.rotation,
        )
        .with_height(r.height)
    }
}

/// An asset with a concrete position and rotation
///
/// The footprint is derived from position, rotation and dimensions and is
/// recomputed by every setter, so it can never be stale. Deserialization
/// ignores any stored footprint and rebuilds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlacedAssetRecord")]
pub struct PlacedAsset {
    id: AssetId,
    asset_type: String,
    width: f64,
    length: f64,
    height: Option<f64>,
    #[serde(serialize_with = "serialize_coord")]
    position: Coord,
    rotation: f64,
    footprint: Polygon<f64>,
}

fn serialize_coord<S: serde::Serializer>(c: &Coord, s: S) -> std::result::Result<S::Ok, S::Error> {
    [c.x, c.y].serialize(s)
}

impl PlacedAsset {
    pub fn new(
        id: AssetId,
        asset_type: &str,
        width: f64,
        length: f64,
        position: Coord,
        rotation_deg: f64,
    ) -> Self {
        let rotation = normalize_degrees(rotation_deg);
        Self {
            footprint: rectangle_footprint(position, width, length, rotation),
            id,
            asset_type: asset_type.to_string(),
            width,
            length,
            height: None,
            position,
            rotation,
        }
    }

    fn with_height(mut self, height: Option<f64>) -> Self {
        self.height = height;
        self
    }

    pub fn id(&self) -> &AssetId {
        &self.id
    }

    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    pub fn position(&self) -> Coord {
        self.position
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn footprint(&self) -> &Polygon<f64> {
        &self.footprint
    }

    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    pub fn centroid(&self) -> Coord {
        self.footprint
            .centroid()
            .map(|p| p.0)
            .unwrap_or(self.position)
    }

    /// The same placement under another id
    pub fn relabeled(&self, id: AssetId) -> Self {
        Self { id, ..self.clone() }
    }

    pub fn set_position(&mut self, position: Coord) {
        self.position = position;
        self.refresh_footprint();
    }

    pub fn set_rotation(&mut self, rotation_deg: f64) {
        self.rotation = normalize_degrees(rotation_deg);
        self.refresh_footprint();
    }

    pub fn place(&mut self, position: Coord, rotation_deg: f64) {
        self.position = position;
        self.rotation = normalize_degrees(rotation_deg);
        self.refresh_footprint();
    }

    fn refresh_footprint(&mut self) {
        self.footprint = rectangle_footprint(self.position, self.width, self.length, self.rotation);
    }
}
