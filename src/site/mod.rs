//! Site inputs: parcel, terrain, asset requests and the JSON request schema

mod asset;
mod boundary;
mod request;
mod terrain;

pub use asset::{expand_slots, normalize_degrees, AssetSlot, AssetSpec, PlacedAsset};
pub use boundary::PropertyBoundary;
pub use request::{ConstraintRecord, ElevationRecord, SiteInput, SiteRequest, ZoneRecord};
pub use terrain::{BuildableZone, TerrainModel};
