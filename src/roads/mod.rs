//! Road network assembly from per-asset paths

pub mod network;

pub use crate::core::config::RoadSurface;
pub use network::{AssetAccess, RoadNetwork, RoadNetworkBuilder, RoadSegment, RoadVertex};
