//! Full layout pipeline and its result

mod earthwork;
mod engine;
mod result;

pub use earthwork::{AssetEarthwork, EarthworkEstimator, EarthworkSummary, PadGradingEstimator};
pub use engine::SiteLayoutEngine;
pub use result::{LayoutResult, UnconnectedAsset};
