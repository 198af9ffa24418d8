pub mod cancel;
pub mod config;
pub mod error;
pub mod types;

pub use cancel::CancellationToken;
pub use config::{
    EngineConfig, FitnessWeights, NavigationConfig, OptimizationConfig, RadiusSchedule,
    RoadConfig, RoadSurface,
};
pub use error::{LayoutError, Result};
