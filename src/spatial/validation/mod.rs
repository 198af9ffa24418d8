//! Load-time validation of boundary, zone and constraint geometry

mod geometric;

pub use geometric::GeometricValidator;

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InsufficientVertices { ring: usize, count: usize, minimum: usize },
    NonFiniteCoordinate { ring: usize, coordinate: [f64; 2] },
    ZeroArea,
    SelfIntersecting { ring: usize, description: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientVertices { ring, count, minimum } => {
                write!(f, "ring {ring} has {count} distinct vertices, need {minimum}")
            }
            Self::NonFiniteCoordinate { ring, coordinate } => {
                write!(f, "ring {ring} has non-finite coordinate {coordinate:?}")
            }
            Self::ZeroArea => write!(f, "polygon has zero area"),
            Self::SelfIntersecting { ring, description } => {
                write!(f, "ring {ring} is not simple: {description}")
            }
        }
    }
}
