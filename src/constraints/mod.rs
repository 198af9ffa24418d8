//! Constraint model, spatial index and collision checks

mod collision;
mod constraint;
mod store;

pub use collision::{CollisionValidator, PlacementCheck, Violation, ViolationKind};
pub use constraint::{ClearanceRule, Constraint, ConstraintType, Priority, Severity};
pub use store::ConstraintStore;
