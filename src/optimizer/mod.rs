//! Population-based search over asset arrangements

pub mod candidate;
pub mod fitness;
pub mod genetic;
pub mod operators;

pub use candidate::{Candidate, Population};
pub use fitness::{FitnessComponents, FitnessEvaluator, FitnessResult};
pub use genetic::{GenerationStats, GeneticOptimizer, OptimizationOutcome};
pub use operators::MutationParams;
