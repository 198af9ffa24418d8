//! Engine configuration with documented defaults
//!
//! Every tunable of the optimizer, the navigation graph and the road builder
//! lives here. All sections deserialize from TOML with per-field defaults, so a
//! config file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{LayoutError, Result};

/// Tolerance on the fitness weights summing to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Top-level configuration for one layout run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub optimization: OptimizationConfig,
    pub navigation: NavigationConfig,
    pub roads: RoadConfig,
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML config file without validating it
    ///
    /// For callers that fill in required values (such as the entrance from a
    /// site request) before handing the config to the engine, which validates.
    pub fn load_unchecked(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Parse and validate a TOML config string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section. Run before any search starts.
    pub fn validate(&self) -> Result<()> {
        self.optimization.validate()?;
        self.navigation.validate()?;
        self.roads.validate()?;
        Ok(())
    }
}

/// Relative weights of the fitness components
///
/// Must be non-negative and sum to 1.0. The violation weight scales only the
/// soft (WARNING/PREFERENCE) penalty; BLOCKING violations are penalized
/// independently of the weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub violation: f64,
    pub earthwork: f64,
    pub accessibility: f64,
    pub compactness: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            violation: 0.4,
            earthwork: 0.25,
            accessibility: 0.2,
            compactness: 0.15,
        }
    }
}

impl FitnessWeights {
    pub fn sum(&self) -> f64 {
        self.violation + self.earthwork + self.accessibility + self.compactness
    }

    fn validate(&self) -> Result<()> {
        let all = [
            ("violation", self.violation),
            ("earthwork", self.earthwork),
            ("accessibility", self.accessibility),
            ("compactness", self.compactness),
        ];
        for (name, value) in all {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::Configuration(format!(
                    "fitness weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(LayoutError::Configuration(format!(
                "fitness weights must sum to 1.0, got {sum:.6}"
            )));
        }
        Ok(())
    }
}

/// How the mutation radius evolves across generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusSchedule {
    /// Radius stays at `mutation_radius` for the whole run
    Fixed,
    /// Linear decay from `mutation_radius` to 10% of it at `max_generations`
    #[default]
    LinearDecay,
}

/// Genetic search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    // === POPULATION ===
    /// Candidates per generation (constant across generations)
    pub population_size: usize,

    /// Hard cap on generations
    pub max_generations: usize,

    /// Stop after this many generations without an improvement above `epsilon`
    pub patience: usize,

    /// Minimum best-fitness gain that counts as improvement
    pub epsilon: f64,

    // === OPERATORS ===
    /// Per-asset probability of applying a mutation operator
    pub mutation_rate: f64,

    /// Maximum positional jitter of a move mutation (site units)
    ///
    /// Decays according to `radius_schedule`.
    pub mutation_radius: f64,

    /// Radius annealing policy
    pub radius_schedule: RadiusSchedule,

    /// Maximum rotation jitter of a rotate mutation (degrees)
    pub rotation_jitter_deg: f64,

    /// Probability that two selected parents are recombined rather than the
    /// fitter one being copied
    pub crossover_rate: f64,

    /// Candidates sampled per tournament
    pub tournament_size: usize,

    /// Top candidates copied unmutated into the next generation
    ///
    /// Must be at least 1 so the best fitness never decreases.
    pub elite_count: usize,

    /// Reject-and-resample attempts per asset when seeding
    ///
    /// After this many overlapping draws the last draw is kept as a penalized
    /// seed so the population is never empty.
    pub placement_attempts: usize,

    // === PLACEMENT RULES ===
    /// Minimum clearance between any two asset footprints, and default
    /// clearance for BLOCKING constraints without their own setback
    pub min_spacing: f64,

    /// Weights of the fitness components
    pub fitness_weights: FitnessWeights,

    // === SITE ===
    /// Maximum road grade in percent (rise over run × 100)
    pub max_grade_percent: f64,

    /// Site entrance; roads start here and accessibility is measured from it
    pub entrance_point: Option<[f64; 2]>,

    // === EXECUTION ===
    /// Seed of the optimizer RNG
    pub seed: u64,

    /// Evaluate fitness and run path searches on the rayon pool
    pub parallel: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            max_generations: 120,
            patience: 25,
            epsilon: 1e-4,

            mutation_rate: 0.3,
            mutation_radius: 20.0,
            radius_schedule: RadiusSchedule::LinearDecay,
            rotation_jitter_deg: 45.0,
            crossover_rate: 0.9,
            tournament_size: 3,
            elite_count: 2,
            placement_attempts: 25,

            min_spacing: 0.0,
            fitness_weights: FitnessWeights::default(),

            max_grade_percent: 10.0,
            entrance_point: None,

            seed: 42,
            parallel: true,
        }
    }
}

impl OptimizationConfig {
    /// Mutation radius to use in `generation` under the configured schedule
    pub fn radius_at(&self, generation: usize) -> f64 {
        match self.radius_schedule {
            RadiusSchedule::Fixed => self.mutation_radius,
            RadiusSchedule::LinearDecay => {
                let span = self.max_generations.max(1) as f64;
                let t = (generation as f64 / span).clamp(0.0, 1.0);
                self.mutation_radius * (1.0 - 0.9 * t)
            }
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(LayoutError::Configuration(msg));

        if self.population_size < 2 {
            return fail(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            ));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return fail(format!(
                "tournament_size ({}) must be in 1..={}",
                self.tournament_size, self.population_size
            ));
        }
        if self.elite_count == 0 || self.elite_count >= self.population_size {
            return fail(format!(
                "elite_count ({}) must be in 1..{}",
                self.elite_count, self.population_size
            ));
        }
        for (name, rate) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return fail(format!("{name} must be within [0, 1], got {rate}"));
            }
        }
        for (name, value) in [
            ("mutation_radius", self.mutation_radius),
            ("rotation_jitter_deg", self.rotation_jitter_deg),
            ("min_spacing", self.min_spacing),
            ("epsilon", self.epsilon),
        ] {
            if !value.is_finite() || value < 0.0 {
                return fail(format!("{name} must be non-negative, got {value}"));
            }
        }
        if !self.max_grade_percent.is_finite() || self.max_grade_percent <= 0.0 {
            return fail(format!(
                "max_grade_percent must be positive, got {}",
                self.max_grade_percent
            ));
        }
        match self.entrance_point {
            None => return fail("entrance_point is required".into()),
            Some([x, y]) if !x.is_finite() || !y.is_finite() => {
                return fail(format!("entrance_point must be finite, got [{x}, {y}]"));
            }
            Some(_) => {}
        }

        self.fitness_weights.validate()
    }
}

/// Navigation grid and grade cost model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Grid spacing of navigation nodes (site units)
    pub cell_size: f64,

    /// Upper bound on node count; the cell size grows to respect it on large sites
    pub max_nodes: usize,

    /// Steepness of the grade penalty: cost multiplier at the grade limit is
    /// `1 + grade_penalty_weight`
    pub grade_penalty_weight: f64,

    /// Extra cost multiplier for cells outside every buildable zone
    pub off_zone_penalty: f64,

    /// Lateral offset of switchback legs; `None` means twice the cell size
    pub switchback_width: Option<f64>,

    /// Most legs a single switchback may use
    pub max_switchback_legs: usize,

    /// Steepest terrain a switchback may traverse, as a multiple of the grade limit
    pub max_switchback_ratio: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            cell_size: 5.0,
            max_nodes: 40_000,
            grade_penalty_weight: 4.0,
            off_zone_penalty: 0.5,
            switchback_width: None,
            max_switchback_legs: 12,
            max_switchback_ratio: 4.0,
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(LayoutError::Configuration(format!(
                "navigation.cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.max_nodes < 4 {
            return Err(LayoutError::Configuration(
                "navigation.max_nodes must be at least 4".into(),
            ));
        }
        let penalty_ok = |p: f64| p.is_finite() && p >= 0.0;
        if !penalty_ok(self.grade_penalty_weight) || !penalty_ok(self.off_zone_penalty) {
            return Err(LayoutError::Configuration(
                "navigation penalties must be finite and non-negative".into(),
            ));
        }
        if let Some(width) = self.switchback_width {
            if !width.is_finite() || width <= 0.0 {
                return Err(LayoutError::Configuration(format!(
                    "navigation.switchback_width must be positive, got {width}"
                )));
            }
        }
        if !self.max_switchback_ratio.is_finite() || self.max_switchback_ratio < 1.0 {
            return Err(LayoutError::Configuration(format!(
                "navigation.max_switchback_ratio must be >= 1, got {}",
                self.max_switchback_ratio
            )));
        }
        Ok(())
    }
}

/// Road surface material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadSurface {
    Gravel,
    #[default]
    Asphalt,
    Concrete,
}

/// Road network parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Carriageway width (site units)
    pub width: f64,

    pub surface: RoadSurface,

    /// Path vertices closer than this are merged onto one shared vertex;
    /// `None` means 0.75 × the navigation cell size
    pub snap_tolerance: Option<f64>,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            width: 24.0,
            surface: RoadSurface::Asphalt,
            snap_tolerance: None,
        }
    }
}

impl RoadConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err(LayoutError::Configuration(format!(
                "roads.width must be positive, got {}",
                self.width
            )));
        }
        if let Some(tol) = self.snap_tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(LayoutError::Configuration(format!(
                    "roads.snap_tolerance must be non-negative, got {tol}"
                )));
            }
        }
        Ok(())
    }
}
