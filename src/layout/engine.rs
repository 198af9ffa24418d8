//! End-to-end layout pipeline
//!
//! optimize → navigation graph → per-asset routes → road network → earthwork.
//! The site and config are read-only for the lifetime of the engine; every
//! run builds its own validator, population and graph.

use geo::Coord;
use tracing::{info, warn};

use super::earthwork::{EarthworkEstimator, PadGradingEstimator};
use super::result::{sort_violations, LayoutResult, UnconnectedAsset};
use crate::constraints::CollisionValidator;
use crate::core::cancel::CancellationToken;
use crate::core::config::EngineConfig;
use crate::core::error::{LayoutError, Result};
use crate::navigation::{route_assets, NavigationGraph, Unreachable};
use crate::optimizer::{FitnessEvaluator, GeneticOptimizer, OptimizationOutcome};
use crate::roads::RoadNetworkBuilder;
use crate::site::{PlacedAsset, SiteInput, SiteRequest};
use crate::spatial::geometry::point_polygon_distance;

/// How far outside the parcel the entrance may sit, as a fraction of the
/// parcel diagonal
const ENTRANCE_TOLERANCE: f64 = 0.1;

pub struct SiteLayoutEngine {
    site: SiteInput,
    config: EngineConfig,
    entrance: Coord,
    estimator: Box<dyn EarthworkEstimator>,
}

impl SiteLayoutEngine {
    /// Validate the config against the site; nothing runs on bad input
    pub fn new(site: SiteInput, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if site.assets.is_empty() {
            return Err(LayoutError::Configuration("no assets requested".into()));
        }
        for spec in &site.assets {
            spec.validate()?;
        }

        let [x, y] = config
            .optimization
            .entrance_point
            .ok_or_else(|| LayoutError::Configuration("entrance_point is required".into()))?;
        let entrance = Coord { x, y };
        let offset = point_polygon_distance(entrance, site.boundary.polygon());
        let tolerance = ENTRANCE_TOLERANCE * site.boundary.diagonal();
        if offset > tolerance {
            return Err(LayoutError::Configuration(format!(
                "entrance_point [{x}, {y}] is {offset:.1} from the parcel, more than {tolerance:.1}"
            )));
        }

        Ok(Self {
            site,
            config,
            entrance,
            estimator: Box::new(PadGradingEstimator::default()),
        })
    }

    /// Build from a JSON request; its entrance, if any, overrides the config
    pub fn from_request(request: SiteRequest, mut config: EngineConfig) -> Result<Self> {
        if let Some(entrance) = request.entrance {
            config.optimization.entrance_point = Some(entrance);
        }
        Self::new(request.into_site()?, config)
    }

    pub fn with_earthwork_estimator(mut self, estimator: impl EarthworkEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn site(&self) -> &SiteInput {
        &self.site
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entrance(&self) -> Coord {
        self.entrance
    }

    /// Optimize from scratch and build roads for the best arrangement
    pub fn generate(&self, cancel: &CancellationToken) -> LayoutResult {
        info!(
            assets = self.site.assets.iter().map(|s| s.count).sum::<usize>(),
            constraints = self.site.constraints.len(),
            seed = self.config.optimization.seed,
            "Generating layout"
        );
        let outcome = self.optimizer().run(cancel);
        self.finish(outcome, cancel)
    }

    /// Refine an edited arrangement, usually `LayoutResult::assets` after
    /// manual changes
    ///
    /// The result scores at least as well as the seed. Seed assets take the
    /// ids of the slots they fill. Fails with `SeedMismatch` if the seed's
    /// asset types, counts or dimensions differ from the request, or if it
    /// repeats an id.
    pub fn reoptimize(&self, seed: Vec<PlacedAsset>, cancel: &CancellationToken) -> Result<LayoutResult> {
        info!(assets = seed.len(), "Re-optimizing edited layout");
        let outcome = self.optimizer().refine(seed, cancel)?;
        Ok(self.finish(outcome, cancel))
    }

    /// Score an arrangement without searching
    pub fn evaluate(&self, assets: &[PlacedAsset]) -> crate::optimizer::FitnessResult {
        self.evaluator().score(assets)
    }

    fn evaluator(&self) -> FitnessEvaluator<'_> {
        let opt = &self.config.optimization;
        let validator = CollisionValidator::new(&self.site.constraints, &self.site.boundary, opt.min_spacing);
        FitnessEvaluator::new(validator, &self.site.terrain, opt.fitness_weights, self.entrance)
    }

    fn optimizer(&self) -> GeneticOptimizer<'_> {
        GeneticOptimizer::new(&self.config.optimization, &self.site.assets, self.evaluator())
    }

    fn finish(&self, outcome: OptimizationOutcome, cancel: &CancellationToken) -> LayoutResult {
        let opt = &self.config.optimization;
        let mut graph = NavigationGraph::build(
            &self.site,
            &outcome.best,
            self.entrance,
            &self.config.navigation,
            opt.max_grade_percent,
        );
        let routing = route_assets(&mut graph, &self.config.navigation, opt.parallel, cancel);
        let road_network = RoadNetworkBuilder::new(&self.config.roads, graph.cell_size(), opt.max_grade_percent)
            .build(&graph, &routing.routes);

        let mut unconnected: Vec<UnconnectedAsset> = Vec::new();
        for route in &routing.routes {
            match &route.result {
                Err(reason) => unconnected.push(UnconnectedAsset::new(route.asset_id.clone(), *reason)),
                Ok(_) if !road_network.is_asset_connected(&route.asset_id) => {
                    warn!(asset = %route.asset_id, "Routed asset lost its road during merging");
                    unconnected.push(UnconnectedAsset::new(route.asset_id.clone(), Unreachable::Blocked));
                }
                Ok(_) => {}
            }
        }

        let earthwork = self.estimator.estimate(&self.site.terrain, &outcome.best);
        let mut violations = outcome.fitness.violations.clone();
        sort_violations(&mut violations);

        let cancelled = outcome.cancelled || routing.cancelled;
        info!(
            fitness = outcome.fitness.total,
            feasible = outcome.feasible,
            road_length = road_network.total_length(),
            segments = road_network.segments.len(),
            unconnected = unconnected.len(),
            cut = earthwork.total_cut,
            fill = earthwork.total_fill,
            cancelled,
            "Layout complete"
        );
        if !outcome.feasible {
            warn!(
                violations = violations.iter().filter(|v| v.is_blocking()).count(),
                "Layout is infeasible; see violations for the constraints to relax"
            );
        }

        LayoutResult {
            unconnected_asset_ids: unconnected.iter().map(|u| u.asset_id.clone()).collect(),
            unconnected,
            assets: outcome.best,
            road_network,
            fitness: outcome.fitness,
            feasible: outcome.feasible,
            generations_run: outcome.generations_run,
            converged: outcome.converged,
            cancelled,
            violations,
            fitness_history: outcome.history,
            earthwork,
            switchbacks: routing.switchbacks,
        }
    }
}
