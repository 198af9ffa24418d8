//! Candidate scoring
//!
//! Four normalized components in [0, 1] are combined by the configured
//! weights. BLOCKING violations are subtracted as a separate term that is
//! always larger than the whole weighted range, so every feasible arrangement
//! outranks every infeasible one whatever the weights are.

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::constraints::{CollisionValidator, Violation};
use crate::core::config::FitnessWeights;
use crate::core::types::distance;
use crate::site::{PlacedAsset, TerrainModel};
use crate::spatial::geometry::{rect_diagonal, union_bounds};

/// Scale of the BLOCKING penalty. With the lowest priority weight (0.5) a
/// single violation costs 10 * 0.5^1.5 ≈ 3.54, above the weighted range of 2.
pub const BLOCKING_PENALTY_SCALE: f64 = 10.0;

/// Local slope at which a placement earns no earthwork credit
pub const EARTHWORK_SLOPE_CAP_PERCENT: f64 = 20.0;

/// Normalized component scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessComponents {
    /// Penalty applied for violations; 0 when nothing is violated
    pub violation_penalty: f64,
    /// 1.0 on flat ground, 0.0 at or above the slope cap
    pub earthwork_proxy: f64,
    /// 1.0 when every asset sits on the entrance
    pub accessibility: f64,
    /// 1.0 for a zero-extent arrangement
    pub compactness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessResult {
    /// Weighted score minus the BLOCKING penalty; higher is better
    pub total: f64,
    /// Weighted score before the BLOCKING penalty
    pub raw: f64,
    pub components: FitnessComponents,
    pub blocking_count: usize,
    pub violations: Vec<Violation>,
}

impl FitnessResult {
    pub fn is_feasible(&self) -> bool {
        self.blocking_count == 0
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Ranking order, best first: higher total, then fewer violations, then
    /// higher raw score. Callers break remaining ties by candidate id.
    ///
    /// Every key is compared exactly so the order stays total for sorting.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .total
            .total_cmp(&self.total)
            .then_with(|| self.violation_count().cmp(&other.violation_count()))
            .then_with(|| other.raw.total_cmp(&self.raw))
    }
}

/// Scores arrangements; shared read-only across the rayon pool
#[derive(Debug, Clone, Copy)]
pub struct FitnessEvaluator<'a> {
    validator: CollisionValidator<'a>,
    terrain: &'a TerrainModel,
    weights: FitnessWeights,
    entrance: Coord,
    site_diagonal: f64,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(
        validator: CollisionValidator<'a>,
        terrain: &'a TerrainModel,
        weights: FitnessWeights,
        entrance: Coord,
    ) -> Self {
        let site_diagonal = validator.boundary().diagonal().max(f64::EPSILON);
        Self {
            validator,
            terrain,
            weights,
            entrance,
            site_diagonal,
        }
    }

    pub fn validator(&self) -> &CollisionValidator<'a> {
        &self.validator
    }

    pub fn score(&self, assets: &[PlacedAsset]) -> FitnessResult {
        let violations = self.validator.check_arrangement(assets);

        let mut blocking_count = 0;
        let mut blocking_weight = 0.0;
        let mut soft_sum = 0.0;
        for v in &violations {
            if v.is_blocking() {
                blocking_count += 1;
                blocking_weight += v.priority().weight();
            } else {
                soft_sum += v.severity().soft_penalty() * v.priority().weight();
            }
        }
        let soft_norm = 1.0 - (-soft_sum).exp();
        let blocking_term = if blocking_count > 0 {
            BLOCKING_PENALTY_SCALE * f64::powf(blocking_weight, 1.5)
        } else {
            0.0
        };

        let earthwork_proxy = self.earthwork_proxy(assets);
        let accessibility = self.accessibility(assets);
        let compactness = self.compactness(assets);

        let w = &self.weights;
        let raw = w.earthwork * earthwork_proxy
            + w.accessibility * accessibility
            + w.compactness * compactness
            + w.violation * (1.0 - soft_norm);

        FitnessResult {
            total: raw - blocking_term,
            raw,
            components: FitnessComponents {
                violation_penalty: blocking_term + soft_norm,
                earthwork_proxy,
                accessibility,
                compactness,
            },
            blocking_count,
            violations,
        }
    }

    /// Mean slope credit over each footprint's centroid and corners
    fn earthwork_proxy(&self, assets: &[PlacedAsset]) -> f64 {
        if assets.is_empty() || !self.terrain.has_data() {
            return 1.0;
        }
        let per_asset = assets.iter().map(|asset| {
            let corners = asset.footprint().exterior().0.iter().take(4).copied();
            let samples: Vec<Coord> = std::iter::once(asset.centroid()).chain(corners).collect();
            let mean_slope = samples
                .iter()
                .map(|&p| {
                    self.terrain
                        .slope_at(p)
                        .unwrap_or(EARTHWORK_SLOPE_CAP_PERCENT)
                        .abs()
                })
                .sum::<f64>()
                / samples.len() as f64;
            1.0 - (mean_slope / EARTHWORK_SLOPE_CAP_PERCENT).min(1.0)
        });
        per_asset.sum::<f64>() / assets.len() as f64
    }

    fn accessibility(&self, assets: &[PlacedAsset]) -> f64 {
        if assets.is_empty() {
            return 1.0;
        }
        let mean = assets
            .iter()
            .map(|a| distance(a.centroid(), self.entrance))
            .sum::<f64>()
            / assets.len() as f64;
        1.0 - (mean / self.site_diagonal).min(1.0)
    }

    fn compactness(&self, assets: &[PlacedAsset]) -> f64 {
        match union_bounds(assets.iter().map(|a| a.footprint())) {
            Some(bounds) => 1.0 - (rect_diagonal(&bounds) / self.site_diagonal).min(1.0),
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Constraint, ConstraintStore, ConstraintType, Severity};
    use crate::site::{AssetSpec, BuildableZone, PropertyBoundary};
    use crate::spatial::geometry::ring_to_polygon;

    fn boundary() -> PropertyBoundary {
        PropertyBoundary::rectangle([0.0, 0.0], [100.0, 100.0]).unwrap()
    }

    fn at(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_unconstrained_asset_has_no_penalty() {
        let boundary = boundary();
        let store = ConstraintStore::new();
        let terrain = TerrainModel::flat();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let evaluator = FitnessEvaluator::new(validator, &terrain, FitnessWeights::default(), at(0.0, 0.0));

        let asset = AssetSpec::new("shed", 1, 10.0, 10.0).place(0, at(50.0, 50.0), 0.0);
        let result = evaluator.score(&[asset]);
        assert!(result.is_feasible());
        assert_eq!(result.components.violation_penalty, 0.0);
        assert_eq!(result.components.earthwork_proxy, 1.0);
        assert!(result.total > 0.0 && result.total <= 1.0);
    }

    #[test]
    fn test_blocking_violation_dominates() {
        let boundary = boundary();
        let store = ConstraintStore::from_constraints([Constraint::new(
            "pond",
            ConstraintType::Water,
            ring_to_polygon(&[[0.0, 0.0], [20.0, 0.0], [20.0, 20.0], [0.0, 20.0]]),
        )])
        .unwrap();
        let terrain = TerrainModel::flat();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        // Accessibility only, so the infeasible asset next to the entrance would win without the penalty
        let weights = FitnessWeights {
            violation: 0.0,
            earthwork: 0.0,
            accessibility: 1.0,
            compactness: 0.0,
        };
        let evaluator = FitnessEvaluator::new(validator, &terrain, weights, at(0.0, 0.0));
        let spec = AssetSpec::new("shed", 1, 6.0, 6.0);

        let in_pond = evaluator.score(&[spec.place(0, at(10.0, 10.0), 0.0)]);
        let far_away = evaluator.score(&[spec.place(0, at(95.0, 95.0), 0.0)]);
        assert!(!in_pond.is_feasible());
        assert!(far_away.is_feasible());
        assert!(far_away.total > in_pond.total);
        assert_eq!(far_away.rank_cmp(&in_pond), Ordering::Less);
    }

    #[test]
    fn test_rank_order_is_total_for_near_ties() {
        let result = |total: f64, violations: usize| FitnessResult {
            total,
            raw: total,
            components: FitnessComponents::default(),
            blocking_count: 0,
            violations: (0..violations)
                .map(|i| Violation {
                    asset_id: crate::core::types::AssetId::for_slot("shed", i),
                    kind: crate::constraints::ViolationKind::Constraint {
                        constraint_id: crate::core::types::ConstraintId::new("flood"),
                        constraint_type: ConstraintType::Floodplain,
                        severity: Severity::Warning,
                        priority: crate::constraints::Priority::Low,
                    },
                })
                .collect(),
        };
        // Totals a hair apart with violation counts running the other way
        let a = result(1.0, 2);
        let b = result(1.0 + 6e-13, 1);
        let c = result(1.0 + 1.2e-12, 0);
        let d = result(1.0 + 1.2e-12, 3);
        assert!(c.rank_cmp(&b).is_lt());
        assert!(b.rank_cmp(&a).is_lt());
        assert!(c.rank_cmp(&a).is_lt());
        assert!(c.rank_cmp(&d).is_lt());

        let mut ranked = vec![a.clone(), d.clone(), b.clone(), c.clone()];
        ranked.sort_by(|x, y| x.rank_cmp(y));
        assert_eq!(ranked, vec![c, d, b, a]);
    }

    #[test]
    fn test_soft_violation_lowers_score_but_stays_feasible() {
        let boundary = boundary();
        let store = ConstraintStore::from_constraints([Constraint::new(
            "flood",
            ConstraintType::Floodplain,
            ring_to_polygon(&[[0.0, 0.0], [50.0, 0.0], [50.0, 100.0], [0.0, 100.0]]),
        )
        .with_severity(Severity::Warning)])
        .unwrap();
        let terrain = TerrainModel::flat();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let evaluator = FitnessEvaluator::new(validator, &terrain, FitnessWeights::default(), at(50.0, 50.0));
        let spec = AssetSpec::new("shed", 1, 6.0, 6.0);

        let wet = evaluator.score(&[spec.place(0, at(40.0, 50.0), 0.0)]);
        let dry = evaluator.score(&[spec.place(0, at(60.0, 50.0), 0.0)]);
        assert!(wet.is_feasible());
        assert_eq!(wet.violation_count(), 1);
        assert!(wet.components.violation_penalty > 0.0);
        assert!(dry.total > wet.total);
    }

    #[test]
    fn test_earthwork_prefers_flat_zone() {
        let boundary = boundary();
        let store = ConstraintStore::new();
        let terrain = TerrainModel::new(vec![
            BuildableZone {
                id: "flat".into(),
                polygon: ring_to_polygon(&[[0.0, 0.0], [50.0, 0.0], [50.0, 100.0], [0.0, 100.0]]),
                mean_slope_percent: 1.0,
                mean_elevation: 100.0,
            },
            BuildableZone {
                id: "steep".into(),
                polygon: ring_to_polygon(&[[50.0, 0.0], [100.0, 0.0], [100.0, 100.0], [50.0, 100.0]]),
                mean_slope_percent: 15.0,
                mean_elevation: 110.0,
            },
        ])
        .unwrap();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let evaluator = FitnessEvaluator::new(validator, &terrain, FitnessWeights::default(), at(50.0, 50.0));
        let spec = AssetSpec::new("shed", 1, 6.0, 6.0);

        let flat = evaluator.score(&[spec.place(0, at(25.0, 50.0), 0.0)]);
        let steep = evaluator.score(&[spec.place(0, at(75.0, 50.0), 0.0)]);
        assert!(flat.components.earthwork_proxy > steep.components.earthwork_proxy);
        assert!((flat.components.earthwork_proxy - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_compactness_rewards_clustering() {
        let boundary = boundary();
        let store = ConstraintStore::new();
        let terrain = TerrainModel::flat();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let evaluator = FitnessEvaluator::new(validator, &terrain, FitnessWeights::default(), at(50.0, 50.0));
        let spec = AssetSpec::new("shed", 2, 6.0, 6.0);

        let tight = evaluator.score(&[spec.place(0, at(45.0, 50.0), 0.0), spec.place(1, at(55.0, 50.0), 0.0)]);
        let sprawl = evaluator.score(&[spec.place(0, at(5.0, 5.0), 0.0), spec.place(1, at(95.0, 95.0), 0.0)]);
        assert!(tight.components.compactness > sprawl.components.compactness);
    }
}
