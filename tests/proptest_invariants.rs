//! Property-based invariant tests
//!
//! 1. Any arrangement free of BLOCKING violations outranks any arrangement
//!    with one, whatever the fitness weights.
//! 2. A placed asset's footprint always matches its current position,
//!    rotation and dimensions after arbitrary edits.
//! 3. No edge of a navigation graph exceeds the grade limit on arbitrary
//!    terrain.

use geo::{Area, Centroid, Coord};
use proptest::prelude::*;
use site_layout::constraints::{CollisionValidator, Constraint, ConstraintStore, ConstraintType, Severity};
use site_layout::core::{FitnessWeights, NavigationConfig};
use site_layout::navigation::NavigationGraph;
use site_layout::optimizer::FitnessEvaluator;
use site_layout::site::{AssetSpec, PropertyBoundary, SiteInput, TerrainModel};
use site_layout::spatial::geometry::{rectangle_footprint, ring_to_polygon};
use site_layout::spatial::Grid;

// ── Helpers ─────────────────────────────────────────────────────────────

fn weights_strategy() -> impl Strategy<Value = FitnessWeights> {
    (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0)
        .prop_filter("weights must not all vanish", |(a, b, c, d)| a + b + c + d > 1e-3)
        .prop_map(|(a, b, c, d)| {
            let sum = a + b + c + d;
            FitnessWeights {
                violation: a / sum,
                earthwork: b / sum,
                accessibility: c / sum,
                compactness: d / sum,
            }
        })
}

fn pond_store() -> ConstraintStore {
    ConstraintStore::from_constraints([
        Constraint::new(
            "pond",
            ConstraintType::Water,
            ring_to_polygon(&[[100.0, 100.0], [160.0, 100.0], [160.0, 160.0], [100.0, 160.0]]),
        )
        .with_severity(Severity::Blocking)
        .with_setback(10.0),
        Constraint::new(
            "view",
            ConstraintType::UserDefined,
            ring_to_polygon(&[[0.0, 0.0], [60.0, 0.0], [60.0, 60.0], [0.0, 60.0]]),
        )
        .with_severity(Severity::Preference),
    ])
    .unwrap()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Feasible outranks infeasible
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn feasible_outranks_infeasible(
        weights in weights_strategy(),
        bad_x in 95.0f64..165.0,
        bad_y in 95.0f64..165.0,
        good_x in 20.0f64..50.0,
        good_y in 20.0f64..50.0,
    ) {
        let store = pond_store();
        let boundary = PropertyBoundary::rectangle([0.0, 0.0], [300.0, 300.0]).unwrap();
        let terrain = TerrainModel::flat();
        let validator = CollisionValidator::new(&store, &boundary, 0.0);
        let evaluator = FitnessEvaluator::new(validator, &terrain, weights, Coord { x: 0.0, y: 0.0 });

        let spec = AssetSpec::new("barn", 1, 20.0, 20.0);
        // Sits on the preference zone: soft penalty only
        let good = evaluator.score(&[spec.place(0, Coord { x: good_x, y: good_y }, 0.0)]);
        // Inside the pond or its setback
        let bad = evaluator.score(&[spec.place(0, Coord { x: bad_x, y: bad_y }, 0.0)]);

        prop_assert!(good.is_feasible());
        prop_assert!(!bad.is_feasible());
        prop_assert!(
            good.total > bad.total,
            "feasible {} <= infeasible {} under {:?}",
            good.total, bad.total, weights
        );
        prop_assert!(good.rank_cmp(&bad).is_lt());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Footprint follows every edit
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn footprint_recomputed_after_edits(
        width in 1.0f64..80.0,
        length in 1.0f64..80.0,
        moves in prop::collection::vec((-500.0f64..500.0, -500.0f64..500.0, -720.0f64..720.0), 1..8),
    ) {
        let spec = AssetSpec::new("shed", 1, width, length).with_rotation_step(0.0);
        let mut asset = spec.place(0, Coord { x: 0.0, y: 0.0 }, 0.0);

        for (i, (x, y, rotation)) in moves.into_iter().enumerate() {
            if i % 2 == 0 {
                asset.set_position(Coord { x, y });
                asset.set_rotation(rotation);
            } else {
                asset.place(Coord { x, y }, rotation);
            }

            let expected = rectangle_footprint(asset.position(), width, length, asset.rotation());
            for (a, b) in asset.footprint().exterior().coords().zip(expected.exterior().coords()) {
                prop_assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
            }
            prop_assert!((asset.footprint().unsigned_area() - width * length).abs() < 1e-6 * width * length);
            let centroid = asset.footprint().centroid().unwrap();
            prop_assert!((centroid.x() - x).abs() < 1e-6);
            prop_assert!((centroid.y() - y).abs() < 1e-6);
            prop_assert!((0.0..360.0).contains(&asset.rotation()));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Graph edges never exceed the grade limit
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn graph_edges_within_grade(
        values in prop::collection::vec(0.0f64..6.0, 100),
        max_grade in 2.0f64..20.0,
    ) {
        let site = SiteInput {
            boundary: PropertyBoundary::rectangle([0.0, 0.0], [100.0, 100.0]).unwrap(),
            terrain: TerrainModel::flat().with_elevation(Grid::from_rows(10, 10, 10.0, [0.0, 0.0], values).unwrap()),
            constraints: ConstraintStore::new(),
            assets: vec![],
        };
        let graph = NavigationGraph::build(
            &site,
            &[],
            Coord { x: 0.0, y: 0.0 },
            &NavigationConfig::default(),
            max_grade,
        );
        for (_, edge) in graph.edges() {
            prop_assert!(edge.grade <= max_grade + 1e-9);
            prop_assert!(!edge.switchback);
        }
        for steep in graph.steep_edges() {
            prop_assert!(steep.grade > max_grade);
        }
    }
}
