//! Selection, recombination and mutation
//!
//! Every operator takes the optimizer's RNG explicitly. Candidates are aligned
//! by slot index, so slot `i` of any two candidates always holds the same
//! asset type.

use geo::{Coord, Rect};
use rand::Rng;

use super::candidate::Candidate;
use crate::site::{AssetSlot, AssetSpec, PlacedAsset};

/// Out of 20: move 12 (60%), rotate 5 (25%), swap 3 (15%)
const MOVE_SHARE: u32 = 12;
const ROTATE_SHARE: u32 = 5;
const OPERATOR_TOTAL: u32 = 20;

/// Fittest of `k` uniformly sampled candidates
pub fn tournament_select<'p, R: Rng>(population: &'p [Candidate], k: usize, rng: &mut R) -> &'p Candidate {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..k.max(1) {
        let challenger = &population[rng.gen_range(0..population.len())];
        if challenger.rank_cmp(best).is_lt() {
            best = challenger;
        }
    }
    best
}

/// One child from two parents, slot by slot
///
/// Each slot either inherits one parent's asset whole or blends the two
/// positions by a random weight, taking rotation from the dominant parent.
pub fn crossover<R: Rng>(a: &Candidate, b: &Candidate, rng: &mut R) -> Vec<PlacedAsset> {
    a.assets()
        .iter()
        .zip(b.assets())
        .map(|(pa, pb)| {
            debug_assert_eq!(pa.id(), pb.id());
            if rng.gen_bool(0.5) {
                return if rng.gen_bool(0.5) { pa.clone() } else { pb.clone() };
            }
            let alpha: f64 = rng.gen();
            let (x, y) = (pa.position(), pb.position());
            let position = Coord {
                x: alpha * x.x + (1.0 - alpha) * y.x,
                y: alpha * x.y + (1.0 - alpha) * y.y,
            };
            let rotation = if alpha >= 0.5 { pa.rotation() } else { pb.rotation() };
            let mut child = pa.clone();
            child.place(position, rotation);
            child
        })
        .collect()
}

/// Mutation strength for one generation
#[derive(Debug, Clone, Copy)]
pub struct MutationParams {
    pub rate: f64,
    pub radius: f64,
    pub rotation_jitter_deg: f64,
    /// Positions are clamped to this box
    pub bounds: Rect<f64>,
}

/// Apply per-asset move/rotate/swap operators in place
pub fn mutate<R: Rng>(
    assets: &mut [PlacedAsset],
    slots: &[AssetSlot],
    specs: &[AssetSpec],
    params: &MutationParams,
    rng: &mut R,
) {
    for i in 0..assets.len() {
        if !rng.gen_bool(params.rate) {
            continue;
        }
        let roll = rng.gen_range(0..OPERATOR_TOTAL);
        if roll < MOVE_SHARE {
            jitter_position(&mut assets[i], params, rng);
        } else if roll < MOVE_SHARE + ROTATE_SHARE {
            let spec = &specs[slots[i].spec_index];
            let delta = if params.rotation_jitter_deg > 0.0 {
                rng.gen_range(-params.rotation_jitter_deg..=params.rotation_jitter_deg)
            } else {
                0.0
            };
            let rotation = spec.snap_rotation(assets[i].rotation() + delta);
            assets[i].set_rotation(rotation);
        } else {
            let partners: Vec<usize> = (0..assets.len())
                .filter(|&j| j != i && slots[j].spec_index == slots[i].spec_index)
                .collect();
            if partners.is_empty() {
                jitter_position(&mut assets[i], params, rng);
                continue;
            }
            let j = partners[rng.gen_range(0..partners.len())];
            let (pi, pj) = (assets[i].position(), assets[j].position());
            assets[i].set_position(pj);
            assets[j].set_position(pi);
        }
    }
}

fn jitter_position<R: Rng>(asset: &mut PlacedAsset, params: &MutationParams, rng: &mut R) {
    if params.radius <= 0.0 {
        return;
    }
    let p = asset.position();
    let moved = Coord {
        x: p.x + rng.gen_range(-params.radius..=params.radius),
        y: p.y + rng.gen_range(-params.radius..=params.radius),
    };
    asset.set_position(clamp_to(moved, &params.bounds));
}

fn clamp_to(p: Coord, bounds: &Rect<f64>) -> Coord {
    Coord {
        x: p.x.clamp(bounds.min().x, bounds.max().x),
        y: p.y.clamp(bounds.min().y, bounds.max().y),
    }
}

/// Uniform position for a spec inside `bounds`, inset by half its short side
pub fn random_position<R: Rng>(spec: &AssetSpec, bounds: &Rect<f64>, rng: &mut R) -> Coord {
    let inset = spec.width.min(spec.length) / 2.0;
    let axis = |lo: f64, hi: f64, rng: &mut R| {
        if hi - lo > 2.0 * inset {
            rng.gen_range(lo + inset..=hi - inset)
        } else {
            (lo + hi) / 2.0
        }
    };
    let x = axis(bounds.min().x, bounds.max().x, rng);
    let y = axis(bounds.min().y, bounds.max().y, rng);
    Coord { x, y }
}

/// Uniform rotation snapped to the spec's granularity
pub fn random_rotation<R: Rng>(spec: &AssetSpec, rng: &mut R) -> f64 {
    spec.snap_rotation(rng.gen_range(0.0..360.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CandidateId;
    use crate::site::expand_slots;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn bounds() -> Rect<f64> {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 100.0 })
    }

    fn specs() -> Vec<AssetSpec> {
        vec![AssetSpec::new("barn", 2, 10.0, 20.0), AssetSpec::new("silo", 1, 5.0, 5.0)]
    }

    fn candidate(id: u64, specs: &[AssetSpec], offset: f64) -> Candidate {
        let assets = expand_slots(specs)
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                specs[slot.spec_index].place_as(
                    slot.id.clone(),
                    Coord {
                        x: 10.0 + 20.0 * i as f64 + offset,
                        y: 50.0,
                    },
                    0.0,
                )
            })
            .collect();
        Candidate::new(CandidateId(id), assets)
    }

    #[test]
    fn test_crossover_preserves_slot_types() {
        let specs = specs();
        let a = candidate(0, &specs, 0.0);
        let b = candidate(1, &specs, 30.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let child = crossover(&a, &b, &mut rng);
            assert_eq!(child.len(), 3);
            for (c, p) in child.iter().zip(a.assets()) {
                assert_eq!(c.asset_type(), p.asset_type());
                assert_eq!(c.id(), p.id());
                let x = c.position().x;
                assert!(x >= p.position().x - 1e-9 && x <= p.position().x + 30.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_mutation_stays_in_bounds_and_snaps() {
        let specs = specs();
        let slots = expand_slots(&specs);
        let mut assets = candidate(0, &specs, 0.0).into_assets();
        let params = MutationParams {
            rate: 1.0,
            radius: 200.0,
            rotation_jitter_deg: 90.0,
            bounds: bounds(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            mutate(&mut assets, &slots, &specs, &params, &mut rng);
            for a in &assets {
                let p = a.position();
                assert!((0.0..=100.0).contains(&p.x) && (0.0..=100.0).contains(&p.y));
                assert_eq!(a.rotation() % 90.0, 0.0);
            }
        }
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let specs = specs();
        let slots = expand_slots(&specs);
        let original = candidate(0, &specs, 0.0).into_assets();
        let mut assets = original.clone();
        let params = MutationParams {
            rate: 0.0,
            radius: 50.0,
            rotation_jitter_deg: 45.0,
            bounds: bounds(),
        };
        mutate(&mut assets, &slots, &specs, &params, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(assets, original);
    }

    #[test]
    fn test_tournament_picks_fittest_of_full_sample() {
        use crate::optimizer::fitness::{FitnessComponents, FitnessResult};
        let specs = specs();
        let population: Vec<Candidate> = (0..4)
            .map(|i| {
                let mut c = candidate(i, &specs, 0.0);
                c.set_fitness(FitnessResult {
                    total: i as f64,
                    raw: i as f64,
                    components: FitnessComponents::default(),
                    blocking_count: 0,
                    violations: vec![],
                });
                c
            })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        // A large tournament almost surely samples the best
        let winner = tournament_select(&population, 64, &mut rng);
        assert_eq!(winner.id(), CandidateId(3));
    }

    #[test]
    fn test_random_position_respects_inset() {
        let spec = AssetSpec::new("barn", 1, 10.0, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            let p = random_position(&spec, &bounds(), &mut rng);
            assert!(p.x >= 5.0 && p.x <= 95.0);
            assert!(p.y >= 5.0 && p.y <= 95.0);
        }
    }
}
