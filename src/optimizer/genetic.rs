//! Generational genetic search over asset arrangements
//!
//! A single driver owns the population and the RNG. Per-candidate scoring is
//! the only parallel step; results are collected in index order so a
//! parallel run is identical to a sequential one with the same seed.

use geo::Polygon;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::candidate::{Candidate, Population};
use super::fitness::{FitnessEvaluator, FitnessResult};
use super::operators::{crossover, mutate, random_position, random_rotation, tournament_select, MutationParams};
use crate::core::cancel::CancellationToken;
use crate::core::config::OptimizationConfig;
use crate::core::error::{LayoutError, Result};
use crate::core::types::CandidateId;
use crate::site::{expand_slots, AssetSlot, AssetSpec, PlacedAsset};

/// Result of one optimization run
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub best: Vec<PlacedAsset>,
    pub fitness: FitnessResult,
    pub feasible: bool,
    /// Stopped because the best fitness stalled for `patience` generations
    pub converged: bool,
    pub cancelled: bool,
    pub generations_run: usize,
    /// Best fitness after initialization and after each generation
    pub history: Vec<f64>,
    pub initial_feasible: usize,
}

/// Per-generation statistics, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best: f64,
    pub mean: f64,
    pub feasible: usize,
    pub radius: f64,
}

pub struct GeneticOptimizer<'a> {
    config: &'a OptimizationConfig,
    specs: &'a [AssetSpec],
    slots: Vec<AssetSlot>,
    evaluator: FitnessEvaluator<'a>,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl<'a> GeneticOptimizer<'a> {
    pub fn new(config: &'a OptimizationConfig, specs: &'a [AssetSpec], evaluator: FitnessEvaluator<'a>) -> Self {
        Self {
            config,
            specs,
            slots: expand_slots(specs),
            evaluator,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            next_id: 0,
        }
    }

    pub fn slots(&self) -> &[AssetSlot] {
        &self.slots
    }

    /// Search from a random, feasibility-biased population
    pub fn run(&mut self, cancel: &CancellationToken) -> OptimizationOutcome {
        let population = self.seed_population(None);
        self.evolve(population, cancel)
    }

    /// Search from an edited arrangement
    ///
    /// The seed is aligned to slots by asset type and enters the population
    /// unmutated, so the result is never worse than the seed. Half the
    /// population is mutated seed variants, the rest is random.
    pub fn refine(&mut self, seed: Vec<PlacedAsset>, cancel: &CancellationToken) -> Result<OptimizationOutcome> {
        let aligned = self.align_seed(seed)?;
        let population = self.seed_population(Some(aligned));
        Ok(self.evolve(population, cancel))
    }

    fn evolve(&mut self, mut population: Population, cancel: &CancellationToken) -> OptimizationOutcome {
        self.evaluate(&mut population);
        let initial_feasible = population.feasible_count();
        info!(
            population = population.len(),
            slots = self.slots.len(),
            feasible = initial_feasible,
            "Initial population evaluated"
        );
        if initial_feasible == 0 {
            warn!("No feasible candidate in the initial population; searching from penalized seeds");
        }

        let mut best = self.best_of(&population);
        let mut history = vec![best.total()];
        let mut stall = 0;
        let mut generation = 0;
        let mut converged = false;
        let mut cancelled = false;

        while generation < self.config.max_generations {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let radius = self.config.radius_at(generation);
            let next = self.next_generation(&population, radius);
            population.replace(next);
            self.evaluate(&mut population);
            generation += 1;

            let generation_best = self.best_of(&population);
            if generation_best.total() > best.total() + self.config.epsilon {
                stall = 0;
            } else {
                stall += 1;
            }
            if generation_best.rank_cmp(&best).is_lt() {
                best = generation_best;
            }
            history.push(best.total());

            let stats = GenerationStats {
                generation,
                best: best.total(),
                mean: population.mean_fitness(),
                feasible: population.feasible_count(),
                radius,
            };
            debug!(
                generation = stats.generation,
                best = stats.best,
                mean = stats.mean,
                feasible = stats.feasible,
                radius = stats.radius,
                stall,
                "Generation complete"
            );

            if stall >= self.config.patience {
                converged = true;
                break;
            }
        }

        let fitness = best
            .fitness()
            .cloned()
            .unwrap_or_else(|| self.evaluator.score(best.assets()));
        let feasible = fitness.is_feasible();
        info!(
            generations = generation,
            best = fitness.total,
            feasible,
            converged,
            cancelled,
            "Optimization finished"
        );
        if !feasible {
            warn!(
                blocking = fitness.blocking_count,
                "Best arrangement still violates blocking constraints"
            );
        }

        OptimizationOutcome {
            best: best.into_assets(),
            fitness,
            feasible,
            converged,
            cancelled,
            generations_run: generation,
            history,
            initial_feasible,
        }
    }

    fn best_of(&self, population: &Population) -> Candidate {
        population
            .best()
            .cloned()
            .unwrap_or_else(|| Candidate::new(CandidateId(u64::MAX), Vec::new()))
    }

    /// Score every unevaluated candidate; elites keep their cached result
    fn evaluate(&self, population: &mut Population) {
        let evaluator = &self.evaluator;
        let pending: Vec<usize> = population
            .candidates()
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_evaluated())
            .map(|(i, _)| i)
            .collect();

        let candidates = population.candidates();
        let scored: Vec<(usize, FitnessResult)> = if self.config.parallel {
            pending
                .par_iter()
                .map(|&i| (i, evaluator.score(candidates[i].assets())))
                .collect()
        } else {
            pending
                .iter()
                .map(|&i| (i, evaluator.score(candidates[i].assets())))
                .collect()
        };

        let candidates = population.candidates_mut();
        for (i, fitness) in scored {
            candidates[i].set_fitness(fitness);
        }
    }

    fn next_generation(&mut self, population: &Population, radius: f64) -> Vec<Candidate> {
        let size = population.len();
        let mut next = Vec::with_capacity(size);

        for &i in population.ranked().iter().take(self.config.elite_count) {
            next.push(population.candidates()[i].clone());
        }

        let params = self.mutation_params(radius);
        let pool = population.candidates();
        while next.len() < size {
            let a = tournament_select(pool, self.config.tournament_size, &mut self.rng);
            let b = tournament_select(pool, self.config.tournament_size, &mut self.rng);
            let mut child = if self.rng.gen_bool(self.config.crossover_rate) {
                crossover(a, b, &mut self.rng)
            } else if a.rank_cmp(b).is_le() {
                a.assets().to_vec()
            } else {
                b.assets().to_vec()
            };
            mutate(&mut child, &self.slots, self.specs, &params, &mut self.rng);
            let id = self.next_candidate_id();
            next.push(Candidate::new(id, child));
        }
        next
    }

    fn mutation_params(&self, radius: f64) -> MutationParams {
        MutationParams {
            rate: self.config.mutation_rate,
            radius,
            rotation_jitter_deg: self.config.rotation_jitter_deg,
            bounds: self.evaluator.validator().boundary().bounds(),
        }
    }

    fn next_candidate_id(&mut self) -> CandidateId {
        let id = CandidateId(self.next_id);
        self.next_id += 1;
        id
    }

    fn seed_population(&mut self, seed: Option<Vec<PlacedAsset>>) -> Population {
        let size = self.config.population_size;
        let mut candidates = Vec::with_capacity(size);

        if let Some(seed) = seed {
            let id = self.next_candidate_id();
            candidates.push(Candidate::new(id, seed.clone()));
            let params = self.mutation_params(self.config.mutation_radius);
            while candidates.len() < size / 2 {
                let mut variant = seed.clone();
                mutate(&mut variant, &self.slots, self.specs, &params, &mut self.rng);
                let id = self.next_candidate_id();
                candidates.push(Candidate::new(id, variant));
            }
        }

        while candidates.len() < size {
            let assets = self.random_arrangement();
            let id = self.next_candidate_id();
            candidates.push(Candidate::new(id, assets));
        }
        Population::new(candidates)
    }

    /// Place slots one by one, resampling each up to `placement_attempts`
    /// times until it clears constraints, the parcel and earlier slots
    fn random_arrangement(&mut self) -> Vec<PlacedAsset> {
        let validator = *self.evaluator.validator();
        let bounds = validator.boundary().bounds();
        let attempts = self.config.placement_attempts.max(1);
        let mut placed: Vec<PlacedAsset> = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            let spec = &self.specs[slot.spec_index];
            let mut draw = None;
            for _ in 0..attempts {
                let position = random_position(spec, &bounds, &mut self.rng);
                let rotation = random_rotation(spec, &mut self.rng);
                let asset = spec.place_as(slot.id.clone(), position, rotation);
                let others: Vec<&Polygon<f64>> = placed.iter().map(|a| a.footprint()).collect();
                let valid = validator.check_footprint(asset.footprint(), &others).is_valid();
                draw = Some(asset);
                if valid {
                    break;
                }
            }
            if let Some(asset) = draw {
                placed.push(asset);
            }
        }
        placed
    }

    /// Assign seed assets to slots and relabel them with the slot ids
    ///
    /// A slot takes the seed asset of its type carrying its id when there is
    /// one, otherwise the first unassigned asset of its type. Geometry is
    /// kept as edited; dimensions must match the request.
    fn align_seed(&self, seed: Vec<PlacedAsset>) -> Result<Vec<PlacedAsset>> {
        let mut ids = BTreeSet::new();
        for asset in &seed {
            if !ids.insert(asset.id()) {
                return Err(LayoutError::SeedMismatch(format!(
                    "seed lists asset '{}' more than once",
                    asset.id()
                )));
            }
        }

        let mut remaining: Vec<Option<&PlacedAsset>> = seed.iter().map(Some).collect();
        let mut aligned = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let spec = &self.specs[slot.spec_index];
            let of_type = |a: &Option<&PlacedAsset>| a.is_some_and(|a| a.asset_type() == spec.asset_type);
            let pick = remaining
                .iter()
                .position(|a| of_type(a) && a.is_some_and(|a| *a.id() == slot.id))
                .or_else(|| remaining.iter().position(of_type));
            let found = pick.and_then(|i| remaining[i].take()).ok_or_else(|| {
                LayoutError::SeedMismatch(format!("seed has too few '{}' assets", spec.asset_type))
            })?;
            if (found.width() - spec.width).abs() > 1e-9 || (found.length() - spec.length).abs() > 1e-9 {
                return Err(LayoutError::SeedMismatch(format!(
                    "seed asset '{}' is {} x {}, requested '{}' is {} x {}",
                    found.id(),
                    found.width(),
                    found.length(),
                    spec.asset_type,
                    spec.width,
                    spec.length
                )));
            }
            aligned.push(found.relabeled(slot.id.clone()));
        }

        if let Some(extra) = remaining.into_iter().flatten().next() {
            return Err(LayoutError::SeedMismatch(format!(
                "seed asset '{}' of type '{}' has no requested slot",
                extra.id(),
                extra.asset_type()
            )));
        }
        Ok(aligned)
    }
}
