//! Genomes and generations

use std::cmp::Ordering;

use super::fitness::FitnessResult;
use crate::core::types::CandidateId;
use crate::site::PlacedAsset;

/// One proposed arrangement, one asset per slot
///
/// The cached fitness is cleared whenever the assets are borrowed mutably.
#[derive(Debug, Clone)]
pub struct Candidate {
    id: CandidateId,
    assets: Vec<PlacedAsset>,
    fitness: Option<FitnessResult>,
}

impl Candidate {
    pub fn new(id: CandidateId, assets: Vec<PlacedAsset>) -> Self {
        Self {
            id,
            assets,
            fitness: None,
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn assets(&self) -> &[PlacedAsset] {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut [PlacedAsset] {
        self.fitness = None;
        &mut self.assets
    }

    pub fn into_assets(self) -> Vec<PlacedAsset> {
        self.assets
    }

    pub fn fitness(&self) -> Option<&FitnessResult> {
        self.fitness.as_ref()
    }

    pub fn set_fitness(&mut self, fitness: FitnessResult) {
        self.fitness = Some(fitness);
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness total, `-inf` when unevaluated
    pub fn total(&self) -> f64 {
        self.fitness.as_ref().map_or(f64::NEG_INFINITY, |f| f.total)
    }

    /// Ranking order, best first; unevaluated candidates sort last
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        let by_fitness = match (&self.fitness, &other.fitness) {
            (Some(a), Some(b)) => a.rank_cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_fitness.then_with(|| self.id.cmp(&other.id))
    }
}

/// Candidates of one generation
#[derive(Debug, Clone)]
pub struct Population {
    candidates: Vec<Candidate>,
}

impl Population {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidates_mut(&mut self) -> &mut [Candidate] {
        &mut self.candidates
    }

    /// Swap in the next generation; sizes must match
    pub fn replace(&mut self, next: Vec<Candidate>) {
        debug_assert_eq!(next.len(), self.candidates.len(), "population size changed");
        self.candidates = next;
    }

    /// Indices sorted best first
    pub fn ranked(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.candidates.len()).collect();
        order.sort_by(|&a, &b| self.candidates[a].rank_cmp(&self.candidates[b]));
        order
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.iter().min_by(|a, b| a.rank_cmp(b))
    }

    pub fn mean_fitness(&self) -> f64 {
        let evaluated: Vec<f64> = self
            .candidates
            .iter()
            .filter_map(|c| c.fitness().map(|f| f.total))
            .collect();
        if evaluated.is_empty() {
            return 0.0;
        }
        evaluated.iter().sum::<f64>() / evaluated.len() as f64
    }

    pub fn feasible_count(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.fitness().is_some_and(|f| f.is_feasible()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::fitness::FitnessComponents;
    use crate::site::AssetSpec;
    use geo::Coord;

    fn scored(id: u64, total: f64, violations: usize) -> Candidate {
        let mut c = Candidate::new(CandidateId(id), vec![]);
        let spec = AssetSpec::new("shed", 1, 1.0, 1.0);
        let asset = spec.place(0, Coord { x: 0.0, y: 0.0 }, 0.0);
        let violations = (0..violations)
            .map(|_| crate::constraints::Violation {
                asset_id: asset.id().clone(),
                kind: crate::constraints::ViolationKind::OutsideBoundary,
            })
            .collect();
        c.set_fitness(FitnessResult {
            total,
            raw: total,
            components: FitnessComponents::default(),
            blocking_count: 0,
            violations,
        });
        c
    }

    #[test]
    fn test_mutation_clears_cached_fitness() {
        let spec = AssetSpec::new("shed", 1, 4.0, 4.0);
        let mut c = scored(1, 0.5, 0);
        c = Candidate {
            assets: vec![spec.place(0, Coord { x: 1.0, y: 1.0 }, 0.0)],
            ..c
        };
        assert!(c.is_evaluated());
        c.assets_mut()[0].set_position(Coord { x: 2.0, y: 2.0 });
        assert!(!c.is_evaluated());
        assert_eq!(c.total(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_ranking_tie_breaks() {
        let population = Population::new(vec![
            scored(4, 0.5, 1),
            scored(3, 0.5, 0),
            scored(2, 0.9, 2),
            scored(1, 0.5, 0),
            Candidate::new(CandidateId(0), vec![]),
        ]);
        let ranked: Vec<u64> = population
            .ranked()
            .into_iter()
            .map(|i| population.candidates()[i].id().0)
            .collect();
        assert_eq!(ranked, [2, 1, 3, 4, 0]);
        assert_eq!(population.best().map(|c| c.id()), Some(CandidateId(2)));
    }
}
