//! Genome operators for the genetic algorithm.
//!
//! Provides fitness-proportionate selection, single-point crossover and
//! per-gene mutation over flat weight vectors.

use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Flat controller weights, in the order produced by `NeuralController::to_genome`.
pub type Genome = Vec<f64>;

/// Invariant violations raised by genome operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneticError {
    #[error("Genome length mismatch: expected {expected}, got {actual}")]
    GenomeLength { expected: usize, actual: usize },
    #[error("Population is empty")]
    EmptyPopulation,
    #[error("Got {fitnesses} fitness values for {genomes} genomes")]
    FitnessCount { genomes: usize, fitnesses: usize },
}

/// Swap the tails of two equal-length genomes at `cut`.
///
/// `cut` is clamped to the genome length; genomes shorter than 2 come back
/// unchanged.
pub fn crossover_at(
    parent1: &[f64],
    parent2: &[f64],
    cut: usize,
) -> Result<(Genome, Genome), GeneticError> {
    if parent1.len() != parent2.len() {
        return Err(GeneticError::GenomeLength {
            expected: parent1.len(),
            actual: parent2.len(),
        });
    }
    if parent1.len() < 2 {
        return Ok((parent1.to_vec(), parent2.to_vec()));
    }

    let cut = cut.min(parent1.len());
    let mut child1 = Vec::with_capacity(parent1.len());
    child1.extend_from_slice(&parent1[..cut]);
    child1.extend_from_slice(&parent2[cut..]);

    let mut child2 = Vec::with_capacity(parent2.len());
    child2.extend_from_slice(&parent2[..cut]);
    child2.extend_from_slice(&parent1[cut..]);

    Ok((child1, child2))
}

/// Random number generator wrapper for genome operations.
pub struct EvolutionRng {
    rng: StdRng,
}

impl EvolutionRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Underlying generator, for track generation and weight initialization.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Single-point crossover with a random cut in `[1, len - 1)` (cut 1 for
    /// length-2 genomes).
    pub fn crossover(
        &mut self,
        parent1: &[f64],
        parent2: &[f64],
    ) -> Result<(Genome, Genome), GeneticError> {
        let len = parent1.len();
        let cut = if len < 2 || len != parent2.len() {
            0
        } else {
            self.rng.gen_range(1..(len - 1).max(2))
        };
        crossover_at(parent1, parent2, cut)
    }

    /// Copy of `genome` where each gene was shifted by `±rate` with
    /// probability `chance`.
    pub fn mutate(&mut self, genome: &[f64], chance: f64, rate: f64) -> Genome {
        genome
            .iter()
            .map(|&gene| {
                if self.rng.r#gen::<f64>() < chance {
                    if self.rng.gen_bool(0.5) {
                        gene + rate
                    } else {
                        gene - rate
                    }
                } else {
                    gene
                }
            })
            .collect()
    }

    /// Draw two parents with probability proportional to fitness, with
    /// replacement. Falls back to uniform sampling when the fitnesses cannot
    /// serve as weights (all zero, negative or non-finite).
    pub fn select_pair<'a>(
        &mut self,
        genomes: &'a [Genome],
        fitnesses: &[f64],
    ) -> Result<(&'a [f64], &'a [f64]), GeneticError> {
        if genomes.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        if genomes.len() != fitnesses.len() {
            return Err(GeneticError::FitnessCount {
                genomes: genomes.len(),
                fitnesses: fitnesses.len(),
            });
        }

        let (a, b) = match WeightedIndex::new(fitnesses) {
            Ok(dist) => (dist.sample(&mut self.rng), dist.sample(&mut self.rng)),
            Err(_) => (
                self.rng.gen_range(0..genomes.len()),
                self.rng.gen_range(0..genomes.len()),
            ),
        };
        Ok((&genomes[a], &genomes[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parents() -> (Genome, Genome) {
        (
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
        )
    }

    #[test]
    fn test_crossover_at_cut_three() {
        let (p1, p2) = parents();
        let (c1, c2) = crossover_at(&p1, &p2, 3).unwrap();
        assert_eq!(c1, vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]);
        assert_eq!(c2, vec![7.0, 8.0, 9.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_crossover_is_deterministic_for_seed() {
        let (p1, p2) = parents();
        let first = EvolutionRng::new(42).crossover(&p1, &p2).unwrap();
        let second = EvolutionRng::new(42).crossover(&p1, &p2).unwrap();
        assert_eq!(first, second);

        // Cut lies in [1, 5): both children mix both parents
        let (c1, c2) = first;
        assert_eq!(c1[0], 1.0);
        assert_eq!(c1[5], 12.0);
        assert_eq!(c2[0], 7.0);
        assert_eq!(c2[5], 6.0);
    }

    #[test]
    fn test_crossover_length_mismatch() {
        let mut rng = EvolutionRng::new(0);
        let err = rng.crossover(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            GeneticError::GenomeLength {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_short_genomes_unchanged() {
        let mut rng = EvolutionRng::new(0);
        let (c1, c2) = rng.crossover(&[1.0], &[2.0]).unwrap();
        assert_eq!((c1, c2), (vec![1.0], vec![2.0]));

        let (c1, c2) = rng.crossover(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert_eq!((c1, c2), (vec![1.0, 4.0], vec![3.0, 2.0]));
    }

    #[test]
    fn test_mutation_does_not_touch_input() {
        let mut rng = EvolutionRng::new(9);
        let genome = vec![0.0; 100];
        let mutated = rng.mutate(&genome, 1.0, 0.25);
        assert!(genome.iter().all(|&g| g == 0.0));
        assert!(mutated.iter().all(|&g| g.abs() == 0.25));
        assert!(mutated.iter().any(|&g| g > 0.0));
        assert!(mutated.iter().any(|&g| g < 0.0));

        assert_eq!(rng.mutate(&genome, 0.0, 0.25), genome);
    }

    #[test]
    fn test_select_pair_prefers_fit() {
        let mut rng = EvolutionRng::new(3);
        let genomes = vec![vec![0.0], vec![1.0]];
        for _ in 0..50 {
            let (a, b) = rng.select_pair(&genomes, &[0.0, 5.0]).unwrap();
            assert_eq!((a[0], b[0]), (1.0, 1.0));
        }
    }

    #[test]
    fn test_select_pair_uniform_fallback() {
        let mut rng = EvolutionRng::new(3);
        let genomes = vec![vec![0.0], vec![1.0], vec![2.0]];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let (a, b) = rng.select_pair(&genomes, &[0.0, 0.0, 0.0]).unwrap();
            seen[a[0] as usize] = true;
            seen[b[0] as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_select_pair_errors() {
        let mut rng = EvolutionRng::new(0);
        assert_eq!(
            rng.select_pair(&[], &[]).unwrap_err(),
            GeneticError::EmptyPopulation
        );
        assert!(matches!(
            rng.select_pair(&[vec![1.0]], &[1.0, 2.0]),
            Err(GeneticError::FitnessCount { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_crossover_preserves_genes(seed in any::<u64>(), len in 2usize..40) {
            let p1: Genome = (0..len).map(|i| i as f64).collect();
            let p2: Genome = (0..len).map(|i| -(i as f64) - 1.0).collect();
            let (c1, c2) = EvolutionRng::new(seed).crossover(&p1, &p2).unwrap();
            prop_assert_eq!(c1.len(), len);
            prop_assert_eq!(c2.len(), len);
            for i in 0..len {
                // Each position holds the two parent genes, one per child
                let mut pair = [c1[i], c2[i]];
                pair.sort_by(|a, b| a.total_cmp(b));
                prop_assert_eq!(pair, [p2[i], p1[i]]);
            }
        }
    }
}
