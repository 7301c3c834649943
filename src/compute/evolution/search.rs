//! Generational genetic algorithm with elitism.

use super::genome::{EvolutionRng, GeneticError, Genome};

/// Result of breeding one generation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// New population, elites first in descending fitness order.
    pub genomes: Vec<Genome>,
    /// Number of genomes carried over unchanged.
    pub elite_count: usize,
    /// Mean fitness of the elite slice.
    pub elite_mean_fitness: f64,
    pub best_fitness: f64,
    /// Index of the best genome in the *input* population.
    pub best_index: usize,
}

/// Number of elites kept for a population of `len`: `round(len * carryover)`
/// clamped to `[1, len]`.
pub fn elite_count(len: usize, carryover: f64) -> usize {
    let raw = (len as f64 * carryover).round();
    (raw.max(0.0) as usize).clamp(1, len.max(1))
}

/// Indices ordered by descending fitness; ties keep their input order.
pub fn rank_by_fitness(fitnesses: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitnesses.len()).collect();
    order.sort_by(|&a, &b| fitnesses[b].total_cmp(&fitnesses[a]));
    order
}

/// Breed the next population.
///
/// The top `carryover` fraction survives unchanged. The rest is filled with
/// mutated crossover children of parents drawn from the elite slice; when
/// only one slot remains the second child is dropped.
pub fn next_generation(
    rng: &mut EvolutionRng,
    genomes: &[Genome],
    fitnesses: &[f64],
    carryover: f64,
    chance: f64,
    rate: f64,
) -> Result<Generation, GeneticError> {
    if genomes.is_empty() {
        return Err(GeneticError::EmptyPopulation);
    }
    if genomes.len() != fitnesses.len() {
        return Err(GeneticError::FitnessCount {
            genomes: genomes.len(),
            fitnesses: fitnesses.len(),
        });
    }
    let expected = genomes[0].len();
    if let Some(bad) = genomes.iter().find(|g| g.len() != expected) {
        return Err(GeneticError::GenomeLength {
            expected,
            actual: bad.len(),
        });
    }

    let order = rank_by_fitness(fitnesses);
    let n_elite = elite_count(genomes.len(), carryover);
    let elite_genomes: Vec<Genome> = order[..n_elite]
        .iter()
        .map(|&i| genomes[i].clone())
        .collect();
    let elite_fitness: Vec<f64> = order[..n_elite].iter().map(|&i| fitnesses[i]).collect();

    let mut next = elite_genomes.clone();
    while next.len() < genomes.len() {
        let (p1, p2) = rng.select_pair(&elite_genomes, &elite_fitness)?;
        let (c1, c2) = rng.crossover(p1, p2)?;
        next.push(rng.mutate(&c1, chance, rate));
        if next.len() < genomes.len() {
            next.push(rng.mutate(&c2, chance, rate));
        }
    }

    let best_index = order[0];
    Ok(Generation {
        genomes: next,
        elite_count: n_elite,
        elite_mean_fitness: elite_fitness.iter().sum::<f64>() / n_elite as f64,
        best_fitness: fitnesses[best_index],
        best_index,
    })
}

/// Mutation chance that decays as the elite improves:
/// `min + (max - min) * exp(-elite_mean / scale)`, clamped to `[min, max]`.
pub fn dynamic_mutation_chance(elite_mean: f64, bounds: (f64, f64), scale: f64) -> f64 {
    let (min, max) = bounds;
    let decay = (-elite_mean.max(0.0) / scale).exp();
    let chance = min + (max - min) * decay;
    if chance.is_finite() {
        chance.clamp(min, max)
    } else {
        min
    }
}
