//! Genetic algorithm over flat controller genomes.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): progress ratio plus a decaying finish bonus
//! - **Genome Operations** (`genome`): selection, crossover and mutation
//! - **Search** (`search`): elitist generational breeding and the dynamic
//!   mutation schedule
//!
//! # Example
//!
//! ```rust
//! use maze_evolution::compute::evolution::{EvolutionRng, next_generation};
//!
//! let mut rng = EvolutionRng::new(7);
//! let genomes = vec![vec![0.0; 4], vec![1.0; 4], vec![2.0; 4]];
//! let fitnesses = [0.5, 2.0, 1.0];
//!
//! let generation = next_generation(&mut rng, &genomes, &fitnesses, 0.34, 0.1, 0.05).unwrap();
//! assert_eq!(generation.genomes.len(), 3);
//! assert_eq!(generation.genomes[0], genomes[1]);
//! ```

mod fitness;
mod genome;
mod search;

pub use fitness::{evaluate_all, fitness, time_bonus};
pub use genome::{EvolutionRng, GeneticError, Genome, crossover_at};
pub use search::{
    Generation, dynamic_mutation_chance, elite_count, next_generation, rank_by_fitness,
};
