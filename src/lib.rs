//! Maze evolution - Neuroevolution of differential-drive vehicles.
//!
//! A population of rectangular two-wheeled vehicles, each steered by a small
//! feed-forward network reading distance sensors, drives through a
//! procedurally generated tile maze. At the end of every run the vehicles are
//! scored by progress towards the finish line and a genetic algorithm breeds
//! the next generation. Tracks are regenerated and grown as the population
//! keeps succeeding.
//!
//! # Architecture
//!
//! - `schema`: Configuration, episode and progress types
//! - `compute`: Geometry, track generation, vehicles, controllers and the
//!   [`Environment`](compute::Environment) that ties them together
//! - `persistence`: Binary save format for trained agents
//! - `report`: Per-track-size experiment reports
//!
//! # Example
//!
//! ```rust,no_run
//! use maze_evolution::{Environment, SimulationConfig, TickOutcome};
//!
//! let config = SimulationConfig {
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//! let mut env = Environment::new(config).unwrap();
//!
//! let mut generations = 0;
//! while generations < 10 {
//!     if let TickOutcome::RunEnded(summary) = env.tick().unwrap() {
//!         println!("run {}: {} finished", summary.generation, summary.finished);
//!         generations += 1;
//!     }
//! }
//!
//! let best = env.save_best_agent().unwrap();
//! println!("best agent: {} bytes", best.len());
//! ```

pub mod compute;
pub mod persistence;
pub mod report;
pub mod schema;

// Re-export commonly used types
pub use compute::{Environment, EnvironmentError, TickOutcome, Track, Vehicle};
pub use persistence::AgentRecord;
pub use report::ExperimentReport;
pub use schema::{EnvironmentSnapshot, RunSummary, SimulationConfig};
