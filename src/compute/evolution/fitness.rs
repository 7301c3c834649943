//! Episode fitness.
//!
//! The base term rewards progress away from the start and towards the goal:
//! `sqrt(from_start) / sqrt(max(to_goal, min_goal_distance))`. Finishers
//! receive an extra `finish_bonus * exp(-ticks / time_scale)`, which is
//! bounded by `finish_bonus`, strictly decreasing in the time taken and
//! vanishes for very slow finishes.

use crate::schema::{EpisodeData, FitnessConfig};

/// Fitness of a single episode. Never negative.
pub fn fitness(episode: &EpisodeData, config: &FitnessConfig) -> f64 {
    let from_start = episode.displacement_from_start.max(0.0);
    let to_goal = episode.displacement_to_goal.max(config.min_goal_distance);
    let base = from_start.sqrt() / to_goal.sqrt();

    match episode.ticks_taken() {
        Some(ticks) if episode.is_finished() => base + time_bonus(ticks, config),
        _ => base,
    }
}

/// Bonus for finishing after `ticks`.
pub fn time_bonus(ticks: u64, config: &FitnessConfig) -> f64 {
    config.finish_bonus * (-(ticks as f64) / config.time_scale).exp()
}

/// Fitness of every episode, in order.
pub fn evaluate_all<'a, I>(episodes: I, config: &FitnessConfig) -> Vec<f64>
where
    I: IntoIterator<Item = &'a EpisodeData>,
{
    episodes.into_iter().map(|e| fitness(e, config)).collect()
}
