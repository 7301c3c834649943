//! Read-only views of environment progress for renderers and drivers.

use serde::{Deserialize, Serialize};

use super::episode::{EpisodeStatus, SensorReading};
use crate::compute::{Point, Segment, Tile};

/// Schedule bookkeeping exposed to the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleCounters {
    /// Consecutive successful runs since the last scheduled regeneration.
    pub success_streak: u32,
    /// Scheduled regenerations since the last scheduled resize.
    pub regenerations_since_resize: u32,
    /// Track regenerations over the whole session (manual included).
    pub total_regenerations: u32,
    /// Track resizes over the whole session (manual included).
    pub total_resizes: u32,
}

/// Outcome of one finished run (episode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Generation that was evaluated.
    pub generation: u64,
    /// Track size the run took place on.
    pub track_size: usize,
    pub finished: usize,
    pub collided: usize,
    /// Vehicles still running when the tick budget ran out.
    pub timed_out: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    /// Mean ticks to finish among finishers.
    pub mean_finish_ticks: Option<f64>,
    /// The schedule replaced the track after this run.
    pub regenerated: bool,
    /// The schedule grew the track after this run.
    pub resized: bool,
}

impl RunSummary {
    /// At least one vehicle reached the finish line.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.finished > 0
    }
}

/// Fitness statistics per evaluated generation, for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f64>,
    /// Average fitness per generation.
    pub mean_fitness: Vec<f64>,
    /// Fraction of the population that finished.
    pub finish_rate: Vec<f64>,
    /// Mutation chance in effect while the generation was evaluated.
    pub mutation_chance: Vec<f64>,
}

impl EvolutionHistory {
    pub fn record(&mut self, summary: &RunSummary, population: usize, mutation_chance: f64) {
        self.best_fitness.push(summary.best_fitness);
        self.mean_fitness.push(summary.mean_fitness);
        self.finish_rate
            .push(summary.finished as f64 / population.max(1) as f64);
        self.mutation_chance.push(mutation_chance);
    }

    pub fn len(&self) -> usize {
        self.best_fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_fitness.is_empty()
    }
}

/// Pose and sensing state of one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub center: Point,
    pub heading: f64,
    /// Body outline, Top, Right, Bottom, Left.
    pub body: [Segment; 4],
    /// Left and right wheel positions.
    pub wheel_positions: [Point; 2],
    /// Left and right wheel speeds.
    pub wheel_speeds: [f64; 2],
    pub sensor_origins: Vec<Point>,
    pub readings: Vec<SensorReading>,
    pub status: EpisodeStatus,
    pub collision: Option<Point>,
}

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub generation: u64,
    pub tick: u64,
    pub track_size: usize,
    pub tiles: Vec<Tile>,
    pub finish_line: Segment,
    pub vehicles: Vec<VehicleSnapshot>,
    pub counters: ScheduleCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(finished: usize, best: f64) -> RunSummary {
        RunSummary {
            generation: 0,
            track_size: 3,
            finished,
            collided: 4 - finished,
            timed_out: 0,
            best_fitness: best,
            mean_fitness: best / 2.0,
            mean_finish_ticks: None,
            regenerated: false,
            resized: false,
        }
    }

    #[test]
    fn test_history_records_rates() {
        let mut history = EvolutionHistory::default();
        history.record(&summary(1, 2.0), 4, 0.1);
        history.record(&summary(0, 1.0), 4, 0.2);

        assert_eq!(history.len(), 2);
        assert_eq!(history.finish_rate, vec![0.25, 0.0]);
        assert_eq!(history.mean_fitness, vec![1.0, 0.5]);
        assert!(summary(1, 0.0).is_success());
        assert!(!summary(0, 0.0).is_success());
    }
}
