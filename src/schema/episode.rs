//! Per-vehicle episode state.

use serde::{Deserialize, Serialize};

use crate::compute::Point;

/// Lifecycle of a single vehicle within one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EpisodeStatus {
    /// Still moving, sensing and steering.
    #[default]
    Running,
    /// Hit a wall or left the world; frozen until reset.
    Collided,
    /// Crossed the finish line; frozen until reset.
    Finished,
}

impl EpisodeStatus {
    /// Whether the vehicle stopped updating for this episode.
    #[inline]
    pub fn is_done(self) -> bool {
        !matches!(self, EpisodeStatus::Running)
    }
}

/// Result of casting one sensor ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Nearest wall hit, or the ray end when nothing was hit.
    pub point: Point,
    /// Distance from the sensor origin to `point`.
    pub distance: f64,
    /// `false` when the ray reached full range.
    pub hit: bool,
}

/// Everything observed about one vehicle during the current episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeData {
    /// One reading per sensor, in sensor order.
    pub readings: Vec<SensorReading>,
    /// Where the vehicle collided, if it did.
    pub collision: Option<Point>,
    /// Straight-line distance from the start position.
    pub displacement_from_start: f64,
    /// Straight-line distance to the finish line midpoint.
    pub displacement_to_goal: f64,
    pub status: EpisodeStatus,
    /// Tick at which the episode began.
    pub start_tick: u64,
    /// Tick at which the vehicle crossed the finish line.
    pub finish_tick: Option<u64>,
}

impl EpisodeData {
    /// Fresh episode data for a vehicle sitting at the start.
    pub fn new(start_tick: u64, displacement_to_goal: f64) -> Self {
        Self {
            readings: Vec::new(),
            collision: None,
            displacement_from_start: 0.0,
            displacement_to_goal,
            status: EpisodeStatus::Running,
            start_tick,
            finish_tick: None,
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status == EpisodeStatus::Finished
    }

    #[inline]
    pub fn is_collided(&self) -> bool {
        self.status == EpisodeStatus::Collided
    }

    /// Ticks from episode start to finish, if finished.
    pub fn ticks_taken(&self) -> Option<u64> {
        self.finish_tick
            .map(|finish| finish.saturating_sub(self.start_tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_taken() {
        let mut episode = EpisodeData::new(10, 250.0);
        assert_eq!(episode.ticks_taken(), None);
        assert!(!episode.status.is_done());

        episode.status = EpisodeStatus::Finished;
        episode.finish_tick = Some(42);
        assert_eq!(episode.ticks_taken(), Some(32));
        assert!(episode.is_finished());
        assert!(episode.status.is_done());
    }
}
