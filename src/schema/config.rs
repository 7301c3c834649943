//! Configuration types for maze evolution runs.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use serde::{Deserialize, Serialize};

use crate::compute::{MAX_TRACK_SIZE, MIN_TRACK_SIZE};

/// Smallest population the genetic algorithm can breed from.
pub const MIN_POPULATION_SIZE: usize = 1;
/// Inclusive bounds for the per-generation tick budget.
pub const TICK_BUDGET_BOUNDS: (u64, u64) = (1, 100_000);

/// Most finish-bonus time scales one run may span. The bonus at the end of
/// a run stays at or above `finish_bonus * exp(-MAX_BONUS_DECAY)`, so
/// finishers one tick apart still score differently.
pub const MAX_BONUS_DECAY: f64 = 8.0;

/// Widest controller layer (inputs or hidden) a saved agent may carry.
pub const MAX_LAYER_WIDTH: usize = 1 << 16;

fn default_true() -> bool {
    true
}

/// Top-level simulation configuration.
///
/// Immutable once handed to the environment; runtime parameter changes go
/// through the environment's validated setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of vehicles per generation.
    pub population_size: usize,
    /// Tick budget for one episode.
    pub ticks_per_generation: u64,
    /// Maze layout parameters.
    pub track: TrackConfig,
    /// Vehicle body, speed limits and sensors.
    pub vehicle: VehicleConfig,
    /// Controller topology.
    pub network: NetworkConfig,
    /// Genetic algorithm parameters.
    pub genetic: GeneticConfig,
    /// Fitness shaping.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Track regeneration/resizing schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Run the genetic algorithm at the end of each episode.
    #[serde(default = "default_true")]
    pub learning_mode: bool,
    /// Start the next episode automatically when one ends.
    #[serde(default = "default_true")]
    pub auto_reset: bool,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            ticks_per_generation: 600,
            track: TrackConfig::default(),
            vehicle: VehicleConfig::default(),
            network: NetworkConfig::default(),
            genetic: GeneticConfig::default(),
            fitness: FitnessConfig::default(),
            schedule: ScheduleConfig::default(),
            learning_mode: true,
            auto_reset: true,
            random_seed: None,
        }
    }
}

/// Maze layout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Tiles per side of the grid.
    pub size: usize,
    /// Side length of the whole grid in world units; tiles are `world_size / size`.
    pub world_size: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            size: 7,
            world_size: 700.0,
        }
    }
}

impl TrackConfig {
    /// Tile side length for the configured grid size.
    pub fn tile_size(&self) -> f64 {
        self.tile_size_for(self.size)
    }

    /// Tile side length if the grid had `size` tiles per side.
    pub fn tile_size_for(&self, size: usize) -> f64 {
        self.world_size / size.max(1) as f64
    }
}

/// A single distance sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Angle relative to the vehicle heading, in radians.
    pub angle: f64,
    /// Maximum ray length in world units.
    pub range: f64,
}

/// Vehicle body, speed limits and sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Body extent along the heading; also the turning divisor.
    pub width: f64,
    /// Body extent across the heading; wheels sit at ±height/2.
    pub height: f64,
    /// Per-wheel speed limit (world units per tick).
    pub max_speed: f64,
    /// Largest speed change the controller may request per tick.
    pub max_speed_delta: f64,
    /// Largest heading change the controller may request per tick (radians).
    pub max_turn_angle: f64,
    /// Heading at reset (radians). π/2 faces down the maze.
    pub initial_heading: f64,
    /// Sensor fan.
    pub sensors: Vec<SensorConfig>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let range = 150.0;
        Self {
            width: 20.0,
            height: 20.0,
            max_speed: 5.0,
            max_speed_delta: 0.5,
            max_turn_angle: 0.15,
            initial_heading: FRAC_PI_2,
            sensors: [-FRAC_PI_2, -FRAC_PI_4, 0.0, FRAC_PI_4, FRAC_PI_2]
                .into_iter()
                .map(|angle| SensorConfig { angle, range })
                .collect(),
        }
    }
}

/// Controller topology (two hidden layers of equal width).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Width of each hidden layer.
    pub hidden_width: usize,
    /// Standard deviation of the initial weight distribution.
    pub init_std: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_width: 10,
            init_std: 0.5,
        }
    }
}

/// Genetic algorithm parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Fraction of the population carried over unchanged (elitism).
    pub carryover_fraction: f64,
    /// Per-gene mutation probability.
    pub mutation_chance: f64,
    /// Magnitude of a single gene perturbation.
    pub mutation_rate: f64,
    /// Adapt the mutation chance to elite fitness after every generation.
    #[serde(default)]
    pub dynamic_mutation: bool,
    /// Domain the dynamic mutation chance is clamped to.
    #[serde(default = "default_mutation_chance_bounds")]
    pub mutation_chance_bounds: (f64, f64),
    /// Elite fitness at which the dynamic chance has decayed by 1/e.
    #[serde(default = "default_dynamic_fitness_scale")]
    pub dynamic_fitness_scale: f64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            carryover_fraction: 0.2,
            mutation_chance: 0.1,
            mutation_rate: 0.1,
            dynamic_mutation: false,
            mutation_chance_bounds: default_mutation_chance_bounds(),
            dynamic_fitness_scale: default_dynamic_fitness_scale(),
        }
    }
}

fn default_mutation_chance_bounds() -> (f64, f64) {
    (0.01, 0.5)
}
fn default_dynamic_fitness_scale() -> f64 {
    2.0
}

/// Fitness shaping constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Bonus awarded for an instantaneous finish.
    pub finish_bonus: f64,
    /// Ticks over which the finish bonus decays by 1/e.
    pub time_scale: f64,
    /// Lower bound on the distance-to-goal denominator.
    pub min_goal_distance: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            finish_bonus: 10.0,
            time_scale: 250.0,
            min_goal_distance: 1.0,
        }
    }
}

/// Track regeneration and resizing schedule. `None` disables a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Regenerate the track after this many consecutive successful runs.
    #[serde(default)]
    pub regenerate_after: Option<u32>,
    /// Grow the track after this many scheduled regenerations.
    #[serde(default)]
    pub resize_after: Option<u32>,
}

impl SimulationConfig {
    /// Number of controller inputs: one per sensor plus the vehicle speed.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.vehicle.sensors.len() + 1
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_population_size(self.population_size)?;
        validate_tick_budget(self.ticks_per_generation)?;
        validate_track_size(self.track.size)?;
        if !positive(self.track.world_size) {
            return Err(ConfigError::InvalidWorldSize(self.track.world_size));
        }

        let v = &self.vehicle;
        if !(positive(v.width) && positive(v.height)) {
            return Err(ConfigError::InvalidVehicleDimensions);
        }
        let limits_ok = positive(v.max_speed)
            && non_negative(v.max_speed_delta)
            && non_negative(v.max_turn_angle);
        if !limits_ok {
            return Err(ConfigError::InvalidSpeedLimits);
        }
        if v.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        if let Some(i) = v.sensors.iter().position(|s| !positive(s.range)) {
            return Err(ConfigError::InvalidSensorRange(i));
        }

        if self.network.hidden_width == 0 {
            return Err(ConfigError::InvalidHiddenWidth);
        }
        validate_layer_width("hidden", self.network.hidden_width)?;
        validate_layer_width("input", self.input_size())?;
        if !non_negative(self.network.init_std) {
            return Err(ConfigError::InvalidInitStd(self.network.init_std));
        }

        let g = &self.genetic;
        validate_fraction("carryover_fraction", g.carryover_fraction)?;
        validate_fraction("mutation_chance", g.mutation_chance)?;
        validate_mutation_rate(g.mutation_rate)?;
        let (lo, hi) = g.mutation_chance_bounds;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(ConfigError::InvalidMutationDomain(lo, hi));
        }
        if !positive(g.dynamic_fitness_scale) {
            return Err(ConfigError::InvalidFitnessScale(g.dynamic_fitness_scale));
        }

        let f = &self.fitness;
        let shape_ok =
            positive(f.finish_bonus) && positive(f.time_scale) && positive(f.min_goal_distance);
        if !shape_ok {
            return Err(ConfigError::InvalidFitnessShape);
        }
        validate_bonus_decay(self.ticks_per_generation, f.time_scale)?;

        validate_schedule_interval(self.schedule.regenerate_after)?;
        validate_schedule_interval(self.schedule.resize_after)?;

        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Reject grid sizes outside the supported range.
pub fn validate_track_size(size: usize) -> Result<usize, ConfigError> {
    if (MIN_TRACK_SIZE..=MAX_TRACK_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(ConfigError::TrackSizeOutOfRange {
            size,
            min: MIN_TRACK_SIZE,
            max: MAX_TRACK_SIZE,
        })
    }
}

/// Reject tick budgets outside [`TICK_BUDGET_BOUNDS`].
pub fn validate_tick_budget(ticks: u64) -> Result<u64, ConfigError> {
    let (min, max) = TICK_BUDGET_BOUNDS;
    if (min..=max).contains(&ticks) {
        Ok(ticks)
    } else {
        Err(ConfigError::TickBudgetOutOfRange { ticks, min, max })
    }
}

/// Reject tick budgets longer than [`MAX_BONUS_DECAY`] bonus time scales.
pub fn validate_bonus_decay(ticks: u64, time_scale: f64) -> Result<(), ConfigError> {
    if ticks as f64 <= time_scale * MAX_BONUS_DECAY {
        Ok(())
    } else {
        Err(ConfigError::BonusDecayTooFast { ticks, time_scale })
    }
}

/// Reject controller layers wider than [`MAX_LAYER_WIDTH`].
pub fn validate_layer_width(layer: &'static str, width: usize) -> Result<usize, ConfigError> {
    if width <= MAX_LAYER_WIDTH {
        Ok(width)
    } else {
        Err(ConfigError::LayerTooWide {
            layer,
            width,
            max: MAX_LAYER_WIDTH,
        })
    }
}

/// Reject populations too small to breed.
pub fn validate_population_size(size: usize) -> Result<usize, ConfigError> {
    if size >= MIN_POPULATION_SIZE {
        Ok(size)
    } else {
        Err(ConfigError::PopulationTooSmall(size))
    }
}

/// Reject values outside `[0, 1]` (NaN included).
pub fn validate_fraction(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::FractionOutOfRange { name, value })
    }
}

/// Reject negative or non-finite mutation magnitudes.
pub fn validate_mutation_rate(value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidMutationRate(value))
    }
}

/// Reject enabled schedule rules with a zero interval.
pub fn validate_schedule_interval(every: Option<u32>) -> Result<Option<u32>, ConfigError> {
    match every {
        Some(0) => Err(ConfigError::InvalidScheduleInterval),
        other => Ok(other),
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Track size {size} outside supported range {min}..={max}")]
    TrackSizeOutOfRange { size: usize, min: usize, max: usize },
    #[error("Tick budget {ticks} outside supported range {min}..={max}")]
    TickBudgetOutOfRange { ticks: u64, min: u64, max: u64 },
    #[error("Population size {0} is too small (need at least 1)")]
    PopulationTooSmall(usize),
    #[error("World size must be positive, got {0}")]
    InvalidWorldSize(f64),
    #[error("Vehicle width and height must be positive")]
    InvalidVehicleDimensions,
    #[error("Vehicle speed limits must be non-negative (max speed positive)")]
    InvalidSpeedLimits,
    #[error("Vehicle needs at least one sensor")]
    NoSensors,
    #[error("Sensor {0} must have a positive range")]
    InvalidSensorRange(usize),
    #[error("Hidden layer width must be non-zero")]
    InvalidHiddenWidth,
    #[error("Initial weight deviation must be non-negative, got {0}")]
    InvalidInitStd(f64),
    #[error("{name} must be within [0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },
    #[error("Mutation rate must be finite and non-negative, got {0}")]
    InvalidMutationRate(f64),
    #[error("Invalid mutation chance domain [{0}, {1}]")]
    InvalidMutationDomain(f64, f64),
    #[error("Dynamic fitness scale must be positive, got {0}")]
    InvalidFitnessScale(f64),
    #[error("Fitness bonus and time/distance scales must be positive")]
    InvalidFitnessShape,
    #[error(
        "Tick budget {ticks} spans more than {} bonus time scales of {time_scale}",
        MAX_BONUS_DECAY
    )]
    BonusDecayTooFast { ticks: u64, time_scale: f64 },
    #[error("{layer} layer width {width} exceeds {max}")]
    LayerTooWide {
        layer: &'static str,
        width: usize,
        max: usize,
    },
    #[error("Schedule interval must be positive when enabled")]
    InvalidScheduleInterval,
}
