//! Evolution environment: the per-tick simulation, end-of-run handling and
//! the command surface used by drivers and control panels.
//!
//! One episode (run) lasts until every vehicle has collided or finished, or
//! the tick budget is exhausted. At the end of a run, in order:
//!
//! 1. unless observing, the regeneration/resize schedule advances;
//! 2. unless observing or learning is off, the genetic algorithm breeds the
//!    next generation (and the dynamic mutation chance is updated);
//! 3. the track is replaced if the schedule fired, and all vehicles reset.
//!
//! With auto-reset off the finished run is held until
//! [`Environment::proceed_to_next_generation`] is called.

use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use super::evolution::{
    EvolutionRng, GeneticError, Genome, dynamic_mutation_chance, evaluate_all, next_generation,
    rank_by_fitness,
};
use super::geometry::{Point, Segment, distance, intersect};
use super::network::{NeuralController, OutputScale, Topology};
use super::track::{MAX_TRACK_SIZE, MIN_TRACK_SIZE, Track, TrackGenerator};
use super::vehicle::Vehicle;
use crate::persistence::{AgentFormatError, AgentRecord};
use crate::report::ExperimentReport;
use crate::schema::{
    ConfigError, EnvironmentSnapshot, EpisodeData, EpisodeStatus, EvolutionHistory, RunSummary,
    ScheduleCounters, SensorReading, SimulationConfig, VehicleSnapshot, validate_bonus_decay,
    validate_fraction, validate_mutation_rate, validate_schedule_interval, validate_tick_budget,
    validate_track_size,
};

/// Errors surfaced by environment commands.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Genetic(#[from] GeneticError),
    #[error(transparent)]
    Format(#[from] AgentFormatError),
    #[error("Population slot {slot} out of range (population {len})")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// Result of a single [`Environment::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The run is still going, or just ended and is waiting for a manual proceed.
    Advanced,
    /// The run ended and end-of-run handling was applied.
    RunEnded(RunSummary),
    /// Nothing to do: the run is over and auto-reset is off.
    Idle,
}

/// One member of the population.
#[derive(Debug, Clone)]
pub struct Agent {
    pub vehicle: Vehicle,
    pub controller: NeuralController,
    pub episode: EpisodeData,
}

impl Agent {
    fn body_radius(&self) -> f64 {
        self.vehicle.width().hypot(self.vehicle.height()) * 0.5
    }

    fn reset(&mut self, track: &Track, start: Point, goal: Point) {
        self.vehicle.reset(start);
        self.episode = EpisodeData::new(0, distance(start, goal));
        self.sense(track);
    }

    /// Move, detect collision or finish, sense, then steer.
    fn step(&mut self, track: &Track, start: Point, goal: Point, tick: u64) {
        if self.episode.status.is_done() {
            return;
        }

        let before = self.vehicle.center();
        self.vehicle.move_step();
        let center = self.vehicle.center();
        self.episode.displacement_from_start = distance(start, center);
        self.episode.displacement_to_goal = distance(center, goal);

        if let Some(point) = self.find_collision(track, before) {
            self.episode.status = EpisodeStatus::Collided;
            self.episode.collision = Some(point);
        } else if self.crossed_finish(track, before) {
            self.episode.status = EpisodeStatus::Finished;
            self.episode.finish_tick = Some(tick);
        }

        self.sense(track);
        if !self.episode.status.is_done() {
            let (d_theta, d_speed) = self.controller.predict(&self.inputs());
            self.vehicle.drive(d_theta, d_speed);
        }
    }

    /// Body overlap at the new pose, else the first wall the center's motion
    /// segment crossed since `before`.
    fn find_collision(&self, track: &Track, before: Point) -> Option<Point> {
        let center = self.vehicle.center();
        if !track.in_bounds(center) {
            return Some(center);
        }
        let path = Segment::new(before, center);
        let reach = self.body_radius() + path.length();
        track
            .walls_near(center, reach)
            .find_map(|wall| self.vehicle.collides(wall))
            .or_else(|| {
                track
                    .walls_near(center, reach)
                    .filter_map(|wall| intersect(&path, wall))
                    .min_by(|a, b| distance(before, *a).total_cmp(&distance(before, *b)))
            })
    }

    fn crossed_finish(&self, track: &Track, before: Point) -> bool {
        let line = track.finish_line();
        self.vehicle.collides(&line).is_some()
            || intersect(&Segment::new(before, self.vehicle.center()), &line).is_some()
    }

    /// Nearest wall hit per sensor; the ray end when nothing is in range.
    fn sense(&mut self, track: &Track) {
        let center = self.vehicle.center();
        let radius = self.body_radius();
        self.episode.readings = self
            .vehicle
            .sensors()
            .iter()
            .map(|sensor| {
                track
                    .walls_near(center, sensor.range + radius)
                    .filter_map(|wall| sensor.intersects(wall))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(point, distance)| SensorReading {
                        point,
                        distance,
                        hit: true,
                    })
                    .unwrap_or_else(|| SensorReading {
                        point: sensor.ray_end(),
                        distance: sensor.range,
                        hit: false,
                    })
            })
            .collect();
    }

    /// Sensor distances over range, then speed over max speed.
    fn inputs(&self) -> Vec<f64> {
        let mut inputs: Vec<f64> = self
            .episode
            .readings
            .iter()
            .zip(self.vehicle.sensors())
            .map(|(reading, sensor)| reading.distance / sensor.range)
            .collect();
        inputs.push(self.vehicle.speed() / self.vehicle.max_speed());
        inputs
    }

    fn snapshot(&self) -> VehicleSnapshot {
        let [left, right] = self.vehicle.wheels();
        VehicleSnapshot {
            center: self.vehicle.center(),
            heading: self.vehicle.heading(),
            body: self.vehicle.body_borders(),
            wheel_positions: [left.position, right.position],
            wheel_speeds: [left.speed, right.speed],
            sensor_origins: self.vehicle.sensors().iter().map(|s| s.origin()).collect(),
            readings: self.episode.readings.clone(),
            status: self.episode.status,
            collision: self.episode.collision,
        }
    }
}

/// Size the resize schedule grows to after `size`, wrapping at the maximum.
pub fn next_track_size(size: usize) -> usize {
    if size >= MAX_TRACK_SIZE {
        MIN_TRACK_SIZE
    } else {
        size + 1
    }
}

/// Population of vehicles evolving on a shared track.
pub struct Environment {
    config: SimulationConfig,
    track: Arc<Track>,
    agents: Vec<Agent>,
    rng: EvolutionRng,
    topology: Topology,
    generation: u64,
    tick: u64,
    run_done: bool,
    observing: bool,
    counters: ScheduleCounters,
    history: EvolutionHistory,
    report: ExperimentReport,
}

impl Environment {
    /// Validate `config`, generate the first track and a random population.
    pub fn new(config: SimulationConfig) -> Result<Self, EnvironmentError> {
        config.validate()?;

        let mut rng = config
            .random_seed
            .map_or_else(EvolutionRng::random, EvolutionRng::new);
        let generator = TrackGenerator::new(config.track.size, config.track.tile_size());
        let track = Arc::new(generator.generate(rng.rng_mut()));

        let topology = Topology::from_config(&config);
        let scale = OutputScale::from_config(&config);
        let start = track.first_tile().center();
        let agents = (0..config.population_size)
            .map(|_| Agent {
                vehicle: Vehicle::new(start, &config.vehicle),
                controller: NeuralController::random(
                    topology,
                    scale,
                    config.network.init_std,
                    rng.rng_mut(),
                ),
                episode: EpisodeData::new(0, 0.0),
            })
            .collect();

        let mut env = Self {
            config,
            track,
            agents,
            rng,
            topology,
            generation: 0,
            tick: 0,
            run_done: false,
            observing: false,
            counters: ScheduleCounters::default(),
            history: EvolutionHistory::default(),
            report: ExperimentReport::new(),
        };
        env.reset_agents();
        Ok(env)
    }

    /// Advance every running vehicle by one tick.
    pub fn tick(&mut self) -> Result<TickOutcome, EnvironmentError> {
        if self.run_done {
            if self.config.auto_reset {
                return self.proceed_to_next_generation().map(TickOutcome::RunEnded);
            }
            return Ok(TickOutcome::Idle);
        }

        self.tick += 1;
        let tick = self.tick;
        let track: &Track = &self.track;
        let start = track.first_tile().center();
        let goal = track.finish_line().midpoint();
        self.agents
            .par_iter_mut()
            .for_each(|agent| agent.step(track, start, goal, tick));

        let all_done = self.agents.iter().all(|a| a.episode.status.is_done());
        if all_done || self.tick >= self.config.ticks_per_generation {
            self.run_done = true;
            if self.config.auto_reset {
                return self.proceed_to_next_generation().map(TickOutcome::RunEnded);
            }
        }
        Ok(TickOutcome::Advanced)
    }

    /// End the current run now (whether or not it is over) and apply
    /// end-of-run handling.
    pub fn proceed_to_next_generation(&mut self) -> Result<RunSummary, EnvironmentError> {
        let fitnesses = self.fitnesses();
        let mut summary = self.summarize(&fitnesses);
        let chance_in_effect = self.config.genetic.mutation_chance;

        if !self.observing {
            let (regenerate, resize) = self.advance_schedule(summary.is_success());
            summary.regenerated = regenerate;
            summary.resized = resize;
            if self.config.learning_mode {
                self.evolve(&fitnesses)?;
            }
        }

        debug!(
            "run ended: generation {} size {} finished {} collided {} timed out {} best {:.3}",
            summary.generation,
            summary.track_size,
            summary.finished,
            summary.collided,
            summary.timed_out,
            summary.best_fitness
        );
        self.history
            .record(&summary, self.agents.len(), chance_in_effect);
        self.report.record(&summary);

        if summary.resized {
            let size = next_track_size(self.track.size());
            self.replace_track(size);
            self.counters.total_resizes += 1;
            info!("track resized to {size} after {} runs", self.history.len());
        } else if summary.regenerated {
            self.replace_track(self.track.size());
            self.counters.total_regenerations += 1;
            info!("track regenerated after {} runs", self.history.len());
        }

        self.reset_agents();
        Ok(summary)
    }

    /// Restart the current episode without evolving.
    pub fn reset_episode(&mut self) {
        self.reset_agents();
    }

    /// Replace the track with a new layout of the same size and restart the episode.
    pub fn regenerate_track(&mut self) {
        self.replace_track(self.track.size());
        self.counters.total_regenerations += 1;
        self.counters.success_streak = 0;
        info!("track regenerated (size {})", self.track.size());
        self.reset_agents();
    }

    /// Replace the track with a new one of `size` tiles per side and restart
    /// the episode.
    pub fn resize_track(&mut self, size: usize) -> Result<(), EnvironmentError> {
        validate_track_size(size)?;
        self.replace_track(size);
        self.counters.total_resizes += 1;
        self.counters.success_streak = 0;
        self.counters.regenerations_since_resize = 0;
        info!("track resized to {size}");
        self.reset_agents();
        Ok(())
    }

    pub fn set_learning_mode(&mut self, enabled: bool) {
        self.config.learning_mode = enabled;
    }

    pub fn set_auto_reset(&mut self, enabled: bool) {
        self.config.auto_reset = enabled;
    }

    /// While observing, runs still end and reset but neither the schedule
    /// nor the genetic algorithm advances.
    pub fn set_observing(&mut self, enabled: bool) {
        self.observing = enabled;
    }

    pub fn set_dynamic_mutation(&mut self, enabled: bool) {
        self.config.genetic.dynamic_mutation = enabled;
    }

    pub fn set_mutation_chance(&mut self, chance: f64) -> Result<(), ConfigError> {
        self.config.genetic.mutation_chance = validate_fraction("mutation_chance", chance)?;
        Ok(())
    }

    pub fn set_mutation_rate(&mut self, rate: f64) -> Result<(), ConfigError> {
        self.config.genetic.mutation_rate = validate_mutation_rate(rate)?;
        Ok(())
    }

    pub fn set_carryover_fraction(&mut self, fraction: f64) -> Result<(), ConfigError> {
        self.config.genetic.carryover_fraction = validate_fraction("carryover_fraction", fraction)?;
        Ok(())
    }

    /// Takes effect on the current run: it ends once the tick counter reaches
    /// the new budget. The budget may span at most
    /// [`MAX_BONUS_DECAY`](crate::schema::MAX_BONUS_DECAY) finish
    /// bonus time scales.
    pub fn set_ticks_per_generation(&mut self, ticks: u64) -> Result<(), ConfigError> {
        let ticks = validate_tick_budget(ticks)?;
        validate_bonus_decay(ticks, self.config.fitness.time_scale)?;
        self.config.ticks_per_generation = ticks;
        Ok(())
    }

    /// Regenerate after this many consecutive successful runs (`None` disables).
    pub fn set_regenerate_after(&mut self, runs: Option<u32>) -> Result<(), ConfigError> {
        self.config.schedule.regenerate_after = validate_schedule_interval(runs)?;
        Ok(())
    }

    /// Resize after this many scheduled regenerations (`None` disables).
    pub fn set_resize_after(&mut self, regenerations: Option<u32>) -> Result<(), ConfigError> {
        self.config.schedule.resize_after = validate_schedule_interval(regenerations)?;
        Ok(())
    }

    /// Index of the fittest agent in the current episode; ties go to the
    /// lowest index, which after breeding is the previous generation's best.
    pub fn best_agent_index(&self) -> usize {
        rank_by_fitness(&self.fitnesses())
            .first()
            .copied()
            .unwrap_or(0)
    }

    /// Serialize the fittest agent's controller.
    pub fn save_best_agent(&self) -> Result<Vec<u8>, EnvironmentError> {
        let agent = self
            .agents
            .get(self.best_agent_index())
            .ok_or(GeneticError::EmptyPopulation)?;
        Ok(AgentRecord::from_controller(&agent.controller).to_bytes()?)
    }

    /// Replace the controller weights of population slot `slot` with a saved agent.
    pub fn load_agent(&mut self, slot: usize, blob: &[u8]) -> Result<(), EnvironmentError> {
        self.check_slot(slot)?;
        let record = AgentRecord::from_bytes(blob)?;
        self.load_record(slot, &record)
    }

    /// Install a decoded agent into population slot `slot`.
    pub fn load_record(
        &mut self,
        slot: usize,
        record: &AgentRecord,
    ) -> Result<(), EnvironmentError> {
        self.check_slot(slot)?;
        if record.topology != self.topology {
            return Err(AgentFormatError::TopologyMismatch {
                expected: self.topology,
                found: record.topology,
            }
            .into());
        }
        self.agents[slot].controller.set_genome(&record.genome)?;
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of generations bred so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ticks elapsed in the current run.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn counters(&self) -> ScheduleCounters {
        self.counters
    }

    /// Whether the current run is over and waiting to proceed.
    pub fn is_run_done(&self) -> bool {
        self.run_done
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn mutation_chance(&self) -> f64 {
        self.config.genetic.mutation_chance
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    pub fn report(&self) -> &ExperimentReport {
        &self.report
    }

    /// Fitness of every agent for the current episode.
    pub fn fitnesses(&self) -> Vec<f64> {
        evaluate_all(self.agents.iter().map(|a| &a.episode), &self.config.fitness)
    }

    /// Read-only view for rendering.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            generation: self.generation,
            tick: self.tick,
            track_size: self.track.size(),
            tiles: self.track.tiles().to_vec(),
            finish_line: self.track.finish_line(),
            vehicles: self.agents.iter().map(Agent::snapshot).collect(),
            counters: self.counters,
        }
    }

    fn check_slot(&self, slot: usize) -> Result<(), EnvironmentError> {
        let len = self.agents.len();
        if slot < len {
            Ok(())
        } else {
            Err(EnvironmentError::SlotOutOfRange { slot, len })
        }
    }

    fn reset_agents(&mut self) {
        self.tick = 0;
        self.run_done = false;
        let track: &Track = &self.track;
        let start = track.first_tile().center();
        let goal = track.finish_line().midpoint();
        for agent in &mut self.agents {
            agent.reset(track, start, goal);
        }
    }

    fn replace_track(&mut self, size: usize) {
        let generator = TrackGenerator::new(size, self.config.track.tile_size_for(size));
        let track = if size == self.track.size() {
            generator.regenerate_distinct(&self.track, self.rng.rng_mut())
        } else {
            generator.generate(self.rng.rng_mut())
        };
        self.track = Arc::new(track);
        self.config.track.size = size;
    }

    /// Update the streak counters; returns whether to (regenerate, resize).
    fn advance_schedule(&mut self, success: bool) -> (bool, bool) {
        let counters = &mut self.counters;
        counters.success_streak = if success {
            counters.success_streak + 1
        } else {
            0
        };

        let Some(every) = self.config.schedule.regenerate_after else {
            return (false, false);
        };
        if counters.success_streak < every {
            return (false, false);
        }
        counters.success_streak = 0;
        counters.regenerations_since_resize += 1;

        match self.config.schedule.resize_after {
            Some(every) if counters.regenerations_since_resize >= every => {
                counters.regenerations_since_resize = 0;
                (true, true)
            }
            _ => (true, false),
        }
    }

    fn evolve(&mut self, fitnesses: &[f64]) -> Result<(), EnvironmentError> {
        let genomes: Vec<Genome> = self
            .agents
            .iter()
            .map(|a| a.controller.to_genome())
            .collect();
        let genetic = self.config.genetic.clone();
        let next = next_generation(
            &mut self.rng,
            &genomes,
            fitnesses,
            genetic.carryover_fraction,
            genetic.mutation_chance,
            genetic.mutation_rate,
        )?;
        for (agent, genome) in self.agents.iter_mut().zip(&next.genomes) {
            agent.controller.set_genome(genome)?;
        }

        if genetic.dynamic_mutation {
            self.config.genetic.mutation_chance = dynamic_mutation_chance(
                next.elite_mean_fitness,
                genetic.mutation_chance_bounds,
                genetic.dynamic_fitness_scale,
            );
        }
        self.generation += 1;
        info!(
            "generation {} bred: best {:.3}, elite mean {:.3}, mutation chance {:.3}",
            self.generation,
            next.best_fitness,
            next.elite_mean_fitness,
            self.config.genetic.mutation_chance
        );
        Ok(())
    }

    fn summarize(&self, fitnesses: &[f64]) -> RunSummary {
        let count = |status: EpisodeStatus| {
            self.agents
                .iter()
                .filter(|a| a.episode.status == status)
                .count()
        };
        let finish_ticks: Vec<u64> = self
            .agents
            .iter()
            .filter(|a| a.episode.is_finished())
            .filter_map(|a| a.episode.ticks_taken())
            .collect();
        let mean_finish_ticks = (!finish_ticks.is_empty())
            .then(|| finish_ticks.iter().sum::<u64>() as f64 / finish_ticks.len() as f64);

        RunSummary {
            generation: self.generation,
            track_size: self.track.size(),
            finished: count(EpisodeStatus::Finished),
            collided: count(EpisodeStatus::Collided),
            timed_out: count(EpisodeStatus::Running),
            best_fitness: fitnesses.iter().copied().fold(0.0, f64::max),
            mean_fitness: fitnesses.iter().sum::<f64>() / fitnesses.len().max(1) as f64,
            mean_finish_ticks,
            regenerated: false,
            resized: false,
        }
    }
}
