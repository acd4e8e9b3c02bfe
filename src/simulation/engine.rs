//! Simulation driver that ties everything together
//!
//! One `Simulation` owns the clock, the world, the controller and the spawn
//! generator. Every tick runs the same sequence: advance the clock, spawn and
//! move vehicles under the lights chosen last tick, aggregate the queues, let
//! the controller pick the next lights, and hand a snapshot to the sinks.

use anyhow::{Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::clock::SimClock;
use super::config::SimulationConfig;
use super::controller::{IntersectionController, LightPhase};
use super::error::{DispatchError, SpawnRejected};
use super::metrics::{ApproachSnapshot, MetricsSink, Snapshot};
use super::planner::{plan_path, GridPos, Path, RoutingGrid};
use super::types::{Direction, VehicleCategory, VehicleId};
use super::world::{Aggregates, World};

/// Commands applied between ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    Reset,
    SetSpeed(f32),
}

pub struct Simulation {
    config: SimulationConfig,
    clock: SimClock,
    world: World,
    controller: IntersectionController,
    grid: RoutingGrid,
    rng: StdRng,
    /// Lights gating vehicle movement on the next tick
    lights: LightPhase,
    last_snapshot: Snapshot,
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config
            .validate()
            .context("invalid simulation configuration")?;

        let clock = SimClock::new(config.tick_duration);
        let world = World::new(config.capacity, config.spawn_rates.clone());
        let controller = IntersectionController::new(config.controller.clone());
        let grid = RoutingGrid::district(config.district_size);
        let rng = StdRng::seed_from_u64(config.seed);
        let lights = controller.phase();
        let last_snapshot =
            build_snapshot(&clock, &world, &controller, lights, &world.aggregates(), 0);

        Ok(Self {
            config,
            clock,
            world,
            controller,
            grid,
            rng,
            lights,
            last_snapshot,
            sinks: Vec::new(),
        })
    }

    /// Register a sink that receives every snapshot from now on
    pub fn add_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.sinks.push(sink);
    }

    /// Run one tick and return its snapshot.
    ///
    /// While paused nothing moves and the previous snapshot is returned.
    pub fn tick(&mut self) -> Snapshot {
        if !self.clock.is_running() {
            return self.last_snapshot.clone();
        }

        let tick = self.clock.tick();
        let delta_secs = self.clock.step_secs();

        self.world.spawn_random(&mut self.rng, tick, delta_secs);
        let exited = self.world.advance(&self.lights, delta_secs);
        let aggregates = self.world.aggregates();
        self.lights = self.controller.update(&aggregates, tick, delta_secs);

        let snapshot = self.snapshot(&aggregates, exited.len());
        for sink in &mut self.sinks {
            sink.record(&snapshot);
        }
        self.last_snapshot = snapshot.clone();
        snapshot
    }

    pub fn control(&mut self, command: Command) {
        match command {
            Command::Pause => {
                self.clock.pause();
                info!("Simulation paused at tick {}", self.clock.now());
            }
            Command::Resume => {
                self.clock.resume();
                info!("Simulation resumed at tick {}", self.clock.now());
            }
            Command::Reset => self.reset(),
            Command::SetSpeed(multiplier) => {
                let applied = self.clock.set_speed(multiplier);
                if applied != multiplier {
                    warn!("Speed {} out of range, using {}", multiplier, applied);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.world.reset();
        self.controller.reset();
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.lights = self.controller.phase();
        self.last_snapshot = self.snapshot(&self.world.aggregates(), 0);
        info!("Simulation reset");
    }

    /// Spawn an ordinary vehicle immediately, bypassing the random arrivals
    pub fn spawn(
        &mut self,
        direction: Direction,
        category: VehicleCategory,
    ) -> Result<VehicleId, SpawnRejected> {
        self.world.spawn(direction, category, self.clock.now())
    }

    /// Force an emergency vehicle onto `direction`, routed from that
    /// approach's entry cell to the intersection.
    pub fn spawn_emergency(&mut self, direction: Direction) -> Result<VehicleId, DispatchError> {
        let result = plan_path(&self.grid, self.grid.entry(direction), self.grid.center())
            .map_err(DispatchError::from)
            .and_then(|route| self.place_emergency(direction, route));
        if let Err(e) = &result {
            warn!("Emergency spawn on {} discarded: {}", direction, e);
        }
        result
    }

    /// Route an emergency vehicle from any district cell to the
    /// intersection. The side the route arrives from picks the approach.
    pub fn dispatch_emergency(&mut self, origin: GridPos) -> Result<VehicleId, DispatchError> {
        let result = plan_path(&self.grid, origin, self.grid.center())
            .map_err(DispatchError::from)
            .and_then(|route| {
                let direction = route
                    .approach()
                    .ok_or(DispatchError::OriginAtIntersection(origin))?;
                self.place_emergency(direction, route)
            });
        if let Err(e) = &result {
            warn!("Emergency dispatch from {} discarded: {}", origin, e);
        }
        result
    }

    fn place_emergency(&mut self, direction: Direction, route: Path) -> Result<VehicleId, DispatchError> {
        let steps = route.steps();
        let id = self
            .world
            .spawn(direction, VehicleCategory::Emergency, self.clock.now())?;
        self.world.set_route(id, route);
        info!("Emergency vehicle {} on {} approach ({} route steps)", id, direction, steps);
        Ok(id)
    }

    fn snapshot(&self, aggregates: &Aggregates, exited_this_tick: usize) -> Snapshot {
        build_snapshot(
            &self.clock,
            &self.world,
            &self.controller,
            self.lights,
            aggregates,
            exited_this_tick,
        )
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn controller(&self) -> &IntersectionController {
        &self.controller
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn lights(&self) -> LightPhase {
        self.lights
    }

    pub fn grid(&self) -> &RoutingGrid {
        &self.grid
    }

    /// Mutable routing district, e.g. to close streets
    pub fn grid_mut(&mut self) -> &mut RoutingGrid {
        &mut self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn last_snapshot(&self) -> &Snapshot {
        &self.last_snapshot
    }
}

fn build_snapshot(
    clock: &SimClock,
    world: &World,
    controller: &IntersectionController,
    lights: LightPhase,
    aggregates: &Aggregates,
    exited_this_tick: usize,
) -> Snapshot {
    let live = world.direction_counts();
    let approaches = Direction::ALL.map(|direction| {
        let agg = aggregates.get(direction);
        ApproachSnapshot {
            direction,
            queue_length: agg.queue_length,
            average_wait: agg.average_wait,
            emergency_present: agg.emergency_present,
            live_vehicles: live[direction.index()],
        }
    });

    Snapshot {
        tick: clock.now(),
        sim_time: clock.elapsed_secs(),
        approaches,
        lights,
        phase_time_remaining: controller.time_remaining(),
        vehicles_by_category: world.category_counts(),
        states: world.state_counts(),
        counters: world.counters(),
        decision: controller.last_reason(),
        preemption_active: controller.preemption_target().is_some(),
        exited_this_tick,
    }
}
