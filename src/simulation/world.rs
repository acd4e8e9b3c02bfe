//! Vehicle registry for the intersection
//!
//! The world owns every live vehicle and the three ordered lanes of each
//! approach: vehicles still driving in, the stop-line queue, and vehicles
//! crossing the box. A vehicle id is in exactly one of those lanes until it
//! exits, at which point it is removed from the registry in the same step.

use log::debug;
use ordered_float::OrderedFloat;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};

use super::config::SpawnRates;
use super::controller::LightPhase;
use super::error::SpawnRejected;
use super::planner::Path;
use super::types::{
    Axis, Direction, VehicleCategory, VehicleId, APPROACH_LENGTH, INTERSECTION_SPAN,
    VEHICLE_SPACING,
};
use super::vehicle::{Vehicle, VehicleState};

/// Lifetime spawn and exit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleCounters {
    /// Every spawn attempt, accepted or not
    pub requested: u64,
    pub accepted: u64,
    pub rejected_capacity: u64,
    pub rejected_blocked: u64,
    pub exited: u64,
}

impl VehicleCounters {
    pub fn rejected(&self) -> u64 {
        self.rejected_capacity + self.rejected_blocked
    }
}

/// Live vehicles per lifecycle stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub approaching: usize,
    pub queued: usize,
    pub crossing: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.approaching + self.queued + self.crossing
    }
}

/// Queue summary for one approach
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApproachAggregate {
    pub queue_length: usize,
    /// Mean wait of the queued vehicles, 0 when the queue is empty
    pub average_wait: f32,
    pub emergency_present: bool,
}

/// Per-direction queue summaries, indexed by [`Direction::index`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregates {
    per_direction: [ApproachAggregate; 4],
}

impl Aggregates {
    pub fn from_parts(per_direction: [ApproachAggregate; 4]) -> Self {
        Self { per_direction }
    }

    pub fn get(&self, direction: Direction) -> &ApproachAggregate {
        &self.per_direction[direction.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &ApproachAggregate)> {
        Direction::ALL
            .into_iter()
            .map(move |d| (d, &self.per_direction[d.index()]))
    }

    /// Longest queue on either approach of the axis
    pub fn axis_max_queue(&self, axis: Axis) -> usize {
        axis.directions()
            .iter()
            .map(|d| self.get(*d).queue_length)
            .max()
            .unwrap_or(0)
    }

    /// Highest average wait on either approach of the axis
    pub fn axis_max_wait(&self, axis: Axis) -> f32 {
        axis.directions()
            .iter()
            .map(|d| self.get(*d).average_wait)
            .fold(0.0, f32::max)
    }

    pub fn axis_has_emergency(&self, axis: Axis) -> bool {
        axis.directions()
            .iter()
            .any(|d| self.get(*d).emergency_present)
    }
}

/// Lanes of one approach, each ordered front (furthest along) to back
#[derive(Debug, Clone, Default)]
struct Approach {
    approaching: VecDeque<VehicleId>,
    queue: VecDeque<VehicleId>,
    crossing: VecDeque<VehicleId>,
}

impl Approach {
    /// Stop position for the next vehicle to join the queue
    fn queue_tail(&self) -> f32 {
        APPROACH_LENGTH - self.queue.len() as f32 * VEHICLE_SPACING
    }
}

/// The vehicle registry
#[derive(Debug, Clone)]
pub struct World {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    approaches: [Approach; 4],
    capacity: usize,
    spawn_rates: SpawnRates,
    next_id: u64,
    counters: VehicleCounters,
}

impl World {
    pub fn new(capacity: usize, spawn_rates: SpawnRates) -> Self {
        Self {
            vehicles: BTreeMap::new(),
            approaches: Default::default(),
            capacity,
            spawn_rates,
            next_id: 0,
            counters: VehicleCounters::default(),
        }
    }

    /// Drop every vehicle and zero the counters
    pub fn reset(&mut self) {
        self.vehicles.clear();
        self.approaches = Default::default();
        self.next_id = 0;
        self.counters = VehicleCounters::default();
    }

    /// Place a new vehicle at the start of an approach.
    ///
    /// Rejections are counted and returned; they are not faults.
    pub fn spawn(
        &mut self,
        direction: Direction,
        category: VehicleCategory,
        tick: u64,
    ) -> Result<VehicleId, SpawnRejected> {
        self.counters.requested += 1;

        if self.vehicles.len() >= self.capacity {
            self.counters.rejected_capacity += 1;
            return Err(SpawnRejected::CapacityExceeded);
        }

        let approach = &self.approaches[direction.index()];
        let last_in_lane = approach
            .approaching
            .back()
            .and_then(|id| self.vehicles.get(id))
            .map(|v| v.position.into_inner());
        let blocked = match last_in_lane {
            Some(position) => position < VEHICLE_SPACING,
            None => approach.queue_tail() < 0.0,
        };
        if blocked {
            self.counters.rejected_blocked += 1;
            return Err(SpawnRejected::SpawnBlocked);
        }

        let id = VehicleId(self.next_id);
        self.next_id += 1;
        self.vehicles
            .insert(id, Vehicle::new(id, category, direction, tick));
        self.approaches[direction.index()].approaching.push_back(id);
        self.counters.accepted += 1;

        debug!("Spawned {} {:?} on {} approach", id, category, direction);
        Ok(id)
    }

    /// Roll for random arrivals on every approach.
    ///
    /// Each (direction, category) pair arrives with probability
    /// `rate * delta_secs`. Returns the number of vehicles actually placed.
    pub fn spawn_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        tick: u64,
        delta_secs: f32,
    ) -> usize {
        let mut placed = 0;
        for direction in Direction::ALL {
            for category in VehicleCategory::ALL {
                let probability = (self.spawn_rates.rate(category) * delta_secs).clamp(0.0, 1.0);
                if rng.random::<f32>() < probability
                    && self.spawn(direction, category, tick).is_ok()
                {
                    placed += 1;
                }
            }
        }
        placed
    }

    /// Attach an emergency route to a live vehicle
    pub fn set_route(&mut self, id: VehicleId, route: Path) -> bool {
        match self.vehicles.get_mut(&id) {
            Some(vehicle) => {
                vehicle.route = Some(route);
                true
            }
            None => false,
        }
    }

    /// Move every vehicle one step, gated by `phase`.
    ///
    /// Returns copies of the vehicles that left the box during this step.
    pub fn advance(&mut self, phase: &LightPhase, delta_secs: f32) -> Vec<Vehicle> {
        let mut exited = Vec::new();
        for direction in Direction::ALL {
            let approach = &mut self.approaches[direction.index()];

            exited.extend(advance_crossing(approach, &mut self.vehicles, delta_secs));
            let joined = advance_approaching(approach, &mut self.vehicles, delta_secs);
            if phase.is_green(direction.axis()) {
                release_front(approach, &mut self.vehicles);
            }

            // Wait starts counting on the step after a vehicle joins
            for id in approach.queue.iter().filter(|id| !joined.contains(*id)) {
                if let Some(vehicle) = self.vehicles.get_mut(id) {
                    vehicle.wait_time += delta_secs;
                }
            }
        }
        self.counters.exited += exited.len() as u64;
        exited
    }

    /// Per-direction queue length, mean wait and emergency presence
    pub fn aggregates(&self) -> Aggregates {
        let mut per_direction = [ApproachAggregate::default(); 4];
        for direction in Direction::ALL {
            let queued: Vec<&Vehicle> = self.approaches[direction.index()]
                .queue
                .iter()
                .filter_map(|id| self.vehicles.get(id))
                .collect();

            let total_wait: f32 = queued.iter().map(|v| v.wait_time).sum();
            per_direction[direction.index()] = ApproachAggregate {
                queue_length: queued.len(),
                average_wait: if queued.is_empty() {
                    0.0
                } else {
                    total_wait / queued.len() as f32
                },
                emergency_present: queued.iter().any(|v| v.is_emergency()),
            };
        }
        Aggregates { per_direction }
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// Live vehicles in id order
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn live_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue of an approach, front first
    pub fn queue(&self, direction: Direction) -> Vec<VehicleId> {
        self.approaches[direction.index()]
            .queue
            .iter()
            .copied()
            .collect()
    }

    pub fn counters(&self) -> VehicleCounters {
        self.counters
    }

    pub fn state_counts(&self) -> StateCounts {
        self.approaches
            .iter()
            .fold(StateCounts::default(), |acc, a| StateCounts {
                approaching: acc.approaching + a.approaching.len(),
                queued: acc.queued + a.queue.len(),
                crossing: acc.crossing + a.crossing.len(),
            })
    }

    /// Live vehicles per category, indexed by [`VehicleCategory::index`]
    pub fn category_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for vehicle in self.vehicles.values() {
            counts[vehicle.category.index()] += 1;
        }
        counts
    }

    /// Live vehicles per approach, indexed by [`Direction::index`]
    pub fn direction_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for vehicle in self.vehicles.values() {
            counts[vehicle.direction.index()] += 1;
        }
        counts
    }
}

/// Move crossing vehicles and remove the ones past the far side
fn advance_crossing(
    approach: &mut Approach,
    vehicles: &mut BTreeMap<VehicleId, Vehicle>,
    delta_secs: f32,
) -> Vec<Vehicle> {
    let mut leader: Option<f32> = None;
    for id in &approach.crossing {
        if let Some(vehicle) = vehicles.get_mut(id) {
            let limit = leader.map_or(f32::INFINITY, |p| p - VEHICLE_SPACING);
            leader = Some(vehicle.drive(delta_secs, limit));
        }
    }

    let exit_line = APPROACH_LENGTH + INTERSECTION_SPAN;
    let mut exited = Vec::new();
    while let Some(&front) = approach.crossing.front() {
        let past = vehicles
            .get(&front)
            .is_none_or(|v| v.position.into_inner() >= exit_line);
        if !past {
            break;
        }
        approach.crossing.pop_front();
        if let Some(mut vehicle) = vehicles.remove(&front) {
            vehicle.state = VehicleState::Exited;
            debug!("{} exited after waiting {:.1}s", vehicle.id, vehicle.wait_time);
            exited.push(vehicle);
        }
    }
    exited
}

/// Car-following toward the queue tail; vehicles reaching it join the queue.
/// Returns the ids that joined during this step.
fn advance_approaching(
    approach: &mut Approach,
    vehicles: &mut BTreeMap<VehicleId, Vehicle>,
    delta_secs: f32,
) -> Vec<VehicleId> {
    let mut leader: Option<f32> = None;
    let mut joined = Vec::new();

    for id in &approach.approaching {
        let Some(vehicle) = vehicles.get_mut(id) else {
            continue;
        };
        let tail = APPROACH_LENGTH - approach.queue.len() as f32 * VEHICLE_SPACING;
        let limit = leader.map_or(tail, |p| p - VEHICLE_SPACING);
        let position = vehicle.drive(delta_secs, limit);

        if leader.is_none() && position >= tail {
            vehicle.state = VehicleState::Queued;
            vehicle.position = OrderedFloat(tail);
            let emergency = vehicle.is_emergency();

            // Emergency vehicles move up behind any emergency already waiting
            let slot = if emergency {
                approach
                    .queue
                    .iter()
                    .take_while(|q| vehicles.get(q).is_some_and(|v| v.is_emergency()))
                    .count()
            } else {
                approach.queue.len()
            };
            approach.queue.insert(slot, *id);
            joined.push(*id);
        } else {
            leader = Some(position);
        }
    }

    if !joined.is_empty() {
        approach.approaching.drain(..joined.len());
        restack_queue(approach, vehicles);
    }
    joined
}

/// Let the front of the queue onto the box once the previous crossing
/// vehicle has cleared one spacing past the stop line
fn release_front(approach: &mut Approach, vehicles: &mut BTreeMap<VehicleId, Vehicle>) {
    let clear = approach
        .crossing
        .back()
        .and_then(|id| vehicles.get(id))
        .is_none_or(|v| v.position.into_inner() >= APPROACH_LENGTH + VEHICLE_SPACING);
    if !clear {
        return;
    }

    let Some(id) = approach.queue.pop_front() else {
        return;
    };
    if let Some(vehicle) = vehicles.get_mut(&id) {
        vehicle.state = VehicleState::Crossing;
        vehicle.position = OrderedFloat(APPROACH_LENGTH);
        debug!("{} crossing from {} after {:.1}s", id, vehicle.direction, vehicle.wait_time);
    }
    approach.crossing.push_back(id);
    restack_queue(approach, vehicles);
}

/// Close up the queue so slot `i` sits `i` spacings behind the stop line
fn restack_queue(approach: &Approach, vehicles: &mut BTreeMap<VehicleId, Vehicle>) {
    for (slot, id) in approach.queue.iter().enumerate() {
        if let Some(vehicle) = vehicles.get_mut(id) {
            vehicle.position = OrderedFloat(APPROACH_LENGTH - slot as f32 * VEHICLE_SPACING);
        }
    }
}
