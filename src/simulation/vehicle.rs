//! Vehicle state for the intersection simulation

use ordered_float::OrderedFloat;

use super::planner::Path;
use super::types::{Direction, VehicleCategory, VehicleId};

/// Lifecycle stage of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleState {
    /// Driving toward the back of its approach queue
    Approaching,
    /// Stopped in the approach queue
    Queued,
    /// Released onto the box, wait time frozen
    Crossing,
    /// Past the far side. Exited vehicles are removed from the world in the
    /// same step, so this value is only ever seen on a returned copy.
    Exited,
}

/// A vehicle in the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub category: VehicleCategory,
    pub direction: Direction,
    /// Distance travelled from the spawn point along the approach
    pub position: OrderedFloat<f32>,
    pub state: VehicleState,
    /// Seconds spent queued
    pub wait_time: f32,
    pub spawn_tick: u64,
    /// Route through the district, attached to emergency vehicles at dispatch
    pub route: Option<Path>,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        category: VehicleCategory,
        direction: Direction,
        spawn_tick: u64,
    ) -> Self {
        Self {
            id,
            category,
            direction,
            position: OrderedFloat(0.0),
            state: VehicleState::Approaching,
            wait_time: 0.0,
            spawn_tick,
            route: None,
        }
    }

    pub fn speed(&self) -> f32 {
        self.category.nominal_speed()
    }

    pub fn is_emergency(&self) -> bool {
        self.category.is_emergency()
    }

    /// Move forward by at most `speed * delta_secs`, never past `limit` and
    /// never backwards. Returns the new position.
    pub fn drive(&mut self, delta_secs: f32, limit: f32) -> f32 {
        let wanted = self.position.into_inner() + self.speed() * delta_secs;
        let next = wanted.min(limit).max(self.position.into_inner());
        self.position = OrderedFloat(next);
        next
    }
}
