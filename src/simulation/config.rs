//! Run configuration
//!
//! Both structs are immutable for the lifetime of a run and validated once
//! when the simulation is built.

use super::error::ConfigError;
use super::types::{Axis, VehicleCategory};

/// Largest routing district side length accepted
pub const MAX_DISTRICT_SIZE: i32 = 1024;

/// Shortest yellow the controller accepts, in seconds
pub const MIN_YELLOW_SECS: f32 = 3.0;

/// Shortest all-red clearance the controller accepts, in seconds
pub const MIN_ALL_RED_SECS: f32 = 0.5;

/// Thresholds and durations for the traffic-light controller.
///
/// All durations are in simulated seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Queue length (vehicles) above which the green is extended
    pub queue_threshold: usize,
    /// Average wait (seconds) above which the green is extended
    pub wait_threshold: f32,
    pub base_green: f32,
    pub yellow: f32,
    pub all_red: f32,
    /// Seconds added per tick by the queue-length rule
    pub queue_extension: f32,
    /// Seconds added per tick by the wait-time rule
    pub wait_extension: f32,
    /// Cap on the total seconds added to a single green phase
    pub max_extension: f32,
    /// Axis that holds the green when the run starts
    pub initial_green: Axis,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            queue_threshold: 10,
            wait_threshold: 60.0,
            base_green: 30.0,
            yellow: 5.0,
            all_red: 2.0,
            queue_extension: 10.0,
            wait_extension: 5.0,
            max_extension: 30.0,
            initial_green: Axis::NorthSouth,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("base_green", self.base_green)?;
        if self.yellow.is_nan() || self.yellow < MIN_YELLOW_SECS {
            return Err(ConfigError::BelowSafetyMinimum {
                field: "yellow",
                value: self.yellow,
                minimum: MIN_YELLOW_SECS,
            });
        }
        if self.all_red.is_nan() || self.all_red < MIN_ALL_RED_SECS {
            return Err(ConfigError::BelowSafetyMinimum {
                field: "all_red",
                value: self.all_red,
                minimum: MIN_ALL_RED_SECS,
            });
        }
        non_negative("wait_threshold", self.wait_threshold)?;
        non_negative("queue_extension", self.queue_extension)?;
        non_negative("wait_extension", self.wait_extension)?;
        non_negative("max_extension", self.max_extension)?;
        Ok(())
    }
}

/// Spawn rates in vehicles per second, per approach, for each category
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRates {
    pub car: f32,
    pub bus: f32,
    pub truck: f32,
    pub emergency: f32,
}

impl Default for SpawnRates {
    fn default() -> Self {
        // One vehicle every two seconds across the box, split 65/15/15/5
        // between the categories and evenly between the four approaches.
        Self {
            car: 0.08125,
            bus: 0.01875,
            truck: 0.01875,
            emergency: 0.00625,
        }
    }
}

impl SpawnRates {
    pub fn rate(&self, category: VehicleCategory) -> f32 {
        match category {
            VehicleCategory::Car => self.car,
            VehicleCategory::Bus => self.bus,
            VehicleCategory::Truck => self.truck,
            VehicleCategory::Emergency => self.emergency,
        }
    }

    /// Multiply every rate by `factor`
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            car: self.car * factor,
            bus: self.bus * factor,
            truck: self.truck * factor,
            emergency: self.emergency * factor,
        }
    }

    /// No random arrivals at all; vehicles only appear when spawned explicitly
    pub fn none() -> Self {
        Self {
            car: 0.0,
            bus: 0.0,
            truck: 0.0,
            emergency: 0.0,
        }
    }
}

/// Everything needed to build a [`Simulation`](super::Simulation)
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Seed for the spawn generator; reset reseeds from it
    pub seed: u64,
    /// Maximum number of live vehicles
    pub capacity: usize,
    /// Simulated seconds per tick at speed 1.0
    pub tick_duration: f32,
    pub spawn_rates: SpawnRates,
    /// Side length of the square routing district used for emergency dispatch
    pub district_size: i32,
    pub controller: ControllerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            capacity: 80,
            tick_duration: 0.1,
            spawn_rates: SpawnRates::default(),
            district_size: 9,
            controller: ControllerConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        positive("tick_duration", self.tick_duration)?;
        for category in VehicleCategory::ALL {
            non_negative("spawn rate", self.spawn_rates.rate(category))?;
        }
        if self.district_size < 3 {
            return Err(ConfigError::DistrictTooSmall(self.district_size));
        }
        if self.district_size > MAX_DISTRICT_SIZE {
            return Err(ConfigError::DistrictTooLarge {
                size: self.district_size,
                maximum: MAX_DISTRICT_SIZE,
            });
        }
        self.controller.validate()
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
