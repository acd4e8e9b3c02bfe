//! Intersection simulation core
//!
//! Everything needed to run the four-approach intersection headless: the
//! clock, the vehicle registry, the light controller and its policy, the
//! emergency route planner and the snapshot types handed to observers.

mod clock;
mod config;
mod controller;
mod engine;
mod error;
mod metrics;
mod planner;
mod policy;
mod types;
mod vehicle;
mod world;

pub use clock::{SimClock, MAX_SPEED, MIN_SPEED};
pub use config::{
    ControllerConfig, SimulationConfig, SpawnRates, MAX_DISTRICT_SIZE, MIN_ALL_RED_SECS,
    MIN_YELLOW_SECS,
};
pub use controller::{
    ControllerState, DecisionRecord, IntersectionController, LightPhase, Signal,
    DECISION_HISTORY_LEN,
};
pub use engine::{Command, Simulation};
pub use error::{ConfigError, DispatchError, PlanError, SpawnRejected};
pub use metrics::{
    ApproachSnapshot, LogSink, MetricsHistory, MetricsSink, MetricsSummary, Snapshot,
    HISTORY_CAPACITY,
};
pub use planner::{plan_path, plan_path_with, CellCosts, CostModel, GridPos, Path, RoutingGrid, UniformCost};
pub use policy::{evaluate, Action, DecisionReason, PolicyContext, Rule, RULES};
pub use types::{
    Axis, Direction, VehicleCategory, VehicleId, APPROACH_LENGTH, INTERSECTION_SPAN,
    SAFE_FOLLOWING_MULTIPLIER, VEHICLE_LENGTH, VEHICLE_SPACING,
};
pub use vehicle::{Vehicle, VehicleState};
pub use world::{
    Aggregates, ApproachAggregate, StateCounts, VehicleCounters, World,
};
