//! Core types for the intersection simulation
//!
//! Directions, axes, vehicle categories and the geometry constants shared by
//! the world and the controller.

use std::fmt;

/// A unique identifier for a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// The approach a vehicle arrives on.
///
/// `North` means the vehicle comes *from* the north and drives southbound
/// through the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Stable index used for per-direction arrays
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two perpendicular flows sharing a light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

impl Axis {
    pub fn opposite(self) -> Axis {
        match self {
            Axis::NorthSouth => Axis::EastWest,
            Axis::EastWest => Axis::NorthSouth,
        }
    }

    /// The two approaches served by this axis
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::NorthSouth => [Direction::North, Direction::South],
            Axis::EastWest => [Direction::East, Direction::West],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::NorthSouth => f.write_str("NS"),
            Axis::EastWest => f.write_str("EW"),
        }
    }
}

/// Type of vehicle in the simulation
///
/// Category is plain data: every behavioural difference comes from the
/// speed/priority table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleCategory {
    Car,
    Bus,
    Truck,
    Emergency,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 4] = [
        VehicleCategory::Car,
        VehicleCategory::Bus,
        VehicleCategory::Truck,
        VehicleCategory::Emergency,
    ];

    pub fn index(self) -> usize {
        match self {
            VehicleCategory::Car => 0,
            VehicleCategory::Bus => 1,
            VehicleCategory::Truck => 2,
            VehicleCategory::Emergency => 3,
        }
    }

    /// Nominal cruising speed in metres per second
    pub fn nominal_speed(self) -> f32 {
        match self {
            VehicleCategory::Car => 12.0,
            VehicleCategory::Bus => 9.0,
            VehicleCategory::Truck => 10.0,
            VehicleCategory::Emergency => 16.0,
        }
    }

    pub fn priority(self) -> u8 {
        match self {
            VehicleCategory::Car | VehicleCategory::Truck => 1,
            VehicleCategory::Bus => 2,
            VehicleCategory::Emergency => 10,
        }
    }

    pub fn is_emergency(self) -> bool {
        self == VehicleCategory::Emergency
    }
}

/// Length of a vehicle in metres
pub const VEHICLE_LENGTH: f32 = 5.0;

/// Following distance multiplier for VEHICLE_LENGTH
pub const SAFE_FOLLOWING_MULTIPLIER: f32 = 1.5;

/// Minimum front-to-front spacing between consecutive vehicles in a lane
pub const VEHICLE_SPACING: f32 = VEHICLE_LENGTH * SAFE_FOLLOWING_MULTIPLIER;

/// Distance from the spawn point to the stop line
pub const APPROACH_LENGTH: f32 = 150.0;

/// Distance from the stop line to the far side of the box
pub const INTERSECTION_SPAN: f32 = 20.0;
