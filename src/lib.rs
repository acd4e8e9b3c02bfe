//! Smart Intersection Library
//!
//! A four-approach intersection simulator with an adaptive, rule-based
//! traffic-light controller and A* routing for emergency vehicles.

pub mod simulation;
