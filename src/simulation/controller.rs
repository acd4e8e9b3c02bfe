//! Traffic-light controller for the intersection
//!
//! A three-state machine (green, yellow, all-red) driven by the rule chain in
//! [`policy`](super::policy). Lights are always derived from the machine
//! state, so the two axes can never show green or yellow together.

use log::{debug, info};
use std::collections::VecDeque;

use super::config::ControllerConfig;
use super::policy::{self, Action, DecisionReason, PolicyContext};
use super::types::Axis;
use super::world::Aggregates;

/// Number of non-normal decisions kept for inspection
pub const DECISION_HISTORY_LEN: usize = 100;

/// Light shown to one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Green,
    Yellow,
    Red,
}

/// Lights for both axes at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightPhase {
    pub north_south: Signal,
    pub east_west: Signal,
}

impl LightPhase {
    fn with(axis: Axis, signal: Signal) -> Self {
        match axis {
            Axis::NorthSouth => Self {
                north_south: signal,
                east_west: Signal::Red,
            },
            Axis::EastWest => Self {
                north_south: Signal::Red,
                east_west: signal,
            },
        }
    }

    pub fn all_red() -> Self {
        Self {
            north_south: Signal::Red,
            east_west: Signal::Red,
        }
    }

    pub fn signal(&self, axis: Axis) -> Signal {
        match axis {
            Axis::NorthSouth => self.north_south,
            Axis::EastWest => self.east_west,
        }
    }

    pub fn is_green(&self, axis: Axis) -> bool {
        self.signal(axis) == Signal::Green
    }
}

/// Controller machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Green(Axis),
    Yellow(Axis),
    AllRed { next: Axis },
}

/// A decision that changed the timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRecord {
    pub tick: u64,
    pub reason: DecisionReason,
    /// Axis holding the green when the decision was made, if any
    pub green_axis: Option<Axis>,
    pub seconds_added: f32,
}

#[derive(Debug, Clone)]
pub struct IntersectionController {
    config: ControllerConfig,
    state: ControllerState,
    /// Seconds spent in the current state
    timer: f32,
    /// Length of the current green, base plus extensions
    green_duration: f32,
    extension_used: f32,
    /// Axis a running preemption will hand the green to
    preemption: Option<Axis>,
    last_reason: DecisionReason,
    history: VecDeque<DecisionRecord>,
    preemptions_started: u64,
}

impl IntersectionController {
    pub fn new(config: ControllerConfig) -> Self {
        let initial = config.initial_green;
        let green_duration = config.base_green;
        Self {
            config,
            state: ControllerState::Green(initial),
            timer: 0.0,
            green_duration,
            extension_used: 0.0,
            preemption: None,
            last_reason: DecisionReason::Normal,
            history: VecDeque::with_capacity(DECISION_HISTORY_LEN),
            preemptions_started: 0,
        }
    }

    /// Back to the initial green with no history
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Consume this tick's aggregates and return the lights to apply next.
    pub fn update(&mut self, aggregates: &Aggregates, tick: u64, delta_secs: f32) -> LightPhase {
        match self.state {
            ControllerState::Green(axis) => self.update_green(axis, aggregates, tick, delta_secs),
            ControllerState::Yellow(axis) => {
                self.watch_for_emergency(axis.opposite(), aggregates, tick);
                self.timer += delta_secs;
                if self.timer >= self.config.yellow {
                    let next = self.preemption.unwrap_or(axis.opposite());
                    self.enter(ControllerState::AllRed { next });
                }
                self.last_reason = self.sequence_reason();
            }
            ControllerState::AllRed { next } => {
                if self.watch_for_emergency(next, aggregates, tick) {
                    self.state = ControllerState::AllRed {
                        next: next.opposite(),
                    };
                }
                self.timer += delta_secs;
                if self.timer >= self.config.all_red {
                    if let ControllerState::AllRed { next } = self.state {
                        self.grant_green(next);
                    }
                }
                self.last_reason = self.sequence_reason();
            }
        }
        self.phase()
    }

    fn update_green(&mut self, axis: Axis, aggregates: &Aggregates, tick: u64, delta_secs: f32) {
        let ctx = PolicyContext {
            green_axis: axis,
            aggregates,
            config: &self.config,
            extension_used: self.extension_used,
            preemption_active: self.preemption.is_some(),
        };
        let (reason, action) = policy::evaluate(&ctx);
        self.last_reason = reason;

        match action {
            Action::Preempt(target) => {
                self.begin_preemption(target, tick, Some(axis));
                self.enter(ControllerState::Yellow(axis));
                return;
            }
            Action::Extend(seconds) => {
                self.green_duration += seconds;
                self.extension_used += seconds;
                debug!(
                    "{} green extended by {:.1}s ({}), now {:.1}s",
                    axis, seconds, reason, self.green_duration
                );
                self.record(DecisionRecord {
                    tick,
                    reason,
                    green_axis: Some(axis),
                    seconds_added: seconds,
                });
            }
            Action::Maintain => {}
        }

        self.timer += delta_secs;
        if self.timer >= self.green_duration {
            self.enter(ControllerState::Yellow(axis));
        }
    }

    /// During yellow or all-red, register a preemption for an emergency
    /// waiting on the axis that would not get the next green.
    fn watch_for_emergency(&mut self, next_green: Axis, aggregates: &Aggregates, tick: u64) -> bool {
        let other = next_green.opposite();
        if self.preemption.is_some()
            || aggregates.axis_has_emergency(next_green)
            || !aggregates.axis_has_emergency(other)
        {
            return false;
        }
        self.begin_preemption(other, tick, None);
        true
    }

    fn begin_preemption(&mut self, target: Axis, tick: u64, green_axis: Option<Axis>) {
        self.preemption = Some(target);
        self.preemptions_started += 1;
        info!("Emergency preemption started at tick {}: green goes to {}", tick, target);
        self.record(DecisionRecord {
            tick,
            reason: DecisionReason::Preempt,
            green_axis,
            seconds_added: 0.0,
        });
    }

    fn grant_green(&mut self, axis: Axis) {
        self.enter(ControllerState::Green(axis));
        self.green_duration = self.config.base_green;
        self.extension_used = 0.0;
        if self.preemption == Some(axis) {
            self.preemption = None;
            info!("Emergency preemption complete: {} is green", axis);
        }
    }

    fn enter(&mut self, state: ControllerState) {
        debug!("Light state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.timer = 0.0;
    }

    fn sequence_reason(&self) -> DecisionReason {
        if self.preemption.is_some() {
            DecisionReason::Preempt
        } else {
            DecisionReason::Normal
        }
    }

    fn record(&mut self, record: DecisionRecord) {
        if self.history.len() == DECISION_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    pub fn phase(&self) -> LightPhase {
        match self.state {
            ControllerState::Green(axis) => LightPhase::with(axis, Signal::Green),
            ControllerState::Yellow(axis) => LightPhase::with(axis, Signal::Yellow),
            ControllerState::AllRed { .. } => LightPhase::all_red(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Seconds left in the current state
    pub fn time_remaining(&self) -> f32 {
        let duration = match self.state {
            ControllerState::Green(_) => self.green_duration,
            ControllerState::Yellow(_) => self.config.yellow,
            ControllerState::AllRed { .. } => self.config.all_red,
        };
        (duration - self.timer).max(0.0)
    }

    /// Length of the current (or most recent) green, including extensions
    pub fn green_duration(&self) -> f32 {
        self.green_duration
    }

    pub fn extension_used(&self) -> f32 {
        self.extension_used
    }

    pub fn last_reason(&self) -> DecisionReason {
        self.last_reason
    }

    pub fn preemption_target(&self) -> Option<Axis> {
        self.preemption
    }

    pub fn preemptions_started(&self) -> u64 {
        self.preemptions_started
    }

    /// Most recent non-normal decisions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &DecisionRecord> {
        self.history.iter()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}
