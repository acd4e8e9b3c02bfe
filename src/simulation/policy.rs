//! Rule-based light policy
//!
//! The policy is a fixed, ordered list of (predicate, action) rules. The first
//! rule whose predicate holds decides the tick; later rules are not consulted.

use std::fmt;

use super::config::ControllerConfig;
use super::types::Axis;
use super::world::Aggregates;

/// Tag reported with every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    Preempt,
    ExtendQueue,
    ExtendWait,
    Normal,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::Preempt => "PREEMPT",
            DecisionReason::ExtendQueue => "EXTEND_QUEUE",
            DecisionReason::ExtendWait => "EXTEND_WAIT",
            DecisionReason::Normal => "NORMAL",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the controller should do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Cut the current green and hand the next one to this axis
    Preempt(Axis),
    /// Add seconds to the current green
    Extend(f32),
    Maintain,
}

/// Inputs a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub green_axis: Axis,
    pub aggregates: &'a Aggregates,
    pub config: &'a ControllerConfig,
    /// Seconds already added to the current green
    pub extension_used: f32,
    pub preemption_active: bool,
}

impl PolicyContext<'_> {
    fn red_axis(&self) -> Axis {
        self.green_axis.opposite()
    }

    fn remaining_budget(&self) -> f32 {
        (self.config.max_extension - self.extension_used).max(0.0)
    }
}

pub struct Rule {
    pub reason: DecisionReason,
    pub applies: fn(&PolicyContext) -> bool,
    pub action: fn(&PolicyContext) -> Action,
}

/// Rules in priority order
pub const RULES: [Rule; 4] = [
    Rule {
        reason: DecisionReason::Preempt,
        applies: |ctx| !ctx.preemption_active && ctx.aggregates.axis_has_emergency(ctx.red_axis()),
        action: |ctx| Action::Preempt(ctx.red_axis()),
    },
    Rule {
        reason: DecisionReason::ExtendQueue,
        applies: |ctx| {
            ctx.config.queue_extension > 0.0
                && ctx.remaining_budget() > 0.0
                && ctx.aggregates.axis_max_queue(ctx.green_axis) > ctx.config.queue_threshold
        },
        action: |ctx| Action::Extend(ctx.config.queue_extension.min(ctx.remaining_budget())),
    },
    Rule {
        reason: DecisionReason::ExtendWait,
        applies: |ctx| {
            ctx.config.wait_extension > 0.0
                && ctx.remaining_budget() > 0.0
                && ctx.aggregates.axis_max_wait(ctx.green_axis) > ctx.config.wait_threshold
        },
        action: |ctx| Action::Extend(ctx.config.wait_extension.min(ctx.remaining_budget())),
    },
    Rule {
        reason: DecisionReason::Normal,
        applies: |_| true,
        action: |_| Action::Maintain,
    },
];

/// Run the rule chain and return the first match
pub fn evaluate(ctx: &PolicyContext) -> (DecisionReason, Action) {
    RULES
        .iter()
        .find(|rule| (rule.applies)(ctx))
        .map(|rule| (rule.reason, (rule.action)(ctx)))
        .unwrap_or((DecisionReason::Normal, Action::Maintain))
}
