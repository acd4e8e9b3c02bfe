//! Per-tick snapshots and the sinks that consume them
//!
//! A [`Snapshot`] is an owned copy taken at the end of a tick. Sinks only
//! ever see snapshots, never the live world.

use log::debug;
use std::collections::VecDeque;

use super::controller::{LightPhase, Signal};
use super::policy::DecisionReason;
use super::types::{Direction, VehicleCategory};
use super::world::{StateCounts, VehicleCounters};

/// Queue state of one approach at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachSnapshot {
    pub direction: Direction,
    pub queue_length: usize,
    pub average_wait: f32,
    pub emergency_present: bool,
    /// Live vehicles on this approach in any stage
    pub live_vehicles: usize,
}

/// Point-in-time copy of the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    /// Simulated seconds since the last reset
    pub sim_time: f32,
    /// Indexed by [`Direction::index`]
    pub approaches: [ApproachSnapshot; 4],
    pub lights: LightPhase,
    pub phase_time_remaining: f32,
    /// Live vehicles, indexed by [`VehicleCategory::index`]
    pub vehicles_by_category: [usize; 4],
    pub states: StateCounts,
    pub counters: VehicleCounters,
    pub decision: DecisionReason,
    pub preemption_active: bool,
    pub exited_this_tick: usize,
}

impl Snapshot {
    pub fn approach(&self, direction: Direction) -> &ApproachSnapshot {
        &self.approaches[direction.index()]
    }

    pub fn category_count(&self, category: VehicleCategory) -> usize {
        self.vehicles_by_category[category.index()]
    }

    pub fn live_vehicles(&self) -> usize {
        self.states.total()
    }

    pub fn max_queue(&self) -> usize {
        self.approaches
            .iter()
            .map(|a| a.queue_length)
            .max()
            .unwrap_or(0)
    }

    /// Mean of the per-approach average waits, over approaches with a queue
    pub fn average_wait(&self) -> f32 {
        let waiting: Vec<f32> = self
            .approaches
            .iter()
            .filter(|a| a.queue_length > 0)
            .map(|a| a.average_wait)
            .collect();
        if waiting.is_empty() {
            0.0
        } else {
            waiting.iter().sum::<f32>() / waiting.len() as f32
        }
    }

    /// One-line status, e.g. for headless progress output
    pub fn digest(&self) -> String {
        let queues = self
            .approaches
            .iter()
            .map(|a| {
                format!(
                    "{}={}{}",
                    &a.direction.name()[..1].to_uppercase(),
                    a.queue_length,
                    if a.emergency_present { "!" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "t={:.1}s NS={} EW={} ({:.1}s left) queues[{}] live={} exited={} decision={}",
            self.sim_time,
            signal_char(self.lights.north_south),
            signal_char(self.lights.east_west),
            self.phase_time_remaining,
            queues,
            self.live_vehicles(),
            self.counters.exited,
            self.decision
        )
    }
}

fn signal_char(signal: Signal) -> char {
    match signal {
        Signal::Green => 'G',
        Signal::Yellow => 'Y',
        Signal::Red => 'R',
    }
}

/// Consumer of per-tick snapshots
pub trait MetricsSink {
    fn record(&mut self, snapshot: &Snapshot);
}

/// Logs a digest every `every` ticks at debug level
#[derive(Debug, Clone)]
pub struct LogSink {
    every: u64,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl MetricsSink for LogSink {
    fn record(&mut self, snapshot: &Snapshot) {
        if snapshot.tick % self.every == 0 {
            debug!("tick {}: {}", snapshot.tick, snapshot.digest());
        }
    }
}

/// Default number of snapshots kept by [`MetricsHistory`]
pub const HISTORY_CAPACITY: usize = 1000;

/// Aggregate view over a window of snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub ticks: usize,
    /// Simulated seconds between the first and last snapshot
    pub span_secs: f32,
    pub mean_wait: f32,
    pub peak_wait: f32,
    pub peak_queue: usize,
    /// Mean queue length, indexed by [`Direction::index`]
    pub mean_queue: [f32; 4],
    /// Number of times a preemption sequence started inside the window
    pub preemption_activations: usize,
    pub exited: usize,
    /// Exits per simulated minute
    pub throughput_per_min: f32,
}

/// Bounded in-memory history of recent snapshots
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MetricsHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Summarise the retained window. `None` when nothing was recorded.
    pub fn summary(&self) -> Option<MetricsSummary> {
        let first = self.snapshots.front()?;
        let last = self.snapshots.back()?;
        let ticks = self.snapshots.len();

        let mut mean_queue = [0.0f32; 4];
        let mut wait_sum = 0.0;
        let mut peak_wait = 0.0f32;
        let mut peak_queue = 0;
        let mut preemption_activations = 0;
        let mut was_preempting = false;

        for snapshot in &self.snapshots {
            for approach in &snapshot.approaches {
                mean_queue[approach.direction.index()] += approach.queue_length as f32;
                peak_wait = peak_wait.max(approach.average_wait);
            }
            wait_sum += snapshot.average_wait();
            peak_queue = peak_queue.max(snapshot.max_queue());
            if snapshot.preemption_active && !was_preempting {
                preemption_activations += 1;
            }
            was_preempting = snapshot.preemption_active;
        }
        for queue in &mut mean_queue {
            *queue /= ticks as f32;
        }

        // Exits in the first snapshot happened before the window opened
        let exited: usize = self
            .snapshots
            .iter()
            .skip(1)
            .map(|s| s.exited_this_tick)
            .sum();
        let span_secs = last.sim_time - first.sim_time;
        let throughput_per_min = if span_secs > 0.0 {
            exited as f32 / (span_secs / 60.0)
        } else {
            0.0
        };

        Some(MetricsSummary {
            ticks,
            span_secs,
            mean_wait: wait_sum / ticks as f32,
            peak_wait,
            peak_queue,
            mean_queue,
            preemption_activations,
            exited,
            throughput_per_min,
        })
    }
}

impl MetricsSink for MetricsHistory {
    fn record(&mut self, snapshot: &Snapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot.clone());
    }
}
