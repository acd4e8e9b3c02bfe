//! End-to-end properties of full simulation runs

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use smart_intersection::simulation::{
    Axis, Command, ConfigError, ControllerConfig, DecisionReason, Direction, DispatchError,
    GridPos, MetricsHistory, MetricsSink, PlanError, Signal, Simulation, SimulationConfig,
    Snapshot, SpawnRates, SpawnRejected, VehicleCategory, VehicleId, VehicleState,
    MAX_DISTRICT_SIZE,
};

fn quiet() -> SimulationConfig {
    SimulationConfig {
        spawn_rates: SpawnRates::none(),
        ..SimulationConfig::default()
    }
}

fn busy(seed: u64) -> SimulationConfig {
    SimulationConfig {
        seed,
        spawn_rates: SpawnRates::default().scaled(3.0),
        ..SimulationConfig::default()
    }
}

fn run(sim: &mut Simulation, ticks: usize) -> Vec<Snapshot> {
    (0..ticks).map(|_| sim.tick()).collect()
}

/// Shares the snapshots it receives with the test body
struct Recorder(Rc<RefCell<Vec<Snapshot>>>);

impl MetricsSink for Recorder {
    fn record(&mut self, snapshot: &Snapshot) {
        self.0.borrow_mut().push(snapshot.clone());
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SimulationConfig {
        controller: ControllerConfig {
            yellow: 1.0,
            ..ControllerConfig::default()
        },
        ..SimulationConfig::default()
    };
    let err = Simulation::new(config).err().unwrap();
    assert!(format!("{:#}", err).contains("yellow"));

    let config = SimulationConfig {
        capacity: 0,
        ..SimulationConfig::default()
    };
    assert!(Simulation::new(config).is_err());
}

#[test]
fn test_oversized_district_is_rejected() {
    let config = SimulationConfig {
        district_size: 50_000,
        ..SimulationConfig::default()
    };
    let err = Simulation::new(config).err().unwrap();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::DistrictTooLarge {
            size: 50_000,
            maximum: MAX_DISTRICT_SIZE,
        })
    );

    let largest = SimulationConfig {
        district_size: MAX_DISTRICT_SIZE,
        ..SimulationConfig::default()
    };
    assert!(largest.validate().is_ok());
}

#[test]
fn test_lights_mutually_exclusive_under_load() {
    let mut sim = Simulation::new(busy(3)).unwrap();
    for tick in 0..4000 {
        if tick % 450 == 100 {
            let _ = sim.spawn_emergency(Direction::ALL[(tick / 450) % 4]);
        }
        let snapshot = sim.tick();
        assert!(
            snapshot.lights.north_south == Signal::Red || snapshot.lights.east_west == Signal::Red,
            "both axes open at tick {}: {:?}",
            snapshot.tick,
            snapshot.lights
        );
    }
    assert!(sim.controller().preemptions_started() > 0);
}

#[test]
fn test_emergency_preempts_on_arrival_and_exits() {
    let mut sim = Simulation::new(quiet()).unwrap();
    let ambulance = sim.spawn_emergency(Direction::East).unwrap();

    let mut arrival = None;
    for _ in 0..200 {
        let snapshot = sim.tick();
        if snapshot.approach(Direction::East).emergency_present {
            arrival = Some(snapshot);
            break;
        }
    }
    let arrival = arrival.expect("ambulance never reached the stop line");

    // The same tick that sees the ambulance queued cuts the NS green
    assert_eq!(arrival.lights.north_south, Signal::Yellow);
    assert_eq!(arrival.lights.east_west, Signal::Red);
    assert_eq!(arrival.decision, DecisionReason::Preempt);
    assert!(arrival.preemption_active);

    let mut exited_at = None;
    for _ in 0..200 {
        let snapshot = sim.tick();
        assert_ne!(snapshot.lights.east_west, Signal::Yellow);
        if sim.world().vehicle(ambulance).is_none() {
            exited_at = Some(snapshot.tick);
            break;
        }
    }
    let exited_at = exited_at.expect("ambulance never exited");
    // Yellow, all-red and the crossing itself, at 0.1s per tick
    assert!(exited_at - arrival.tick <= 100, "took {} ticks", exited_at - arrival.tick);
    assert_eq!(sim.world().counters().exited, 1);
}

#[test]
fn test_wait_never_decreases_and_freezes_on_release() {
    let mut sim = Simulation::new(busy(11)).unwrap();
    let mut seen: BTreeMap<VehicleId, (f32, VehicleState)> = BTreeMap::new();

    for _ in 0..3000 {
        sim.tick();
        for vehicle in sim.world().vehicles() {
            if let Some(&(wait, state)) = seen.get(&vehicle.id) {
                assert!(vehicle.wait_time >= wait, "{} wait went backwards", vehicle.id);
                if state == VehicleState::Crossing {
                    assert_eq!(vehicle.wait_time, wait, "{} waited while crossing", vehicle.id);
                }
            }
            if vehicle.state == VehicleState::Approaching {
                assert_eq!(vehicle.wait_time, 0.0);
            }
            seen.insert(vehicle.id, (vehicle.wait_time, vehicle.state));
        }
    }
    assert!(seen.values().any(|&(wait, _)| wait > 0.0));
}

#[test]
fn test_vehicles_are_conserved_under_capacity_pressure() {
    let config = SimulationConfig {
        capacity: 20,
        spawn_rates: SpawnRates::default().scaled(10.0),
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();

    for _ in 0..3000 {
        let snapshot = sim.tick();
        let c = snapshot.counters;
        assert!(snapshot.live_vehicles() <= 20);
        assert_eq!(c.accepted + c.rejected(), c.requested);
        assert_eq!(c.accepted, snapshot.live_vehicles() as u64 + c.exited);
        assert_eq!(
            snapshot.vehicles_by_category.iter().sum::<usize>(),
            snapshot.live_vehicles()
        );
        assert_eq!(
            snapshot.approaches.iter().map(|a| a.live_vehicles).sum::<usize>(),
            snapshot.live_vehicles()
        );
    }

    let counters = sim.world().counters();
    assert!(counters.rejected_capacity > 0);
    assert!(counters.exited > 0);
}

#[test]
fn test_same_seed_same_run() {
    let mut a = Simulation::new(busy(5)).unwrap();
    let mut b = Simulation::new(busy(5)).unwrap();
    let mut c = Simulation::new(busy(6)).unwrap();

    let run_a = run(&mut a, 1500);
    let run_b = run(&mut b, 1500);
    let run_c = run(&mut c, 1500);
    assert_eq!(run_a, run_b);
    assert_ne!(run_a, run_c);
}

#[test]
fn test_long_queue_extends_green() {
    let config = SimulationConfig {
        controller: ControllerConfig {
            initial_green: Axis::EastWest,
            base_green: 60.0,
            ..ControllerConfig::default()
        },
        ..quiet()
    };
    let mut sim = Simulation::new(config).unwrap();

    let mut placed = 0;
    let mut snapshots = Vec::new();
    for _ in 0..1500 {
        if placed < 14 && sim.spawn(Direction::North, VehicleCategory::Car).is_ok() {
            placed += 1;
        }
        snapshots.push(sim.tick());
    }
    assert_eq!(placed, 14);

    let extended: Vec<&Snapshot> = snapshots
        .iter()
        .filter(|s| s.decision == DecisionReason::ExtendQueue)
        .collect();
    assert!(!extended.is_empty(), "queue never triggered an extension");
    for snapshot in &extended {
        assert_eq!(snapshot.lights.north_south, Signal::Green);
    }

    let record = sim
        .controller()
        .history()
        .find(|r| r.reason == DecisionReason::ExtendQueue)
        .unwrap();
    assert_eq!(record.green_axis, Some(Axis::NorthSouth));
}

#[test]
fn test_pause_resume_and_reset() {
    let mut sim = Simulation::new(busy(9)).unwrap();
    run(&mut sim, 50);

    sim.control(Command::Pause);
    let frozen = sim.last_snapshot().clone();
    for _ in 0..10 {
        assert_eq!(sim.tick(), frozen);
    }
    assert_eq!(sim.clock().now(), 50);

    sim.control(Command::Resume);
    assert_eq!(sim.tick().tick, 51);

    sim.control(Command::Reset);
    assert_eq!(sim.clock().now(), 0);
    assert_eq!(sim.world().live_count(), 0);
    assert_eq!(sim.controller().preemptions_started(), 0);

    let mut fresh = Simulation::new(busy(9)).unwrap();
    assert_eq!(run(&mut sim, 300), run(&mut fresh, 300));
}

#[test]
fn test_speed_changes_simulated_time_per_tick() {
    let mut sim = Simulation::new(quiet()).unwrap();
    sim.control(Command::SetSpeed(2.0));
    let snapshot = sim.tick();
    assert!((snapshot.sim_time - 0.2).abs() < 1e-6);

    sim.control(Command::SetSpeed(50.0));
    assert_eq!(sim.clock().speed(), 10.0);
}

#[test]
fn test_sinks_receive_every_tick() {
    let received = Rc::new(RefCell::new(Vec::new()));
    let mut sim = Simulation::new(busy(2)).unwrap();
    sim.add_sink(Box::new(Recorder(received.clone())));

    let direct = run(&mut sim, 25);
    assert_eq!(*received.borrow(), direct);

    // Paused ticks are not recorded again
    sim.control(Command::Pause);
    run(&mut sim, 5);
    assert_eq!(received.borrow().len(), 25);
}

#[test]
fn test_spawn_emergency_attaches_route() {
    let mut sim = Simulation::new(quiet()).unwrap();
    let id = sim.spawn_emergency(Direction::North).unwrap();

    let vehicle = sim.world().vehicle(id).unwrap();
    assert_eq!(vehicle.category, VehicleCategory::Emergency);
    assert_eq!(vehicle.direction, Direction::North);
    let route = vehicle.route.as_ref().unwrap();
    assert_eq!(route.start(), Some(GridPos::new(4, 0)));
    assert_eq!(route.goal(), Some(GridPos::new(4, 4)));
    assert_eq!(route.steps(), 4);
    assert_eq!(route.approach(), Some(Direction::North));
}

#[test]
fn test_dispatch_picks_approach_from_route() {
    let mut sim = Simulation::new(quiet()).unwrap();

    let id = sim.dispatch_emergency(GridPos::new(0, 0)).unwrap();
    assert_eq!(sim.world().vehicle(id).unwrap().direction, Direction::North);

    // Closing the street north of the box forces a western arrival
    sim.grid_mut().block(GridPos::new(4, 3));
    let id = sim.dispatch_emergency(GridPos::new(0, 0)).unwrap();
    let vehicle = sim.world().vehicle(id).unwrap();
    assert_eq!(vehicle.direction, Direction::West);
    assert_eq!(
        vehicle.route.as_ref().and_then(|r| r.approach()),
        Some(Direction::West)
    );
    assert_eq!(vehicle.route.as_ref().map(|r| r.cost), Some(8));
}

#[test]
fn test_dispatch_failures_leave_no_vehicle() {
    let mut sim = Simulation::new(quiet()).unwrap();
    let center = sim.grid().center();

    assert_eq!(
        sim.dispatch_emergency(center),
        Err(DispatchError::OriginAtIntersection(center))
    );
    assert_eq!(
        sim.dispatch_emergency(GridPos::new(20, 0)),
        Err(DispatchError::Routing(PlanError::InvalidGridCoordinate(
            GridPos::new(20, 0)
        )))
    );

    for cell in [
        GridPos::new(4, 3),
        GridPos::new(3, 4),
        GridPos::new(5, 4),
        GridPos::new(4, 5),
    ] {
        sim.grid_mut().block(cell);
    }
    assert_eq!(
        sim.spawn_emergency(Direction::South),
        Err(DispatchError::Routing(PlanError::NoPathFound))
    );
    assert_eq!(sim.world().live_count(), 0);
    assert_eq!(sim.world().counters().requested, 0);
}

#[test]
fn test_emergency_respects_capacity() {
    let config = SimulationConfig {
        capacity: 1,
        ..quiet()
    };
    let mut sim = Simulation::new(config).unwrap();
    sim.spawn(Direction::West, VehicleCategory::Truck).unwrap();

    assert_eq!(
        sim.spawn_emergency(Direction::East),
        Err(DispatchError::Rejected(SpawnRejected::CapacityExceeded))
    );
    assert_eq!(sim.world().live_count(), 1);
}

#[test]
fn test_history_window_and_summary() {
    let mut sim = Simulation::new(busy(4)).unwrap();
    let mut history = MetricsHistory::with_capacity(100);
    assert!(history.summary().is_none());

    for _ in 0..600 {
        history.record(&sim.tick());
    }

    assert_eq!(history.len(), 100);
    assert_eq!(history.latest().map(|s| s.tick), Some(600));
    assert_eq!(history.iter().next().map(|s| s.tick), Some(501));

    let summary = history.summary().unwrap();
    assert_eq!(summary.ticks, 100);
    assert!((summary.span_secs - 9.9).abs() < 1e-2);
    assert!(summary.peak_queue >= summary.mean_queue.iter().cloned().fold(0.0, f32::max) as usize);
    assert!(summary.mean_wait <= summary.peak_wait);

    history.clear();
    assert!(history.is_empty());
}

#[test]
fn test_preemption_activations_are_counted_once() {
    let mut sim = Simulation::new(quiet()).unwrap();
    let mut history = MetricsHistory::default();
    sim.spawn_emergency(Direction::South).unwrap();
    for tick in 0..600 {
        if tick == 200 {
            sim.spawn_emergency(Direction::West).unwrap();
        }
        history.record(&sim.tick());
    }

    // The South ambulance rides the initial NS green; only West preempts
    let summary = history.summary().unwrap();
    assert_eq!(summary.preemption_activations, 1);
    assert_eq!(summary.exited, 2);
    assert_eq!(sim.controller().preemptions_started(), 1);
}
