use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use smart_intersection::simulation::{
    Command, ControllerConfig, Direction, LogSink, MetricsHistory, MetricsSink, Simulation,
    SimulationConfig, SpawnRates, VehicleCategory,
};

#[derive(Parser)]
#[command(name = "smart_intersection")]
#[command(about = "Adaptive traffic-light intersection simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "3000")]
    ticks: u64,

    /// Simulated seconds per tick
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for vehicle arrivals
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Maximum number of live vehicles
    #[arg(long, default_value = "80")]
    capacity: usize,

    /// Speed multiplier applied to every tick
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Multiplier on the default arrival rates
    #[arg(long, default_value = "1.0")]
    spawn_scale: f32,

    /// Queue length that triggers a green extension
    #[arg(long, default_value = "10")]
    queue_threshold: usize,

    /// Average wait in seconds that triggers a green extension
    #[arg(long, default_value = "60")]
    wait_threshold: f32,

    /// Base green duration in seconds
    #[arg(long, default_value = "30")]
    green: f32,

    /// Inject an emergency vehicle every N ticks (0 disables)
    #[arg(long, default_value = "0")]
    emergency_every: u64,

    /// Approach used for injected emergency vehicles
    #[arg(long, value_enum, default_value = "north")]
    emergency_direction: Direction,

    /// Print a status line every N ticks
    #[arg(long, default_value = "100")]
    report_every: u64,
}

impl Cli {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            seed: self.seed,
            capacity: self.capacity,
            tick_duration: self.delta,
            spawn_rates: SpawnRates::default().scaled(self.spawn_scale),
            controller: ControllerConfig {
                queue_threshold: self.queue_threshold,
                wait_threshold: self.wait_threshold,
                base_green: self.green,
                ..ControllerConfig::default()
            },
            ..SimulationConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation without any front end and report statistics
fn run_headless(cli: &Cli) -> Result<()> {
    let report_every = cli.report_every.max(1);
    info!("Running intersection simulation in headless mode...");
    info!("Ticks: {}, Delta: {}s, Seed: {}", cli.ticks, cli.delta, cli.seed);

    let mut sim = Simulation::new(cli.config())?;
    sim.control(Command::SetSpeed(cli.speed));
    sim.add_sink(Box::new(LogSink::new(report_every)));
    let mut history = MetricsHistory::default();

    for _ in 0..cli.ticks {
        let now = sim.clock().now();
        if cli.emergency_every > 0 && now > 0 && now % cli.emergency_every == 0 {
            if let Err(e) = sim.spawn_emergency(cli.emergency_direction) {
                debug!("Skipped emergency injection at tick {}: {}", now, e);
            }
        }

        let snapshot = sim.tick();
        history.record(&snapshot);
        if snapshot.tick % report_every == 0 {
            println!("{}", snapshot.digest());
        }
    }

    let last = sim.last_snapshot();
    let counters = last.counters;
    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {:.1}s", last.sim_time);
    info!("Vehicles spawned: {}", counters.accepted);
    info!("Vehicles rejected: {}", counters.rejected());
    info!("Vehicles exited: {}", counters.exited);
    info!("Live vehicles: {}", last.live_vehicles());
    for category in VehicleCategory::ALL {
        info!("  {:?}: {}", category, last.category_count(category));
    }
    info!("Preemptions: {}", sim.controller().preemptions_started());
    if let Some(summary) = history.summary() {
        info!("Mean wait: {:.1}s (peak {:.1}s)", summary.mean_wait, summary.peak_wait);
        info!("Peak queue: {}", summary.peak_queue);
        info!("Throughput: {:.1} vehicles/min", summary.throughput_per_min);
    }
    Ok(())
}
