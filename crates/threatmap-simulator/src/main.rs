//! Headless threat map simulator CLI
//!
//! Runs the simulation without a transport and logs what happens.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use threatmap_simulator::{LaunchPolicy, LogSink, Scenario, SimConfig, SimulationEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "threatmap-sim")]
#[command(about = "Simulate cyber attacks and interceptors without a server")]
struct Args {
    /// Scenario file with location pools and optional history
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "50")]
    tick_ms: u64,

    /// Attack generation interval in milliseconds
    #[arg(long, default_value = "800")]
    generation_ms: u64,

    /// Attack speed in meters per second
    #[arg(long, default_value = "30000")]
    attack_speed: f64,

    /// Cap on attack travel time in milliseconds
    #[arg(long)]
    max_travel_ms: Option<f64>,

    /// Pause before a finished replay starts over, in milliseconds
    #[arg(long, default_value = "10000")]
    replay_pause_ms: u64,

    /// Interceptor speed in meters per second
    #[arg(long, default_value = "45000")]
    interceptor_speed: f64,

    /// Interceptor launch policy
    #[arg(long, value_enum, default_value_t = LaunchPolicy::Immediate)]
    policy: LaunchPolicy,

    /// Centers defending each attack
    #[arg(short, long, default_value = "1")]
    interceptors: usize,

    /// Keep sibling interceptors flying after one destroys the attack
    #[arg(long)]
    no_cancel_siblings: bool,

    /// Run time in seconds
    #[arg(short, long, default_value = "30")]
    duration_secs: u64,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Print every event as a JSON line
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("threatmap_simulator=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::defaults(),
    };

    let mut config = SimConfig {
        attack_speed_mps: args.attack_speed,
        max_attack_travel_ms: args.max_travel_ms,
        tick_interval: Duration::from_millis(args.tick_ms),
        generation_interval: Duration::from_millis(args.generation_ms),
        replay_pause: Duration::from_millis(args.replay_pause_ms),
        interceptors_per_attack: args.interceptors,
        seed: args.seed,
        ..SimConfig::default()
    };
    config.intercept.interceptor_speed_mps = args.interceptor_speed;
    config.intercept.launch_policy = args.policy;
    config.intercept.cancel_siblings_on_intercept = !args.no_cancel_siblings;

    info!(
        "Starting threat map simulation: {} sources, {} centers, {} historical records",
        scenario.sources.len(),
        scenario.centers.len(),
        scenario.history.len()
    );
    info!(
        "Tick: {}ms, Generation: {}ms, Duration: {}s, Policy: {:?}",
        args.tick_ms, args.generation_ms, args.duration_secs, args.policy
    );

    let mut engine = SimulationEngine::new(config, scenario, LogSink::new(args.json))?;
    let stats = engine
        .run(tokio::time::sleep(Duration::from_secs(args.duration_secs)))
        .await;

    info!("=== SIMULATION SUMMARY ===");
    info!("Attacks generated: {}", stats.generated);
    info!("Hits: {}", stats.hits);
    info!("Intercepted: {}", stats.intercepted);
    info!("Interceptor misses: {}", stats.missed);
    info!("Ticks: {}", stats.ticks);

    Ok(())
}
