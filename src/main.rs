//! eyetouch - run a gaze interaction test plan headlessly and export the results.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use eyetouch::clock::{Clock, SystemClock};
use eyetouch::config::HarnessConfig;
use eyetouch::gaze::{spawn_producer, LatestSample, SimulatedGazeSource};
use eyetouch::orchestrator::TestOrchestrator;
use eyetouch::region::{RegionGrid, RegionTracker};
use eyetouch::session::TrackingSession;

#[derive(Parser, Debug)]
#[command(name = "eyetouch", about = "Gaze region tracking and attention test harness")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid layout (ROWSxCOLS)
    #[arg(long)]
    grid: Option<String>,

    /// Screen resolution (WxH)
    #[arg(long)]
    resolution: Option<String>,

    /// Tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seed for sequence generation and simulated gaze
    #[arg(long)]
    seed: Option<u64>,

    /// CSV export path
    #[arg(long)]
    export: Option<PathBuf>,

    /// Exit after N seconds even if the plan is unfinished
    #[arg(long)]
    exit_after: Option<u64>,

    /// Seconds the simulated gaze rests on each region
    #[arg(long, default_value = "2.5")]
    fixation_secs: f64,
}

/// Parse "AxB" into two positive numbers.
fn parse_pair<T: std::str::FromStr + PartialOrd + Default>(s: &str) -> Option<(T, T)> {
    let (a, b) = s.split_once('x')?;
    let a = a.trim().parse::<T>().ok()?;
    let b = b.trim().parse::<T>().ok()?;
    if a > T::default() && b > T::default() {
        Some((a, b))
    } else {
        None
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(grid) = &cli.grid {
        let (rows, cols) = parse_pair::<usize>(grid)
            .with_context(|| format!("invalid grid '{grid}', expected ROWSxCOLS"))?;
        config.screen.rows = rows;
        config.screen.cols = cols;
    }
    if let Some(res) = &cli.resolution {
        let (w, h) = parse_pair::<f64>(res)
            .with_context(|| format!("invalid resolution '{res}', expected WxH"))?;
        config.screen.width = w;
        config.screen.height = h;
    }
    if let Some(ms) = cli.tick_ms {
        config.tracking.tick_interval_ms = ms;
    }
    if cli.seed.is_some() {
        config.tests.seed = cli.seed;
    }
    if let Some(path) = &cli.export {
        config.export.path = path.clone();
    }
    if config.plan.is_empty() {
        config.plan = config.default_plan();
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eyetouch=info".into()),
        )
        .init();

    info!("eyetouch v{} starting", env!("CARGO_PKG_VERSION"));
    let config = load_config(&cli)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let grid = RegionGrid::new(
        config.screen.width,
        config.screen.height,
        config.screen.rows,
        config.screen.cols,
    )?;
    info!(
        "Screen {}x{} split into {}x{} regions",
        config.screen.width, config.screen.height, config.screen.rows, config.screen.cols
    );

    // The simulated gaze visits every region centre in turn.
    let targets = grid.regions().iter().map(|r| (r.center_x, r.center_y)).collect();
    let mut simulated = SimulatedGazeSource::new(clock.clone(), targets, config.tests.seed);
    simulated.fixation_s = cli.fixation_secs;

    let mut tracker = RegionTracker::new(grid);
    tracker.max_history = config.tracking.history_cap;
    tracker.min_confidence = config.tracking.min_confidence;
    let orchestrator = TestOrchestrator::new(tracker, clock, config.tests.seed);

    let slot = LatestSample::new();
    let producer = spawn_producer(simulated, slot.clone(), config.tracking.source_interval())
        .context("starting gaze source")?;

    let mut session = TrackingSession::new(slot, orchestrator, &config);
    session.start()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let exit = session.run(&shutdown, cli.exit_after.map(Duration::from_secs));
    info!("Session ended: {:?}", exit);
    session.stop();
    producer.stop();

    let orchestrator = session.into_orchestrator();
    let stats = orchestrator.statistics();
    info!(
        "{} test(s): success rate {:.0}%, average accuracy {:.0}%, average duration {:.2}s",
        stats.total_tests,
        stats.success_rate * 100.0,
        stats.average_accuracy * 100.0,
        stats.average_duration
    );

    orchestrator
        .write_results(&config.export.path)
        .with_context(|| format!("writing {}", config.export.path.display()))?;
    Ok(())
}
