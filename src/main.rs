use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use traffic_score::{output, Aggregator, ArrivalCutoff, EngineConfig, FcdReader};

/// Scores a simulation run from its floating car data output.
#[derive(Parser, Debug)]
#[command(name = "traffic-score", version)]
struct Args {
    /// The FCD XML file written by the simulator.
    fcd: PathBuf,

    /// JSON file with engine parameters; unset fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SUMO network whose traffic light plans are copied into the score file.
    #[arg(long)]
    net: Option<PathBuf>,

    /// Directory the artifacts are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Label used in artifact file names. Defaults to the FCD file name.
    #[arg(long)]
    label: Option<String>,

    /// Overrides the tracked vehicle ID.
    #[arg(long)]
    tracked: Option<String>,

    /// Overrides the observation window start, in s.
    #[arg(long)]
    window_start: Option<f64>,

    /// Overrides the grid cell size.
    #[arg(long)]
    cell_size: Option<f64>,

    /// Stop reading once the tracked vehicle has left the simulation.
    #[arg(long)]
    stop_on_arrival: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(id) = args.tracked.clone() {
        config.tracked_vehicle_id = id;
    }
    if let Some(t) = args.window_start {
        config.window_start = t;
    }
    if let Some(size) = args.cell_size {
        config.cell_size = size;
    }

    let mut aggregator = Aggregator::new(&config)?;
    let reader = FcdReader::open(&args.fcd)?;
    if args.stop_on_arrival {
        aggregator.try_consume(ArrivalCutoff::new(
            reader,
            config.tracked_vehicle_id.clone(),
            config.window_start,
        ))?;
    } else {
        aggregator.try_consume(reader)?;
    }
    log::info!(
        "Consumed telemetry up to t={} in {:.2}s",
        aggregator.last_time(),
        start.elapsed().as_secs_f64()
    );

    let partial = Instant::now();
    let summary = aggregator.finalize();
    let timing_plans = match &args.net {
        Some(path) => output::load_timing_plans(path)
            .with_context(|| format!("reading traffic lights from {}", path.display()))?,
        None => vec![],
    };
    let label = match args.label {
        Some(label) => label,
        None => args
            .fcd
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("FCD path has no file name")?,
    };
    let paths = output::write_run(&args.out_dir, &label, &summary, &timing_plans)?;
    log::info!(
        "Wrote {}, {} and {} in {:.2}s",
        paths.score.display(),
        paths.pins.display(),
        paths.speed.display(),
        partial.elapsed().as_secs_f64()
    );
    log::info!(
        "{} timesteps, {} observations ({} outside the grid), value {}",
        summary.records,
        summary.observations,
        summary.dropped_observations,
        summary.score.value
    );

    if args.json {
        let json = serde_json::json!({
            "score": summary.score,
            "records": summary.records,
            "observations": summary.observations,
            "droppedObservations": summary.dropped_observations,
            "bounds": summary.grid.average_speed.bounds,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    }

    log::info!("Total time {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
