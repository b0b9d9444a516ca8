use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use bevy::{app::ScheduleRunnerPlugin, prelude::*};
use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use plantar::{
    prelude::*,
    sensor::{ConditionedSource, Conditioner, LineSource, SimulatedSource},
};
use tracing_subscriber::EnvFilter;

/// Number of processed readings between two summaries in the log.
const SUMMARY_INTERVAL: u64 = 20;

#[derive(Parser, Debug)]
/// Monitors plantar pressure and gait phase of an FSR insole.
struct Cli {
    /// Directory that contains `plantar.toml`
    #[clap(long, default_value = "config")]
    config_dir: PathBuf,
    /// Apply the overlay in `<CONFIG_DIR>/overlay/<DEVICE>/`
    #[clap(long, short)]
    device: Option<String>,
    /// Replay packets from a file, `-` reads from stdin [default: -]
    #[clap(long, short, conflicts_with = "simulate")]
    input: Option<PathBuf>,
    /// Generate random readings instead of reading packets
    #[clap(long)]
    simulate: bool,
    /// Seed for the simulated readings
    #[clap(long, default_value_t = 0)]
    seed: u64,
    /// Print every view as a line of JSON to stdout
    #[clap(long)]
    json: bool,
    /// Override the calibration constant `k` of `p = k * v^1.5`
    #[clap(long)]
    calibration: Option<f32>,
    /// Override the gait activity threshold, in kPa
    #[clap(long)]
    gait_threshold: Option<f32>,
    /// Store the effective config as overlay of `--device` and exit
    #[clap(long, requires = "device")]
    save_overlay: bool,
}

#[derive(Resource)]
struct Reporting {
    json: bool,
}

fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let overlay_dir = cli
        .device
        .as_ref()
        .map(|device| cli.config_dir.join("overlay").join(device));
    let mut config: PlantarConfig = load_config(&cli.config_dir, overlay_dir.as_deref())?;
    if let Some(calibration) = cli.calibration {
        config.pressure.calibration = calibration;
    }
    if let Some(threshold) = cli.gait_threshold {
        config.gait.activity_threshold = threshold;
    }

    let pipeline = Pipeline::new(&config)?;
    if cli.save_overlay {
        if let Some(overlay_dir) = &overlay_dir {
            let main = PlantarConfig::load(&cli.config_dir)?;
            config.save_as_overlay(&main, overlay_dir)?;
            tracing::info!("stored overlay in `{}`", overlay_dir.display());
        }
        return Ok(());
    }

    let source = open_source(&cli, &config)?;

    let exit = App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
                config.acquisition.poll_interval,
            )),
        )
        .add_plugins(MonitorPlugin)
        .insert_resource(Session::new(pipeline))
        .insert_resource(source)
        .insert_resource(Reporting { json: cli.json })
        .add_systems(PostUpdate, report)
        .run();

    match exit {
        AppExit::Success => Ok(()),
        AppExit::Error(code) => Err(miette!("monitor exited with code {code}")),
    }
}

fn open_source(cli: &Cli, config: &PlantarConfig) -> Result<ActiveSource> {
    let sensors = config.sensors.ids.clone();

    let source: Box<dyn ReadingSource + Send + Sync> = if cli.simulate {
        Box::new(SimulatedSource::new(sensors, cli.seed))
    } else {
        match cli.input.as_deref() {
            Some(path) if path != Path::new("-") => {
                let file = File::open(path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to open `{}`", path.display()))?;
                Box::new(LineSource::new(BufReader::new(file), sensors))
            }
            _ => Box::new(LineSource::new(BufReader::new(io::stdin()), sensors)),
        }
    };

    if !config.conditioning.enabled {
        return Ok(ActiveSource::new(source));
    }

    let conditioner = Conditioner::new(config.conditioning.clone(), &config.sensors.ids);
    Ok(ActiveSource::new(ConditionedSource::new(source, conditioner)))
}

fn report(view: Res<MonitorView>, reporting: Res<Reporting>) {
    if !view.is_changed() || view.samples == 0 {
        return;
    }

    if reporting.json {
        match serde_json::to_string(&*view) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!(%error, "failed to serialize view"),
        }
    }

    if view.samples % SUMMARY_INTERVAL == 0 {
        tracing::info!(
            samples = view.samples,
            steps = view.steps,
            phase = ?view.phase,
            total_kpa = view.total_pressure,
            peak_kpa = view.smoothed_peak.as_ref().map(|peak| peak.pressure),
            session_max_kpa = view.session_max,
            "monitor summary"
        );
    }
}
