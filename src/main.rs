//! Exposure Capture CLI
//!
//! Opens the camera, optionally converges the exposure time toward an
//! operator-chosen brightness, and writes a bounded number of frames as
//! `{YYYY-MM-DD}_{index}.png`.

use clap::Parser;
use exposure_capture::{
    acquisition::{Acquisition, FrameNamer, PngSink, SinkError, StopSignal},
    capture::{Camera, MockCamera},
    config::{ConfigError, FileConfig},
    exposure::StepPolicy,
    metrics::{MetricsError, MetricsRegistry, MetricsSnapshot},
    operator::{
        parse_convergence_rate, parse_target_intensity, FixedOperator, IntensityChoice, Operator,
        Prompter, RateChoice,
    },
    session::{ExposureOutcome, Session, SessionError, SessionPlan},
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "exposure-capture", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to acquire.
    #[arg(short = 'n', long)]
    max_frames: Option<u32>,

    /// Sample budget for exposure adjustment.
    #[arg(long)]
    samples: Option<u32>,

    /// Grab timeout in milliseconds, for both adjustment and acquisition.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip exposure adjustment.
    #[arg(long)]
    no_adjust: bool,

    /// Convergence rate in [0.01, 1]; answers the prompt non-interactively.
    #[arg(long, requires = "target", value_parser = rate_arg)]
    rate: Option<RateChoice>,

    /// Target intensity in [0, 255]; answers the prompt non-interactively.
    #[arg(long, requires = "rate", value_parser = intensity_arg)]
    target: Option<IntensityChoice>,

    /// Direction rule applied when a sample is brighter than the target.
    #[arg(long, value_enum)]
    step_policy: Option<StepPolicy>,

    /// Directory receiving the PNG files.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write run metrics in Prometheus text format to this file.
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Use the synthetic camera instead of hardware.
    #[arg(long)]
    mock: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn rate_arg(value: &str) -> Result<RateChoice, String> {
    parse_convergence_rate(value).map_err(|e| e.to_string())
}

fn intensity_arg(value: &str) -> Result<IntensityChoice, String> {
    parse_target_intensity(value).map_err(|e| e.to_string())
}

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("output directory unavailable: {0}")]
    Output(#[from] SinkError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Exposure Capture v{}", exposure_capture::VERSION);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    let plan = SessionPlan::from_config(&config);

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.raise()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let acquisition = Acquisition::new(FrameNamer::today()).with_stop_signal(stop);
    let mut sink = PngSink::create(&config.output.directory)?;
    let mut camera = open_backend(cli.mock);
    let mut operator: Box<dyn Operator> = match (cli.rate, cli.target) {
        (Some(rate), Some(intensity)) => Box::new(FixedOperator { rate, intensity }),
        _ => Box::new(Prompter::stdio(
            config.exposure.suggested_rate,
            config.exposure.suggested_intensity,
        )),
    };

    println!("Starting capture\n...\n...");
    let report = Session::new(&plan, &acquisition).run(
        camera.as_mut(),
        operator.as_mut(),
        &mut sink,
    )?;

    if let ExposureOutcome::Adjusted(ref convergence) = report.exposure {
        println!(
            "Current Exposure Time: {:.1} us ({})",
            convergence.final_exposure_us,
            if convergence.converged {
                "converged"
            } else {
                "not converged"
            }
        );
    }
    println!(
        "Done!\nAcquired {} frames in {:.0} seconds",
        report.acquisition.frames_written,
        report.acquisition.elapsed.as_secs_f64()
    );

    if let Some(path) = &config.output.metrics_file {
        let registry = MetricsRegistry::new()?;
        registry.update(&MetricsSnapshot::from_report(&report));
        registry.write_to(path)?;
        info!(path = %path.display(), "Metrics written");
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<FileConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if let Some(max_frames) = cli.max_frames {
        config.acquisition.max_frames = max_frames;
    }
    if let Some(samples) = cli.samples {
        config.exposure.max_samples = samples;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.exposure.timeout_ms = timeout_ms;
        config.acquisition.timeout_ms = timeout_ms;
    }
    if cli.no_adjust {
        config.exposure.enabled = false;
    }
    if let Some(policy) = cli.step_policy {
        config.exposure.step_policy = policy;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(path) = &cli.metrics_file {
        config.output.metrics_file = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "camera")]
fn open_backend(mock: bool) -> Box<dyn Camera> {
    if mock {
        Box::new(MockCamera::new())
    } else {
        Box::new(exposure_capture::capture::NativeCamera::new())
    }
}

#[cfg(not(feature = "camera"))]
fn open_backend(mock: bool) -> Box<dyn Camera> {
    if !mock {
        warn!("Built without the `camera` feature; using the synthetic camera");
    }
    Box::new(MockCamera::new())
}
