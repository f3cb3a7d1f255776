//! phasegrain CLI: live playback and WAV export.
//!
//! Usage:
//!   phasegrain --algorithm serial-pair-grain --amplitude 0.5 --seconds 10
//!   phasegrain --config patch.toml --wav output.wav

use clap::Parser;
use pg_master::{AlgorithmId, Controller, ParamChange, SynthConfig};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use std::{fs, io::Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "phasegrain")]
#[command(about = "Phase-modulation and granular synthesizer", long_about = None)]
struct Cli {
    /// TOML configuration file; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wiring preset, e.g. serial-pair-grain or six-chain
    #[arg(short, long)]
    algorithm: Option<AlgorithmId>,

    /// Number of grain generators (serial-pair-grain-bank only)
    #[arg(long)]
    generators: Option<usize>,

    /// Master note, 0-127
    #[arg(short, long)]
    master: Option<u8>,

    /// Amplitude for every operator, 0-1
    #[arg(long, default_value = "0.5")]
    amplitude: f32,

    /// Absolute note for an operator, as OP:NOTE
    #[arg(long, value_parser = parse_pair)]
    note: Vec<(usize, u8)>,

    /// Lock an operator to the master note at a ratio, as OP:RATIO
    #[arg(long, value_parser = parse_pair)]
    lock: Vec<(usize, u8)>,

    /// Samples between grain births
    #[arg(long)]
    period: Option<u32>,

    #[arg(long)]
    period_jitter: Option<u32>,

    /// Grain length in samples
    #[arg(long)]
    duration: Option<u32>,

    #[arg(long)]
    duration_jitter: Option<u32>,

    /// How far back in the delay line grains are taken from, in samples
    #[arg(long)]
    lag: Option<u32>,

    #[arg(long)]
    lag_jitter: Option<u32>,

    /// Length to play or render
    #[arg(short, long, default_value = "10.0")]
    seconds: f32,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,
}

fn parse_pair(s: &str) -> Result<(usize, u8), String> {
    let (op, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected OP:VALUE, got {}", s))?;
    let op = op.parse().map_err(|e| format!("bad operator {}: {}", op, e))?;
    let value = value.parse().map_err(|e| format!("bad value {}: {}", value, e))?;
    Ok((op, value))
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(cli)?;
    let ctrl = Controller::new(config)?;
    for change in param_changes(cli, ctrl.config()) {
        ctrl.set(change)?;
    }

    let config = ctrl.config();
    println!("Algorithm:   {}", config.algorithm);
    println!("Operators:   {}", config.operators);
    println!("Generators:  {}", config.generators);
    println!("Sample rate: {} Hz, block {}", config.sample_rate, config.block_len);
    println!();

    match &cli.wav {
        Some(path) => render_to_wav(&ctrl, path, cli.seconds),
        None => play_audio(ctrl, cli.seconds),
    }
}

fn load_config(cli: &Cli) -> Result<SynthConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            toml::from_str(&text)?
        }
        None => SynthConfig::default(),
    };
    if let Some(algorithm) = cli.algorithm {
        let (operators, generators) = algorithm.default_counts();
        config.algorithm = algorithm;
        config.operators = operators;
        config.generators = generators;
    }
    if let Some(generators) = cli.generators {
        config.generators = generators;
    }
    info!(algorithm = %config.algorithm, "configuration loaded");
    Ok(config)
}

fn param_changes(cli: &Cli, config: &SynthConfig) -> Vec<ParamChange> {
    let mut changes = Vec::new();
    if let Some(note) = cli.master {
        changes.push(ParamChange::MasterNote(note));
    }
    for op in 0..config.operators {
        changes.push(ParamChange::OperatorAmplitude {
            op,
            amplitude: cli.amplitude,
        });
    }
    for &(op, value) in &cli.note {
        changes.push(ParamChange::OperatorLocked { op, locked: false });
        changes.push(ParamChange::OperatorFrequency { op, value });
    }
    for &(op, value) in &cli.lock {
        changes.push(ParamChange::OperatorLocked { op, locked: true });
        changes.push(ParamChange::OperatorFrequency { op, value });
    }
    for gen in 0..config.generators {
        let grain = [
            cli.period.map(|value| ParamChange::Period { gen, value }),
            cli.period_jitter
                .map(|value| ParamChange::PeriodJitter { gen, value }),
            cli.duration
                .map(|value| ParamChange::Duration { gen, value }),
            cli.duration_jitter
                .map(|value| ParamChange::DurationJitter { gen, value }),
            cli.lag.map(|value| ParamChange::Lag { gen, value }),
            cli.lag_jitter
                .map(|value| ParamChange::LagJitter { gen, value }),
        ];
        changes.extend(grain.into_iter().flatten());
    }
    changes
}

fn play_audio(mut ctrl: Controller, seconds: f32) -> Result<(), Box<dyn Error>> {
    ctrl.play()?;
    println!("Playing...");

    let deadline = Instant::now() + Duration::from_secs_f32(seconds.max(0.0));
    while ctrl.is_playing() && Instant::now() < deadline {
        print!("\rBlocks: {}", ctrl.blocks_rendered());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(50));
    }
    println!();
    ctrl.stop()?;

    println!("Done.");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, seconds: f32) -> Result<(), Box<dyn Error>> {
    println!(
        "Rendering {} s to {} at {} Hz...",
        seconds,
        path.display(),
        ctrl.config().sample_rate
    );

    let wav = ctrl.render_to_wav(seconds)?;
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).map_err(|e| format!("failed to write {}: {}", path.display(), e))?;

    println!("Done.");
    Ok(())
}
