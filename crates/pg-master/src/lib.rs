//! Headless controller for phasegrain.
//!
//! Owns a configuration and a shared control surface, and provides live
//! playback and offline rendering that both the CLI and tests share.

mod wav;

use pg_audio::{AudioOutput, CpalOutput};
use pg_engine::Engine;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

// Re-export common types so callers don't need pg-ir/pg-engine directly.
pub use pg_audio::AudioError;
pub use pg_engine::ControlSurface;
pub use pg_ir::{
    Algorithm, AlgorithmId, ConfigError, EnvelopeShape, FrequencyMode, ParamError, SynthConfig,
};

pub use wav::{samples_to_wav, to_pcm16, write_wav};

/// Top-level error for controller operations.
#[derive(Debug)]
pub enum SynthError {
    Config(ConfigError),
    Audio(AudioError),
    Param(ParamError),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::Config(e) => write!(f, "configuration error: {}", e),
            SynthError::Audio(e) => write!(f, "audio error: {}", e),
            SynthError::Param(e) => write!(f, "parameter rejected: {}", e),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SynthError::Config(e) => Some(e),
            SynthError::Audio(e) => Some(e),
            SynthError::Param(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SynthError {
    fn from(e: ConfigError) -> Self {
        SynthError::Config(e)
    }
}

impl From<AudioError> for SynthError {
    fn from(e: AudioError) -> Self {
        SynthError::Audio(e)
    }
}

impl From<ParamError> for SynthError {
    fn from(e: ParamError) -> Self {
        SynthError::Param(e)
    }
}

/// A single parameter write, as issued by a control layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamChange {
    MasterNote(u8),
    /// Note when the operator is absolute, ratio when locked.
    OperatorFrequency { op: usize, value: u8 },
    OperatorLocked { op: usize, locked: bool },
    OperatorAmplitude { op: usize, amplitude: f32 },
    Period { gen: usize, value: u32 },
    PeriodJitter { gen: usize, value: u32 },
    Duration { gen: usize, value: u32 },
    DurationJitter { gen: usize, value: u32 },
    Lag { gen: usize, value: u32 },
    LagJitter { gen: usize, value: u32 },
}

impl ParamChange {
    /// Write the change to `controls`.
    pub fn apply(self, controls: &ControlSurface) -> Result<(), ParamError> {
        match self {
            ParamChange::MasterNote(note) => controls.set_master_note(note),
            ParamChange::OperatorFrequency { op, value } => {
                controls.set_operator_frequency(op, value)
            }
            ParamChange::OperatorLocked { op, locked } => controls.set_operator_locked(op, locked),
            ParamChange::OperatorAmplitude { op, amplitude } => {
                controls.set_operator_amplitude(op, amplitude)
            }
            ParamChange::Period { gen, value } => controls.set_period(gen, value),
            ParamChange::PeriodJitter { gen, value } => controls.set_period_jitter(gen, value),
            ParamChange::Duration { gen, value } => controls.set_duration(gen, value),
            ParamChange::DurationJitter { gen, value } => controls.set_duration_jitter(gen, value),
            ParamChange::Lag { gen, value } => controls.set_lag(gen, value),
            ParamChange::LagJitter { gen, value } => controls.set_lag_jitter(gen, value),
        }
    }
}

/// Headless synth controller: owns a configuration and manages playback.
pub struct Controller {
    config: SynthConfig,
    algorithm: Algorithm,
    controls: Arc<ControlSurface>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    blocks: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    thread: JoinHandle<Result<(), AudioError>>,
}

impl Controller {
    /// Validate `config` and build its preset algorithm.
    pub fn new(config: SynthConfig) -> Result<Self, SynthError> {
        config.validate()?;
        let algorithm = config.algorithm.build(config.operators, config.generators)?;
        Self::with_algorithm(config, algorithm)
    }

    pub fn with_algorithm(config: SynthConfig, algorithm: Algorithm) -> Result<Self, SynthError> {
        let controls = Arc::new(ControlSurface::new(&config));
        let controller = Self {
            config,
            algorithm,
            controls,
            playback: None,
        };
        // Fail here rather than on the audio thread.
        controller.build_engine()?;
        Ok(controller)
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Shared parameter surface; writes reach a playing engine at its next block.
    pub fn controls(&self) -> Arc<ControlSurface> {
        Arc::clone(&self.controls)
    }

    /// Apply a parameter change, logging rejections.
    pub fn set(&self, change: ParamChange) -> Result<(), ParamError> {
        change.apply(&self.controls).inspect_err(|e| {
            warn!(?change, error = %e, "parameter rejected");
        })
    }

    fn build_engine(&self) -> Result<Engine, ConfigError> {
        Engine::with_controls(
            self.config.clone(),
            self.algorithm.clone(),
            Arc::clone(&self.controls),
        )
    }

    // --- Real-time playback ---

    /// Start live playback on a dedicated audio thread. Returns once the
    /// device is running, or with the error that kept it from starting.
    pub fn play(&mut self) -> Result<(), SynthError> {
        if let Err(e) = self.stop() {
            warn!(error = %e, "previous playback ended with an error");
        }

        let engine = self.build_engine()?;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let blocks = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::sync_channel(1);

        let stop = stop_signal.clone();
        let rendered = blocks.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            let result = audio_thread(engine, &stop, &rendered, started_tx);
            if let Err(e) = &result {
                error!(error = %e, "playback failed");
            }
            done.store(true, Ordering::Relaxed);
            result
        });

        if let Err(e) = wait_for_start(&started_rx) {
            let _ = thread.join();
            return Err(e.into());
        }

        info!(algorithm = %self.config.algorithm, "playback started");
        self.playback = Some(PlaybackHandle {
            stop_signal,
            blocks,
            finished,
            thread,
        });
        Ok(())
    }

    /// Stop playback, returning any error the audio thread hit while running.
    pub fn stop(&mut self) -> Result<(), SynthError> {
        let Some(pb) = self.playback.take() else {
            return Ok(());
        };
        pb.stop_signal.store(true, Ordering::Relaxed);
        let result = pb
            .thread
            .join()
            .unwrap_or_else(|_| Err(AudioError::Playback("audio thread panicked".into())));
        info!(blocks = pb.blocks.load(Ordering::Relaxed), "playback stopped");
        result.map_err(SynthError::from)
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    /// Blocks rendered by the current playback, or zero when stopped.
    pub fn blocks_rendered(&self) -> u64 {
        self.playback
            .as_ref()
            .map_or(0, |p| p.blocks.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Render `blocks` blocks with the current parameters.
    pub fn render(&self, blocks: usize) -> Result<Vec<f32>, SynthError> {
        let mut engine = self.build_engine()?;
        let mut samples = Vec::with_capacity(blocks * engine.block_len());
        for _ in 0..blocks {
            samples.extend_from_slice(engine.synthesize());
        }
        Ok(samples)
    }

    /// Render at least `seconds` of audio as a 16-bit mono WAV file.
    pub fn render_to_wav(&self, seconds: f32) -> Result<Vec<u8>, SynthError> {
        let samples = (seconds.max(0.0) * self.config.sample_rate as f32).ceil() as usize;
        let blocks = samples.div_ceil(self.config.block_len);
        let rendered = self.render(blocks)?;
        Ok(wav::samples_to_wav(&rendered, self.config.sample_rate))
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

type StartResult = Result<(), AudioError>;

/// Block until the audio thread reports whether the device started.
fn wait_for_start(started: &Receiver<StartResult>) -> StartResult {
    match started.recv() {
        Ok(result) => result,
        Err(_) => Err(AudioError::Playback("audio thread exited before starting".into())),
    }
}

fn open_output(sample_rate: u32) -> Result<CpalOutput, AudioError> {
    let (mut output, consumer) = CpalOutput::new(sample_rate)?;
    output.build_stream(consumer)?;
    output.start()?;
    Ok(output)
}

fn audio_thread(
    mut engine: Engine,
    stop_signal: &AtomicBool,
    blocks: &AtomicU64,
    started: SyncSender<StartResult>,
) -> Result<(), AudioError> {
    let mut output = match open_output(engine.sample_rate()) {
        Ok(output) => output,
        Err(e) => {
            // Reported by play().
            let _ = started.send(Err(e));
            return Ok(());
        }
    };
    let _ = started.send(Ok(()));

    while !stop_signal.load(Ordering::Relaxed) {
        output.write(engine.synthesize());
        blocks.store(engine.blocks_rendered(), Ordering::Relaxed);
    }

    output.stop()
}
