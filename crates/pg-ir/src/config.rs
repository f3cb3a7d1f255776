//! Construction-time configuration.
//!
//! A [`SynthConfig`] is fixed for the lifetime of an engine. Every default and
//! bound the control layer may later move within lives here, and
//! [`SynthConfig::validate`] guarantees that no parameter inside those bounds
//! can make the audio thread index outside a table or a delay line.

use crate::algorithm::AlgorithmId;
use crate::error::{ConfigError, ParamError};

/// Number of entries in the note → increment table.
pub const NOTE_COUNT: usize = 128;

/// Hard ceiling on grains alive at once in one generator. The grain pool is
/// preallocated to this size.
pub const MAX_GRAINS_PER_GENERATOR: usize = 64;

/// Highest harmonic ratio a locked operator accepts.
pub const MAX_LOCK_RATIO: u8 = 4;

/// Window applied to every grain at birth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum EnvelopeShape {
    /// Raised cosine with a 0.08 floor.
    #[default]
    Hamming,
    /// Linear rise to the midpoint, linear fall.
    Triangle,
    /// Raised cosine reaching zero at both ends.
    Hann,
}

/// Initial state of every operator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct OperatorDefaults {
    /// Absolute note, `0..128`.
    pub note: u8,
    /// Output gain, `0..=1`.
    pub amplitude: f32,
}

impl Default for OperatorDefaults {
    fn default() -> Self {
        Self {
            note: 68,
            amplitude: 0.0,
        }
    }
}

/// Grain timing parameters, all in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GrainSettings {
    /// Samples between births.
    pub period: u32,
    /// Births are delayed by a uniform draw from `0..period_jitter`.
    pub period_jitter: u32,
    /// Grain length.
    pub duration: u32,
    /// Stored for the control layer; grain lengths are not jittered.
    pub duration_jitter: u32,
    /// How far behind the newest delay-line sample a grain ends.
    pub lag: u32,
    /// Lag is extended by a uniform draw from `0..lag_jitter`.
    pub lag_jitter: u32,
}

impl Default for GrainSettings {
    fn default() -> Self {
        Self {
            period: 500,
            period_jitter: 0,
            duration: 150,
            duration_jitter: 0,
            lag: 0,
            lag_jitter: 0,
        }
    }
}

/// Inclusive limits for every grain parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GrainBounds {
    pub min_period: u32,
    pub max_period: u32,
    pub max_period_jitter: u32,
    pub min_duration: u32,
    pub max_duration: u32,
    pub max_duration_jitter: u32,
    pub max_lag: u32,
    pub max_lag_jitter: u32,
}

impl GrainBounds {
    /// Bounds sized for a delay line of `delay_len` samples.
    pub fn for_delay(delay_len: usize) -> Self {
        Self {
            min_period: 10,
            max_period: 5000,
            max_period_jitter: 500,
            min_duration: 5,
            max_duration: 5000,
            max_duration_jitter: 500,
            max_lag: (delay_len / 2) as u32,
            max_lag_jitter: 500,
        }
    }

    pub fn check_period(&self, value: u32) -> Result<u32, ParamError> {
        within("period", value, self.min_period, self.max_period)
    }

    pub fn check_period_jitter(&self, value: u32) -> Result<u32, ParamError> {
        within("period_jitter", value, 0, self.max_period_jitter)
    }

    pub fn check_duration(&self, value: u32) -> Result<u32, ParamError> {
        within("duration", value, self.min_duration, self.max_duration)
    }

    pub fn check_duration_jitter(&self, value: u32) -> Result<u32, ParamError> {
        within("duration_jitter", value, 0, self.max_duration_jitter)
    }

    pub fn check_lag(&self, value: u32) -> Result<u32, ParamError> {
        within("lag", value, 0, self.max_lag)
    }

    pub fn check_lag_jitter(&self, value: u32) -> Result<u32, ParamError> {
        within("lag_jitter", value, 0, self.max_lag_jitter)
    }

    /// Check every field of `settings`.
    pub fn check(&self, settings: &GrainSettings) -> Result<(), ParamError> {
        self.check_period(settings.period)?;
        self.check_period_jitter(settings.period_jitter)?;
        self.check_duration(settings.duration)?;
        self.check_duration_jitter(settings.duration_jitter)?;
        self.check_lag(settings.lag)?;
        self.check_lag_jitter(settings.lag_jitter)?;
        Ok(())
    }

    /// Longest history any grain request can reach back into.
    pub fn worst_case_reach(&self) -> usize {
        self.max_lag as usize + self.max_lag_jitter as usize + self.max_duration as usize
    }
}

impl Default for GrainBounds {
    fn default() -> Self {
        Self::for_delay(SynthConfig::DEFAULT_SAMPLE_RATE as usize * 2)
    }
}

fn within(param: &'static str, value: u32, min: u32, max: u32) -> Result<u32, ParamError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::OutOfBounds {
            param,
            value,
            min,
            max,
        })
    }
}

/// Check a note number against the frequency table.
pub fn check_note(param: &'static str, value: u8) -> Result<u8, ParamError> {
    within(param, value as u32, 0, NOTE_COUNT as u32 - 1).map(|v| v as u8)
}

/// Everything needed to construct an engine.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SynthConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per block.
    pub block_len: usize,
    /// Number of operators.
    pub operators: usize,
    /// Number of grain generators.
    pub generators: usize,
    /// Wiring preset.
    pub algorithm: AlgorithmId,
    /// Capacity of every delay line, in samples.
    pub delay_len: usize,
    /// Population cap per grain generator.
    pub max_grains: usize,
    /// Initial master note.
    pub master_note: u8,
    /// Seed for the jitter generators. Each grain generator derives its own stream.
    pub seed: u64,
    /// Grain window.
    pub envelope: EnvelopeShape,
    /// Initial operator state.
    pub operator: OperatorDefaults,
    /// Initial grain generator state.
    pub grain: GrainSettings,
    /// Limits for grain parameters.
    pub bounds: GrainBounds,
}

impl SynthConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 20_000;
    pub const DEFAULT_BLOCK_LEN: usize = 50;
    pub const DEFAULT_MAX_GRAINS: usize = 50;

    /// Default configuration for a given algorithm, with the operator and
    /// generator counts that algorithm needs.
    pub fn for_algorithm(algorithm: AlgorithmId) -> Self {
        let (operators, generators) = algorithm.default_counts();
        Self {
            algorithm,
            operators,
            generators,
            ..Self::default()
        }
    }

    /// Verify that the configuration can build an engine whose real-time path
    /// never fails. Algorithm/count compatibility is checked when the
    /// algorithm is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.block_len == 0 {
            return Err(ConfigError::ZeroBlockLength);
        }
        if self.max_grains > MAX_GRAINS_PER_GENERATOR {
            return Err(ConfigError::TooManyGrains {
                requested: self.max_grains,
                limit: MAX_GRAINS_PER_GENERATOR,
            });
        }
        if self.max_grains == 0 {
            return Err(ConfigError::OutOfBounds { param: "max_grains" });
        }
        check_note("master_note", self.master_note)
            .map_err(|_| ConfigError::OutOfBounds { param: "master_note" })?;
        check_note("operator.note", self.operator.note)
            .map_err(|_| ConfigError::OutOfBounds { param: "operator.note" })?;
        let amplitude = self.operator.amplitude;
        if !amplitude.is_finite() || !(0.0..=1.0).contains(&amplitude) {
            return Err(ConfigError::OutOfBounds {
                param: "operator.amplitude",
            });
        }

        let b = &self.bounds;
        if b.min_period > b.max_period {
            return Err(ConfigError::OutOfBounds { param: "bounds.period" });
        }
        if b.min_duration == 0 || b.min_duration > b.max_duration {
            return Err(ConfigError::OutOfBounds {
                param: "bounds.duration",
            });
        }
        b.check(&self.grain).map_err(|e| match e {
            ParamError::OutOfBounds { param, .. } => ConfigError::OutOfBounds { param },
            _ => ConfigError::OutOfBounds { param: "grain" },
        })?;

        let required = b.worst_case_reach().max(self.block_len);
        if required > self.delay_len {
            return Err(ConfigError::DelayTooShort {
                required,
                capacity: self.delay_len,
            });
        }
        Ok(())
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        let sample_rate = Self::DEFAULT_SAMPLE_RATE;
        let delay_len = sample_rate as usize * 2;
        Self {
            sample_rate,
            block_len: Self::DEFAULT_BLOCK_LEN,
            operators: 2,
            generators: 1,
            algorithm: AlgorithmId::SerialPairGrain,
            delay_len,
            max_grains: Self::DEFAULT_MAX_GRAINS,
            master_note: 68,
            seed: 0x5eed_9a17,
            envelope: EnvelopeShape::default(),
            operator: OperatorDefaults::default(),
            grain: GrainSettings::default(),
            bounds: GrainBounds::for_delay(delay_len),
        }
    }
}
