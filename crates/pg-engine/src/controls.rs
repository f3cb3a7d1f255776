//! Lock-free parameter surface shared between a control thread and the
//! audio thread.
//!
//! Every field is an independent atomic. Writers validate, store with
//! `Relaxed`, then bump `generation` with `Release`; the engine checks the
//! generation with `Acquire` once per block and re-resolves node state only
//! when it moved. A write is therefore never observed mid-block.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use pg_ir::{
    check_note, FrequencyMode, GrainBounds, GrainSettings, ParamError, SynthConfig,
    MAX_LOCK_RATIO,
};

/// An `f32` stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order)
    }
}

#[derive(Debug)]
struct OperatorControls {
    note: AtomicU8,
    ratio: AtomicU8,
    locked: AtomicBool,
    amplitude: AtomicF32,
}

#[derive(Debug)]
struct GeneratorControls {
    period: AtomicU32,
    period_jitter: AtomicU32,
    duration: AtomicU32,
    duration_jitter: AtomicU32,
    lag: AtomicU32,
    lag_jitter: AtomicU32,
}

impl GeneratorControls {
    fn new(settings: &GrainSettings) -> Self {
        Self {
            period: AtomicU32::new(settings.period),
            period_jitter: AtomicU32::new(settings.period_jitter),
            duration: AtomicU32::new(settings.duration),
            duration_jitter: AtomicU32::new(settings.duration_jitter),
            lag: AtomicU32::new(settings.lag),
            lag_jitter: AtomicU32::new(settings.lag_jitter),
        }
    }
}

/// Externally settable synth parameters.
#[derive(Debug)]
pub struct ControlSurface {
    master: AtomicU8,
    operators: Vec<OperatorControls>,
    generators: Vec<GeneratorControls>,
    bounds: GrainBounds,
    generation: AtomicU64,
}

impl ControlSurface {
    /// Controls initialised from the configuration defaults.
    pub fn new(config: &SynthConfig) -> Self {
        let operators = (0..config.operators)
            .map(|_| OperatorControls {
                note: AtomicU8::new(config.operator.note),
                ratio: AtomicU8::new(0),
                locked: AtomicBool::new(false),
                amplitude: AtomicF32::new(config.operator.amplitude),
            })
            .collect();
        let generators = (0..config.generators)
            .map(|_| GeneratorControls::new(&config.grain))
            .collect();
        Self {
            master: AtomicU8::new(config.master_note),
            operators,
            generators,
            bounds: config.bounds,
            generation: AtomicU64::new(0),
        }
    }

    /// Whether this surface was built for a configuration shaped like `config`.
    pub fn matches(&self, config: &SynthConfig) -> bool {
        self.operators.len() == config.operators
            && self.generators.len() == config.generators
            && self.bounds == config.bounds
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    pub fn bounds(&self) -> &GrainBounds {
        &self.bounds
    }

    /// Bumped after every accepted write.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    fn operator(&self, op: usize) -> Result<&OperatorControls, ParamError> {
        self.operators.get(op).ok_or(ParamError::UnknownOperator(op))
    }

    fn generator(&self, gen: usize) -> Result<&GeneratorControls, ParamError> {
        self.generators
            .get(gen)
            .ok_or(ParamError::UnknownGenerator(gen))
    }

    // --- Engine ---

    pub fn set_master_note(&self, note: u8) -> Result<(), ParamError> {
        let note = check_note("master_note", note)?;
        self.master.store(note, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    pub fn master_note(&self) -> u8 {
        self.master.load(Ordering::Relaxed)
    }

    // --- Operators ---

    /// Set the frequency value the operator's current mode uses: a note when
    /// absolute, a ratio when locked.
    pub fn set_operator_frequency(&self, op: usize, value: u8) -> Result<(), ParamError> {
        let controls = self.operator(op)?;
        if controls.locked.load(Ordering::Relaxed) {
            self.set_operator_ratio(op, value)
        } else {
            self.set_operator_note(op, value)
        }
    }

    /// Note used while the operator is absolute.
    pub fn set_operator_note(&self, op: usize, note: u8) -> Result<(), ParamError> {
        let controls = self.operator(op)?;
        let note = check_note("operator.note", note)?;
        controls.note.store(note, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    /// Ratio used while the operator is locked to the master note.
    pub fn set_operator_ratio(&self, op: usize, ratio: u8) -> Result<(), ParamError> {
        let controls = self.operator(op)?;
        if ratio > MAX_LOCK_RATIO {
            return Err(ParamError::OutOfBounds {
                param: "operator.ratio",
                value: ratio as u32,
                min: 0,
                max: MAX_LOCK_RATIO as u32,
            });
        }
        controls.ratio.store(ratio, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    pub fn set_operator_locked(&self, op: usize, locked: bool) -> Result<(), ParamError> {
        self.operator(op)?.locked.store(locked, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    /// Set mode and value together.
    pub fn set_operator_mode(&self, op: usize, mode: FrequencyMode) -> Result<(), ParamError> {
        let controls = self.operator(op)?;
        match mode {
            FrequencyMode::Absolute(note) => {
                let note = check_note("operator.note", note)?;
                controls.note.store(note, Ordering::Relaxed);
                controls.locked.store(false, Ordering::Relaxed);
            }
            FrequencyMode::Locked(ratio) => {
                if ratio > MAX_LOCK_RATIO {
                    return Err(ParamError::OutOfBounds {
                        param: "operator.ratio",
                        value: ratio as u32,
                        min: 0,
                        max: MAX_LOCK_RATIO as u32,
                    });
                }
                controls.ratio.store(ratio, Ordering::Relaxed);
                controls.locked.store(true, Ordering::Relaxed);
            }
        }
        self.bump();
        Ok(())
    }

    pub fn operator_mode(&self, op: usize) -> Result<FrequencyMode, ParamError> {
        let controls = self.operator(op)?;
        Ok(if controls.locked.load(Ordering::Relaxed) {
            FrequencyMode::Locked(controls.ratio.load(Ordering::Relaxed))
        } else {
            FrequencyMode::Absolute(controls.note.load(Ordering::Relaxed))
        })
    }

    pub fn set_operator_amplitude(&self, op: usize, amplitude: f32) -> Result<(), ParamError> {
        let controls = self.operator(op)?;
        if !amplitude.is_finite() || !(0.0..=1.0).contains(&amplitude) {
            return Err(ParamError::InvalidAmplitude);
        }
        controls.amplitude.store(amplitude, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    pub fn operator_amplitude(&self, op: usize) -> Result<f32, ParamError> {
        Ok(self.operator(op)?.amplitude.load(Ordering::Relaxed))
    }

    // --- Grain generators ---

    fn set_grain(
        &self,
        gen: usize,
        value: u32,
        check: fn(&GrainBounds, u32) -> Result<u32, ParamError>,
        field: fn(&GeneratorControls) -> &AtomicU32,
    ) -> Result<(), ParamError> {
        let controls = self.generator(gen)?;
        let value = check(&self.bounds, value)?;
        field(controls).store(value, Ordering::Relaxed);
        self.bump();
        Ok(())
    }

    pub fn set_period(&self, gen: usize, period: u32) -> Result<(), ParamError> {
        self.set_grain(gen, period, GrainBounds::check_period, |g| &g.period)
    }

    pub fn set_period_jitter(&self, gen: usize, jitter: u32) -> Result<(), ParamError> {
        self.set_grain(gen, jitter, GrainBounds::check_period_jitter, |g| {
            &g.period_jitter
        })
    }

    pub fn set_duration(&self, gen: usize, duration: u32) -> Result<(), ParamError> {
        self.set_grain(gen, duration, GrainBounds::check_duration, |g| &g.duration)
    }

    pub fn set_duration_jitter(&self, gen: usize, jitter: u32) -> Result<(), ParamError> {
        self.set_grain(gen, jitter, GrainBounds::check_duration_jitter, |g| {
            &g.duration_jitter
        })
    }

    pub fn set_lag(&self, gen: usize, lag: u32) -> Result<(), ParamError> {
        self.set_grain(gen, lag, GrainBounds::check_lag, |g| &g.lag)
    }

    pub fn set_lag_jitter(&self, gen: usize, jitter: u32) -> Result<(), ParamError> {
        self.set_grain(gen, jitter, GrainBounds::check_lag_jitter, |g| {
            &g.lag_jitter
        })
    }

    /// Snapshot of one generator's parameters.
    pub fn grain_settings(&self, gen: usize) -> Result<GrainSettings, ParamError> {
        let g = self.generator(gen)?;
        Ok(GrainSettings {
            period: g.period.load(Ordering::Relaxed),
            period_jitter: g.period_jitter.load(Ordering::Relaxed),
            duration: g.duration.load(Ordering::Relaxed),
            duration_jitter: g.duration_jitter.load(Ordering::Relaxed),
            lag: g.lag.load(Ordering::Relaxed),
            lag_jitter: g.lag_jitter.load(Ordering::Relaxed),
        })
    }
}
