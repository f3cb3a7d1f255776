//! Grain generator: a bounded, time-varying population of grains.

use alloc::vec;
use alloc::vec::Vec;

use arrayvec::ArrayVec;
use pg_ir::{EnvelopeShape, GrainSettings, MAX_GRAINS_PER_GENERATOR};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::delay_line::DelayLine;
use crate::grain::{Grain, GrainState};
use crate::node::{ProcessInput, SignalNode};

/// Spawns grains from a tapped operator's delay line and mixes them.
///
/// Grain storage is a fixed pool sized at construction. `live` holds pool
/// slots in birth order; removing a dead grain shifts later grains down so
/// live indices stay contiguous.
#[derive(Clone, Debug)]
pub struct GrainGenerator {
    pool: Vec<Grain>,
    live: ArrayVec<u8, MAX_GRAINS_PER_GENERATOR>,
    free: ArrayVec<u8, MAX_GRAINS_PER_GENERATOR>,
    max_grains: usize,
    settings: GrainSettings,
    envelope: EnvelopeShape,
    /// Samples since the last birth.
    since_birth: u32,
    /// Period for the current birth cycle, jitter included.
    period: u32,
    births: u64,
    rng: SmallRng,
    output: Vec<f32>,
}

impl GrainGenerator {
    /// `max_grains` is clamped to [`MAX_GRAINS_PER_GENERATOR`]; every pool slot
    /// can hold a grain of `max_duration` samples.
    pub fn new(
        block_len: usize,
        max_grains: usize,
        max_duration: usize,
        settings: GrainSettings,
        envelope: EnvelopeShape,
        seed: u64,
    ) -> Self {
        let max_grains = max_grains.min(MAX_GRAINS_PER_GENERATOR);
        let mut free = ArrayVec::new();
        for slot in (0..max_grains).rev() {
            free.push(slot as u8);
        }
        let mut generator = Self {
            pool: vec![Grain::with_capacity(max_duration); max_grains],
            live: ArrayVec::new(),
            free,
            max_grains,
            settings,
            envelope,
            since_birth: 0,
            period: settings.period,
            births: 0,
            rng: SmallRng::seed_from_u64(seed),
            output: vec![0.0; block_len],
        };
        generator.period = generator.draw_period();
        generator
    }

    /// Replace the grain parameters. Takes effect for the next birth; grains
    /// already alive keep their content.
    pub fn apply(&mut self, settings: GrainSettings) {
        let period_changed = settings.period != self.settings.period
            || settings.period_jitter != self.settings.period_jitter;
        self.settings = settings;
        if period_changed {
            self.period = self.draw_period();
        }
    }

    pub fn settings(&self) -> &GrainSettings {
        &self.settings
    }

    /// Number of grains currently alive.
    pub fn population(&self) -> usize {
        self.live.len()
    }

    pub fn max_grains(&self) -> usize {
        self.max_grains
    }

    /// Total grains born since construction.
    pub fn births(&self) -> u64 {
        self.births
    }

    #[cfg(test)]
    pub(crate) fn output_mut(&mut self) -> &mut [f32] {
        &mut self.output
    }

    /// The `index`th live grain in birth order.
    pub fn grain(&self, index: usize) -> Option<&Grain> {
        self.live.get(index).map(|&slot| &self.pool[slot as usize])
    }

    fn jitter(&mut self, range: u32) -> u32 {
        if range == 0 {
            0
        } else {
            self.rng.gen_range(0..range)
        }
    }

    fn draw_period(&mut self) -> u32 {
        self.settings.period + self.jitter(self.settings.period_jitter)
    }

    fn give_birth(&mut self, history: &DelayLine) {
        let Some(slot) = self.free.pop() else {
            return;
        };
        let lag = self.settings.lag + self.jitter(self.settings.lag_jitter);
        let duration = self.settings.duration as usize;
        let spawned =
            self.pool[slot as usize].spawn(history, lag as usize, duration, &self.envelope);
        if spawned.is_err() {
            // Bounds checked against the delay length at construction.
            debug_assert!(false, "grain request outside delay line: {:?}", spawned);
            self.free.push(slot);
            return;
        }
        self.live.push(slot);
        self.births += 1;
        self.since_birth = 0;
        self.period = self.draw_period();
    }
}

impl SignalNode for GrainGenerator {
    fn process(&mut self, input: &ProcessInput<'_>) {
        self.output.fill(0.0);

        let mut i = 0;
        while i < self.live.len() {
            let slot = self.live[i];
            if self.pool[slot as usize].render(&mut self.output) == GrainState::Dead {
                self.live.remove(i);
                self.free.push(slot);
            } else {
                i += 1;
            }
        }

        for _ in 0..self.output.len() {
            self.since_birth = self.since_birth.saturating_add(1);
            if self.since_birth > self.period && self.live.len() < self.max_grains {
                if let Some(history) = input.history {
                    self.give_birth(history);
                }
            }
        }
    }

    fn output(&self) -> &[f32] {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 50;

    fn settings(period: u32, duration: u32) -> GrainSettings {
        GrainSettings {
            period,
            duration,
            ..GrainSettings::default()
        }
    }

    fn filled_history() -> DelayLine {
        let mut line = DelayLine::new(2000);
        line.sample(&[1.0; 2000]);
        line
    }

    fn step(generator: &mut GrainGenerator, history: &DelayLine) {
        generator.run(&ProcessInput {
            signal: &[],
            history: Some(history),
        });
    }

    #[test]
    fn first_birth_after_period_elapses() {
        let history = filled_history();
        let mut gen = GrainGenerator::new(
            BLOCK,
            50,
            500,
            settings(500, 150),
            EnvelopeShape::Hamming,
            1,
        );
        let mut first = None;
        for block in 0..20 {
            step(&mut gen, &history);
            if gen.births() > 0 && first.is_none() {
                first = Some(block);
            }
        }
        assert_eq!(first, Some(10));
    }

    #[test]
    fn grain_sounds_for_exactly_its_duration() {
        const DURATION: u32 = 137;
        let history = filled_history();
        // Births 201 samples apart never overlap a 137-sample grain.
        let mut gen = GrainGenerator::new(
            BLOCK,
            50,
            500,
            settings(200, DURATION),
            EnvelopeShape::Hamming,
            1,
        );

        let mut sounding = 0;
        for _ in 0..40 {
            step(&mut gen, &history);
            sounding += gen.output().iter().filter(|&&s| s != 0.0).count();
        }
        // Stop births and let the last grain finish.
        gen.apply(settings(5000, DURATION));
        for _ in 0..4 {
            step(&mut gen, &history);
            sounding += gen.output().iter().filter(|&&s| s != 0.0).count();
        }

        assert!(gen.births() >= 5);
        assert_eq!(gen.population(), 0);
        assert_eq!(sounding as u64, gen.births() * DURATION as u64);
    }

    #[test]
    fn newborn_grain_starts_next_block() {
        let history = filled_history();
        let mut gen = GrainGenerator::new(
            BLOCK,
            50,
            500,
            settings(60, 70),
            EnvelopeShape::Hamming,
            1,
        );
        // Born during the second block, silent until the third.
        step(&mut gen, &history);
        step(&mut gen, &history);
        assert_eq!(gen.population(), 1);
        assert!(gen.output().iter().all(|&s| s == 0.0));
        step(&mut gen, &history);
        assert!(gen.output().iter().all(|&s| s != 0.0));
        assert!(gen.grain(0).is_some());
    }

    #[test]
    fn population_never_exceeds_cap() {
        let history = filled_history();
        let mut gen = GrainGenerator::new(
            BLOCK,
            3,
            1000,
            settings(10, 1000),
            EnvelopeShape::Hamming,
            7,
        );
        for _ in 0..100 {
            step(&mut gen, &history);
            assert!(gen.population() <= 3);
        }
        assert_eq!(gen.population(), 3);
    }

    #[test]
    fn dead_grains_free_their_slots() {
        let history = filled_history();
        let mut gen = GrainGenerator::new(
            BLOCK,
            4,
            100,
            settings(10, 20),
            EnvelopeShape::Hamming,
            3,
        );
        for _ in 0..200 {
            step(&mut gen, &history);
        }
        assert!(gen.births() > 100);
        assert!(gen.population() <= 4);
    }

    #[test]
    fn no_history_no_births() {
        let mut gen = GrainGenerator::new(
            BLOCK,
            4,
            100,
            settings(10, 20),
            EnvelopeShape::Hamming,
            3,
        );
        for _ in 0..10 {
            gen.run(&ProcessInput {
                signal: &[],
                history: None,
            });
        }
        assert_eq!(gen.births(), 0);
    }

    #[test]
    fn same_seed_same_jitter() {
        let history = filled_history();
        let jittered = GrainSettings {
            period: 40,
            period_jitter: 30,
            duration: 30,
            lag: 10,
            lag_jitter: 200,
            ..GrainSettings::default()
        };
        let mut a = GrainGenerator::new(BLOCK, 10, 100, jittered, EnvelopeShape::Hamming, 99);
        let mut b = GrainGenerator::new(BLOCK, 10, 100, jittered, EnvelopeShape::Hamming, 99);
        for _ in 0..50 {
            step(&mut a, &history);
            step(&mut b, &history);
            assert_eq!(a.output(), b.output());
        }
        assert_eq!(a.births(), b.births());
    }

    #[test]
    fn apply_changes_next_birth() {
        let history = filled_history();
        let mut gen = GrainGenerator::new(
            BLOCK,
            10,
            500,
            settings(5000, 150),
            EnvelopeShape::Hamming,
            1,
        );
        step(&mut gen, &history);
        gen.apply(settings(10, 150));
        step(&mut gen, &history);
        assert!(gen.births() >= 1);
        assert_eq!(gen.settings().period, 10);
    }
}
