//! Phase-modulated cosine oscillator.

use alloc::vec;
use alloc::vec::Vec;
use core::f32::consts::{PI, TAU};

use crate::delay_line::DelayLine;
use crate::node::{ProcessInput, SignalNode};

/// A cosine oscillator whose phase is pushed around by its inputs.
///
/// Phase is carried across blocks so rendering N blocks is identical to
/// rendering one block N times as long.
#[derive(Clone, Debug)]
pub struct Operator {
    /// Radians per sample, resolved from the frequency table.
    increment: f32,
    amplitude: f32,
    /// Phase of the last rendered sample, in (−π, π].
    phase: f32,
    output: Vec<f32>,
    delay_line: Option<DelayLine>,
}

impl Operator {
    /// A silent operator at zero frequency.
    pub fn new(block_len: usize) -> Self {
        Self {
            increment: 0.0,
            amplitude: 0.0,
            phase: 0.0,
            output: vec![0.0; block_len],
            delay_line: None,
        }
    }

    /// Attach a delay line of `capacity` samples fed with every block.
    pub fn with_delay_line(mut self, capacity: usize) -> Self {
        self.delay_line = Some(DelayLine::new(capacity));
        self
    }

    pub fn set_increment(&mut self, increment: f32) {
        self.increment = increment;
    }

    pub fn increment(&self) -> f32 {
        self.increment
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Phase carried into the next block.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn delay_line(&self) -> Option<&DelayLine> {
        self.delay_line.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn output_mut(&mut self) -> &mut [f32] {
        &mut self.output
    }
}

impl SignalNode for Operator {
    fn process(&mut self, input: &ProcessInput<'_>) {
        let mut phase = self.phase;
        let modulation = input.signal.iter().chain(core::iter::repeat(&0.0));
        for (out, m) in self.output.iter_mut().zip(modulation) {
            phase = wrap_phase(phase + self.increment + m);
            *out = libm::cosf(phase) * self.amplitude;
        }
        self.phase = phase;
    }

    fn output(&self) -> &[f32] {
        &self.output
    }

    fn tap(&mut self) {
        if let Some(line) = self.delay_line.as_mut() {
            line.sample(&self.output);
        }
    }
}

/// Normalise a phase into (−π, π].
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    if phase > -PI && phase <= PI {
        return phase;
    }
    let mut offset = libm::fmodf(PI - phase, TAU);
    if offset < 0.0 {
        offset += TAU;
    }
    let wrapped = PI - offset;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_block(op: &mut Operator, signal: &[f32]) -> Vec<f32> {
        op.run(&ProcessInput {
            signal,
            history: None,
        });
        op.output().to_vec()
    }

    #[test]
    fn wrap_keeps_range() {
        for &p in &[0.0, PI, -PI, 3.0 * PI, -3.0 * PI, 7.5, -7.5, 100.0, -1e4] {
            let w = wrap_phase(p);
            assert!(w > -PI - 1e-5 && w <= PI + 1e-5, "{} -> {}", p, w);
            assert!((libm::cosf(w) - libm::cosf(p)).abs() < 1e-2, "{}", p);
        }
        assert_eq!(wrap_phase(-PI), PI);
    }

    #[test]
    fn unmodulated_output_is_cosine() {
        let mut op = Operator::new(8);
        op.set_increment(0.25);
        op.set_amplitude(0.5);
        let out = run_block(&mut op, &[0.0; 8]);
        for (i, s) in out.iter().enumerate() {
            let expected = libm::cosf(0.25 * (i + 1) as f32) * 0.5;
            assert!((s - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn phase_carries_across_blocks() {
        let mut split = Operator::new(10);
        let mut whole = Operator::new(40);
        for op in [&mut split, &mut whole] {
            op.set_increment(0.7);
            op.set_amplitude(1.0);
        }
        let mut joined = Vec::new();
        for _ in 0..4 {
            joined.extend(run_block(&mut split, &[0.0; 10]));
        }
        let reference = run_block(&mut whole, &[0.0; 40]);
        assert_eq!(joined, reference);
        assert_eq!(split.phase(), whole.phase());
    }

    #[test]
    fn modulation_shifts_phase() {
        let mut op = Operator::new(1);
        op.set_amplitude(1.0);
        let out = run_block(&mut op, &[PI]);
        assert!((out[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn carry_stays_in_range() {
        let mut op = Operator::new(50);
        op.set_increment(3.0);
        op.set_amplitude(1.0);
        for _ in 0..100 {
            run_block(&mut op, &[2.5; 50]);
            assert!(op.phase() > -PI && op.phase() <= PI);
        }
    }

    #[test]
    fn tap_records_output() {
        let mut op = Operator::new(4).with_delay_line(8);
        op.set_increment(0.1);
        op.set_amplitude(1.0);
        let out = run_block(&mut op, &[0.0; 4]);
        let history = op.delay_line().unwrap().segment(0, 4).unwrap();
        assert_eq!(history, out);
    }

    #[test]
    fn zero_amplitude_is_silent() {
        let mut op = Operator::new(4);
        op.set_increment(0.3);
        assert_eq!(run_block(&mut op, &[0.0; 4]), vec![0.0; 4]);
    }
}
