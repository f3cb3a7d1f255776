//! A single grain: an enveloped copy of a delay-line segment.

use alloc::vec;
use alloc::vec::Vec;

use pg_ir::RangeError;

use crate::delay_line::DelayLine;
use crate::envelope::Window;

/// Lifecycle of a grain. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrainState {
    /// More than one sample left to play.
    Alive,
    /// The next sample is the last.
    Expiring,
    /// Every sample has been played; the slot can be reused.
    Dead,
}

/// Preallocated grain storage. A pool slot is reused by calling
/// [`Grain::spawn`] again once the previous grain is dead.
#[derive(Clone, Debug)]
pub struct Grain {
    content: Vec<f32>,
    envelope: Vec<f32>,
    len: usize,
    index: usize,
}

impl Grain {
    /// An empty (dead) grain able to hold up to `max_duration` samples.
    pub fn with_capacity(max_duration: usize) -> Self {
        Self {
            content: vec![0.0; max_duration],
            envelope: vec![0.0; max_duration],
            len: 0,
            index: 0,
        }
    }

    /// Copy `duration` samples ending `lag` samples before the newest entry of
    /// `history`, and window them with `shape`.
    pub fn spawn(
        &mut self,
        history: &DelayLine,
        lag: usize,
        duration: usize,
        shape: &impl Window,
    ) -> Result<(), RangeError> {
        if duration > self.content.len() {
            return Err(RangeError::Segment {
                lag,
                duration,
                capacity: self.content.len(),
            });
        }
        history.read_segment(lag, duration, &mut self.content)?;
        shape.fill(&mut self.envelope[..duration]);
        self.len = duration;
        self.index = 0;
        Ok(())
    }

    pub fn state(&self) -> GrainState {
        if self.index >= self.len {
            GrainState::Dead
        } else if self.index + 1 == self.len {
            GrainState::Expiring
        } else {
            GrainState::Alive
        }
    }

    /// Length in samples.
    pub fn duration(&self) -> usize {
        self.len
    }

    /// Samples already played.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Mix the grain into `out`, stopping early if it dies. Returns the state
    /// after the block.
    pub fn render(&mut self, out: &mut [f32]) -> GrainState {
        let remaining = self.len.saturating_sub(self.index);
        let n = remaining.min(out.len());
        let start = self.index;
        let content = &self.content[start..start + n];
        let envelope = &self.envelope[start..start + n];
        for ((o, &c), &e) in out.iter_mut().zip(content).zip(envelope) {
            *o += c * e;
        }
        self.index += n;
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_ir::EnvelopeShape;

    struct Flat;

    impl Window for Flat {
        fn fill(&self, out: &mut [f32]) {
            out.fill(1.0);
        }
    }

    fn history() -> DelayLine {
        let mut line = DelayLine::new(32);
        let ramp: Vec<f32> = (1..=32).map(|x| x as f32).collect();
        line.sample(&ramp);
        line
    }

    #[test]
    fn new_grain_is_dead() {
        assert_eq!(Grain::with_capacity(10).state(), GrainState::Dead);
    }

    #[test]
    fn plays_exactly_duration_samples() {
        let mut grain = Grain::with_capacity(16);
        grain.spawn(&history(), 0, 7, &Flat).unwrap();

        let mut emitted = 0;
        loop {
            let mut block = [0.0; 3];
            let state = grain.render(&mut block);
            emitted += block.iter().filter(|&&s| s != 0.0).count();
            if state == GrainState::Dead {
                break;
            }
        }
        assert_eq!(emitted, 7);
    }

    #[test]
    fn content_comes_from_lagged_segment() {
        let mut grain = Grain::with_capacity(16);
        grain.spawn(&history(), 2, 4, &Flat).unwrap();
        let mut block = [0.0; 6];
        assert_eq!(grain.render(&mut block), GrainState::Dead);
        assert_eq!(block, [27.0, 28.0, 29.0, 30.0, 0.0, 0.0]);
    }

    #[test]
    fn state_walks_forward() {
        let mut grain = Grain::with_capacity(8);
        grain.spawn(&history(), 0, 3, &Flat).unwrap();
        assert_eq!(grain.state(), GrainState::Alive);
        let mut one = [0.0; 1];
        assert_eq!(grain.render(&mut one), GrainState::Alive);
        assert_eq!(grain.render(&mut one), GrainState::Expiring);
        assert_eq!(grain.render(&mut one), GrainState::Dead);
        assert_eq!(grain.render(&mut one), GrainState::Dead);
        assert_eq!(grain.position(), 3);
    }

    #[test]
    fn envelope_is_applied() {
        let mut grain = Grain::with_capacity(8);
        grain.spawn(&history(), 0, 5, &EnvelopeShape::Hann).unwrap();
        let mut block = [0.0; 5];
        grain.render(&mut block);
        assert!(block[0].abs() < 1e-5);
        assert!((block[2] - 30.0).abs() < 1e-4);
        assert!(block[4].abs() < 1e-4);
    }

    #[test]
    fn mixes_into_existing_signal() {
        let mut grain = Grain::with_capacity(8);
        grain.spawn(&history(), 0, 2, &Flat).unwrap();
        let mut block = [1.0; 2];
        grain.render(&mut block);
        assert_eq!(block, [32.0, 33.0]);
    }

    #[test]
    fn oversized_request_rejected() {
        let mut grain = Grain::with_capacity(4);
        assert!(grain.spawn(&history(), 0, 5, &Flat).is_err());
        assert!(grain.spawn(&history(), 30, 4, &Flat).is_err());
    }
}
