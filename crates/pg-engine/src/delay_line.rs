//! Fixed-capacity rolling history of an operator's output.

use alloc::vec;
use alloc::vec::Vec;

use pg_ir::RangeError;

/// Circular buffer holding exactly `capacity` of the most recent samples.
///
/// `head` points at the oldest sample, so chronological index `k` lives at
/// `buf[(head + k) % capacity]`.
#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: Vec<f32>,
    head: usize,
}

impl DelayLine {
    /// A silent delay line. `capacity` must be nonzero.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)],
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Evict `block.len()` of the oldest samples and append `block`.
    pub fn sample(&mut self, block: &[f32]) {
        let cap = self.buf.len();
        let block = if block.len() > cap {
            &block[block.len() - cap..]
        } else {
            block
        };
        let n = block.len();
        let first = (cap - self.head).min(n);
        self.buf[self.head..self.head + first].copy_from_slice(&block[..first]);
        self.buf[..n - first].copy_from_slice(&block[first..]);
        self.head = (self.head + n) % cap;
    }

    /// The sample `taps` positions back from the newest (`1` is the newest).
    pub fn get(&self, taps: usize) -> Result<f32, RangeError> {
        let cap = self.buf.len();
        if taps == 0 || taps > cap {
            return Err(RangeError::Segment {
                lag: taps,
                duration: 1,
                capacity: cap,
            });
        }
        Ok(self.buf[(self.head + cap - taps) % cap])
    }

    /// Copy `duration` consecutive samples ending `lag` samples before the
    /// newest into the front of `dst`.
    pub fn read_segment(
        &self,
        lag: usize,
        duration: usize,
        dst: &mut [f32],
    ) -> Result<(), RangeError> {
        let cap = self.buf.len();
        let reach = lag.checked_add(duration);
        if reach.map_or(true, |r| r > cap) || dst.len() < duration {
            return Err(RangeError::Segment {
                lag,
                duration,
                capacity: cap,
            });
        }
        let start = (self.head + cap - lag - duration) % cap;
        let first = (cap - start).min(duration);
        dst[..first].copy_from_slice(&self.buf[start..start + first]);
        dst[first..duration].copy_from_slice(&self.buf[..duration - first]);
        Ok(())
    }

    /// Allocating form of [`DelayLine::read_segment`]. Not for the audio thread.
    pub fn segment(&self, lag: usize, duration: usize) -> Result<Vec<f32>, RangeError> {
        let mut out = vec![0.0; duration];
        self.read_segment(lag, duration, &mut out)?;
        Ok(out)
    }
}
