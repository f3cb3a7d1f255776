//! Sample-rate conversion between the synth and the output device.

/// Linear-interpolating rate converter, pulled one device sample at a time.
///
/// Output lags the source by one source sample. At equal rates the step is
/// exactly one, so samples pass through unchanged.
#[derive(Clone, Debug)]
pub struct Resampler {
    step: f64,
    phase: f64,
    prev: f32,
    next: f32,
}

impl Resampler {
    pub fn new(source_rate: u32, device_rate: u32) -> Self {
        Self {
            step: source_rate as f64 / device_rate.max(1) as f64,
            phase: 1.0,
            prev: 0.0,
            next: 0.0,
        }
    }

    /// Produce the next device-rate sample, pulling source samples as needed.
    pub fn next_sample(&mut self, mut pull: impl FnMut() -> f32) -> f32 {
        while self.phase >= 1.0 {
            self.prev = self.next;
            self.next = pull();
            self.phase -= 1.0;
        }
        let out = self.prev + (self.next - self.prev) * self.phase as f32;
        self.phase += self.step;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source_rate: u32, device_rate: u32, source: &[f32], count: usize) -> Vec<f32> {
        let mut resampler = Resampler::new(source_rate, device_rate);
        let mut input = source.iter().copied();
        (0..count)
            .map(|_| resampler.next_sample(|| input.next().unwrap_or(0.0)))
            .collect()
    }

    #[test]
    fn equal_rates_pass_through_one_sample_late() {
        let out = run(48_000, 48_000, &[0.25, -0.5, 1.0], 4);
        assert_eq!(out, vec![0.0, 0.25, -0.5, 1.0]);
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        let ramp = [0.0, 1.0, 2.0, 3.0];
        let out = run(20_000, 40_000, &ramp, 8);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn downsampling_skips_source_samples() {
        let ramp = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = run(40_000, 20_000, &ramp, 4);
        assert_eq!(out, vec![0.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn pulls_track_the_rate_ratio() {
        let mut resampler = Resampler::new(20_000, 48_000);
        let mut pulled = 0;
        for _ in 0..48_000 {
            resampler.next_sample(|| {
                pulled += 1;
                0.0
            });
        }
        assert!((19_999..=20_001).contains(&pulled), "pulled {}", pulled);
    }
}
