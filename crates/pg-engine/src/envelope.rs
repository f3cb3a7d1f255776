//! Grain window shapes.

use core::f32::consts::TAU;

use pg_ir::EnvelopeShape;

/// A windowing strategy applied to every grain at birth.
pub trait Window {
    /// Fill `out` with a window of `out.len()` points.
    fn fill(&self, out: &mut [f32]);
}

impl Window for EnvelopeShape {
    fn fill(&self, out: &mut [f32]) {
        match self {
            EnvelopeShape::Hamming => raised_cosine(out, 0.54, 0.46),
            EnvelopeShape::Hann => raised_cosine(out, 0.5, 0.5),
            EnvelopeShape::Triangle => triangle(out),
        }
    }
}

/// Symmetric `a - b·cos(2πk/(n-1))`. A single point window is `1`.
fn raised_cosine(out: &mut [f32], a: f32, b: f32) {
    let n = out.len();
    match n {
        0 => return,
        1 => {
            out[0] = 1.0;
            return;
        }
        _ => {}
    }
    let denom = (n - 1) as f32;
    for (k, w) in out.iter_mut().enumerate() {
        *w = a - b * libm::cosf(TAU * k as f32 / denom);
    }
}

/// Rises by `2/n` per point over the first half, then falls by the same step.
fn triangle(out: &mut [f32]) {
    let n = out.len();
    if n == 0 {
        return;
    }
    let step = 2.0 / n as f32;
    let half = n / 2;
    let mut level = 0.0;
    for (k, w) in out.iter_mut().enumerate() {
        if k < half {
            level += step;
        } else {
            level -= step;
        }
        *w = level;
    }
}
