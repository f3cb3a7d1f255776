//! Note-to-phase-increment conversion.
//!
//! Notes follow MIDI numbering but the tuning reference is 400 Hz at note 69,
//! not concert A. The table is computed once per engine and never changes.

use core::f32::consts::TAU;

use pg_ir::{RangeError, NOTE_COUNT};

/// Tuning reference note.
const REFERENCE_NOTE: f32 = 69.0;

/// Frequency of the reference note in Hz.
const REFERENCE_HZ: f32 = 400.0;

/// Frequency in Hz of `note` under the synth's tuning.
pub fn note_to_hz(note: u8) -> f32 {
    libm::powf(2.0, (note as f32 - REFERENCE_NOTE) / 12.0) * REFERENCE_HZ
}

/// Per-sample phase increments, in radians, for every note.
#[derive(Clone, Debug)]
pub struct FrequencyTable {
    increments: [f32; NOTE_COUNT],
    sample_rate: u32,
}

impl FrequencyTable {
    /// Build the table for `sample_rate`. A zero rate yields an all-zero table;
    /// configuration validation rejects it before an engine is built.
    pub fn new(sample_rate: u32) -> Self {
        let mut increments = [0.0; NOTE_COUNT];
        if sample_rate > 0 {
            let fs = sample_rate as f32;
            for (note, inc) in increments.iter_mut().enumerate() {
                *inc = TAU * note_to_hz(note as u8) / fs;
            }
        }
        Self {
            increments,
            sample_rate,
        }
    }

    /// Increment for a note already known to be in range. Notes above 127
    /// saturate to the top entry.
    #[inline]
    pub fn increment(&self, note: u8) -> f32 {
        self.increments[(note as usize).min(NOTE_COUNT - 1)]
    }

    /// Checked lookup for externally supplied note numbers.
    pub fn try_increment(&self, note: i32) -> Result<f32, RangeError> {
        usize::try_from(note)
            .ok()
            .and_then(|n| self.increments.get(n).copied())
            .ok_or(RangeError::Note(note))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
