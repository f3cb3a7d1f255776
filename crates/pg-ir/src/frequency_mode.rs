//! Operator frequency interpretation.

use crate::config::NOTE_COUNT;

/// How an operator's frequency value is turned into a note index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrequencyMode {
    /// The value is a MIDI note number, independent of the master note.
    Absolute(u8),
    /// The value is a harmonic ratio: the operator plays `master + ratio * 12`.
    Locked(u8),
}

impl FrequencyMode {
    /// Resolve to a note index in `0..NOTE_COUNT` for the given master note.
    ///
    /// Locked operators that would land above the top of the table saturate
    /// at the highest note.
    pub fn note(self, master: u8) -> u8 {
        let top = (NOTE_COUNT - 1) as u16;
        let note = match self {
            FrequencyMode::Absolute(note) => note as u16,
            FrequencyMode::Locked(ratio) => master as u16 + ratio as u16 * 12,
        };
        note.min(top) as u8
    }

    /// True when the operator tracks the master note.
    pub fn is_locked(self) -> bool {
        matches!(self, FrequencyMode::Locked(_))
    }
}

impl Default for FrequencyMode {
    fn default() -> Self {
        FrequencyMode::Absolute(68)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_ignores_master() {
        assert_eq!(FrequencyMode::Absolute(60).note(12), 60);
        assert_eq!(FrequencyMode::Absolute(60).note(100), 60);
    }

    #[test]
    fn locked_adds_octaves_to_master() {
        assert_eq!(FrequencyMode::Locked(0).note(68), 68);
        assert_eq!(FrequencyMode::Locked(2).note(40), 64);
    }

    #[test]
    fn locked_saturates_at_top_note() {
        assert_eq!(FrequencyMode::Locked(4).note(127), 127);
        assert_eq!(FrequencyMode::Absolute(200).note(0), 127);
    }
}
