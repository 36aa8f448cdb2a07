// Musical timing - beat/second conversions at a given tempo
// Pure functions; all timing state lives in the scheduler

use std::fmt;

use super::SequenceError;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    /// BPM must be finite and > 0
    pub fn new(bpm: f64) -> Result<Self, SequenceError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SequenceError::InvalidTempo(bpm));
        }
        Ok(Self { bpm })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Convert a beat count to seconds at this tempo
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        self.seconds_per_beat() * beats
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Instant, relative to a note's start, at which the tone is silenced.
/// With a staccato fraction of 0 the full duration stays audible.
pub fn cutoff_seconds(duration_seconds: f64, staccato: f64) -> f64 {
    duration_seconds * (1.0 - staccato)
}

/// Offset within a note at which the slide into the next note begins.
/// Clamped so the slide never starts before the note itself.
pub fn slide_start_offset(cutoff: f64, smoothing_beats: f64, tempo: Tempo) -> f64 {
    cutoff - cutoff.min(tempo.beats_to_seconds(smoothing_beats))
}
