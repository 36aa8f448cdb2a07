// Note representation for the sequencer
// A note is a frequency in Hz (0 = rest) plus a duration in beats, together
// with its scheduling state for the current play session.

use std::str::FromStr;

use super::SequenceError;
use super::timing::Tempo;

/// Scheduling state of a note within a play session.
///
/// Automation commands cannot be retracted once emitted, so `Committed`
/// carries a start time that is never rewritten; only `Unplanned` and
/// `Pending` notes may be re-timed by tempo changes or loop re-plans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteState {
    /// Not part of a planned pass yet (fresh notes, or before first play)
    Unplanned,
    /// Planned start time, still revisable
    Pending { planned_time: f64 },
    /// Automation emitted; start time is final
    Committed { committed_time: f64 },
}

/// A single note in a sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    frequency: f64,
    duration_beats: f64,
    state: NoteState,
}

impl Note {
    /// Creates a pitched note (frequency in Hz, duration in beats)
    pub fn new(frequency: f64, duration_beats: f64) -> Self {
        Self {
            frequency,
            duration_beats,
            state: NoteState::Unplanned,
        }
    }

    /// Creates a rest occupying `duration_beats` of silence
    pub fn rest(duration_beats: f64) -> Self {
        Self::new(0.0, duration_beats)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn duration_beats(&self) -> f64 {
        self.duration_beats
    }

    pub fn is_rest(&self) -> bool {
        self.frequency == 0.0
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, NoteState::Committed { .. })
    }

    /// Planned or committed start time, if any
    pub fn scheduled_time(&self) -> Option<f64> {
        match self.state {
            NoteState::Unplanned => None,
            NoteState::Pending { planned_time } => Some(planned_time),
            NoteState::Committed { committed_time } => Some(committed_time),
        }
    }

    /// Duration in seconds at the given tempo
    pub fn duration_seconds(&self, tempo: Tempo) -> f64 {
        tempo.beats_to_seconds(self.duration_beats)
    }

    /// Assigns the planned start time. Also used on committed notes when a
    /// fresh pass (loop wrap, new play) re-plans the whole sequence.
    pub(crate) fn plan(&mut self, at: f64) {
        self.state = NoteState::Pending { planned_time: at };
    }

    /// Marks a pending note committed at its planned time
    pub(crate) fn commit(&mut self) {
        if let NoteState::Pending { planned_time } = self.state {
            self.state = NoteState::Committed {
                committed_time: planned_time,
            };
        }
    }
}

impl FromStr for Note {
    type Err = SequenceError;

    /// Parses compact notation: a pitch plus an optional duration,
    /// e.g. "A4 q", "c#3 e.", "Eb5 0.75", "- h" (rest).
    ///
    /// Durations: w=4, h=2, q=1, e=0.5, s=0.25 beats, an optional trailing
    /// dot for 1.5x, or a positive decimal beat count. Defaults to "q".
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || SequenceError::InvalidNoteSyntax(text.to_string());

        let mut parts = text.split_whitespace();
        let pitch = parts.next().ok_or_else(invalid)?;
        let duration = parts.next().unwrap_or("q");
        if parts.next().is_some() {
            return Err(invalid());
        }

        let frequency = if pitch == "-" {
            0.0
        } else {
            parse_pitch_frequency(pitch).ok_or_else(invalid)?
        };
        let duration_beats = parse_duration_beats(duration).ok_or_else(invalid)?;

        Ok(Self::new(frequency, duration_beats))
    }
}

/// Equal-temperament frequency for a pitch name like "A4" or "c#3", A4 = 440 Hz
fn parse_pitch_frequency(text: &str) -> Option<f64> {
    let mut chars = text.chars().peekable();

    let semitone = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let accidental = match chars.peek() {
        Some('#') => {
            chars.next();
            1
        }
        Some('b') => {
            chars.next();
            -1
        }
        _ => 0,
    };

    let octave: i32 = chars.collect::<String>().parse().ok()?;

    // MIDI numbering: C-1 = 0, A4 = 69
    let midi = 12 * (octave + 1) + semitone + accidental;
    Some(440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0))
}

fn parse_duration_beats(text: &str) -> Option<f64> {
    let (base, dotted) = match text.strip_suffix('.') {
        Some(base) => (base, true),
        None => (text, false),
    };

    let beats = match base {
        "w" => 4.0,
        "h" => 2.0,
        "q" => 1.0,
        "e" => 0.5,
        "s" => 0.25,
        other => {
            let value: f64 = other.parse().ok()?;
            if !value.is_finite() || value <= 0.0 {
                return None;
            }
            value
        }
    };

    Some(if dotted { beats * 1.5 } else { beats })
}
