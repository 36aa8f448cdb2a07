// TinySeq - Lookahead note sequencer
//
// Converts an ordered list of notes (pitch frequency + duration in beats)
// into precisely timed frequency-automation commands against a real-time
// audio clock, with optional looping, portamento and staccato.

pub mod audio;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::AudioError;
pub use audio::engine::{AudioEngine, OscillatorHandle, Waveform};
pub use audio::realtime::{AudioOutput, RealtimeEngine};
pub use audio::timing::AudioClock;
pub use sequencer::SequenceError;
pub use sequencer::note::{Note, NoteState};
pub use sequencer::player::{SequencePlayer, TICK_INTERVAL};
pub use sequencer::sequence::{LOOKAHEAD_SECONDS, Sequence};
pub use sequencer::timing::Tempo;
