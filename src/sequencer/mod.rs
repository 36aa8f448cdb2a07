// Sequencer module - notes, musical timing, lookahead scheduling

pub mod note;
pub mod player;
pub mod sequence;
pub mod timing;

pub use note::{Note, NoteState};
pub use player::SequencePlayer;
pub use sequence::Sequence;
pub use timing::Tempo;

use thiserror::Error;

/// Sequencer errors
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("invalid tempo: {0} BPM (must be finite and > 0)")]
    InvalidTempo(f64),

    #[error("invalid note syntax: {0:?}")]
    InvalidNoteSyntax(String),
}
