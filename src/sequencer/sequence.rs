// Sequence - Lookahead note scheduler
//
// Walks an ordered note list on a periodic tick, commits notes whose planned
// start time has entered a short lookahead window, and re-plans uncommitted
// notes when the tempo changes mid-playback. Commands already emitted to the
// audio engine cannot be retracted, so the window bounds how far into the
// future "irrevocable" extends: commits stay as late as possible while every
// note is still examined at least once before its deadline.

use log::debug;

use super::SequenceError;
use super::note::{Note, NoteState};
use super::timing::{Tempo, cutoff_seconds, slide_start_offset};
use crate::audio::engine::{AudioEngine, OscillatorHandle, Waveform};

/// Commit horizon: an uncommitted note becomes eligible once its planned
/// start falls within this many seconds of the engine clock.
pub const LOOKAHEAD_SECONDS: f64 = 0.1;

/// Staccato fraction cap; the silenced tail must stay strictly below the
/// full duration.
const MAX_STACCATO: f64 = 0.99;

/// A monophonic note sequence bound to an audio engine.
///
/// Exactly one engine oscillator exists while playing; it is torn down and
/// recreated on every `play` so stale automation from a previous session
/// cannot leak through.
pub struct Sequence<E: AudioEngine> {
    engine: E,
    notes: Vec<Note>,
    tempo: Tempo,
    looping: bool,
    smoothing: f64,
    staccato: f64,
    waveform: Waveform,
    playback_start: f64,
    osc: Option<Box<dyn OscillatorHandle + Send>>,
}

impl<E: AudioEngine> Sequence<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            notes: Vec::new(),
            tempo: Tempo::default(),
            looping: false,
            smoothing: 0.0,
            staccato: 0.0,
            waveform: Waveform::default(),
            playback_start: 0.0,
            osc: None,
        }
    }

    /// Appends a note. While a session is live the note stays unplanned
    /// (and is never committed) until the next re-plan picks it up.
    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Parses and appends one note in compact notation (e.g. "A4 q")
    pub fn push_str(&mut self, text: &str) -> Result<(), SequenceError> {
        self.notes.push(text.parse()?);
        Ok(())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Portamento amount in beats, applied before each pitched note's cutoff
    pub fn set_smoothing(&mut self, beats: f64) {
        self.smoothing = beats.max(0.0);
    }

    /// Fraction of each note's duration silenced at its tail
    pub fn set_staccato(&mut self, fraction: f64) {
        self.staccato = fraction.clamp(0.0, MAX_STACCATO);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Clock time the current pass began; rebased on every loop wrap
    pub fn playback_start(&self) -> f64 {
        self.playback_start
    }

    pub fn is_playing(&self) -> bool {
        self.osc.is_some()
    }

    /// Starts playback at `at` (None = engine clock now).
    ///
    /// Stops any in-progress session, creates a fresh oscillator, plans
    /// timings for all notes and runs one immediate scheduler pass. Returns
    /// immediately; playback advances via `tick`. An empty sequence starts
    /// nothing.
    pub fn play(&mut self, at: Option<f64>) {
        self.stop();
        if self.notes.is_empty() {
            return;
        }

        let when = at.unwrap_or_else(|| self.engine.current_time());
        debug!("play: {} notes from t={:.3}", self.notes.len(), when);

        self.playback_start = when;
        let mut osc = self.engine.create_oscillator(self.waveform);
        osc.start(when);
        self.osc = Some(osc);

        self.plan_timings(0, when);
        self.tick();
    }

    /// Stops playback and discards the oscillator (dropping the handle
    /// disconnects it). Safe to call in any state, repeatedly.
    pub fn stop(&mut self) {
        if self.osc.take().is_some() {
            debug!("stop");
        }
    }

    /// Assigns planned start times to every note from `start_index`,
    /// beginning at `from`; each note starts where the previous one ends.
    /// Returns the end time of the final note.
    pub fn plan_timings(&mut self, start_index: usize, from: f64) -> f64 {
        let tempo = self.tempo;
        let mut when = from;
        for note in self.notes.iter_mut().skip(start_index) {
            note.plan(when);
            when += note.duration_seconds(tempo);
        }
        when
    }

    /// One scheduler pass: commits every pending note whose planned start
    /// falls within the lookahead window. Returns true while further ticks
    /// can still commit something.
    pub fn tick(&mut self) -> bool {
        if self.osc.is_none() {
            return false;
        }

        let horizon = self.engine.current_time() + LOOKAHEAD_SECONDS;
        for index in 0..self.notes.len() {
            let planned = match self.notes[index].state() {
                NoteState::Committed { .. } | NoteState::Unplanned => continue,
                NoteState::Pending { planned_time } => planned_time,
            };
            if planned > horizon {
                // planned times are non-decreasing from here on
                break;
            }

            let end = self.commit(index, planned);

            if index == self.notes.len() - 1 {
                if self.looping {
                    // rebase so the next pass starts exactly where this
                    // one ends: no gap, no overlap
                    self.playback_start = end;
                    self.plan_timings(0, end);
                } else {
                    if let Some(osc) = self.osc.as_mut() {
                        osc.stop(end);
                    }
                    debug!("final note committed, oscillator stops at t={:.3}", end);
                    return false;
                }
            }
        }

        self.looping || self.notes.iter().any(|note| !note.is_committed())
    }

    /// Emits the automation for `notes[index]` starting at `when` and marks
    /// it committed. Returns the note's end time.
    fn commit(&mut self, index: usize, when: f64) -> f64 {
        let note = self.notes[index];
        let duration = note.duration_seconds(self.tempo);
        let cutoff = cutoff_seconds(duration, self.staccato);

        if let Some(osc) = self.osc.as_mut() {
            osc.set_frequency(note.frequency(), when);

            if self.smoothing > 0.0 && !note.is_rest() {
                // Hold until the slide start, then ramp into the next note.
                // The lookup is cyclic so a looped sequence slides across
                // the seam from the last note back into the first.
                let next = self.notes[(index + 1) % self.notes.len()];
                let offset = slide_start_offset(cutoff, self.smoothing, self.tempo);
                osc.set_frequency(note.frequency(), when + offset);
                osc.ramp_frequency(next.frequency(), when + cutoff);
            }

            osc.set_frequency(0.0, when + cutoff);
        }

        self.notes[index].commit();
        when + duration
    }

    /// Changes the tempo, re-planning every note that is not yet committed.
    ///
    /// Committed notes keep their timing (their commands are already out);
    /// the uncommitted tail is re-planned at the new tempo, anchored at the
    /// last committed note's planned end computed with the old tempo. If
    /// nothing has committed yet the whole sequence re-plans from the start
    /// of the pass.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), SequenceError> {
        let tempo = Tempo::new(bpm)?;
        if tempo == self.tempo {
            return Ok(());
        }

        // commits happen strictly in order, so committed notes are a prefix
        let committed = self
            .notes
            .iter()
            .take_while(|note| note.is_committed())
            .count();

        let old = self.tempo;
        self.tempo = tempo;
        debug!("tempo {} -> {} ({} notes committed)", old, tempo, committed);

        if committed == 0 {
            self.plan_timings(0, self.playback_start);
        } else {
            let last = self.notes[committed - 1];
            if let NoteState::Committed { committed_time } = last.state() {
                let anchor = committed_time + last.duration_seconds(old);
                self.plan_timings(committed, anchor);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullOscillator;

    impl OscillatorHandle for NullOscillator {
        fn set_frequency(&mut self, _frequency: f64, _at: f64) {}
        fn ramp_frequency(&mut self, _frequency: f64, _arrival: f64) {}
        fn start(&mut self, _at: f64) {}
        fn stop(&mut self, _at: f64) {}
    }

    /// Engine with a manually driven clock and no observable output
    #[derive(Default)]
    struct NullEngine {
        now: f64,
    }

    impl AudioEngine for NullEngine {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn create_oscillator(&mut self, _waveform: Waveform) -> Box<dyn OscillatorHandle + Send> {
            Box::new(NullOscillator)
        }
    }

    fn three_notes(engine: NullEngine) -> Sequence<NullEngine> {
        let mut sequence = Sequence::new(engine);
        sequence.push(Note::new(440.0, 1.0));
        sequence.push(Note::new(550.0, 2.0));
        sequence.push(Note::rest(0.5));
        sequence
    }

    fn planned_times(sequence: &Sequence<NullEngine>) -> Vec<Option<f64>> {
        sequence
            .notes()
            .iter()
            .map(|note| note.scheduled_time())
            .collect()
    }

    #[test]
    fn test_plan_assigns_back_to_back_times() {
        let mut sequence = three_notes(NullEngine::default());
        let end = sequence.plan_timings(0, 10.0);

        // 120 BPM: 0.5s, 1.0s, 0.25s
        assert_eq!(
            planned_times(&sequence),
            vec![Some(10.0), Some(10.5), Some(11.5)]
        );
        assert_eq!(end, 11.75);
    }

    #[test]
    fn test_plan_sum_law() {
        let mut sequence = three_notes(NullEngine::default());
        let tempo = sequence.tempo();
        let total: f64 = sequence
            .notes()
            .iter()
            .map(|note| note.duration_seconds(tempo))
            .sum();

        let end = sequence.plan_timings(0, 2.0);
        assert_eq!(end, 2.0 + total);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let mut sequence = three_notes(NullEngine::default());

        sequence.plan_timings(0, 1.0);
        let first = planned_times(&sequence);
        sequence.plan_timings(0, 1.0);
        assert_eq!(planned_times(&sequence), first);
    }

    #[test]
    fn test_play_on_empty_sequence() {
        let mut sequence = Sequence::new(NullEngine::default());
        sequence.play(None);
        assert!(!sequence.is_playing());
        assert!(!sequence.tick());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sequence = three_notes(NullEngine::default());
        sequence.play(Some(0.0));
        assert!(sequence.is_playing());

        sequence.stop();
        assert!(!sequence.is_playing());
        sequence.stop();
        assert!(!sequence.is_playing());
    }

    #[test]
    fn test_set_tempo_rejects_invalid() {
        let mut sequence = three_notes(NullEngine::default());
        assert!(matches!(
            sequence.set_tempo(0.0),
            Err(SequenceError::InvalidTempo(_))
        ));
        assert!(matches!(
            sequence.set_tempo(-120.0),
            Err(SequenceError::InvalidTempo(_))
        ));
    }

    #[test]
    fn test_set_tempo_same_value_is_noop() {
        let mut sequence = three_notes(NullEngine::default());
        sequence.plan_timings(0, 5.0);
        let before = planned_times(&sequence);

        sequence.set_tempo(120.0).unwrap();
        assert_eq!(planned_times(&sequence), before);
    }

    #[test]
    fn test_set_tempo_before_any_commit_replans_from_start() {
        let mut sequence = three_notes(NullEngine::default());
        // Start far in the future so the immediate tick commits nothing
        sequence.play(Some(10.0));
        assert!(sequence.notes().iter().all(|note| !note.is_committed()));

        sequence.set_tempo(60.0).unwrap();
        // 60 BPM: 1.0s, 2.0s, 0.5s, still anchored at the session start
        assert_eq!(
            planned_times(&sequence),
            vec![Some(10.0), Some(11.0), Some(13.0)]
        );
    }

    #[test]
    fn test_set_tempo_preserves_committed_prefix() {
        let mut sequence = three_notes(NullEngine::default());
        // The immediate tick commits only the first note (starts at 0,
        // the second is planned at 0.5, beyond the 0.1s window)
        sequence.play(Some(0.0));
        assert!(sequence.notes()[0].is_committed());
        assert!(!sequence.notes()[1].is_committed());

        sequence.set_tempo(60.0).unwrap();

        // Committed note untouched; tail anchored at its old-tempo end
        // (0.5s), then re-timed at the new tempo (2.0s for note 1)
        assert_eq!(
            sequence.notes()[0].state(),
            NoteState::Committed { committed_time: 0.0 }
        );
        assert_eq!(
            planned_times(&sequence)[1..],
            [Some(0.5), Some(2.5)]
        );
    }

    #[test]
    fn test_loop_rebases_playback_start() {
        let mut sequence = Sequence::new(NullEngine::default());
        sequence.set_looping(true);
        sequence.push(Note::new(440.0, 1.0));

        sequence.play(Some(0.0));
        // First pass committed immediately; the next is planned at its end
        assert_eq!(sequence.playback_start(), 0.5);
        assert_eq!(
            sequence.notes()[0].state(),
            NoteState::Pending { planned_time: 0.5 }
        );

        sequence.engine_mut().now = 0.45;
        assert!(sequence.tick());
        assert_eq!(sequence.playback_start(), 1.0);
        assert_eq!(
            sequence.notes()[0].state(),
            NoteState::Pending { planned_time: 1.0 }
        );
    }

    #[test]
    fn test_note_pushed_mid_session_stays_unplanned() {
        let mut sequence = three_notes(NullEngine::default());
        sequence.play(Some(0.0));

        sequence.push(Note::new(660.0, 1.0));
        assert_eq!(sequence.notes()[3].state(), NoteState::Unplanned);

        // Ticks never commit it...
        sequence.engine_mut().now = 5.0;
        sequence.tick();
        assert_eq!(sequence.notes()[3].state(), NoteState::Unplanned);
    }
}
