// SequencePlayer - Periodic tick driver
//
// Drives Sequence::tick on a background thread at a fixed cadence. The tick
// period must stay below the scheduler's lookahead window so every note is
// examined at least once before its commit deadline. External mutations
// (tempo changes, note pushes) go through the same mutex as the tick, so a
// re-plan always completes before the next scheduler pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use super::SequenceError;
use super::note::Note;
use super::sequence::Sequence;
use crate::audio::engine::AudioEngine;

/// Wall-clock interval between scheduler passes
pub const TICK_INTERVAL: Duration = Duration::from_millis(60);

pub struct SequencePlayer<E: AudioEngine + Send + 'static> {
    sequence: Arc<Mutex<Sequence<E>>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<E: AudioEngine + Send + 'static> SequencePlayer<E> {
    pub fn new(sequence: Sequence<E>) -> Self {
        Self {
            sequence: Arc::new(Mutex::new(sequence)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Starts playback at `at` (None = engine clock now) and spawns the
    /// tick thread. Any previous session is stopped first.
    pub fn play(&mut self, at: Option<f64>) {
        self.stop();

        {
            let mut sequence = self.sequence.lock().unwrap();
            sequence.play(at);
            if !sequence.is_playing() {
                // nothing to drive (empty sequence)
                return;
            }
        }

        self.running.store(true, Ordering::Release);
        let sequence = Arc::clone(&self.sequence);
        let running = Arc::clone(&self.running);
        self.worker = Some(thread::spawn(move || {
            debug!("tick thread started");
            while running.load(Ordering::Acquire) {
                if !sequence.lock().unwrap().tick() {
                    break;
                }
                thread::sleep(TICK_INTERVAL);
            }
            debug!("tick thread finished");
        }));
    }

    /// Stops the tick thread and the sequence. The worker is joined, so no
    /// tick can fire once this returns. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.sequence.lock().unwrap().stop();
    }

    /// Changes the tempo; the re-plan completes under the sequence lock
    /// before the next tick can run
    pub fn set_tempo(&self, bpm: f64) -> Result<(), SequenceError> {
        self.sequence.lock().unwrap().set_tempo(bpm)
    }

    /// Appends a note; it takes effect from the next re-plan
    pub fn push(&self, note: Note) {
        self.sequence.lock().unwrap().push(note);
    }

    /// Parses and appends one note in compact notation (e.g. "A4 q")
    pub fn push_str(&self, text: &str) -> Result<(), SequenceError> {
        self.sequence.lock().unwrap().push_str(text)
    }

    pub fn is_playing(&self) -> bool {
        self.sequence.lock().unwrap().is_playing()
    }

    /// Runs `f` with exclusive access to the sequence
    pub fn with_sequence<R>(&self, f: impl FnOnce(&mut Sequence<E>) -> R) -> R {
        let mut sequence = self.sequence.lock().unwrap();
        f(&mut sequence)
    }
}

impl<E: AudioEngine + Send + 'static> Drop for SequencePlayer<E> {
    fn drop(&mut self) {
        self.stop();
    }
}
