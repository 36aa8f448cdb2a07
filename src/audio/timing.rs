// Monotonic audio clock backed by an atomic sample counter
//
// The audio callback advances the counter by the number of frames it
// renders; control-side code reads it back as seconds. The origin is
// arbitrary (stream start), only differences matter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct AudioClock {
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Current sample position (readable from any thread)
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Current clock time in seconds
    pub fn seconds(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate
    }

    /// Advance by rendered frames (called from the audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_creation() {
        let clock = AudioClock::new(48000.0);
        assert_eq!(clock.current_sample(), 0);
        assert_eq!(clock.seconds(), 0.0);
        assert_eq!(clock.sample_rate(), 48000.0);
    }

    #[test]
    fn test_advance() {
        let clock = AudioClock::new(48000.0);
        clock.advance(480);
        assert_eq!(clock.current_sample(), 480);
        clock.advance(480);
        assert_eq!(clock.current_sample(), 960);
    }

    #[test]
    fn test_seconds_conversion() {
        let clock = AudioClock::new(48000.0);

        // 1 second = 48000 samples
        clock.advance(48000);
        assert_eq!(clock.seconds(), 1.0);

        // 10ms more
        clock.advance(480);
        assert!((clock.seconds() - 1.01).abs() < 1e-9);
    }

    #[test]
    fn test_shared_across_clones() {
        let clock = AudioClock::new(48000.0);
        let reader = clock.clone();

        clock.advance(1000);
        assert_eq!(reader.current_sample(), 1000);
    }
}
