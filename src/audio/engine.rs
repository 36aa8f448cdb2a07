// Audio engine boundary consumed by the sequencer
//
// The scheduler only needs a monotonic clock and timestamped frequency
// automation on a single oscillator. Everything else (device handling,
// output chain) stays behind this seam, so tests can substitute a scripted
// engine with a fake clock.

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Square
    }
}

/// Handle to one oscillator connected to the engine's output chain.
///
/// All commands are timestamped against the engine clock and irrevocable
/// once issued. Dropping the handle disconnects the oscillator.
pub trait OscillatorHandle {
    /// Sets the frequency to `frequency` Hz, effective at `at`
    fn set_frequency(&mut self, frequency: f64, at: f64);

    /// Linearly ramps the frequency, arriving at `frequency` Hz at `arrival`
    fn ramp_frequency(&mut self, frequency: f64, arrival: f64);

    /// Starts the oscillator at `at`
    fn start(&mut self, at: f64);

    /// Stops the oscillator at `at`
    fn stop(&mut self, at: f64);
}

/// Capability contract of an audio backend
pub trait AudioEngine {
    /// Current clock time in seconds (monotonic, arbitrary origin)
    fn current_time(&self) -> f64;

    /// Creates an oscillator connected to the output chain
    fn create_oscillator(&mut self, waveform: Waveform) -> Box<dyn OscillatorHandle + Send>;
}
