// Callback-side voice state - frequency automation plus waveform rendering
//
// Mirrors the automation semantics the scheduler relies on: a set command
// steps to its value at its timestamp, a ramp moves linearly from the
// previous automation anchor to its target, and events sharing a timestamp
// apply in emission order (last write wins).

use std::collections::VecDeque;
use std::f32::consts::PI;

use super::engine::Waveform;

/// One timestamped frequency automation command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreqEvent {
    /// Step to `frequency` at `at`
    Set { frequency: f64, at: f64 },
    /// Ramp linearly from the previous anchor, arriving at `arrival`
    Ramp { frequency: f64, arrival: f64 },
}

impl FreqEvent {
    fn time(&self) -> f64 {
        match *self {
            FreqEvent::Set { at, .. } => at,
            FreqEvent::Ramp { arrival, .. } => arrival,
        }
    }
}

/// Frequency automation timeline for one voice.
///
/// Events are kept ordered by timestamp; ties preserve insertion order so
/// the last-emitted command wins once both have applied.
#[derive(Debug)]
pub struct AutomationLane {
    events: VecDeque<FreqEvent>,
    /// Last fully applied event - the anchor a ramp starts from
    anchor_value: f64,
    anchor_time: f64,
}

impl AutomationLane {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(16),
            anchor_value: 0.0,
            anchor_time: 0.0,
        }
    }

    pub fn push(&mut self, event: FreqEvent) {
        // insert after all events at or before this timestamp
        let position = self
            .events
            .iter()
            .position(|existing| existing.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(position, event);
    }

    /// Evaluates the lane at clock time `t`, consuming elapsed events
    pub fn value_at(&mut self, t: f64) -> f64 {
        loop {
            let Some(&next) = self.events.front() else {
                return self.anchor_value;
            };

            match next {
                FreqEvent::Set { frequency, at } => {
                    if t < at {
                        return self.anchor_value;
                    }
                    self.anchor_value = frequency;
                    self.anchor_time = at;
                    self.events.pop_front();
                }
                FreqEvent::Ramp { frequency, arrival } => {
                    if t < arrival {
                        if arrival <= self.anchor_time {
                            // degenerate ramp, treat as a step
                            return frequency;
                        }
                        let span = arrival - self.anchor_time;
                        let progress = ((t - self.anchor_time) / span).clamp(0.0, 1.0);
                        return self.anchor_value + (frequency - self.anchor_value) * progress;
                    }
                    self.anchor_value = frequency;
                    self.anchor_time = arrival;
                    self.events.pop_front();
                }
            }
        }
    }
}

impl Default for AutomationLane {
    fn default() -> Self {
        Self::new()
    }
}

/// Waveform renderer with a wrapping phase accumulator
#[derive(Debug)]
pub struct ToneGenerator {
    waveform: Waveform,
    phase: f32,
    sample_rate: f32,
}

impl ToneGenerator {
    pub fn new(waveform: Waveform, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Renders one sample at `frequency` Hz (0 = silence)
    pub fn next_sample(&mut self, frequency: f32) -> f32 {
        if frequency <= 0.0 {
            // rest: stay silent with the phase parked
            self.phase = 0.0;
            return 0.0;
        }

        let sample = match self.waveform {
            Waveform::Sine => (self.phase * 2.0 * PI).sin(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => (self.phase * 2.0) - 1.0,
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    (self.phase * 4.0) - 1.0
                } else {
                    3.0 - (self.phase * 4.0)
                }
            }
        };

        self.phase += frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

/// One voice in the output mix: automation lane, generator, start/stop gate
#[derive(Debug)]
pub struct Voice {
    id: u32,
    lane: AutomationLane,
    generator: ToneGenerator,
    start_at: Option<f64>,
    stop_at: Option<f64>,
}

impl Voice {
    pub fn new(id: u32, waveform: Waveform, sample_rate: f32) -> Self {
        Self {
            id,
            lane: AutomationLane::new(),
            generator: ToneGenerator::new(waveform, sample_rate),
            start_at: None,
            stop_at: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn apply(&mut self, event: FreqEvent) {
        self.lane.push(event);
    }

    pub fn set_start(&mut self, at: f64) {
        self.start_at = Some(at);
    }

    pub fn set_stop(&mut self, at: f64) {
        self.stop_at = Some(at);
    }

    /// True once a scheduled stop time has passed
    pub fn finished(&self, t: f64) -> bool {
        matches!(self.stop_at, Some(stop) if t >= stop)
    }

    /// Renders one sample at clock time `t`
    pub fn render(&mut self, t: f64) -> f32 {
        let started = matches!(self.start_at, Some(start) if t >= start);
        if !started || self.finished(t) {
            return 0.0;
        }

        let frequency = self.lane.value_at(t) as f32;
        self.generator.next_sample(frequency)
    }
}
