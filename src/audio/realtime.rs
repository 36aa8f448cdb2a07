// CPAL-backed audio engine
//
// The control side (RealtimeEngine) is a cheap Send + Clone handle: it
// allocates voice ids and pushes timestamped commands into a lock-free ring
// buffer. The audio callback drains the commands into per-voice state and
// renders the mix. AudioOutput owns the CPAL stream, which is not Send and
// therefore stays on the thread that opened it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{debug, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::AudioError;
use super::engine::{AudioEngine, OscillatorHandle, Waveform};
use super::timing::AudioClock;
use super::voice::{FreqEvent, Voice};

/// Command ring capacity; the scheduler emits a handful of commands per
/// note and only within its lookahead window, so this never fills up in
/// normal operation
const COMMAND_CAPACITY: usize = 256;

const MASTER_GAIN: f32 = 0.3;

/// Control-to-callback voice commands
enum VoiceCommand {
    Create { id: u32, waveform: Waveform },
    Automate { id: u32, event: FreqEvent },
    Start { id: u32, at: f64 },
    Stop { id: u32, at: f64 },
    Disconnect { id: u32 },
}

type CommandProducer = HeapProd<VoiceCommand>;
type CommandConsumer = HeapCons<VoiceCommand>;

/// Owns the CPAL output stream. Keep it alive for as long as audio should
/// run; dropping it closes the stream.
pub struct AudioOutput {
    _stream: Stream,
}

impl AudioOutput {
    /// Opens the default output device and returns the stream guard plus
    /// the engine handle driving it
    pub fn open() -> Result<(AudioOutput, RealtimeEngine), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0 as f64;
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.into();

        debug!(
            "output device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );
        debug!(
            "config: {} Hz, {} channels, {:?}",
            sample_rate, channels, sample_format
        );

        let clock = AudioClock::new(sample_rate);
        let (producer, consumer) = HeapRb::<VoiceCommand>::new(COMMAND_CAPACITY).split();

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, channels, clock.clone(), consumer)
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, channels, clock.clone(), consumer)
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, channels, clock.clone(), consumer)
            }
            other => return Err(AudioError::UnsupportedFormat(other)),
        }?;
        stream.play()?;

        let engine = RealtimeEngine {
            clock,
            commands: Arc::new(Mutex::new(producer)),
            next_voice_id: Arc::new(AtomicU32::new(0)),
        };

        Ok((AudioOutput { _stream: stream }, engine))
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    clock: AudioClock,
    mut commands: CommandConsumer,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let sample_rate = clock.sample_rate();
    let mut voices: Vec<Voice> = Vec::with_capacity(4);

    let stream = device.build_output_stream(
        config,
        move |output: &mut [T], _| {
            while let Some(command) = commands.try_pop() {
                apply_command(&mut voices, command, sample_rate as f32);
            }

            let base = clock.current_sample();
            let frames = output.len() / channels;

            for frame in 0..frames {
                let t = (base + frame as u64) as f64 / sample_rate;
                let mut mix = 0.0f32;
                for voice in voices.iter_mut() {
                    mix += voice.render(t);
                }

                let value: T = T::from_sample(mix * MASTER_GAIN);
                for channel in 0..channels {
                    output[frame * channels + channel] = value;
                }
            }

            clock.advance(frames);

            let now = base as f64 / sample_rate;
            voices.retain(|voice| !voice.finished(now));
        },
        move |err| warn!("audio stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

fn apply_command(voices: &mut Vec<Voice>, command: VoiceCommand, sample_rate: f32) {
    match command {
        VoiceCommand::Create { id, waveform } => {
            voices.push(Voice::new(id, waveform, sample_rate));
        }
        VoiceCommand::Automate { id, event } => {
            if let Some(voice) = voices.iter_mut().find(|voice| voice.id() == id) {
                voice.apply(event);
            }
        }
        VoiceCommand::Start { id, at } => {
            if let Some(voice) = voices.iter_mut().find(|voice| voice.id() == id) {
                voice.set_start(at);
            }
        }
        VoiceCommand::Stop { id, at } => {
            if let Some(voice) = voices.iter_mut().find(|voice| voice.id() == id) {
                voice.set_stop(at);
            }
        }
        VoiceCommand::Disconnect { id } => {
            voices.retain(|voice| voice.id() != id);
        }
    }
}

/// Send + Clone control handle implementing the engine contract
#[derive(Clone)]
pub struct RealtimeEngine {
    clock: AudioClock,
    commands: Arc<Mutex<CommandProducer>>,
    next_voice_id: Arc<AtomicU32>,
}

impl AudioEngine for RealtimeEngine {
    fn current_time(&self) -> f64 {
        self.clock.seconds()
    }

    fn create_oscillator(&mut self, waveform: Waveform) -> Box<dyn OscillatorHandle + Send> {
        let id = self.next_voice_id.fetch_add(1, Ordering::Relaxed);
        let osc = RealtimeOscillator {
            id,
            commands: Arc::clone(&self.commands),
        };
        osc.push(VoiceCommand::Create { id, waveform });
        Box::new(osc)
    }
}

struct RealtimeOscillator {
    id: u32,
    commands: Arc<Mutex<CommandProducer>>,
}

impl RealtimeOscillator {
    fn push(&self, command: VoiceCommand) {
        let mut producer = self.commands.lock().unwrap();
        if producer.try_push(command).is_err() {
            warn!("audio command ring full, command dropped");
        }
    }
}

impl OscillatorHandle for RealtimeOscillator {
    fn set_frequency(&mut self, frequency: f64, at: f64) {
        self.push(VoiceCommand::Automate {
            id: self.id,
            event: FreqEvent::Set { frequency, at },
        });
    }

    fn ramp_frequency(&mut self, frequency: f64, arrival: f64) {
        self.push(VoiceCommand::Automate {
            id: self.id,
            event: FreqEvent::Ramp { frequency, arrival },
        });
    }

    fn start(&mut self, at: f64) {
        self.push(VoiceCommand::Start { id: self.id, at });
    }

    fn stop(&mut self, at: f64) {
        self.push(VoiceCommand::Stop { id: self.id, at });
    }
}

impl Drop for RealtimeOscillator {
    fn drop(&mut self) {
        self.push(VoiceCommand::Disconnect { id: self.id });
    }
}
