//! Plays a short looping melody on the default audio output.
//!
//! Usage: play [seconds]

use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use tinyseq::{AudioOutput, Sequence, SequencePlayer};

fn main() {
    env_logger::init();

    let seconds: u64 = env::args()
        .nth(1)
        .map(|arg| match arg.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("invalid duration: {arg}");
                process::exit(1);
            }
        })
        .unwrap_or(8);

    let (output, engine) = match AudioOutput::open() {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("failed to open audio output: {err}");
            process::exit(1);
        }
    };

    let mut sequence = Sequence::new(engine);
    sequence.set_looping(true);
    sequence.set_smoothing(0.1);

    let melody = [
        "C4 q", "E4 q", "G4 q", "C5 h", "- q", "A4 q", "F4 q", "D4 q",
    ];
    for note in melody {
        if let Err(err) = sequence.push_str(note) {
            eprintln!("{err}");
            process::exit(1);
        }
    }

    let mut player = SequencePlayer::new(sequence);
    player.play(None);

    println!("playing for {seconds} s, Ctrl-C to quit early");
    thread::sleep(Duration::from_secs(seconds));

    player.stop();
    drop(output);
}
