pub mod app;
pub mod audio;
pub mod delay;
pub mod drive;
pub mod engine;
pub mod env;
pub mod files;
pub mod filter;
pub mod graph;
pub mod host;
pub mod noise;
pub mod osc;
pub mod params;
pub mod pattern;
pub mod record;
pub mod seq;
pub mod state;
pub mod voice;

// Keep https://github.com/RustAudio/cpal/issues/508 in mind
// when changing the sample rate.
pub const SAMPLE_RATE: f64 = 44100.0;
pub const FRAMES_PER_BUFFER: usize = 128;

// Allocate a larger buffer size, because sometimes cpal requests more than the
// configured buffer size when switching the output device.
pub const INTERNAL_BUFFER_SIZE: usize = 4 * FRAMES_PER_BUFFER;

// Converts an absolute time in seconds to a frame index on the engine clock.
pub fn secs_to_frames(secs: f64) -> u64 {
    if secs <= 0.0 {
        0
    } else {
        (secs * SAMPLE_RATE).round() as u64
    }
}

pub fn frames_to_secs(frames: u64) -> f64 {
    frames as f64 / SAMPLE_RATE
}
