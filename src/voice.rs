use crate::engine::EngineCommand;
use crate::env::{ExpRamp, FLOOR};
use crate::filter::{Biquad, DEFAULT_RESONANCE_DB};
use crate::noise::Noise;
use crate::osc::{Oscillator, Waveform};
use crate::params::{SynthParams, Volumes};
use crate::pattern::Track;
use crate::seq::TriggerSink;
use crate::state::Store;
use crate::{secs_to_frames, SAMPLE_RATE};

use anyhow::{anyhow, Result};
use basedrop::{Handle, Owned};
use ringbuf::Producer;
use std::sync::Arc;

// Bass notes, picked by step index modulo 4.
pub const BASS_SCALE: [f64; 4] = [43.65, 49.00, 58.27, 65.41];

const KICK_START_HZ: f64 = 150.0;
const KICK_END_HZ: f64 = 45.0;
const SNARE_BAND_HZ: f64 = 1800.0;
const SNARE_BAND_Q: f64 = 0.7;
const SNARE_TONE_HZ: f64 = 180.0;
const SNARE_TONE_LEVEL: f64 = 0.4;
const HAT_CUTOFF_HZ: f64 = 7000.0;
const BASS_DECAY: f64 = 0.3;

// Sources keep playing a little past the end of their amp ramp.
const TAIL: f64 = 0.02;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ProcessStatus {
    Idle,
    Continue,
}

#[derive(Debug, Clone)]
enum Pitch {
    Fixed(f64),
    Sweep(ExpRamp),
}

impl Pitch {
    fn next(&mut self) -> f64 {
        match self {
            Pitch::Fixed(freq) => *freq,
            Pitch::Sweep(ramp) => ramp.next(),
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Tone(Oscillator, Pitch),
    Noise(Noise),
}

#[derive(Debug, Clone)]
struct Layer {
    source: Source,
    filter: Option<Biquad>,
    amp: ExpRamp,
    remaining: u64,
}

impl Layer {
    fn tone(waveform: Waveform, pitch: Pitch, amp: ExpRamp, length: f64) -> Self {
        Self {
            source: Source::Tone(Oscillator::new(waveform, SAMPLE_RATE), pitch),
            filter: None,
            amp,
            remaining: secs_to_frames(length),
        }
    }

    fn noise(amp: ExpRamp, length: f64) -> Self {
        Self {
            source: Source::Noise(Noise::new()),
            filter: None,
            amp,
            remaining: secs_to_frames(length),
        }
    }

    fn through(mut self, filter: Biquad) -> Self {
        self.filter = Some(filter);
        self
    }

    #[inline]
    fn next_sample(&mut self) -> f64 {
        if self.remaining == 0 {
            return 0.0;
        }
        self.remaining -= 1;
        let sample = match &mut self.source {
            Source::Tone(osc, pitch) => osc.next_sample(pitch.next()),
            Source::Noise(noise) => noise.next_sample(),
        };
        let sample = match &mut self.filter {
            Some(filter) => filter.process(sample),
            None => sample,
        };
        sample * self.amp.next()
    }
}

/// A single triggered sound. Built off the audio thread, rendered by the
/// engine from its start frame until every layer has stopped.
#[derive(Debug, Clone)]
pub struct Voice {
    track: Track,
    start: u64,
    layers: Vec<Layer>,
}

fn decay(start: f64, secs: f64) -> ExpRamp {
    ExpRamp::new(start, FLOOR, secs_to_frames(secs))
}

impl Voice {
    pub fn new(track: Track, step: usize, start: u64, params: &SynthParams, volumes: &Volumes) -> Self {
        let volume = volumes.get(track).value();
        match track {
            Track::Kick => Self::kick(start, params.kick_decay.value(), volume),
            Track::Snare => Self::snare(start, params.snare_noise.value(), volume),
            Track::Hat => Self::hat(start, params.hat_decay.value(), volume),
            Track::Bass => Self::bass(
                start,
                BASS_SCALE[step % BASS_SCALE.len()],
                params.bass_cutoff.value(),
                params.bass_q.value(),
                volume,
            ),
        }
    }

    pub fn kick(start: u64, decay_secs: f64, volume: f64) -> Self {
        let sweep = ExpRamp::new(KICK_START_HZ, KICK_END_HZ, secs_to_frames(decay_secs));
        Self {
            track: Track::Kick,
            start,
            layers: vec![Layer::tone(
                Waveform::Sine,
                Pitch::Sweep(sweep),
                decay(volume, decay_secs),
                decay_secs + TAIL,
            )],
        }
    }

    pub fn snare(start: u64, noise_level: f64, volume: f64) -> Self {
        let noise = Layer::noise(decay(noise_level * volume, 0.2), 0.21)
            .through(Biquad::bandpass(SNARE_BAND_HZ, SNARE_BAND_Q, SAMPLE_RATE));
        let tone = Layer::tone(
            Waveform::Triangle,
            Pitch::Fixed(SNARE_TONE_HZ),
            decay(SNARE_TONE_LEVEL * volume, 0.1),
            0.12,
        );
        Self {
            track: Track::Snare,
            start,
            layers: vec![noise, tone],
        }
    }

    pub fn hat(start: u64, decay_secs: f64, volume: f64) -> Self {
        let noise = Layer::noise(decay(volume, decay_secs), decay_secs + TAIL)
            .through(Biquad::highpass(HAT_CUTOFF_HZ, DEFAULT_RESONANCE_DB, SAMPLE_RATE));
        Self {
            track: Track::Hat,
            start,
            layers: vec![noise],
        }
    }

    pub fn bass(start: u64, freq: f64, cutoff: f64, resonance_db: f64, volume: f64) -> Self {
        let tone = Layer::tone(
            Waveform::Sawtooth,
            Pitch::Fixed(freq),
            decay(volume, BASS_DECAY),
            BASS_DECAY + 0.01,
        )
        .through(Biquad::lowpass(cutoff, resonance_db, SAMPLE_RATE));
        Self {
            track: Track::Bass,
            start,
            layers: vec![tone],
        }
    }

    pub fn track(&self) -> Track {
        self.track
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn remaining(&self) -> u64 {
        self.layers.iter().map(|l| l.remaining).max().unwrap_or(0)
    }

    /// Adds this voice into `out`, whose first frame is `clock` on the engine
    /// timeline.
    pub fn render(&mut self, clock: u64, out: &mut [f32]) -> ProcessStatus {
        let offset = self.start.saturating_sub(clock) as usize;
        if offset >= out.len() {
            return ProcessStatus::Continue;
        }
        for sample in out[offset..].iter_mut() {
            let mut sum = 0.0;
            for layer in self.layers.iter_mut() {
                sum += layer.next_sample();
            }
            *sample += sum as f32;
        }
        if self.remaining() == 0 {
            ProcessStatus::Idle
        } else {
            ProcessStatus::Continue
        }
    }
}

pub struct Synth {
    store: Arc<Store>,
    producer: Producer<EngineCommand>,
    handle: Handle,
}

impl Synth {
    pub fn new(store: Arc<Store>, producer: Producer<EngineCommand>, handle: Handle) -> Self {
        Self {
            store,
            producer,
            handle,
        }
    }
}

impl TriggerSink for Synth {
    fn trigger(&mut self, track: Track, step: usize, time: f64) -> Result<()> {
        if !time.is_finite() {
            return Err(anyhow!("{} trigger at invalid time {}", track, time));
        }
        let voice = Voice::new(
            track,
            step,
            secs_to_frames(time),
            &self.store.synth,
            &self.store.volumes,
        );
        let voice = Owned::new(&self.handle, voice);
        if self.producer.push(EngineCommand::Schedule(voice)).is_err() {
            Err(anyhow!("unable to send {} voice to engine", track))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;
    use ringbuf::RingBuffer;

    fn render_all(voice: &mut Voice, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        voice.render(0, &mut out);
        out
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0, |m, s| m.max(s.abs()))
    }

    #[test]
    fn voice_is_silent_before_start() {
        let mut voice = Voice::kick(1000, 0.35, 0.9);
        let out = render_all(&mut voice, 2000);
        assert!(out[..1000].iter().all(|&s| s == 0.0));
        assert!(peak(&out[1000..]) > 0.1);
    }

    #[test]
    fn kick_ends_after_decay() {
        let mut voice = Voice::kick(0, 0.35, 0.9);
        let length = secs_to_frames(0.35 + TAIL) as usize;
        let mut out = vec![0.0; length + 100];
        assert_eq!(voice.render(0, &mut out), ProcessStatus::Idle);
        assert!(out[length..].iter().all(|&s| s == 0.0));
        assert!(peak(&out) <= 0.9);
    }

    #[test]
    fn voice_renders_across_blocks() {
        let mut whole = Voice::snare(10, 0.7, 0.8);
        let mut split = whole.clone();
        let expected = render_all(&mut whole, 512);

        let mut actual = vec![0.0; 512];
        for (i, block) in actual.chunks_mut(128).enumerate() {
            split.render(i as u64 * 128, block);
        }
        assert_eq!(expected, actual);
    }

    #[test]
    fn snare_layers_stop_separately() {
        let mut voice = Voice::snare(0, 0.0, 0.8);
        // No noise layer, only the tone which is done after 0.12 s.
        let out = render_all(&mut voice, secs_to_frames(0.25) as usize);
        let tone_end = secs_to_frames(0.12) as usize;
        assert!(peak(&out[..tone_end]) > 0.05);
        assert!(out[tone_end..].iter().all(|&s| s == 0.0));
        assert_eq!(voice.remaining(), 0);
    }

    #[test]
    fn zero_volume_is_silent() {
        let params = SynthParams::default();
        let volumes = Volumes::default();
        for track in Track::ALL {
            volumes.get(track).set(0.0).unwrap();
            let mut voice = Voice::new(track, 0, 0, &params, &volumes);
            let out = render_all(&mut voice, 4410);
            assert!(out.iter().all(|&s| s == 0.0), "{} made sound", track);
        }
    }

    #[test]
    fn bass_follows_scale() {
        let params = SynthParams::default();
        let volumes = Volumes::default();
        let frames = secs_to_frames(0.3) as usize;
        let crossings = |step| {
            let mut voice = Voice::new(Track::Bass, step, 0, &params, &volumes);
            let out = render_all(&mut voice, frames);
            out.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
        };
        // One upward zero crossing per cycle, 0.3 s of each note.
        for (step, freq) in BASS_SCALE.iter().enumerate() {
            let expected = (freq * 0.3).round() as i64;
            let got = crossings(step + 4) as i64;
            assert!((got - expected).abs() <= 2, "step {}: {} vs {}", step, got, expected);
        }
    }

    #[test]
    fn hat_is_bright() {
        let mut voice = Voice::hat(0, 0.07, 0.6);
        let out = render_all(&mut voice, 2000);
        let mean = out.iter().sum::<f32>() / out.len() as f32;
        assert!(peak(&out) > 0.05);
        assert!(mean.abs() < 0.01);
    }

    #[test]
    fn synth_pushes_voices() {
        let collector = Collector::new();
        let store = Arc::new(Store::new(&collector.handle()));
        let (producer, mut consumer) = RingBuffer::<EngineCommand>::new(1).split();
        let mut synth = Synth::new(store, producer, collector.handle());

        synth.trigger(Track::Kick, 0, 0.5).unwrap();
        assert!(synth.trigger(Track::Snare, 0, 0.5).is_err());
        assert!(synth.trigger(Track::Hat, 0, f64::NAN).is_err());

        match consumer.pop() {
            Some(EngineCommand::Schedule(voice)) => {
                assert_eq!(voice.track(), Track::Kick);
                assert_eq!(voice.start(), secs_to_frames(0.5));
            }
            _ => panic!("expected a scheduled voice"),
        }
    }
}
