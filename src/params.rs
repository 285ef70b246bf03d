use crate::pattern::Track;

use atomic_float::AtomicF64;
use param_derive::Params;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: String, value: f64 },
    #[error("unknown parameter {0:?}")]
    Unknown(String),
}

pub trait Params {
    fn get_param(&self, index: usize) -> &Param;
    fn key(&self, index: usize) -> &'static str;
    fn len(&self) -> usize;

    fn find(&self, key: &str) -> Option<&Param> {
        (0..self.len())
            .find(|&i| self.key(i) == key)
            .map(|i| self.get_param(i))
    }

    fn iter(&self) -> ParamIter<'_, Self>
    where
        Self: Sized,
    {
        ParamIter {
            current: 0,
            params: self,
        }
    }
}

#[derive(Copy, Clone)]
pub enum StepSize {
    Default = 0,
    Large,
}

/// A single control value. Reads and writes are individually atomic so the
/// control surface, the scheduler and the audio thread never need a lock.
pub struct Param {
    value: AtomicF64,
    info: ParamInfo,
}

impl Param {
    pub fn new(value: f64, info: ParamInfo) -> Self {
        Self {
            value: AtomicF64::new(info.clamp(value)),
            info,
        }
    }

    pub fn value(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: f64) -> Result<f64, ParamError> {
        if !value.is_finite() {
            return Err(ParamError::NotFinite {
                name: self.info.name.clone(),
                value,
            });
        }
        let value = self.info.clamp(value);
        self.value.store(value, Ordering::Relaxed);
        Ok(value)
    }

    pub fn incr(&self, step_size: StepSize) {
        let step = self.info.step(step_size);
        let new = f64::min(self.info.max, self.value() + step);
        self.value.store(new, Ordering::Relaxed);
    }

    pub fn decr(&self, step_size: StepSize) {
        let step = self.info.step(step_size);
        let new = f64::max(self.info.min, self.value() - step);
        self.value.store(new, Ordering::Relaxed);
    }

    pub fn value_as_string(&self) -> String {
        let fmt = self.info.format_value.unwrap_or(format_default);
        fmt(self.value())
    }

    pub fn label(&self) -> &str {
        self.info.name.as_str()
    }
}

pub struct ParamInfo {
    name: String,
    min: f64,
    max: f64,
    steps: Option<[f64; 2]>,
    format_value: Option<FormatValue>,
}

impl ParamInfo {
    const DEFAULT_STEPS: [f64; 2] = [0.01, 0.1];

    pub fn new<T: Into<f64>>(name: &str, min: T, max: T) -> Self {
        Self {
            name: String::from(name),
            min: min.into(),
            max: max.into(),
            steps: None,
            format_value: None,
        }
    }

    pub fn with_steps<T: Into<f64>>(mut self, steps: [T; 2]) -> Self {
        self.steps = Some(steps.map(|s| s.into()));
        self
    }

    pub fn with_formatter(mut self, format_value: FormatValue) -> Self {
        self.format_value = Some(format_value);
        self
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    fn step(&self, step_size: StepSize) -> f64 {
        self.steps.unwrap_or(Self::DEFAULT_STEPS)[step_size as usize]
    }
}

type FormatValue = fn(f64) -> String;

fn format_default(v: f64) -> String {
    format!("{:.2}", v)
}

pub fn format_seconds(v: f64) -> String {
    if v < 1.0 {
        format!("{:.0} ms", v * 1000.0)
    } else {
        format!("{:.2} s", v)
    }
}

pub fn format_hz(v: f64) -> String {
    format!("{:.0} Hz", v)
}

pub struct ParamIter<'a, P> {
    current: usize,
    params: &'a P,
}

impl<'a, P: Params> Iterator for ParamIter<'a, P> {
    type Item = (&'static str, &'a Param);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.params.len() {
            None
        } else {
            let idx = self.current;
            self.current += 1;
            Some((self.params.key(idx), self.params.get_param(idx)))
        }
    }
}

#[derive(Params)]
pub struct TransportParams {
    pub bpm: Param,
    pub swing: Param,
}

impl TransportParams {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 300.0;
    // Swing only ever lengthens odd steps, so any non-negative value keeps
    // steps ordered. The upper bound keeps the shuffle musical.
    pub const MAX_SWING: f64 = 0.9;
}

impl Default for TransportParams {
    fn default() -> Self {
        Self {
            bpm: Param::new(
                120.0,
                ParamInfo::new("BPM", Self::MIN_BPM, Self::MAX_BPM).with_steps([1, 10]),
            ),
            swing: Param::new(
                0.1,
                ParamInfo::new("Swing", 0.0, Self::MAX_SWING).with_steps([0.01, 0.1]),
            ),
        }
    }
}

#[derive(Params)]
pub struct SynthParams {
    pub kick_decay: Param,
    pub snare_noise: Param,
    pub hat_decay: Param,
    pub bass_cutoff: Param,
    pub bass_q: Param,
    pub master_cutoff: Param,
    pub delay_mix: Param,
    pub delay_time: Param,
    pub drive: Param,
    pub master_gain: Param,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            kick_decay: Param::new(
                0.35,
                ParamInfo::new("Kick Decay", 0.05, 2.0).with_formatter(format_seconds),
            ),
            snare_noise: Param::new(0.7, ParamInfo::new("Snare Noise", 0.0, 1.0)),
            hat_decay: Param::new(
                0.07,
                ParamInfo::new("Hat Decay", 0.01, 1.0)
                    .with_steps([0.005, 0.05])
                    .with_formatter(format_seconds),
            ),
            bass_cutoff: Param::new(
                800.0,
                ParamInfo::new("Bass Cutoff", 40, 8000)
                    .with_steps([10, 100])
                    .with_formatter(format_hz),
            ),
            bass_q: Param::new(6.0, ParamInfo::new("Bass Resonance", 0, 30).with_steps([0.5, 3.0])),
            master_cutoff: Param::new(
                10_000.0,
                ParamInfo::new("Master Cutoff", 100, 20_000)
                    .with_steps([50, 1000])
                    .with_formatter(format_hz),
            ),
            delay_mix: Param::new(0.15, ParamInfo::new("Delay Mix", 0.0, 1.0)),
            delay_time: Param::new(
                0.25,
                ParamInfo::new("Delay Time", 0.01, 1.0).with_formatter(format_seconds),
            ),
            drive: Param::new(0.0, ParamInfo::new("Drive", 0.0, 1.0)),
            master_gain: Param::new(0.9, ParamInfo::new("Master Gain", 0.0, 1.0)),
        }
    }
}

#[derive(Params)]
pub struct Volumes {
    pub kick: Param,
    pub snare: Param,
    pub hat: Param,
    pub bass: Param,
}

impl Volumes {
    pub fn get(&self, track: Track) -> &Param {
        match track {
            Track::Kick => &self.kick,
            Track::Snare => &self.snare,
            Track::Hat => &self.hat,
            Track::Bass => &self.bass,
        }
    }
}

impl Default for Volumes {
    fn default() -> Self {
        let volume = |name: &str, value: f64| Param::new(value, ParamInfo::new(name, 0.0, 1.0));
        Self {
            kick: volume("Kick Volume", 0.9),
            snare: volume("Snare Volume", 0.8),
            hat: volume("Hat Volume", 0.6),
            bass: volume("Bass Volume", 0.7),
        }
    }
}

/// Address of a single writable value: a transport param, a synth/effect
/// param by key, or a channel volume (`vol.<track>`).
#[derive(Clone, Debug, PartialEq)]
pub enum ParamTarget {
    Transport(String),
    Synth(String),
    Volume(Track),
}

impl FromStr for ParamTarget {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(track) = s.strip_prefix("vol.") {
            return track
                .parse()
                .map(ParamTarget::Volume)
                .map_err(|_| ParamError::Unknown(s.to_string()));
        }
        match s {
            "bpm" | "swing" => Ok(ParamTarget::Transport(s.to_string())),
            "" => Err(ParamError::Unknown(s.to_string())),
            _ => Ok(ParamTarget::Synth(s.to_string())),
        }
    }
}

impl Display for ParamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParamTarget::Transport(key) | ParamTarget::Synth(key) => f.write_str(key),
            ParamTarget::Volume(track) => write!(f, "vol.{}", track),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_range() {
        let params = TransportParams::default();
        assert_eq!(params.bpm.set(0.0), Ok(TransportParams::MIN_BPM));
        assert_eq!(params.bpm.value(), TransportParams::MIN_BPM);
        assert_eq!(params.bpm.set(-40.0), Ok(TransportParams::MIN_BPM));
        assert_eq!(params.swing.set(3.0), Ok(TransportParams::MAX_SWING));
    }

    #[test]
    fn set_rejects_non_finite() {
        let params = SynthParams::default();
        let before = params.kick_decay.value();
        assert!(matches!(
            params.kick_decay.set(f64::NAN),
            Err(ParamError::NotFinite { .. })
        ));
        assert!(params.kick_decay.set(f64::INFINITY).is_err());
        assert_eq!(params.kick_decay.value(), before);
    }

    #[test]
    fn decays_never_reach_zero() {
        let params = SynthParams::default();
        params.kick_decay.set(0.0).unwrap();
        params.hat_decay.set(-1.0).unwrap();
        assert!(params.kick_decay.value() > 0.0);
        assert!(params.hat_decay.value() > 0.0);
    }

    #[test]
    fn derived_keys_are_camel_case() {
        let params = SynthParams::default();
        let keys: Vec<_> = params.iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                "kickDecay",
                "snareNoise",
                "hatDecay",
                "bassCutoff",
                "bassQ",
                "masterCutoff",
                "delayMix",
                "delayTime",
                "drive",
                "masterGain",
            ]
        );
        assert_eq!(params.find("bassQ").unwrap().value(), 6.0);
        assert!(params.find("bass_q").is_none());
    }

    #[test]
    fn incr_and_decr_stay_in_range() {
        let params = TransportParams::default();
        params.bpm.set(299.0).unwrap();
        params.bpm.incr(StepSize::Large);
        assert_eq!(params.bpm.value(), TransportParams::MAX_BPM);
        params.bpm.decr(StepSize::Default);
        assert_eq!(params.bpm.value(), 299.0);
    }

    #[test]
    fn parse_targets() {
        assert_eq!(
            "vol.snare".parse::<ParamTarget>(),
            Ok(ParamTarget::Volume(Track::Snare))
        );
        assert_eq!(
            "bpm".parse::<ParamTarget>(),
            Ok(ParamTarget::Transport("bpm".into()))
        );
        assert_eq!(
            "drive".parse::<ParamTarget>(),
            Ok(ParamTarget::Synth("drive".into()))
        );
        assert!("vol.cowbell".parse::<ParamTarget>().is_err());
    }

    #[test]
    fn formatting() {
        let params = SynthParams::default();
        assert_eq!(params.kick_decay.value_as_string(), "350 ms");
        assert_eq!(params.bass_cutoff.value_as_string(), "800 Hz");
        assert_eq!(params.drive.value_as_string(), "0.00");
    }
}
