use crate::audio::Stereo;
use crate::drive::DriveCurve;
use crate::engine::{EngineCommand, EngineState};
use crate::graph::GraphSettings;
use crate::params::{Param, ParamError, ParamTarget, Params, SynthParams, TransportParams, Volumes};
use crate::pattern::{Pattern, Track};
use crate::SAMPLE_RATE;

use basedrop::{Collector, Handle, Shared, SharedCell};
use ringbuf::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use triple_buffer::{Input, Output, TripleBuffer};

const COMMAND_QUEUE_SIZE: usize = 256;
const RECORD_QUEUE_SIZE: usize = SAMPLE_RATE as usize;
const NO_STEP: usize = usize::MAX;

pub struct Store {
    pub pattern: Pattern,
    pub transport: TransportParams,
    pub synth: SynthParams,
    pub volumes: Volumes,
    drive_curve: SharedCell<DriveCurve>,
    playing_step: AtomicUsize,
    is_playing: AtomicBool,
    is_recording: AtomicBool,
    rendering: AtomicBool,
}

impl Store {
    pub fn new(handle: &Handle) -> Self {
        let synth = SynthParams::default();
        let curve = DriveCurve::new(synth.drive.value());
        Self {
            pattern: Pattern::default(),
            transport: TransportParams::default(),
            synth,
            volumes: Volumes::default(),
            drive_curve: SharedCell::new(Shared::new(handle, curve)),
            playing_step: AtomicUsize::new(NO_STEP),
            is_playing: AtomicBool::new(false),
            is_recording: AtomicBool::new(false),
            rendering: AtomicBool::new(false),
        }
    }

    pub fn param(&self, target: &ParamTarget) -> Result<&Param, ParamError> {
        let param = match target {
            ParamTarget::Transport(key) => self.transport.find(key),
            ParamTarget::Synth(key) => self.synth.find(key),
            ParamTarget::Volume(track) => Some(self.volumes.get(*track)),
        };
        param.ok_or_else(|| ParamError::Unknown(target.to_string()))
    }

    pub fn targets(&self) -> Vec<ParamTarget> {
        let transport = self
            .transport
            .iter()
            .map(|(key, _)| ParamTarget::Transport(key.to_string()));
        let synth = self
            .synth
            .iter()
            .map(|(key, _)| ParamTarget::Synth(key.to_string()));
        let volumes = Track::ALL.into_iter().map(ParamTarget::Volume);
        transport.chain(synth).chain(volumes).collect()
    }

    pub fn bpm(&self) -> f64 {
        self.transport.bpm.value()
    }

    pub fn swing(&self) -> f64 {
        self.transport.swing.value()
    }

    pub fn drive_curve(&self) -> Shared<DriveCurve> {
        self.drive_curve.get()
    }

    // Swaps in a new curve. The old one is freed by the collector, not by
    // whichever thread drops the last reference.
    pub fn set_drive_curve(&self, curve: Shared<DriveCurve>) {
        self.drive_curve.set(curve);
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            master_gain: self.synth.master_gain.value(),
            master_cutoff: self.synth.master_cutoff.value(),
            delay_time: self.synth.delay_time.value(),
            delay_mix: self.synth.delay_mix.value(),
        }
    }

    pub fn playing_step(&self) -> Option<usize> {
        match self.playing_step.load(Ordering::Relaxed) {
            NO_STEP => None,
            step => Some(step),
        }
    }

    pub fn set_playing_step(&self, step: Option<usize>) {
        self.playing_step
            .store(step.unwrap_or(NO_STEP), Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    pub fn set_playing(&self, value: bool) {
        self.is_playing.store(value, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, value: bool) {
        self.is_recording.store(value, Ordering::SeqCst);
    }

    // The engine brackets each render with these. The flag is raised before
    // `is_recording` is read, so a render that saw the old value is still
    // marked when `wait_for_render` looks.
    pub fn begin_render(&self) -> bool {
        self.rendering.store(true, Ordering::SeqCst);
        self.is_recording.load(Ordering::SeqCst)
    }

    pub fn end_render(&self) {
        self.rendering.store(false, Ordering::SeqCst);
    }

    /// Blocks until no render is in progress. Returns false on timeout.
    pub fn wait_for_render(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.rendering.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

pub fn controls() -> (AppControl, EngineControl) {
    let collector = Collector::new();
    let store = Arc::new(Store::new(&collector.handle()));
    let (producer, consumer) = RingBuffer::<EngineCommand>::new(COMMAND_QUEUE_SIZE).split();
    let (record_producer, record_consumer) = RingBuffer::<Stereo>::new(RECORD_QUEUE_SIZE).split();
    let (state_input, state_output) = TripleBuffer::new(&EngineState::default()).split();

    let app_control = AppControl {
        store: store.clone(),
        producer,
        engine_state: state_output,
        recording: record_consumer,
        collector,
    };
    let engine_control = EngineControl {
        store,
        consumer,
        engine_state: state_input,
        recording: record_producer,
    };
    (app_control, engine_control)
}

pub struct AppControl {
    pub store: Arc<Store>,
    pub producer: Producer<EngineCommand>,
    pub engine_state: Output<EngineState>,
    pub recording: Consumer<Stereo>,
    pub collector: Collector,
}

pub struct EngineControl {
    pub store: Arc<Store>,
    pub consumer: Consumer<EngineCommand>,
    pub engine_state: Input<EngineState>,
    pub recording: Producer<Stereo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_params_by_target() {
        let collector = Collector::new();
        let store = Store::new(&collector.handle());

        let bpm = store.param(&"bpm".parse().unwrap()).unwrap();
        assert_eq!(bpm.value(), 120.0);
        let hat = store.param(&ParamTarget::Volume(Track::Hat)).unwrap();
        assert_eq!(hat.value(), 0.6);
        store.param(&"delayMix".parse().unwrap()).unwrap().set(0.5).unwrap();
        assert_eq!(store.graph_settings().delay_mix, 0.5);

        assert_eq!(
            store.param(&"cowbell".parse().unwrap()).err(),
            Some(ParamError::Unknown("cowbell".into()))
        );
    }

    #[test]
    fn playing_step_indicator() {
        let collector = Collector::new();
        let store = Store::new(&collector.handle());
        assert_eq!(store.playing_step(), None);
        store.set_playing_step(Some(3));
        assert_eq!(store.playing_step(), Some(3));
        store.set_playing_step(None);
        assert_eq!(store.playing_step(), None);
    }

    #[test]
    fn drive_curve_swaps() {
        let mut collector = Collector::new();
        let store = Store::new(&collector.handle());
        assert_eq!(store.drive_curve().drive(), 0.0);
        store.set_drive_curve(Shared::new(&collector.handle(), DriveCurve::new(0.5)));
        assert_eq!(store.drive_curve().drive(), 0.5);
        collector.collect();
    }

    #[test]
    fn every_target_resolves() {
        let collector = Collector::new();
        let store = Store::new(&collector.handle());
        let targets = store.targets();
        assert_eq!(targets.len(), 2 + 10 + 4);
        assert_eq!(targets[0], ParamTarget::Transport("bpm".into()));
        assert_eq!(targets[15], ParamTarget::Volume(Track::Bass));

        let labels: Vec<&str> = targets
            .iter()
            .map(|t| store.param(t).map(|p| p.label()))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(labels[0], "BPM");
        assert_eq!(labels[2], "Kick Decay");
        assert_eq!(labels[12], "Kick Volume");
    }

    #[test]
    fn wait_for_render_in_progress() {
        let collector = Collector::new();
        let store = Store::new(&collector.handle());
        assert!(!store.begin_render());
        store.end_render();

        store.set_recording(true);
        assert!(store.begin_render());
        store.set_recording(false);
        assert!(!store.wait_for_render(Duration::from_millis(5)));
        store.end_render();
        assert!(store.wait_for_render(Duration::from_millis(5)));
    }
}
