use std::sync::Arc;

use basedrop::Owned;
use ringbuf::{Consumer, Producer};
use tracing::debug;
use triple_buffer::Input;

use crate::audio::Stereo;
use crate::graph::SignalGraph;
use crate::state::{EngineControl, Store};
use crate::voice::{ProcessStatus, Voice};
use crate::{INTERNAL_BUFFER_SIZE, SAMPLE_RATE};

pub const MAX_VOICES: usize = 64;

pub enum EngineCommand {
    Schedule(Owned<Voice>),
}

// Published after every render call. `frames` is the audio clock that the
// scheduler schedules against.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineState {
    pub frames: u64,
    pub voices: usize,
    pub dropped_voices: u64,
    pub dropped_frames: u64,
}

pub struct Engine {
    store: Arc<Store>,
    state: EngineState,
    state_buf: Input<EngineState>,
    consumer: Consumer<EngineCommand>,
    recording: Producer<Stereo>,
    voices: Vec<Owned<Voice>>,
    graph: SignalGraph,
    sum_buf: Vec<f32>,
    tap_buf: Vec<f32>,
}

impl Engine {
    pub fn new(control: EngineControl) -> Engine {
        let EngineControl {
            store,
            consumer,
            engine_state,
            recording,
        } = control;
        let graph = SignalGraph::new(SAMPLE_RATE, store.synth.master_cutoff.value());
        debug!(
            edges = graph.edges().len(),
            cycle = ?graph.feedback_cycle(),
            loop_gain = graph.loop_gain(),
            "signal graph ready"
        );

        Self {
            store,
            state: EngineState::default(),
            state_buf: engine_state,
            consumer,
            recording,
            voices: Vec::with_capacity(MAX_VOICES),
            graph,
            sum_buf: vec![0.0; INTERNAL_BUFFER_SIZE],
            tap_buf: vec![0.0; INTERNAL_BUFFER_SIZE],
        }
    }

    pub fn render(&mut self, buffer: &mut [Stereo]) {
        self.run_commands();

        let settings = self.store.graph_settings();
        let curve = self.store.drive_curve();
        let recording = self.store.begin_render();

        for block in buffer.chunks_mut(INTERNAL_BUFFER_SIZE) {
            let len = block.len();
            let sum = &mut self.sum_buf[..len];
            sum.fill(0.0);

            let clock = self.state.frames;
            let mut i = 0;
            while i < self.voices.len() {
                if self.voices[i].render(clock, sum) == ProcessStatus::Idle {
                    // Dropping an `Owned` only queues it for the collector.
                    self.voices.swap_remove(i);
                } else {
                    i += 1;
                }
            }

            let tap = &mut self.tap_buf[..len];
            self.graph.process(&settings, &curve, sum, block, tap);

            if recording {
                for &sample in tap.iter() {
                    if self.recording.push(Stereo::splat(sample)).is_err() {
                        self.state.dropped_frames += 1;
                    }
                }
            }
            self.state.frames += len as u64;
        }

        self.state.voices = self.voices.len();
        let buf = self.state_buf.input_buffer();
        buf.clone_from(&self.state);
        self.state_buf.publish();
        self.store.end_render();
    }

    fn run_commands(&mut self) {
        while let Some(cmd) = self.consumer.pop() {
            match cmd {
                EngineCommand::Schedule(voice) => {
                    if self.voices.len() < MAX_VOICES {
                        self.voices.push(voice);
                    } else {
                        self.state.dropped_voices += 1;
                    }
                }
            }
        }
    }
}
