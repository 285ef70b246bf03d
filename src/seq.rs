use crate::engine::EngineState;
use crate::frames_to_secs;
use crate::params::TransportParams;
use crate::pattern::{Track, NUM_STEPS};
use crate::state::Store;

use anyhow::{anyhow, Context, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use triple_buffer::Output;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Timing {
    // Steps starting before `now + schedule_ahead` are dispatched.
    pub schedule_ahead: f64,
    pub poll_interval: Duration,
    pub start_guard: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            schedule_ahead: 0.1,
            poll_interval: Duration::from_millis(25),
            start_guard: 0.05,
        }
    }
}

impl Timing {
    /// Upper bound on steps dispatched in one pass: everything that fits in
    /// the lookahead window at the fastest tempo, plus the one on its edge.
    pub fn max_steps_per_pass(&self) -> usize {
        let shortest = step_length(TransportParams::MAX_BPM, 0.0, 0);
        (self.schedule_ahead / shortest).ceil() as usize + 1
    }
}

/// Length of `step` in seconds. A step is a sixteenth note; odd steps are
/// stretched by half the swing amount.
pub fn step_length(bpm: f64, swing: f64, step: usize) -> f64 {
    let base = 0.25 * 60.0 / bpm;
    if step % 2 == 1 {
        base + swing * 0.5 * base
    } else {
        base
    }
}

pub trait Clock {
    fn now(&mut self) -> f64;
}

pub trait TriggerSink {
    fn trigger(&mut self, track: Track, step: usize, time: f64) -> Result<()>;
}

pub trait AudioOutput {
    fn resume(&mut self) -> Result<()>;
}

pub struct AudioClock {
    state: Output<EngineState>,
}

impl AudioClock {
    pub fn new(state: Output<EngineState>) -> Self {
        Self { state }
    }
}

impl Clock for AudioClock {
    fn now(&mut self) -> f64 {
        frames_to_secs(self.state.read().frames)
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    current_step: usize,
    next_event_time: f64,
    timing: Timing,
}

impl Transport {
    pub fn new(start_time: f64, timing: Timing) -> Self {
        Self {
            current_step: 0,
            next_event_time: start_time,
            timing,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    pub fn schedule(&mut self, now: f64, store: &Store, sink: &mut dyn TriggerSink) -> usize {
        if self.next_event_time < now {
            let mut skipped = 0;
            while self.next_event_time < now {
                self.advance(store);
                skipped += 1;
            }
            debug!(skipped, "scheduler fell behind");
        }

        let horizon = now + self.timing.schedule_ahead;
        let max_steps = self.timing.max_steps_per_pass();
        let mut dispatched = 0;
        while self.next_event_time < horizon && dispatched < max_steps {
            self.dispatch(store, sink);
            self.advance(store);
            dispatched += 1;
        }
        dispatched
    }

    fn dispatch(&self, store: &Store, sink: &mut dyn TriggerSink) {
        let step = self.current_step;
        for track in store.pattern.active_tracks(step) {
            if let Err(e) = sink.trigger(track, step, self.next_event_time) {
                warn!(%track, step, "trigger failed: {:#}", e);
            }
        }
        store.set_playing_step(Some(step));
    }

    fn advance(&mut self, store: &Store) {
        self.next_event_time += step_length(store.bpm(), store.swing(), self.current_step);
        self.current_step = (self.current_step + 1) % NUM_STEPS;
    }
}

struct Parts {
    clock: Box<dyn Clock + Send>,
    sink: Box<dyn TriggerSink + Send>,
}

struct Running {
    stop: Sender<()>,
    handle: JoinHandle<Parts>,
}

// Starts and stops the scheduling thread. The clock and sink move into the
// thread while it runs and come back when it stops.
pub struct Sequencer {
    store: Arc<Store>,
    timing: Timing,
    output: Box<dyn AudioOutput>,
    parts: Option<Parts>,
    running: Option<Running>,
}

impl Sequencer {
    pub fn new(
        store: Arc<Store>,
        timing: Timing,
        clock: Box<dyn Clock + Send>,
        sink: Box<dyn TriggerSink + Send>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            store,
            timing,
            output,
            parts: Some(Parts { clock, sink }),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        self.output
            .resume()
            .context("unable to resume audio output")?;
        let mut parts = self
            .parts
            .take()
            .ok_or_else(|| anyhow!("scheduler is not available"))?;

        let timing = self.timing;
        let mut transport = Transport::new(parts.clock.now() + timing.start_guard, timing);
        let (stop, stop_rx) = mpsc::channel();
        let store = self.store.clone();

        let handle = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || {
                loop {
                    let now = parts.clock.now();
                    transport.schedule(now, &store, parts.sink.as_mut());
                    match stop_rx.recv_timeout(timing.poll_interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                parts
            })?;

        self.running = Some(Running { stop, handle });
        self.store.set_playing(true);
        info!(bpm = self.store.bpm(), swing = self.store.swing(), "transport started");
        Ok(())
    }

    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        // The thread may already be gone; joining tells us either way.
        let _ = running.stop.send(());
        match running.handle.join() {
            Ok(parts) => self.parts = Some(parts),
            Err(_) => error!("scheduler thread panicked"),
        }
        self.store.set_playing(false);
        self.store.set_playing_step(None);
        info!("transport stopped");
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.is_running() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}
