use crate::drive::DriveCurve;
use crate::files;
use crate::params::{ParamTarget, StepSize};
use crate::pattern::Track;
use crate::record::{Export, Recorder};
use crate::seq::{AudioClock, AudioOutput, Sequencer, Timing};
use crate::state::{AppControl, Store};
use crate::voice::Synth;

use anyhow::Result;
use basedrop::{Collector, Shared};
use camino::{Utf8Path, Utf8PathBuf};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleStep(Track, usize),
    SetParam(ParamTarget, f64),
    NudgeParam(ParamTarget, f64),
    Start,
    Stop,
    TogglePlay,
    Randomize,
    Clear,
    SaveState,
    LoadState(String),
    ExportAudio,
    // Frees anything the audio thread let go of since the last tick.
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    None,
    Saved(String),
    Recording(Utf8PathBuf),
    Exported(Utf8PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub export_dir: Utf8PathBuf,
    pub state_file: Utf8PathBuf,
    pub timing: Timing,
    // Fixed seed for `Randomize`, mostly for tests.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: "exports".into(),
            state_file: "groovebox.json".into(),
            timing: Timing::default(),
            seed: None,
        }
    }
}

pub struct App {
    store: Arc<Store>,
    sequencer: Sequencer,
    recorder: Recorder,
    collector: Collector,
    config: Config,
    rng: StdRng,
}

impl App {
    pub fn new(control: AppControl, output: Box<dyn AudioOutput>, config: Config) -> Self {
        let AppControl {
            store,
            producer,
            engine_state,
            recording,
            collector,
        } = control;

        let synth = Synth::new(store.clone(), producer, collector.handle());
        let sequencer = Sequencer::new(
            store.clone(),
            config.timing,
            Box::new(AudioClock::new(engine_state)),
            Box::new(synth),
            output,
        );
        let recorder = Recorder::new(store.clone(), recording, &config.export_dir);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            store,
            sequencer,
            recorder,
            collector,
            config,
            rng,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn take(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::ToggleStep(track, step) => {
                let active = self.store.pattern.toggle(track, step);
                debug!(%track, step, active, "step toggled");
            }
            Command::SetParam(target, value) => {
                let value = self.store.param(&target)?.set(value)?;
                debug!(%target, value, "param set");
                self.refresh_drive_curve();
            }
            Command::NudgeParam(target, amount) => {
                let param = self.store.param(&target)?;
                let step = if amount.abs() >= 1.0 {
                    StepSize::Large
                } else {
                    StepSize::Default
                };
                if amount > 0.0 {
                    param.incr(step);
                } else {
                    param.decr(step);
                }
                self.refresh_drive_curve();
            }
            Command::Start => self.sequencer.start()?,
            Command::Stop => self.sequencer.stop(),
            Command::TogglePlay => self.sequencer.toggle()?,
            Command::Randomize => {
                self.store.pattern.randomize(&mut self.rng);
                info!("pattern randomized");
            }
            Command::Clear => {
                self.store.pattern.clear();
                info!("pattern cleared");
            }
            Command::SaveState => {
                return Ok(Outcome::Saved(files::save_state(&self.store)?));
            }
            Command::LoadState(blob) => {
                let skipped = files::load_state(&self.store, &blob)?;
                if !skipped.is_empty() {
                    debug!(?skipped, "state fields skipped");
                }
                self.refresh_drive_curve();
            }
            Command::ExportAudio => {
                return Ok(match self.recorder.toggle()? {
                    Export::Started(path) => Outcome::Recording(path),
                    Export::Finished(path) => Outcome::Exported(path),
                });
            }
            Command::Tick => self.collector.collect(),
        }
        Ok(Outcome::None)
    }

    pub fn save_to(&self, path: &Utf8Path) -> Result<()> {
        files::write_state(&self.store, path)?;
        info!(%path, "state saved");
        Ok(())
    }

    pub fn load_from(&mut self, path: &Utf8Path) -> Result<()> {
        let skipped = files::read_state(&self.store, path)?;
        if !skipped.is_empty() {
            debug!(?skipped, "state fields skipped");
        }
        self.refresh_drive_curve();
        info!(%path, "state loaded");
        Ok(())
    }

    // The curve table is only rebuilt when the drive amount really changed.
    fn refresh_drive_curve(&mut self) {
        let drive = self.store.synth.drive.value();
        if self.store.drive_curve().drive() != drive {
            let curve = Shared::new(&self.collector.handle(), DriveCurve::new(drive));
            self.store.set_drive_curve(curve);
            debug!(drive, "drive curve rebuilt");
        }
    }
}
