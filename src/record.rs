use crate::audio::Stereo;
use crate::state::Store;
use crate::SAMPLE_RATE;

use anyhow::{anyhow, Result};
use camino::{Utf8Path, Utf8PathBuf};
use hound::{SampleFormat, WavSpec, WavWriter};
use ringbuf::Consumer;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use ulid::Ulid;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const RENDER_WAIT: Duration = Duration::from_millis(100);

pub const WAV_SPEC: WavSpec = WavSpec {
    channels: 2,
    sample_rate: SAMPLE_RATE as u32,
    bits_per_sample: 32,
    sample_format: SampleFormat::Float,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    Started(Utf8PathBuf),
    Finished(Utf8PathBuf),
}

type Writer = WavWriter<BufWriter<File>>;
type WriterHandle = JoinHandle<Option<(Consumer<Stereo>, Result<()>)>>;

struct Take {
    path: Utf8PathBuf,
    stop: Arc<AtomicBool>,
    handle: WriterHandle,
}

enum State {
    Idle(Consumer<Stereo>),
    Recording(Take),
    // The writer thread panicked and took the queue with it.
    Broken,
}

pub struct Recorder {
    store: Arc<Store>,
    dir: Utf8PathBuf,
    state: State,
}

impl Recorder {
    pub fn new<P: AsRef<Utf8Path>>(store: Arc<Store>, frames: Consumer<Stereo>, dir: P) -> Self {
        Self {
            store,
            dir: dir.as_ref().to_owned(),
            state: State::Idle(frames),
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    pub fn toggle(&mut self) -> Result<Export> {
        if self.is_recording() {
            self.finish().map(Export::Finished)
        } else {
            self.start().map(Export::Started)
        }
    }

    fn start(&mut self) -> Result<Utf8PathBuf> {
        let mut frames = match std::mem::replace(&mut self.state, State::Broken) {
            State::Idle(frames) => frames,
            other => {
                self.state = other;
                return Err(anyhow!("recorder is not available"));
            }
        };
        let (path, writer) = match self.create_file() {
            Ok(file) => file,
            Err(e) => {
                self.state = State::Idle(frames);
                return Err(e);
            }
        };
        // Frames left over from an earlier take.
        while frames.pop().is_some() {}

        let stop = Arc::new(AtomicBool::new(false));
        let builder = thread::Builder::new().name("recorder".into());
        let handle = match spawn_writer(builder, frames, writer, stop.clone()) {
            Ok(handle) => handle,
            Err((frames, e)) => {
                self.state = State::Idle(frames);
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };

        self.store.set_recording(true);
        info!(%path, "recording started");
        self.state = State::Recording(Take {
            path: path.clone(),
            stop,
            handle,
        });
        Ok(path)
    }

    fn create_file(&self) -> Result<(Utf8PathBuf, Writer)> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.wav", Ulid::new()));
        let writer = WavWriter::create(&path, WAV_SPEC)?;
        Ok((path, writer))
    }

    fn finish(&mut self) -> Result<Utf8PathBuf> {
        let take = match std::mem::replace(&mut self.state, State::Broken) {
            State::Recording(take) => take,
            other => {
                self.state = other;
                return Err(anyhow!("not recording"));
            }
        };
        self.store.set_recording(false);
        if !self.store.wait_for_render(RENDER_WAIT) {
            warn!("engine still rendering, the end of the take may be cut");
        }
        take.stop.store(true, Ordering::Release);

        let (frames, result) = take
            .handle
            .join()
            .map_err(|_| anyhow!("recorder thread panicked"))?
            .ok_or_else(|| anyhow!("recorder thread never received the queue"))?;
        self.state = State::Idle(frames);
        result?;
        info!(path = %take.path, "recording finished");
        Ok(take.path)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.finish() {
                warn!("unable to finish recording: {:#}", e);
            }
        }
    }
}

// The queue is handed over only once the thread runs, so a failed spawn
// gives it back.
fn spawn_writer(
    builder: thread::Builder,
    frames: Consumer<Stereo>,
    writer: Writer,
    stop: Arc<AtomicBool>,
) -> Result<WriterHandle, (Consumer<Stereo>, io::Error)> {
    let (handoff, queue) = mpsc::sync_channel(1);
    let spawned = builder.spawn(move || {
        let mut frames = queue.recv().ok()?;
        let result = write_frames(&mut frames, writer, &stop);
        Some((frames, result))
    });
    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => return Err((frames, e)),
    };
    match handoff.send(frames) {
        Ok(()) => Ok(handle),
        Err(mpsc::SendError(frames)) => {
            let _ = handle.join();
            Err((frames, io::Error::new(io::ErrorKind::Other, "recorder thread exited")))
        }
    }
}

fn write_frames(frames: &mut Consumer<Stereo>, mut writer: Writer, stop: &AtomicBool) -> Result<()> {
    loop {
        // Stop is raised after the last recording render ended, so one more
        // drain after seeing it picks up every frame of the take.
        let stopping = stop.load(Ordering::Acquire);
        while let Some(frame) = frames.pop() {
            writer.write_sample(frame.channel(0))?;
            writer.write_sample(frame.channel(1))?;
        }
        if stopping {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    writer.finalize()?;
    Ok(())
}
