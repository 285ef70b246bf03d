use crate::audio::{write_interleaved, Stereo};
use crate::engine::Engine;
use crate::seq::AudioOutput;
use crate::{FRAMES_PER_BUFFER, INTERNAL_BUFFER_SIZE, SAMPLE_RATE};

use anyhow::{anyhow, Context, Result};
use assert_no_alloc::assert_no_alloc;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

/// The default output device, driven by the engine. The stream is built
/// paused and starts on the first `resume`.
pub struct Host {
    stream: cpal::Stream,
    playing: bool,
}

impl Host {
    pub fn new(mut engine: Engine) -> Result<Host> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default output device")?;
        let default_config = device
            .default_output_config()
            .context("no default output config")?;
        if default_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "unsupported sample format {:?}",
                default_config.sample_format()
            ));
        }

        let channels = default_config.channels() as usize;
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(SAMPLE_RATE as u32),
            buffer_size: cpal::BufferSize::Fixed(FRAMES_PER_BUFFER as u32),
        };

        let mut buffer = vec![Stereo::ZERO; INTERNAL_BUFFER_SIZE];
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                assert_no_alloc(|| {
                    for chunk in data.chunks_mut(INTERNAL_BUFFER_SIZE * channels) {
                        let frames = &mut buffer[..chunk.len() / channels];
                        engine.render(frames);
                        write_interleaved(frames, chunk, channels);
                    }
                })
            },
            |err| error!("audio output stream error: {}", err),
            None,
        )?;
        let paused = paused(stream.pause());

        info!(
            device = %device.name().unwrap_or_default(),
            channels, "audio output ready"
        );
        Ok(Host {
            stream,
            playing: !paused,
        })
    }
}

impl AudioOutput for Host {
    fn resume(&mut self) -> Result<()> {
        if !self.playing {
            self.stream.play()?;
            self.playing = true;
        }
        Ok(())
    }
}

// Some backends start streams on build and can't pause them.
fn paused(result: Result<(), cpal::PauseStreamError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("unable to pause output stream: {}", e);
            false
        }
    }
}
