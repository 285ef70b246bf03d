#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub struct Frame<const N: usize>([f32; N]);

impl<const N: usize> Frame<N> {
    pub const ZERO: Frame<N> = Frame([0.0; N]);

    pub fn splat(sample: f32) -> Frame<N> {
        Self([sample; N])
    }

    pub fn channel(&self, index: usize) -> f32 {
        self.0[index]
    }
}

pub type Stereo = Frame<2>;

/// Copies stereo frames into an interleaved device buffer with `channels`
/// channels. Extra device channels get silence, a mono device gets the left
/// channel.
pub fn write_interleaved(frames: &[Stereo], out: &mut [f32], channels: usize) {
    for (frame, dst) in frames.iter().zip(out.chunks_mut(channels)) {
        for (ch, sample) in dst.iter_mut().enumerate() {
            *sample = if ch < 2 { frame.channel(ch) } else { 0.0 };
        }
    }
}
