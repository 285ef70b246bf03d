use crate::SAMPLE_RATE;
use lazy_static::lazy_static;
use rand::Rng;

lazy_static! {
    /// One second of white noise shared by every noise voice. Generated once
    /// on first use, never on the audio thread.
    pub static ref WHITE_NOISE: Vec<f32> = {
        let mut rng = rand::thread_rng();
        (0..SAMPLE_RATE as usize)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect()
    };
}

#[derive(Debug, Clone, Default)]
pub struct Noise {
    position: usize,
}

impl Noise {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        let sample = WHITE_NOISE.get(self.position).copied().unwrap_or(0.0);
        self.position += 1;
        sample as f64
    }
}
