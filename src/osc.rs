use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

/// Phase-accumulating oscillator. The frequency is passed per sample so a
/// pitch envelope can drive it. All shapes start at zero on the first sample.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            sample_rate,
        }
    }

    #[inline]
    pub fn next_sample(&mut self, freq: f64) -> f64 {
        let inc = freq / self.sample_rate;
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Triangle => {
                let t = (self.phase + 0.25) % 1.0;
                1.0 - 4.0 * (t - 0.5).abs()
            }
            Waveform::Sawtooth => {
                let t = (self.phase + 0.5) % 1.0;
                2.0 * t - 1.0 - poly_blep(t, inc)
            }
        };
        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

// Polynomial band-limited step, smooths the sawtooth's reset.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
