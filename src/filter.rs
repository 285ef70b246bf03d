use std::f64::consts::PI;

pub const DEFAULT_RESONANCE_DB: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Second order IIR filter, transposed direct form II.
///
/// Coefficients follow the Audio EQ Cookbook. For the low- and high-pass
/// types `q` is a resonance peak in dB; for band-pass it is the linear
/// quality factor.
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    frequency: f64,
    q: f64,
    sample_rate: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(filter_type: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = Self {
            filter_type,
            frequency,
            q,
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        f.update_coefficients();
        f
    }

    pub fn lowpass(frequency: f64, resonance_db: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::Lowpass, frequency, resonance_db, sample_rate)
    }

    pub fn highpass(frequency: f64, resonance_db: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::Highpass, frequency, resonance_db, sample_rate)
    }

    pub fn bandpass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        Self::new(FilterType::Bandpass, frequency, q, sample_rate)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    // Retunes the filter, keeping its state. Cheap to call every block: the
    // coefficients are only recomputed when the value actually changed.
    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency != self.frequency {
            self.frequency = frequency;
            self.update_coefficients();
        }
    }

    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let freq = self.frequency.clamp(1.0, nyquist * 0.999);
        let w0 = 2.0 * PI * freq / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                let alpha = sin_w0 / (2.0 * db_to_linear(self.q));
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let alpha = sin_w0 / (2.0 * db_to_linear(self.q));
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => {
                let alpha = sin_w0 / (2.0 * self.q.max(1e-4));
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

fn db_to_linear(db: f64) -> f64 {
    f64::powf(10.0, db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn peak_after_settling(f: &mut Biquad, freq: f64) -> f64 {
        let mut max_out = 0.0_f64;
        for i in 0..8820 {
            let t = i as f64 / SR;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > 4410 {
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = Biquad::lowpass(5000.0, DEFAULT_RESONANCE_DB, SR);
        let mut output = 0.0;
        for _ in 0..2000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "got {}", output);
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = Biquad::highpass(7000.0, DEFAULT_RESONANCE_DB, SR);
        let mut output = 1.0;
        for _ in 0..2000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "got {}", output);
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = Biquad::lowpass(200.0, 0.0, SR);
        let amp = peak_after_settling(&mut f, 10_000.0);
        assert!(amp < 0.01, "got {}", amp);
    }

    #[test]
    fn bandpass_prefers_center() {
        let mut center = Biquad::bandpass(1800.0, 0.7, SR);
        let mut low = Biquad::bandpass(1800.0, 0.7, SR);
        let at_center = peak_after_settling(&mut center, 1800.0);
        let at_low = peak_after_settling(&mut low, 60.0);
        assert!((at_center - 1.0).abs() < 0.05, "got {}", at_center);
        assert!(at_low < 0.1, "got {}", at_low);
    }

    #[test]
    fn resonance_boosts_cutoff() {
        let mut flat = Biquad::lowpass(800.0, 0.0, SR);
        let mut resonant = Biquad::lowpass(800.0, 12.0, SR);
        assert!(peak_after_settling(&mut resonant, 800.0) > 2.0 * peak_after_settling(&mut flat, 800.0));
    }

    #[test]
    fn retune_keeps_output_finite() {
        let mut f = Biquad::lowpass(10_000.0, DEFAULT_RESONANCE_DB, SR);
        for i in 0..10_000 {
            if i % 1000 == 0 {
                f.set_frequency(100.0 + i as f64);
            }
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            assert!(f.process(input).is_finite());
        }
        assert_eq!(f.frequency(), 9100.0);
    }
}
