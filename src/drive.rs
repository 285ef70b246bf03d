use std::f64::consts::PI;

pub const CURVE_LEN: usize = 65536;

// Angular scale of the shaper, 20 degrees.
const ANGLE: f64 = 20.0 * PI / 180.0;

/// Waveshaper lookup table over the input domain [-1, 1].
///
/// Built from a single `drive` amount; rebuild it when drive changes, never
/// per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveCurve {
    drive: f64,
    table: Vec<f32>,
}

impl DriveCurve {
    pub fn new(drive: f64) -> Self {
        let k = drive * 100.0;
        let table = (0..CURVE_LEN)
            .map(|i| {
                let x = (i as f64 * 2.0) / CURVE_LEN as f64 - 1.0;
                ((3.0 + k) * x * ANGLE / (PI + k * x.abs())) as f32
            })
            .collect();
        Self { drive, table }
    }

    pub fn drive(&self) -> f64 {
        self.drive
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Maps one sample through the curve with linear interpolation between
    /// table points. Input outside [-1, 1] is clamped; zero maps to zero.
    #[inline]
    pub fn shape(&self, input: f32) -> f32 {
        let last = self.table.len() - 1;
        let pos = (input.clamp(-1.0, 1.0) + 1.0) * 0.5 * self.table.len() as f32;
        let index = pos as usize;
        if index >= last {
            return self.table[last];
        }
        let frac = pos - index as f32;
        self.table[index] * (1.0 - frac) + self.table[index + 1] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_is_deterministic() {
        let a = DriveCurve::new(0.4);
        let b = DriveCurve::new(0.4);
        assert_eq!(a, b);
        for x in [-1.0, -0.3, 0.0, 0.12345, 0.9] {
            assert_eq!(a.shape(x), b.shape(x));
        }
    }

    #[test]
    fn curve_changes_with_drive() {
        let clean = DriveCurve::new(0.0);
        let driven = DriveCurve::new(0.5);
        assert_ne!(clean.table(), driven.table());
        assert!(driven.shape(0.2) > clean.shape(0.2));
    }

    #[test]
    fn curve_matches_formula() {
        let curve = DriveCurve::new(0.25);
        let k = 25.0;
        let i = 49152;
        let x = (i as f64 * 2.0) / CURVE_LEN as f64 - 1.0;
        let expected = (3.0 + k) * x * ANGLE / (PI + k * x.abs());
        assert_eq!(curve.table().len(), CURVE_LEN);
        assert!((curve.table()[i] as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn curve_is_odd_and_bounded() {
        let curve = DriveCurve::new(1.0);
        for x in [0.1, 0.5, 0.99] {
            assert!((curve.shape(x) + curve.shape(-x)).abs() < 1e-3);
        }
        assert_eq!(curve.shape(4.0), curve.shape(1.0));
        assert_eq!(curve.shape(-4.0), curve.table()[0]);
    }

    #[test]
    fn silence_stays_silent() {
        for drive in [0.0, 0.3, 1.0] {
            assert_eq!(DriveCurve::new(drive).shape(0.0), 0.0);
        }
    }
}
