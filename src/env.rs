// Exponential ramps can't reach zero, so every decay ends on this floor.
pub const FLOOR: f64 = 0.0001;

/// A value that starts at `start` and moves exponentially to `end` over a
/// fixed number of frames, then holds `end`.
///
/// This is the shape of a "set value at t0, exponential ramp to v1 at t1"
/// automation curve, used both for amplitude and for the kick's pitch sweep.
#[derive(Debug, Clone)]
pub struct ExpRamp {
    value: f64,
    factor: f64,
    remaining: u64,
    end: f64,
}

impl ExpRamp {
    pub fn new(start: f64, end: f64, frames: u64) -> ExpRamp {
        let end = end.max(FLOOR);
        if start <= 0.0 {
            // A ramp from silence stays silent.
            return ExpRamp {
                value: 0.0,
                factor: 1.0,
                remaining: 0,
                end: 0.0,
            };
        }
        if frames == 0 {
            return ExpRamp {
                value: end,
                factor: 1.0,
                remaining: 0,
                end,
            };
        }
        ExpRamp {
            value: start,
            factor: f64::powf(end / start, 1.0 / frames as f64),
            remaining: frames,
            end,
        }
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        let out = self.value;
        if self.remaining > 0 {
            self.remaining -= 1;
            self.value = if self.remaining == 0 {
                self.end
            } else {
                self.value * self.factor
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_value_at(start: f64, end: f64, duration: f64, t: f64) -> f64 {
        if t >= duration {
            end
        } else {
            start * f64::powf(end / start, t / duration)
        }
    }

    #[test]
    fn ramp_reaches_target() {
        let mut ramp = ExpRamp::new(1.0, FLOOR, 100);
        assert_eq!(ramp.next(), 1.0);
        let mut last = 1.0;
        for _ in 1..100 {
            let v = ramp.next();
            assert!(v < last);
            last = v;
        }
        assert_eq!(ramp.next(), FLOOR);
        assert_eq!(ramp.next(), FLOOR);
    }

    #[test]
    fn ramp_matches_closed_form() {
        let mut ramp = ExpRamp::new(150.0, 45.0, 1000);
        for i in 0..1000 {
            let expected = exp_value_at(150.0, 45.0, 1000.0, i as f64);
            let v = ramp.next();
            assert!((v - expected).abs() < 1e-6, "frame {}: {} != {}", i, v, expected);
        }
    }

    #[test]
    fn zero_target_is_floored() {
        let mut ramp = ExpRamp::new(0.5, 0.0, 10);
        for _ in 0..20 {
            assert!(ramp.next() > 0.0);
        }
    }

    #[test]
    fn ramp_from_silence_is_silent() {
        let mut ramp = ExpRamp::new(0.0, FLOOR, 10);
        for _ in 0..20 {
            assert_eq!(ramp.next(), 0.0);
        }
    }
}
