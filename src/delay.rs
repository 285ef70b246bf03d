/// Circular delay line. The graph reads the delayed sample, then writes the
/// new input plus feedback, so a delay of N frames returns what was written
/// N frames earlier.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_delay_frames: usize) -> Self {
        DelayLine {
            buffer: vec![0.0; max_delay_frames + 1],
            write_pos: 0,
        }
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 1
    }

    #[inline]
    pub fn read(&self, delay_frames: usize) -> f32 {
        let delay = delay_frames.clamp(1, self.max_delay());
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - delay) % len;
        self.buffer[read_pos]
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_comes_back_after_delay() {
        let mut line = DelayLine::new(100);
        let delay = 10;
        let mut out = Vec::new();
        for i in 0..30 {
            out.push(line.read(delay));
            line.write(if i == 0 { 1.0 } else { 0.0 });
        }
        assert_eq!(out[10], 1.0);
        assert_eq!(out.iter().filter(|&&s| s != 0.0).count(), 1);
    }

    #[test]
    fn feedback_repeats_decay() {
        const FEEDBACK: f32 = 0.5;
        let mut line = DelayLine::new(100);
        let delay = 10;
        let mut echoes = Vec::new();
        for i in 0..45 {
            let delayed = line.read(delay);
            if delayed != 0.0 {
                echoes.push((i, delayed));
            }
            let input = if i == 0 { 1.0 } else { 0.0 };
            line.write(input + delayed * FEEDBACK);
        }
        assert_eq!(echoes, vec![(10, 1.0), (20, 0.5), (30, 0.25), (40, 0.125)]);
    }

    #[test]
    fn delay_is_clamped_to_buffer() {
        let mut line = DelayLine::new(4);
        line.write(1.0);
        assert_eq!(line.read(0), 1.0);
        for _ in 0..3 {
            line.write(0.0);
        }
        assert_eq!(line.read(1000), 1.0);
    }
}
