use crate::audio::Stereo;
use crate::delay::DelayLine;
use crate::drive::DriveCurve;
use crate::filter::{Biquad, DEFAULT_RESONANCE_DB};

// Gain of the delay's feedback path. The loop is only stable below unity.
pub const FEEDBACK_GAIN: f32 = 0.3;
const _: () = assert!(FEEDBACK_GAIN < 1.0);

pub const MAX_DELAY_SECS: f64 = 1.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Input,
    MasterGain,
    MasterFilter,
    Drive,
    Delay,
    Feedback,
    DelayMix,
    Output,
    RecordTap,
}

pub const NODES: [Node; 9] = [
    Node::Input,
    Node::MasterGain,
    Node::MasterFilter,
    Node::Drive,
    Node::Delay,
    Node::Feedback,
    Node::DelayMix,
    Node::Output,
    Node::RecordTap,
];

/// The fixed topology. `Delay -> Feedback -> Delay` is the one cycle.
pub const EDGES: [(Node, Node); 10] = [
    (Node::Input, Node::MasterGain),
    (Node::MasterGain, Node::MasterFilter),
    (Node::MasterFilter, Node::Drive),
    (Node::Drive, Node::Output),
    (Node::Drive, Node::Delay),
    (Node::Drive, Node::RecordTap),
    (Node::Delay, Node::Feedback),
    (Node::Feedback, Node::Delay),
    (Node::Delay, Node::DelayMix),
    (Node::DelayMix, Node::Output),
];

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GraphSettings {
    pub master_gain: f64,
    pub master_cutoff: f64,
    pub delay_time: f64,
    pub delay_mix: f64,
}

pub struct SignalGraph {
    sample_rate: f64,
    master_filter: Biquad,
    delay: DelayLine,
}

impl SignalGraph {
    pub fn new(sample_rate: f64, master_cutoff: f64) -> Self {
        Self {
            sample_rate,
            master_filter: Biquad::lowpass(master_cutoff, DEFAULT_RESONANCE_DB, sample_rate),
            delay: DelayLine::new((MAX_DELAY_SECS * sample_rate) as usize),
        }
    }

    /// Runs one block of summed voice input through the chain.
    ///
    /// `output` receives dry (post-drive) plus wet delay, `tap` receives the
    /// post-drive signal only. All three slices must have the same length.
    pub fn process(
        &mut self,
        settings: &GraphSettings,
        curve: &DriveCurve,
        input: &[f32],
        output: &mut [Stereo],
        tap: &mut [f32],
    ) {
        self.master_filter.set_frequency(settings.master_cutoff);
        let gain = settings.master_gain as f32;
        let mix = settings.delay_mix as f32;
        let delay_frames = (settings.delay_time * self.sample_rate).round() as usize;

        for ((&x, out), tapped) in input.iter().zip(output.iter_mut()).zip(tap.iter_mut()) {
            let x = self.master_filter.process((x * gain) as f64) as f32;
            let driven = curve.shape(x);

            let delayed = self.delay.read(delay_frames);
            self.delay.write(driven + delayed * FEEDBACK_GAIN);

            *out = Stereo::splat(driven + delayed * mix);
            *tapped = driven;
        }
    }

    pub fn edges(&self) -> &'static [(Node, Node)] {
        &EDGES
    }

    pub fn feedback_cycle(&self) -> Option<Vec<Node>> {
        find_cycle(&EDGES)
    }

    pub fn loop_gain(&self) -> f32 {
        FEEDBACK_GAIN
    }
}

fn find_cycle(edges: &[(Node, Node)]) -> Option<Vec<Node>> {
    fn visit(node: Node, edges: &[(Node, Node)], path: &mut Vec<Node>) -> Option<Vec<Node>> {
        if let Some(start) = path.iter().position(|&n| n == node) {
            return Some(path[start..].to_vec());
        }
        path.push(node);
        for &(_, to) in edges.iter().filter(|(from, _)| *from == node) {
            if let Some(cycle) = visit(to, edges, path) {
                return Some(cycle);
            }
        }
        path.pop();
        None
    }

    NODES
        .iter()
        .find_map(|&node| visit(node, edges, &mut Vec::new()))
}
