use rand::Rng;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

pub const NUM_STEPS: usize = 16;
pub const NUM_TRACKS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Kick,
    Snare,
    Hat,
    Bass,
}

impl Track {
    pub const ALL: [Track; NUM_TRACKS] = [Track::Kick, Track::Snare, Track::Hat, Track::Bass];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Track::Kick => "kick",
            Track::Snare => "snare",
            Track::Hat => "hat",
            Track::Bass => "bass",
        }
    }

    // Probability that `Randomize` turns on `step` for this track.
    pub fn density(self, step: usize) -> f64 {
        match self {
            Track::Kick if step % 4 == 0 => 0.8,
            Track::Kick => 0.2,
            Track::Snare if step % 4 == 2 => 0.7,
            Track::Snare => 0.15,
            Track::Hat => 0.6,
            Track::Bass => 0.25,
        }
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownTrack(pub String);

impl FromStr for Track {
    type Err = UnknownTrack;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Track::ALL
            .iter()
            .copied()
            .find(|track| track.name() == s)
            .ok_or_else(|| UnknownTrack(s.to_string()))
    }
}

/// The 4x16 step grid. Every cell is its own atomic so the control surface can
/// edit while the scheduler reads.
pub struct Pattern {
    cells: [[AtomicBool; NUM_STEPS]; NUM_TRACKS],
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            cells: std::array::from_fn(|_| std::array::from_fn(|_| AtomicBool::new(false))),
        }
    }
}

impl Pattern {
    fn cell(&self, track: Track, step: usize) -> &AtomicBool {
        &self.cells[track.index()][step % NUM_STEPS]
    }

    pub fn is_active(&self, track: Track, step: usize) -> bool {
        self.cell(track, step).load(Ordering::Relaxed)
    }

    pub fn set(&self, track: Track, step: usize, active: bool) {
        self.cell(track, step).store(active, Ordering::Relaxed);
    }

    pub fn toggle(&self, track: Track, step: usize) -> bool {
        !self.cell(track, step).fetch_xor(true, Ordering::Relaxed)
    }

    pub fn active_tracks(&self, step: usize) -> impl Iterator<Item = Track> + '_ {
        Track::ALL
            .into_iter()
            .filter(move |&track| self.is_active(track, step))
    }

    pub fn row(&self, track: Track) -> [bool; NUM_STEPS] {
        std::array::from_fn(|step| self.is_active(track, step))
    }

    pub fn set_row(&self, track: Track, row: &[bool; NUM_STEPS]) {
        for (step, &active) in row.iter().enumerate() {
            self.set(track, step, active);
        }
    }

    pub fn randomize<R: Rng>(&self, rng: &mut R) {
        for track in Track::ALL {
            for step in 0..NUM_STEPS {
                self.set(track, step, rng.gen_bool(track.density(step)));
            }
        }
    }

    pub fn clear(&self) {
        for track in Track::ALL {
            for step in 0..NUM_STEPS {
                self.set(track, step, false);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        Track::ALL
            .iter()
            .all(|&track| (0..NUM_STEPS).all(|step| !self.is_active(track, step)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn toggle_flips_single_cell() {
        let pattern = Pattern::default();
        assert!(pattern.toggle(Track::Snare, 4));
        assert!(pattern.is_active(Track::Snare, 4));
        assert!(!pattern.is_active(Track::Kick, 4));
        assert!(!pattern.is_active(Track::Snare, 5));
        assert!(!pattern.toggle(Track::Snare, 4));
        assert!(pattern.is_empty());
    }

    #[test]
    fn step_index_wraps() {
        let pattern = Pattern::default();
        pattern.toggle(Track::Hat, 17);
        assert!(pattern.is_active(Track::Hat, 1));
        assert!(pattern.is_active(Track::Hat, 33));
    }

    #[test]
    fn active_tracks_in_order() {
        let pattern = Pattern::default();
        pattern.set(Track::Bass, 0, true);
        pattern.set(Track::Kick, 0, true);
        pattern.set(Track::Kick, 8, true);
        pattern.set(Track::Hat, 2, true);
        let tracks: Vec<_> = pattern.active_tracks(0).collect();
        assert_eq!(tracks, vec![Track::Kick, Track::Bass]);
        assert_eq!(pattern.active_tracks(1).count(), 0);
    }

    #[test]
    fn randomize_then_clear() {
        let pattern = Pattern::default();
        let mut rng = StdRng::seed_from_u64(7);
        pattern.randomize(&mut rng);
        assert!(!pattern.is_empty());
        pattern.clear();
        assert!(pattern.is_empty());
    }

    #[test]
    fn randomize_follows_density_bias() {
        let pattern = Pattern::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut downbeats = 0;
        let mut offbeats = 0;
        for _ in 0..500 {
            pattern.randomize(&mut rng);
            downbeats += (0..NUM_STEPS)
                .filter(|s| s % 4 == 0 && pattern.is_active(Track::Kick, *s))
                .count();
            offbeats += (0..NUM_STEPS)
                .filter(|s| s % 4 != 0 && pattern.is_active(Track::Kick, *s))
                .count();
        }
        let downbeat_rate = downbeats as f64 / (500.0 * 4.0);
        let offbeat_rate = offbeats as f64 / (500.0 * 12.0);
        assert!((downbeat_rate - 0.8).abs() < 0.05, "{}", downbeat_rate);
        assert!((offbeat_rate - 0.2).abs() < 0.05, "{}", offbeat_rate);
    }

    #[test]
    fn densities_match_documented_biases() {
        assert_eq!(Track::Kick.density(0), 0.8);
        assert_eq!(Track::Kick.density(1), 0.2);
        assert_eq!(Track::Snare.density(2), 0.7);
        assert_eq!(Track::Snare.density(4), 0.15);
        assert_eq!(Track::Hat.density(5), 0.6);
        assert_eq!(Track::Bass.density(3), 0.25);
    }

    #[test]
    fn track_names_round_trip() {
        for track in Track::ALL {
            assert_eq!(track.name().parse::<Track>(), Ok(track));
        }
        assert!("clap".parse::<Track>().is_err());
    }
}
