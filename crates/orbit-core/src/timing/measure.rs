//! Musical timestamps (bar, beat, tick)

use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::types::TICKS_PER_BEAT;

/// A position in musical time
///
/// Ordering is lexicographic bar → beat → tick. Arithmetic operators work
/// field by field and do **not** carry overflowed ticks into beats or beats
/// into bars, because they have no beats-per-bar to carry with. Comparing
/// the result of an addition is only meaningful once every field is back in
/// its canonical range; call [`Measure::consolidate`] (or build the value
/// with [`Measure::from_ticks`]) when that matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    pub bar: i32,
    pub beat: i32,
    pub tick: i32,
}

impl Measure {
    pub const ZERO: Measure = Measure { bar: 0, beat: 0, tick: 0 };

    pub const fn new(bar: i32, beat: i32, tick: i32) -> Self {
        Self { bar, beat, tick }
    }

    /// A whole number of bars
    pub const fn bars(bars: i32) -> Self {
        Self::new(bars, 0, 0)
    }

    /// A whole number of beats
    pub const fn beats(beats: i32) -> Self {
        Self::new(0, beats, 0)
    }

    /// Absolute tick count at the given beats-per-bar
    pub fn to_ticks(&self, beats_per_bar: i32) -> i64 {
        let bpb = beats_per_bar.max(1) as i64;
        (self.bar as i64 * bpb + self.beat as i64) * TICKS_PER_BEAT as i64 + self.tick as i64
    }

    /// Canonical measure for an absolute tick count
    pub fn from_ticks(ticks: i64, beats_per_bar: i32) -> Self {
        let bpb = beats_per_bar.max(1) as i64;
        let tpb = TICKS_PER_BEAT as i64;
        let total_beats = ticks.div_euclid(tpb);
        Self {
            bar: total_beats.div_euclid(bpb) as i32,
            beat: total_beats.rem_euclid(bpb) as i32,
            tick: ticks.rem_euclid(tpb) as i32,
        }
    }

    /// Carry or borrow out-of-range fields into their neighbours
    pub fn consolidate(&self, beats_per_bar: i32) -> Self {
        Self::from_ticks(self.to_ticks(beats_per_bar), beats_per_bar)
    }

    /// True when every field lies in its per-field range
    pub fn is_canonical(&self, beats_per_bar: i32) -> bool {
        (0..beats_per_bar.max(1)).contains(&self.beat) && (0..TICKS_PER_BEAT).contains(&self.tick)
    }

    /// Whether this measure sits exactly on a bar boundary
    pub fn is_down_beat(&self) -> bool {
        self.beat == 0 && self.tick == 0
    }

    /// Next bar boundary at or after this measure
    pub fn next_down_beat(&self) -> Self {
        if self.is_down_beat() {
            *self
        } else {
            Self::bars(self.bar + 1)
        }
    }
}

impl PartialOrd for Measure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Measure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bar
            .cmp(&other.bar)
            .then(self.beat.cmp(&other.beat))
            .then(self.tick.cmp(&other.tick))
    }
}

impl Add for Measure {
    type Output = Measure;

    fn add(self, rhs: Measure) -> Measure {
        Measure::new(self.bar + rhs.bar, self.beat + rhs.beat, self.tick + rhs.tick)
    }
}

impl Sub for Measure {
    type Output = Measure;

    fn sub(self, rhs: Measure) -> Measure {
        Measure::new(self.bar - rhs.bar, self.beat - rhs.beat, self.tick - rhs.tick)
    }
}

impl AddAssign for Measure {
    fn add_assign(&mut self, rhs: Measure) {
        *self = *self + rhs;
    }
}

impl SubAssign for Measure {
    fn sub_assign(&mut self, rhs: Measure) {
        *self = *self - rhs;
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.bar, self.beat, self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_ordering() {
        let a = Measure::new(0, 3, 127);
        let b = Measure::new(1, 0, 0);
        let c = Measure::new(1, 0, 1);
        assert!(a < b && b < c && a < c);
        assert_eq!(Measure::new(2, 1, 5).cmp(&Measure::new(2, 1, 5)), Ordering::Equal);
    }

    #[test]
    fn test_add_then_sub_is_identity() {
        let measures = [
            Measure::new(0, 0, 0),
            Measure::new(1, 2, 3),
            Measure::new(4, 3, 127),
            Measure::new(12, 0, 64),
        ];
        for a in measures {
            for b in measures {
                assert_eq!(a + b - b, a);
                let mut m = a;
                m += b;
                m -= b;
                assert_eq!(m, a);
            }
        }
    }

    #[test]
    fn test_addition_does_not_carry() {
        let sum = Measure::new(0, 3, 100) + Measure::new(0, 0, 100);
        assert_eq!(sum, Measure::new(0, 3, 200));
        assert!(!sum.is_canonical(4));
        assert_eq!(sum.consolidate(4), Measure::new(1, 0, 72));
    }

    #[test]
    fn test_to_ticks_monotonic() {
        let mut last = -1;
        for bar in 0..3 {
            for beat in 0..4 {
                for tick in (0..TICKS_PER_BEAT).step_by(16) {
                    let t = Measure::new(bar, beat, tick).to_ticks(4);
                    assert!(t > last);
                    last = t;
                }
            }
        }
    }

    #[test]
    fn test_ticks_roundtrip() {
        let m = Measure::new(3, 2, 17);
        assert_eq!(Measure::from_ticks(m.to_ticks(4), 4), m);
        assert_eq!(Measure::from_ticks(-1, 4), Measure::new(-1, 3, 127));
        assert_eq!(Measure::bars(1).to_ticks(3), 3 * TICKS_PER_BEAT as i64);
    }

    #[test]
    fn test_next_down_beat() {
        assert_eq!(Measure::new(2, 0, 0).next_down_beat(), Measure::new(2, 0, 0));
        assert_eq!(Measure::new(2, 0, 1).next_down_beat(), Measure::new(3, 0, 0));
        assert_eq!(Measure::new(2, 3, 127).next_down_beat(), Measure::new(3, 0, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Measure::new(1, 2, 3).to_string(), "1.2.3");
    }
}
