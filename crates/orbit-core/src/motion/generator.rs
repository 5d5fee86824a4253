//! Procedural trajectories for filling empty patterns

use super::pattern::Pattern;
use crate::geometry::Position;

/// Shape to generate, sampled once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternGenerator {
    /// Hold one position
    Static(Position),
    /// Orbit the listener at fixed radius and elevation
    Circle {
        radius: f32,
        elevation: f32,
        /// Full turns over the pattern; negative turns clockwise
        revolutions: f32,
    },
    /// Travel from `from` to `to`, arriving on the last tick
    Line { from: Position, to: Position },
}

impl PatternGenerator {
    pub fn generate(&self, len: usize) -> Vec<Position> {
        match *self {
            PatternGenerator::Static(position) => vec![position; len],
            PatternGenerator::Circle {
                radius,
                elevation,
                revolutions,
            } => (0..len)
                .map(|i| {
                    let t = i as f32 / len as f32;
                    Position::from_spherical(360.0 * revolutions * t, elevation, radius)
                })
                .collect(),
            PatternGenerator::Line { from, to } => {
                let last = len.saturating_sub(1).max(1) as f32;
                (0..len).map(|i| from.lerp(&to, i as f32 / last)).collect()
            }
        }
    }

    /// Replace the samples of `pattern`, moving it to Idle
    pub fn fill(&self, pattern: &Pattern, len: usize) -> bool {
        pattern.fill(self.generate(len))
    }
}
