//! Output channels
//!
//! One [`Channel`] per spatial output. The timer thread is the only writer
//! during playback and recording; the UI reads the state for display and
//! may write it directly for manual control.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::geometry::Position;
use crate::types::MAX_AMBISONICS_ORDER;

/// Live spatial state of one output channel
pub struct Channel {
    index: usize,
    position: Mutex<Position>,
    /// f32 bits
    width: AtomicU32,
    order: AtomicU32,
}

impl Channel {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            position: Mutex::new(Position::INVALID),
            width: AtomicU32::new(0.0f32.to_bits()),
            order: AtomicU32::new(1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Current position; [`Position::INVALID`] until first set
    pub fn position(&self) -> Position {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_position(&self, position: Position) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    /// Source width, clamped to 0..=1
    pub fn width(&self) -> f32 {
        f32::from_bits(self.width.load(Ordering::Relaxed))
    }

    pub fn set_width(&self, width: f32) {
        self.width
            .store(width.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn ambisonics_order(&self) -> u32 {
        self.order.load(Ordering::Relaxed)
    }

    /// Set the ambisonics order (clamped to the supported maximum)
    pub fn set_ambisonics_order(&self, order: u32) {
        self.order
            .store(order.min(MAX_AMBISONICS_ORDER), Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("index", &self.index)
            .field("position", &self.position())
            .field("width", &self.width())
            .field("order", &self.ambisonics_order())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ch = Channel::new(3);
        assert_eq!(ch.index(), 3);
        assert!(!ch.position().is_valid());
        assert_eq!(ch.width(), 0.0);
        assert_eq!(ch.ambisonics_order(), 1);
    }

    #[test]
    fn test_setters_clamp() {
        let ch = Channel::new(0);
        ch.set_width(1.5);
        assert_eq!(ch.width(), 1.0);
        ch.set_ambisonics_order(99);
        assert_eq!(ch.ambisonics_order(), MAX_AMBISONICS_ORDER);
    }
}
