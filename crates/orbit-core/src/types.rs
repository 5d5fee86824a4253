//! Common constants for Orbit
//!
//! Musical time resolution and the limits shared by the clock, the engine
//! and the queues that connect them.

/// Tick resolution of a beat. Fixed at compile time.
pub const TICKS_PER_BEAT: i32 = 128;

/// Default beats per bar for a fresh clock
pub const DEFAULT_BEATS_PER_BAR: i32 = 4;

/// Tempo range accepted by the clock and the tap estimator
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// Capacity of every control queue (handler registration, scheduling)
///
/// Control messages arrive in small bursts from user gestures. Overflowing
/// this is a programming error and aborts instead of blocking.
pub const CONTROL_QUEUE_CAPACITY: usize = 32;

/// Default number of spatial output channels
pub const DEFAULT_CHANNEL_COUNT: usize = 8;

/// Highest ambisonics order forwarded to a backend
pub const MAX_AMBISONICS_ORDER: u32 = 7;
