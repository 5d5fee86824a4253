//! Motion engine error types

use thiserror::Error;

/// Errors returned by the scheduling API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Pattern bound to a channel the engine does not have
    #[error("Channel {channel} out of range (engine has {count} channels)")]
    ChannelOutOfRange { channel: usize, count: usize },

    /// Recording or playback length resolves to zero ticks
    #[error("Pattern length must be at least one tick")]
    EmptyLength,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
