//! Spatial backend interface

use thiserror::Error;

use crate::geometry::Position;

/// Errors a spatial backend can report
#[derive(Error, Debug)]
pub enum SinkError {
    /// The backend has no way to express this parameter
    #[error("Backend does not support {0}")]
    NotImplemented(&'static str),

    /// Socket or transport failure
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be encoded for the wire
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// The backend is gone
    #[error("Backend disconnected")]
    Disconnected,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// A spatial renderer receiving per-channel parameters
///
/// Implementations are driven from the `spatial-egress` worker only, so
/// they may block on I/O.
pub trait SpatialSink: Send {
    fn send_position(&mut self, channel: usize, position: Position) -> SinkResult<()>;

    fn send_width(&mut self, channel: usize, width: f32) -> SinkResult<()>;

    fn send_ambisonics_order(&mut self, channel: usize, order: u32) -> SinkResult<()>;

    /// Short backend name for log lines
    fn name(&self) -> &str {
        "sink"
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SpatialSink for NullSink {
    fn send_position(&mut self, _channel: usize, _position: Position) -> SinkResult<()> {
        Ok(())
    }

    fn send_width(&mut self, _channel: usize, _width: f32) -> SinkResult<()> {
        Ok(())
    }

    fn send_ambisonics_order(&mut self, _channel: usize, _order: u32) -> SinkResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
