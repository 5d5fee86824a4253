//! Spatial output: the backend trait and the egress queue feeding it

mod command_queue;
mod sink;

pub use command_queue::{AsyncCommandQueue, SpatialCommand};
pub use sink::{NullSink, SinkError, SinkResult, SpatialSink};
