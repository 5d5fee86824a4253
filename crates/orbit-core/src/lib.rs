//! Orbit Core - timing and motion sequencing for spatial audio
//!
//! This crate provides:
//! - A free-running tempo clock advancing a Bar.Beat.Tick counter
//! - Lock-free single-producer/single-consumer control queues
//! - A pattern recorder/player that captures and replays trajectories
//! - An asynchronous egress queue forwarding positions to a backend sink
//!
//! # Architecture
//!
//! ```text
//! UI thread ──ControlQueue──► tempo-clock thread ──rtrb──► spatial-egress ──► SpatialSink
//!     ▲                          (MotionEngine tick)
//!     └──────── UiSender (status notifications, UI-thread handlers) ────┘
//! ```
//!
//! The tempo-clock thread never blocks on a lock in its steady state. Only
//! the egress worker may block, on the sink's network I/O.

pub mod geometry;
pub mod motion;
pub mod output;
pub mod queue;
pub mod timing;
pub mod types;
pub mod ui;

pub use geometry::Position;
pub use motion::{
    Channel, EngineConfig, EngineError, MotionEngine, Pattern, PatternGenerator,
    PatternStatus, PatternStatusListener, PatternStatusMessage, RecordingMode,
};
pub use output::{AsyncCommandQueue, NullSink, SinkError, SpatialCommand, SpatialSink};
pub use timing::{ClockEvent, EventHandle, Execution, Measure, TempoClock, TempoEstimator};
pub use types::*;
pub use ui::{ui_channel, UiEventLoop, UiSender};
