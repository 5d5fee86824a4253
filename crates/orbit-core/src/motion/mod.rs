//! Pattern recording and playback synchronised to the tempo clock

mod channel;
mod config;
mod engine;
mod error;
mod generator;
mod listener;
mod message;
mod pattern;
mod sequencer;

pub use channel::Channel;
pub use config::EngineConfig;
pub use engine::MotionEngine;
pub use error::{EngineError, EngineResult};
pub use generator::PatternGenerator;
pub use listener::PatternStatusListener;
pub use message::{
    PatternStatusMessage, RecordingMode, SchedulingMessage, TimedAction, TimedRequest,
};
pub use pattern::{Pattern, PatternStatus};
