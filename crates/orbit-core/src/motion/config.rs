//! Engine configuration
//!
//! Plain serde struct; the application decides where it comes from. Every
//! field has a default so partial YAML files load.

use serde::{Deserialize, Serialize};

use super::message::RecordingMode;
use crate::types::{
    CONTROL_QUEUE_CAPACITY, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM, DEFAULT_CHANNEL_COUNT,
};

/// Commands one channel can emit per tick (position, width, order)
const COMMANDS_PER_CHANNEL: usize = 3;

/// Ticks of headroom the egress ring keeps when the worker falls behind
const EGRESS_HEADROOM_TICKS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of spatial output channels
    pub channel_count: usize,
    /// Initial tempo
    pub tempo_bpm: f64,
    pub beats_per_bar: i32,
    pub recording_mode: RecordingMode,
    /// Egress ring size; `None` derives it from the channel count
    pub command_queue_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_count: DEFAULT_CHANNEL_COUNT,
            tempo_bpm: DEFAULT_BPM,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            recording_mode: RecordingMode::Loop,
            command_queue_capacity: None,
        }
    }
}

impl EngineConfig {
    /// Egress ring capacity actually used
    pub fn effective_command_queue_capacity(&self) -> usize {
        self.command_queue_capacity.unwrap_or_else(|| {
            (self.channel_count * COMMANDS_PER_CHANNEL * EGRESS_HEADROOM_TICKS)
                .max(CONTROL_QUEUE_CAPACITY)
        })
    }
}
