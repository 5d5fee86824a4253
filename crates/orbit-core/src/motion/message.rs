//! Messages between the UI, the timer thread and status listeners

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pattern::{Pattern, PatternStatus};
use crate::timing::Measure;

/// How a recording ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Keep recording, wrapping over the pattern, until stopped
    #[default]
    Loop,
    /// Stop automatically after one pass over the pattern length
    OneShot,
}

/// Control messages from user threads to the timer thread
#[derive(Debug)]
pub enum SchedulingMessage {
    SetRecordingMode(RecordingMode),
    Timed(TimedRequest),
}

/// Something to do to a pattern at a given measure
#[derive(Debug, Clone)]
pub struct TimedRequest {
    pub at: Measure,
    pub action: TimedAction,
}

#[derive(Debug, Clone)]
pub enum TimedAction {
    StartRecording { pattern: Arc<Pattern>, length: Measure },
    /// `length: None` plays at the pattern's own length
    StartPlaying { pattern: Arc<Pattern>, length: Option<Measure> },
    Stop { pattern: Arc<Pattern> },
}

impl TimedAction {
    pub fn pattern(&self) -> &Arc<Pattern> {
        match self {
            TimedAction::StartRecording { pattern, .. }
            | TimedAction::StartPlaying { pattern, .. }
            | TimedAction::Stop { pattern } => pattern,
        }
    }
}

/// Timed request queued on the timer thread, ordered by due time then
/// arrival so requests for the same measure apply in the order sent
pub(crate) struct PendingRequest {
    pub(crate) due_tick: i64,
    pub(crate) seq: u64,
    pub(crate) request: TimedRequest,
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.seq == other.seq
    }
}

impl Eq for PendingRequest {}

impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_tick, self.seq).cmp(&(other.due_tick, other.seq))
    }
}

/// Status change notification delivered to listeners on the UI thread
#[derive(Debug, Clone)]
pub struct PatternStatusMessage {
    pub pattern: Arc<Pattern>,
    pub channel: usize,
    pub status: PatternStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    fn stop_at(pattern: &Arc<Pattern>, due_tick: i64, seq: u64) -> Reverse<PendingRequest> {
        Reverse(PendingRequest {
            due_tick,
            seq,
            request: TimedRequest {
                at: Measure::from_ticks(due_tick, 4),
                action: TimedAction::Stop { pattern: Arc::clone(pattern) },
            },
        })
    }

    #[test]
    fn test_heap_orders_by_time_then_arrival() {
        let p = Arc::new(Pattern::new(1, "p", 0));
        let mut heap = BinaryHeap::new();
        heap.push(stop_at(&p, 512, 0));
        heap.push(stop_at(&p, 128, 1));
        heap.push(stop_at(&p, 128, 2));
        heap.push(stop_at(&p, 0, 3));

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|Reverse(r)| (r.due_tick, r.seq)))
            .collect();
        assert_eq!(order, vec![(0, 3), (128, 1), (128, 2), (512, 0)]);
    }

    #[test]
    fn test_recording_mode_yaml() {
        let mode: RecordingMode = serde_yaml::from_str("one_shot").unwrap();
        assert_eq!(mode, RecordingMode::OneShot);
        assert_eq!(RecordingMode::default(), RecordingMode::Loop);
    }
}
