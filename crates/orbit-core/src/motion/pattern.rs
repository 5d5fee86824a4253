//! Recorded trajectories and their playback status
//!
//! A [`Pattern`] is a tick-indexed buffer of positions bound to one output
//! channel. It is shared as `Arc<Pattern>` between the UI (which creates and
//! schedules it) and the timer thread (which records into it and plays it
//! back), so status and cursor live in atomics and the buffer sits behind a
//! mutex held only for the duration of a single read or write.
//!
//! The status is partly speculative: a pattern shows `Scheduled…` as soon as
//! a request is queued. What the timer thread is actually doing with it
//! (recording, playing, nothing) is tracked separately and only changes at
//! the timepoint a request applies.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::geometry::Position;

/// Where a pattern sits in its record/play life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PatternStatus {
    /// No samples yet
    Empty = 0,
    /// Playing or recording until a scheduled stop takes effect
    ScheduledForIdle = 1,
    Idle = 2,
    ScheduledForRecording = 3,
    Recording = 4,
    ScheduledForPlaying = 5,
    Playing = 6,
}

impl PatternStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PatternStatus::Empty,
            1 => PatternStatus::ScheduledForIdle,
            2 => PatternStatus::Idle,
            3 => PatternStatus::ScheduledForRecording,
            4 => PatternStatus::Recording,
            5 => PatternStatus::ScheduledForPlaying,
            _ => PatternStatus::Playing,
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: PatternStatus) -> bool {
        use PatternStatus::*;
        match self {
            Empty => matches!(next, Idle | ScheduledForRecording),
            Idle => matches!(next, Idle | ScheduledForRecording | ScheduledForPlaying | Empty),
            ScheduledForRecording => matches!(next, Recording | ScheduledForIdle | Idle | Empty),
            Recording => matches!(next, ScheduledForIdle | Idle),
            ScheduledForPlaying => matches!(next, Playing | ScheduledForIdle | Idle),
            Playing => matches!(
                next,
                ScheduledForIdle | Idle | ScheduledForRecording | ScheduledForPlaying
            ),
            ScheduledForIdle => matches!(next, Idle | ScheduledForRecording | ScheduledForPlaying),
        }
    }

    /// A status waiting for a timed request to come due
    pub fn is_scheduled(self) -> bool {
        matches!(
            self,
            PatternStatus::ScheduledForIdle
                | PatternStatus::ScheduledForRecording
                | PatternStatus::ScheduledForPlaying
        )
    }
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternStatus::Empty => "empty",
            PatternStatus::ScheduledForIdle => "scheduled for idle",
            PatternStatus::Idle => "idle",
            PatternStatus::ScheduledForRecording => "scheduled for recording",
            PatternStatus::Recording => "recording",
            PatternStatus::ScheduledForPlaying => "scheduled for playing",
            PatternStatus::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// A tick-indexed spatial trajectory
pub struct Pattern {
    id: u64,
    name: String,
    status: AtomicU8,
    previous_status: AtomicU8,
    channel: AtomicUsize,
    /// `Recording`, `Playing` or `Idle`; owned by the timer thread
    engaged: AtomicU8,
    ticks: Mutex<Vec<Position>>,
    last_updated_tick: AtomicUsize,
}

impl Pattern {
    pub fn new(id: u64, name: impl Into<String>, channel: usize) -> Self {
        Self {
            id,
            name: name.into(),
            status: AtomicU8::new(PatternStatus::Empty as u8),
            previous_status: AtomicU8::new(PatternStatus::Empty as u8),
            channel: AtomicUsize::new(channel),
            engaged: AtomicU8::new(PatternStatus::Idle as u8),
            ticks: Mutex::new(Vec::new()),
            last_updated_tick: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PatternStatus {
        PatternStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn previous_status(&self) -> PatternStatus {
        PatternStatus::from_u8(self.previous_status.load(Ordering::Acquire))
    }

    /// Move to `status`, remembering the current one
    ///
    /// Illegal transitions are logged and rejected (returns false).
    pub fn set_status(&self, status: PatternStatus) -> bool {
        let current = self.status();
        if !current.can_transition_to(status) {
            log::warn!(
                "Pattern '{}': rejected transition {} -> {}",
                self.name,
                current,
                status
            );
            return false;
        }
        self.previous_status.store(current as u8, Ordering::Release);
        self.status.store(status as u8, Ordering::Release);
        true
    }

    /// Revert to the status held before the last [`set_status`](Self::set_status)
    pub fn restore_status(&self) {
        let previous = self.previous_status();
        let current = self.status();
        self.status.store(previous as u8, Ordering::Release);
        self.previous_status.store(current as u8, Ordering::Release);
    }

    /// Being recorded into, including while a stop or restart is pending
    pub fn is_active_recording(&self) -> bool {
        self.engaged() == PatternStatus::Recording
    }

    /// Being played back, including while a stop or restart is pending
    pub fn is_active_playing(&self) -> bool {
        self.engaged() == PatternStatus::Playing
    }

    fn engaged(&self) -> PatternStatus {
        PatternStatus::from_u8(self.engaged.load(Ordering::Acquire))
    }

    pub(crate) fn engage(&self, activity: PatternStatus) {
        debug_assert!(matches!(
            activity,
            PatternStatus::Recording | PatternStatus::Playing
        ));
        self.engaged.store(activity as u8, Ordering::Release);
    }

    pub(crate) fn disengage(&self) {
        self.engaged
            .store(PatternStatus::Idle as u8, Ordering::Release);
    }

    pub fn channel(&self) -> usize {
        self.channel.load(Ordering::Acquire)
    }

    pub fn set_channel(&self, channel: usize) {
        self.channel.store(channel, Ordering::Release);
    }

    /// Length in ticks
    pub fn len(&self) -> usize {
        self.lock_ticks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_ticks().is_empty()
    }

    /// Resize to `len` ticks, every tick invalid
    pub fn resize_and_clear(&self, len: usize) {
        let mut ticks = self.lock_ticks();
        ticks.clear();
        ticks.resize(len, Position::INVALID);
        self.last_updated_tick.store(0, Ordering::Release);
    }

    /// Store a sample
    ///
    /// # Panics
    ///
    /// When `tick` is outside the buffer.
    pub fn write(&self, tick: usize, position: Position) {
        let mut ticks = self.lock_ticks();
        let len = ticks.len();
        match ticks.get_mut(tick) {
            Some(slot) => *slot = position,
            None => panic!(
                "pattern '{}': write at tick {} outside length {}",
                self.name, tick, len
            ),
        }
        self.last_updated_tick.store(tick, Ordering::Release);
    }

    /// Read a sample
    ///
    /// # Panics
    ///
    /// When `tick` is outside the buffer.
    pub fn read(&self, tick: usize) -> Position {
        let ticks = self.lock_ticks();
        match ticks.get(tick) {
            Some(position) => *position,
            None => panic!(
                "pattern '{}': read at tick {} outside length {}",
                self.name,
                tick,
                ticks.len()
            ),
        }
    }

    /// Copy of the whole buffer
    pub fn samples(&self) -> Vec<Position> {
        self.lock_ticks().clone()
    }

    /// Replace the buffer with generated samples and become idle
    ///
    /// Only legal while the pattern is neither scheduled nor active.
    pub fn fill(&self, samples: Vec<Position>) -> bool {
        let status = self.status();
        if !matches!(status, PatternStatus::Empty | PatternStatus::Idle) {
            log::warn!("Pattern '{}': cannot fill while {}", self.name, status);
            return false;
        }
        let last = samples.len().saturating_sub(1);
        *self.lock_ticks() = samples;
        self.last_updated_tick.store(last, Ordering::Release);
        self.set_status(PatternStatus::Idle)
    }

    /// Tick most recently written or read for playback (UI cursor)
    pub fn last_updated_tick(&self) -> usize {
        self.last_updated_tick.load(Ordering::Acquire)
    }

    pub(crate) fn set_last_updated_tick(&self, tick: usize) {
        self.last_updated_tick.store(tick, Ordering::Release);
    }

    fn lock_ticks(&self) -> MutexGuard<'_, Vec<Position>> {
        self.ticks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("channel", &self.channel())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle_transitions() {
        let p = Pattern::new(1, "sweep", 0);
        assert_eq!(p.status(), PatternStatus::Empty);
        assert!(p.set_status(PatternStatus::ScheduledForRecording));
        assert!(p.set_status(PatternStatus::Recording));
        assert!(p.set_status(PatternStatus::ScheduledForIdle));
        assert!(p.set_status(PatternStatus::Idle));
        assert_eq!(p.previous_status(), PatternStatus::ScheduledForIdle);
    }

    #[test]
    fn test_engagement_is_independent_of_status() {
        let p = Pattern::new(1, "sweep", 0);
        assert!(!p.is_active_recording());
        p.set_status(PatternStatus::ScheduledForRecording);
        assert!(!p.is_active_recording());

        p.engage(PatternStatus::Recording);
        p.set_status(PatternStatus::Recording);
        p.set_status(PatternStatus::ScheduledForIdle);
        p.set_status(PatternStatus::ScheduledForPlaying);
        assert!(p.is_active_recording());
        assert!(!p.is_active_playing());

        p.engage(PatternStatus::Playing);
        assert!(p.is_active_playing());
        assert!(!p.is_active_recording());
        p.disengage();
        assert!(!p.is_active_playing());
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let p = Pattern::new(1, "sweep", 0);
        assert!(!p.set_status(PatternStatus::Playing));
        assert!(!p.set_status(PatternStatus::ScheduledForPlaying));
        assert_eq!(p.status(), PatternStatus::Empty);
    }

    #[test]
    fn test_restore_status_reverts_speculation() {
        let p = Pattern::new(1, "sweep", 0);
        p.set_status(PatternStatus::Idle);
        p.set_status(PatternStatus::ScheduledForPlaying);
        p.restore_status();
        assert_eq!(p.status(), PatternStatus::Idle);
    }

    #[test]
    fn test_write_read_and_cursor() {
        let p = Pattern::new(1, "sweep", 2);
        p.resize_and_clear(16);
        assert_eq!(p.len(), 16);
        assert!(!p.read(5).is_valid());

        let pos = Position::from_cartesian(1.0, 2.0, 3.0);
        p.write(5, pos);
        assert_eq!(p.read(5), pos);
        assert_eq!(p.last_updated_tick(), 5);
    }

    #[test]
    #[should_panic(expected = "outside length")]
    fn test_write_out_of_range_panics() {
        let p = Pattern::new(1, "sweep", 0);
        p.resize_and_clear(4);
        p.write(4, Position::ORIGIN);
    }

    #[test]
    fn test_fill_only_when_inactive() {
        let p = Pattern::new(1, "circle", 0);
        assert!(p.fill(vec![Position::ORIGIN; 8]));
        assert_eq!(p.status(), PatternStatus::Idle);
        assert_eq!(p.samples().len(), 8);

        p.set_status(PatternStatus::ScheduledForPlaying);
        p.set_status(PatternStatus::Playing);
        assert!(!p.fill(vec![Position::ORIGIN; 4]));
        assert_eq!(p.len(), 8);
    }
}
