//! Per-tick scheduling, recording and playback
//!
//! [`MotionCore`] is driven once per clock tick from the tempo-clock
//! thread. Each tick runs five steps in order:
//!
//! 1. Drain the scheduling queue. Control messages apply at once; timed
//!    requests go into a min-heap and their patterns are marked
//!    `Scheduled…` right away so the UI can show the pending state.
//! 2. Apply every timed request that has come due.
//! 3. Record the current recording position into the active recording.
//! 4. Advance every playing pattern and move its channel.
//! 5. Forward channel parameters that changed since the last tick to the
//!    egress queue.
//!
//! Only one recording exists engine-wide and at most one playing pattern
//! per channel. Scheduling a new one pre-empts the old one at the same
//! timepoint; a request whose pattern was displaced from its pending slot
//! before it came due is dropped as stale.
//!
//! A pattern keeps recording or playing until the request that ends it
//! applies, whatever speculative status it shows meanwhile. A Stop queued
//! before a newer start of the same pattern only ends the current activity;
//! it does not cancel that start.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::mem;
use std::sync::Arc;

use crossbeam::atomic::AtomicCell;

use super::channel::Channel;
use super::listener::ListenerRegistry;
use super::message::{
    PatternStatusMessage, PendingRequest, RecordingMode, SchedulingMessage, TimedAction,
    TimedRequest,
};
use super::pattern::{Pattern, PatternStatus};
use crate::geometry::Position;
use crate::output::{AsyncCommandQueue, SpatialCommand};
use crate::queue::{ControlReceiver, CONTROL_QUEUE_CAPACITY};
use crate::timing::{ClockShared, Measure};

struct ActiveRecording {
    pattern: Arc<Pattern>,
    start_tick: i64,
    len: i64,
}

struct PlaybackState {
    pattern: Arc<Pattern>,
    /// Ticks one pass over the pattern takes
    length_ticks: usize,
    elapsed_ticks: usize,
}

/// A pattern waiting for its start request
struct PendingStart {
    pattern: Arc<Pattern>,
    /// Queue sequence of the start request
    seq: u64,
}

/// Timer-thread view of one output channel
struct ChannelSlot {
    playing: Option<PlaybackState>,
    pending: Option<PendingStart>,
    sent_position: Position,
    sent_width: f32,
    sent_order: u32,
}

impl ChannelSlot {
    fn mirror(channel: &Channel) -> Self {
        Self {
            playing: None,
            pending: None,
            sent_position: Position::INVALID,
            sent_width: channel.width(),
            sent_order: channel.ambisonics_order(),
        }
    }
}

fn is_pending(slot: &Option<PendingStart>, pattern: &Arc<Pattern>) -> bool {
    slot.as_ref()
        .is_some_and(|pending| Arc::ptr_eq(&pending.pattern, pattern))
}

pub(crate) struct MotionCore {
    channels: Vec<Arc<Channel>>,
    slots: Vec<ChannelSlot>,
    scheduling: ControlReceiver<SchedulingMessage>,
    inbox: Vec<SchedulingMessage>,
    timed: BinaryHeap<Reverse<PendingRequest>>,
    next_seq: u64,
    recording_position: Arc<AtomicCell<Position>>,
    recording_mode: RecordingMode,
    active_recording: Option<ActiveRecording>,
    pending_recording: Option<PendingStart>,
    egress: AsyncCommandQueue,
    egress_backlogged: bool,
    listeners: ListenerRegistry,
    clock: Arc<ClockShared>,
}

impl MotionCore {
    pub(crate) fn new(
        channels: Vec<Arc<Channel>>,
        scheduling: ControlReceiver<SchedulingMessage>,
        recording_position: Arc<AtomicCell<Position>>,
        recording_mode: RecordingMode,
        egress: AsyncCommandQueue,
        listeners: ListenerRegistry,
        clock: Arc<ClockShared>,
    ) -> Self {
        let slots = channels.iter().map(|c| ChannelSlot::mirror(c)).collect();
        Self {
            channels,
            slots,
            scheduling,
            inbox: Vec::with_capacity(CONTROL_QUEUE_CAPACITY),
            timed: BinaryHeap::with_capacity(CONTROL_QUEUE_CAPACITY),
            next_seq: 0,
            recording_position,
            recording_mode,
            active_recording: None,
            pending_recording: None,
            egress,
            egress_backlogged: false,
            listeners,
            clock,
        }
    }

    /// Run one tick at `now`
    pub(crate) fn tick(&mut self, now: Measure) {
        let beats_per_bar = self.clock.beats_per_bar();
        let now_ticks = now.to_ticks(beats_per_bar);

        self.drain_scheduling(beats_per_bar);
        self.apply_due_requests(now_ticks, beats_per_bar);
        self.record(now_ticks);
        self.play();
        self.emit_changes();
    }

    // ─────────────────────────────────────────────────────────────
    // Step 1: scheduling queue
    // ─────────────────────────────────────────────────────────────

    fn drain_scheduling(&mut self, beats_per_bar: i32) {
        let mut inbox = mem::take(&mut self.inbox);
        self.scheduling.drain(|message| inbox.push(message));
        for message in inbox.drain(..) {
            match message {
                SchedulingMessage::SetRecordingMode(mode) => {
                    log::debug!("Recording mode set to {:?}", mode);
                    self.recording_mode = mode;
                }
                SchedulingMessage::Timed(request) => self.enqueue(request, beats_per_bar),
            }
        }
        self.inbox = inbox;
    }

    fn enqueue(&mut self, request: TimedRequest, beats_per_bar: i32) {
        let due_tick = request.at.to_ticks(beats_per_bar);
        let pattern = Arc::clone(request.action.pattern());
        match request.action {
            TimedAction::StartRecording { .. } => {
                if !pattern
                    .status()
                    .can_transition_to(PatternStatus::ScheduledForRecording)
                {
                    log::warn!(
                        "Pattern '{}' cannot be scheduled for recording while {}",
                        pattern.name(),
                        pattern.status()
                    );
                    return;
                }
                // One recording engine-wide: the current one ends where this starts
                let displaced = self
                    .active_recording
                    .as_ref()
                    .filter(|active| !Arc::ptr_eq(&active.pattern, &pattern))
                    .map(|active| Arc::clone(&active.pattern));
                let previous = self.pending_recording.take();

                self.revert_pending(previous, &pattern);
                if let Some(displaced) = displaced {
                    self.push_stop(displaced, request.at, due_tick);
                }
                if pattern.set_status(PatternStatus::ScheduledForRecording) {
                    self.notify(&pattern);
                }
                let seq = self.push(request, due_tick);
                self.pending_recording = Some(PendingStart { pattern, seq });
            }
            TimedAction::StartPlaying { .. } => {
                if !pattern
                    .status()
                    .can_transition_to(PatternStatus::ScheduledForPlaying)
                {
                    log::warn!(
                        "Pattern '{}' cannot be scheduled for playing while {}",
                        pattern.name(),
                        pattern.status()
                    );
                    return;
                }
                let index = pattern.channel();
                let Some(slot) = self.slots.get_mut(index) else {
                    log::warn!("Pattern '{}' bound to missing channel {}", pattern.name(), index);
                    return;
                };
                let displaced = slot
                    .playing
                    .as_ref()
                    .filter(|state| !Arc::ptr_eq(&state.pattern, &pattern))
                    .map(|state| Arc::clone(&state.pattern));
                let previous = slot.pending.take();

                self.revert_pending(previous, &pattern);
                if let Some(displaced) = displaced {
                    self.push_stop(displaced, request.at, due_tick);
                }
                if pattern.set_status(PatternStatus::ScheduledForPlaying) {
                    self.notify(&pattern);
                }
                let seq = self.push(request, due_tick);
                self.slots[index].pending = Some(PendingStart { pattern, seq });
            }
            TimedAction::Stop { .. } => self.push_stop(pattern, request.at, due_tick),
        }
    }

    /// Undo the speculative status of a start pushed out of its pending slot
    fn revert_pending(&self, previous: Option<PendingStart>, replacement: &Arc<Pattern>) {
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous.pattern, replacement) {
                previous.pattern.restore_status();
                self.notify(&previous.pattern);
            }
        }
    }

    fn push_stop(&mut self, pattern: Arc<Pattern>, at: Measure, due_tick: i64) {
        let status = pattern.status();
        if matches!(status, PatternStatus::Recording | PatternStatus::Playing)
            && pattern.set_status(PatternStatus::ScheduledForIdle)
        {
            self.notify(&pattern);
        }
        self.push(
            TimedRequest {
                at,
                action: TimedAction::Stop { pattern },
            },
            due_tick,
        );
    }

    fn push(&mut self, request: TimedRequest, due_tick: i64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timed.push(Reverse(PendingRequest {
            due_tick,
            seq,
            request,
        }));
        seq
    }

    // ─────────────────────────────────────────────────────────────
    // Step 2: timed requests
    // ─────────────────────────────────────────────────────────────

    fn apply_due_requests(&mut self, now_ticks: i64, beats_per_bar: i32) {
        while self
            .timed
            .peek()
            .is_some_and(|Reverse(next)| next.due_tick <= now_ticks)
        {
            let Some(Reverse(due)) = self.timed.pop() else {
                break;
            };
            let seq = due.seq;
            match due.request.action {
                TimedAction::StartRecording { pattern, length } => {
                    self.start_recording(pattern, length, now_ticks, beats_per_bar)
                }
                TimedAction::StartPlaying { pattern, length } => {
                    self.start_playing(pattern, length, beats_per_bar)
                }
                TimedAction::Stop { pattern } => self.stop(&pattern, seq),
            }
        }
    }

    fn start_recording(
        &mut self,
        pattern: Arc<Pattern>,
        length: Measure,
        now_ticks: i64,
        beats_per_bar: i32,
    ) {
        if !is_pending(&self.pending_recording, &pattern)
            || pattern.status() != PatternStatus::ScheduledForRecording
        {
            log::debug!("Dropping stale recording start for '{}'", pattern.name());
            return;
        }
        self.pending_recording = None;

        if let Some(active) = self.active_recording.take() {
            active.pattern.disengage();
            if !Arc::ptr_eq(&active.pattern, &pattern) {
                self.finish(&active.pattern);
            }
        }
        // A pattern being overwritten cannot keep playing
        self.detach(&pattern);

        let len = length.to_ticks(beats_per_bar);
        if len <= 0 {
            log::warn!("Pattern '{}': recording length {} is empty", pattern.name(), length);
            self.finish(&pattern);
            return;
        }

        pattern.resize_and_clear(len as usize);
        pattern.set_status(PatternStatus::Recording);
        pattern.engage(PatternStatus::Recording);
        self.notify(&pattern);
        log::debug!(
            "Recording '{}' for {} ticks ({:?})",
            pattern.name(),
            len,
            self.recording_mode
        );

        self.active_recording = Some(ActiveRecording {
            pattern: Arc::clone(&pattern),
            start_tick: now_ticks,
            len,
        });

        if self.recording_mode == RecordingMode::OneShot {
            let end = now_ticks + len;
            self.push_stop(pattern, Measure::from_ticks(end, beats_per_bar), end);
        }
    }

    fn start_playing(&mut self, pattern: Arc<Pattern>, length: Option<Measure>, beats_per_bar: i32) {
        let index = pattern.channel();
        let Some(slot) = self.slots.get_mut(index) else {
            log::warn!("Pattern '{}' bound to missing channel {}", pattern.name(), index);
            return;
        };
        if !is_pending(&slot.pending, &pattern)
            || pattern.status() != PatternStatus::ScheduledForPlaying
        {
            log::debug!("Dropping stale playback start for '{}'", pattern.name());
            return;
        }
        slot.pending = None;
        let displaced = slot.playing.take().map(|state| state.pattern);

        if let Some(displaced) = displaced {
            displaced.disengage();
            if !Arc::ptr_eq(&displaced, &pattern) {
                self.finish(&displaced);
            }
        }
        // Still recording if its stop lies beyond this start
        self.detach(&pattern);

        let pattern_len = pattern.len();
        let length_ticks = length
            .map(|m| m.to_ticks(beats_per_bar))
            .filter(|&ticks| ticks > 0)
            .map_or(pattern_len, |ticks| ticks as usize);

        if pattern_len == 0 || length_ticks == 0 {
            log::warn!("Pattern '{}' has no samples to play", pattern.name());
            self.finish(&pattern);
            return;
        }

        pattern.set_status(PatternStatus::Playing);
        pattern.engage(PatternStatus::Playing);
        self.notify(&pattern);
        log::debug!(
            "Playing '{}' on channel {} over {} ticks",
            pattern.name(),
            index,
            length_ticks
        );
        self.slots[index].playing = Some(PlaybackState {
            pattern,
            length_ticks,
            elapsed_ticks: 0,
        });
    }

    /// Apply a Stop queued with sequence `seq`
    ///
    /// Ends whatever the pattern is doing. Unless a newer start of the same
    /// pattern is pending, also drops its pending starts and makes it idle.
    fn stop(&mut self, pattern: &Arc<Pattern>, seq: u64) {
        if matches!(pattern.status(), PatternStatus::Idle | PatternStatus::Empty) {
            return;
        }
        self.detach(pattern);

        let newer_start = |pending: &Option<PendingStart>| {
            pending
                .as_ref()
                .is_some_and(|start| Arc::ptr_eq(&start.pattern, pattern) && start.seq > seq)
        };
        if newer_start(&self.pending_recording) || self.slots.iter().any(|s| newer_start(&s.pending))
        {
            log::debug!("'{}' stopped ahead of its next start", pattern.name());
            return;
        }

        if is_pending(&self.pending_recording, pattern) {
            self.pending_recording = None;
        }
        for slot in &mut self.slots {
            if is_pending(&slot.pending, pattern) {
                slot.pending = None;
            }
        }
        self.finish(pattern);
    }

    /// End any recording or playback of `pattern` without touching its status
    fn detach(&mut self, pattern: &Arc<Pattern>) {
        if self
            .active_recording
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.pattern, pattern))
        {
            self.active_recording = None;
        }
        for slot in &mut self.slots {
            if slot
                .playing
                .as_ref()
                .is_some_and(|state| Arc::ptr_eq(&state.pattern, pattern))
            {
                slot.playing = None;
            }
        }
        pattern.disengage();
    }

    fn finish(&self, pattern: &Arc<Pattern>) {
        if pattern.status() != PatternStatus::Idle && pattern.set_status(PatternStatus::Idle) {
            self.notify(pattern);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Steps 3 and 4: recording and playback
    // ─────────────────────────────────────────────────────────────

    fn record(&mut self, now_ticks: i64) {
        let Some(active) = &self.active_recording else {
            return;
        };
        let position = self.recording_position.load();
        let index = (now_ticks - active.start_tick).rem_euclid(active.len) as usize;
        active.pattern.write(index, position);

        if position.is_valid() {
            if let Some(channel) = self.channels.get(active.pattern.channel()) {
                channel.set_position(position);
            }
        }
    }

    fn play(&mut self) {
        for (channel, slot) in self.channels.iter().zip(self.slots.iter_mut()) {
            let Some(state) = slot.playing.as_mut() else {
                continue;
            };
            let pattern_len = state.pattern.len();
            if pattern_len == 0 {
                continue;
            }
            let step = state.elapsed_ticks % state.length_ticks;
            let index = step * pattern_len / state.length_ticks;
            state.elapsed_ticks = state.elapsed_ticks.wrapping_add(1);

            let position = state.pattern.read(index);
            state.pattern.set_last_updated_tick(index);
            if position.is_valid() {
                channel.set_position(position);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Step 5: change detection
    // ─────────────────────────────────────────────────────────────

    /// Forward changed parameters; whatever the full ring refuses stays
    /// unsent and goes out with its latest value on a later tick
    fn emit_changes(&mut self) {
        let mut deferred = 0;
        for (channel, slot) in self.channels.iter().zip(self.slots.iter_mut()) {
            let index = channel.index();

            let position = channel.position();
            if position.is_valid() && position != slot.sent_position {
                let command = SpatialCommand::Position { channel: index, position };
                if self.egress.try_push(command) {
                    slot.sent_position = position;
                } else {
                    deferred += 1;
                }
            }

            let width = channel.width();
            if width.to_bits() != slot.sent_width.to_bits() {
                let command = SpatialCommand::Width { channel: index, width };
                if self.egress.try_push(command) {
                    slot.sent_width = width;
                } else {
                    deferred += 1;
                }
            }

            let order = channel.ambisonics_order();
            if order != slot.sent_order {
                let command = SpatialCommand::AmbisonicsOrder { channel: index, order };
                if self.egress.try_push(command) {
                    slot.sent_order = order;
                } else {
                    deferred += 1;
                }
            }
        }

        if deferred > 0 && !self.egress_backlogged {
            log::warn!(
                "Spatial egress backlogged: {} updates deferred ({} slots)",
                deferred,
                self.egress.capacity()
            );
        } else if deferred == 0 && self.egress_backlogged {
            log::info!("Spatial egress caught up");
        }
        self.egress_backlogged = deferred > 0;
    }

    fn notify(&self, pattern: &Arc<Pattern>) {
        self.listeners.notify(PatternStatusMessage {
            pattern: Arc::clone(pattern),
            channel: pattern.channel(),
            status: pattern.status(),
        });
    }
}
