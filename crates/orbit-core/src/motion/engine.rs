//! The motion engine: public face of the pattern recorder/player
//!
//! [`MotionEngine`] wires a [`TempoClock`], the output channels, the egress
//! queue and the per-tick [`MotionCore`] together. All scheduling calls are
//! non-blocking: they validate their arguments and push a message onto the
//! scheduling control queue, which the timer thread drains on its next tick.
//! The recording position is the exception: it is high-rate input, so it
//! goes into a latest-value cell that the tick reads instead of the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError, Weak};

use crossbeam::atomic::AtomicCell;

use super::channel::Channel;
use super::config::EngineConfig;
use super::sequencer::MotionCore;
use super::error::{EngineError, EngineResult};
use super::generator::PatternGenerator;
use super::listener::{ListenerRegistry, PatternStatusListener};
use super::message::{RecordingMode, SchedulingMessage, TimedAction, TimedRequest};
use super::pattern::Pattern;
use crate::geometry::Position;
use crate::output::{AsyncCommandQueue, SpatialSink};
use crate::queue::{control_queue, ControlSender, CONTROL_QUEUE_CAPACITY};
use crate::timing::{ClockEvent, EventHandle, Execution, Measure, TempoClock};
use crate::ui::UiSender;

/// Tempo-synchronised recorder and player for spatial trajectories
pub struct MotionEngine {
    config: EngineConfig,
    clock: TempoClock,
    channels: Vec<Arc<Channel>>,
    core: Arc<Mutex<MotionCore>>,
    scheduling: ControlSender<SchedulingMessage>,
    recording_position: Arc<AtomicCell<Position>>,
    listeners: ListenerRegistry,
    next_pattern_id: AtomicU64,
    _tick_handler: EventHandle,
}

impl MotionEngine {
    /// Build an engine; the clock stays stopped until [`start`](Self::start)
    pub fn new(config: EngineConfig, sink: Box<dyn SpatialSink>, ui: UiSender) -> Self {
        let clock = TempoClock::with_tempo(ui.clone(), config.tempo_bpm, config.beats_per_bar);
        let channels: Vec<Arc<Channel>> = (0..config.channel_count)
            .map(|index| Arc::new(Channel::new(index)))
            .collect();

        let egress = AsyncCommandQueue::new(sink, config.effective_command_queue_capacity());
        let listeners = ListenerRegistry::new(ui);
        let (scheduling, scheduling_rx) = control_queue(CONTROL_QUEUE_CAPACITY);
        let recording_position = Arc::new(AtomicCell::new(Position::INVALID));

        let core = Arc::new(Mutex::new(MotionCore::new(
            channels.clone(),
            scheduling_rx,
            Arc::clone(&recording_position),
            config.recording_mode,
            egress,
            listeners.clone(),
            Arc::clone(clock.shared()),
        )));

        let tick_core = Arc::clone(&core);
        let tick_handler = clock.schedule_event_handler_addition(
            // Never block the timer thread on a concurrent `process_tick`
            move |now| match tick_core.try_lock() {
                Ok(mut core) => core.tick(now),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().tick(now),
                Err(TryLockError::WouldBlock) => {
                    log::warn!("Motion tick at {} skipped: core held by process_tick", now)
                }
            },
            ClockEvent::Tick,
            Execution::TimerThread,
            true,
        );

        log::info!(
            "Motion engine ready: {} channels, {:.1} BPM, {} beats per bar, {:?} recording",
            config.channel_count,
            config.tempo_bpm,
            config.beats_per_bar,
            config.recording_mode
        );

        Self {
            config,
            clock,
            channels,
            core,
            scheduling,
            recording_position,
            listeners,
            next_pattern_id: AtomicU64::new(1),
            _tick_handler: tick_handler,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    pub fn start(&self) {
        self.clock.start();
    }

    pub fn stop(&self) {
        self.clock.stop();
    }

    pub fn reset(&self) {
        self.clock.reset();
    }

    pub fn clock(&self) -> &TempoClock {
        &self.clock
    }

    /// Run one tick synchronously, as the timer thread would at `now`
    ///
    /// Intended for offline rendering and deterministic tests. Only call it
    /// while the clock is stopped: the timer thread skips any tick that finds
    /// the core held here.
    pub fn process_tick(&self, now: Measure) {
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(now);
    }

    // ─────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&Arc<Channel>> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Arc<Channel>] {
        &self.channels
    }

    fn checked_channel(&self, index: usize) -> EngineResult<&Arc<Channel>> {
        self.channels.get(index).ok_or(EngineError::ChannelOutOfRange {
            channel: index,
            count: self.channels.len(),
        })
    }

    /// Move a channel by hand; forwarded on the next tick
    pub fn set_channel_position(&self, index: usize, position: Position) -> EngineResult<()> {
        self.checked_channel(index)?.set_position(position);
        Ok(())
    }

    pub fn set_channel_width(&self, index: usize, width: f32) -> EngineResult<()> {
        self.checked_channel(index)?.set_width(width);
        Ok(())
    }

    pub fn set_channel_ambisonics_order(&self, index: usize, order: u32) -> EngineResult<()> {
        self.checked_channel(index)?.set_ambisonics_order(order);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Patterns
    // ─────────────────────────────────────────────────────────────

    /// Create an empty pattern bound to `channel`
    pub fn create_pattern(
        &self,
        channel: usize,
        name: impl Into<String>,
    ) -> EngineResult<Arc<Pattern>> {
        self.checked_channel(channel)?;
        let id = self.next_pattern_id.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(Pattern::new(id, name, channel)))
    }

    /// Create a pattern filled by `generator` over `length`
    pub fn generate_pattern(
        &self,
        channel: usize,
        name: impl Into<String>,
        generator: &PatternGenerator,
        length: Measure,
    ) -> EngineResult<Arc<Pattern>> {
        let len = self.length_ticks(length)?;
        let pattern = self.create_pattern(channel, name)?;
        generator.fill(&pattern, len);
        Ok(pattern)
    }

    fn length_ticks(&self, length: Measure) -> EngineResult<usize> {
        let ticks = length.to_ticks(self.clock.beats_per_bar());
        if ticks <= 0 {
            return Err(EngineError::EmptyLength);
        }
        Ok(ticks as usize)
    }

    // ─────────────────────────────────────────────────────────────
    // Recording input
    // ─────────────────────────────────────────────────────────────

    /// Position captured by the active recording from the next tick on
    ///
    /// Only the latest value counts, so this may be called at any rate,
    /// running clock or not.
    pub fn set_recording_position(&self, position: Position) {
        self.recording_position.store(position);
    }

    /// Stop feeding the recording; subsequent ticks record gaps
    pub fn release_recording_position(&self) {
        self.recording_position.store(Position::INVALID);
    }

    pub fn recording_position(&self) -> Position {
        self.recording_position.load()
    }

    /// Takes effect for recordings that start after the message is drained
    pub fn set_recording_mode(&self, mode: RecordingMode) {
        self.scheduling.push(SchedulingMessage::SetRecordingMode(mode));
    }

    // ─────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────

    /// Start recording `pattern` at `at` for `length`
    ///
    /// Any other recording ends at the same timepoint.
    pub fn schedule_recording(
        &self,
        pattern: &Arc<Pattern>,
        length: Measure,
        at: Measure,
    ) -> EngineResult<()> {
        self.checked_channel(pattern.channel())?;
        self.length_ticks(length)?;
        self.push_timed(
            at,
            TimedAction::StartRecording {
                pattern: Arc::clone(pattern),
                length,
            },
        );
        Ok(())
    }

    /// Start looping `pattern` on its channel at `at`
    ///
    /// `length` stretches or squeezes one pass; `None` plays one sample
    /// per tick. Whatever was playing on the channel stops at `at`.
    pub fn schedule_playing(
        &self,
        pattern: &Arc<Pattern>,
        length: Option<Measure>,
        at: Measure,
    ) -> EngineResult<()> {
        self.checked_channel(pattern.channel())?;
        if let Some(length) = length {
            self.length_ticks(length)?;
        }
        self.push_timed(
            at,
            TimedAction::StartPlaying {
                pattern: Arc::clone(pattern),
                length,
            },
        );
        Ok(())
    }

    /// Stop recording or playing `pattern` at `at`
    pub fn schedule_stop(&self, pattern: &Arc<Pattern>, at: Measure) -> EngineResult<()> {
        self.checked_channel(pattern.channel())?;
        self.push_timed(
            at,
            TimedAction::Stop {
                pattern: Arc::clone(pattern),
            },
        );
        Ok(())
    }

    fn push_timed(&self, at: Measure, action: TimedAction) {
        log::debug!("Scheduling {:?} at {}", action, at);
        self.scheduling
            .push(SchedulingMessage::Timed(TimedRequest { at, action }));
    }

    // ─────────────────────────────────────────────────────────────
    // Listeners
    // ─────────────────────────────────────────────────────────────

    /// Subscribe to pattern status changes
    ///
    /// Held weakly: the listener stops receiving once the caller drops it.
    pub fn add_listener<L: PatternStatusListener + 'static>(&self, listener: &Arc<L>) {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn PatternStatusListener> = weak;
        self.listeners.add(weak);
    }
}

impl Drop for MotionEngine {
    fn drop(&mut self) {
        // The timer thread must be joined before the core (and with it the
        // egress worker) can be released
        self.clock.stop();
        log::info!("Motion engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::PatternStatus;
    use crate::output::NullSink;
    use crate::ui::ui_channel;

    fn engine() -> MotionEngine {
        let (ui, _ui_loop) = ui_channel();
        MotionEngine::new(EngineConfig::default(), Box::new(NullSink), ui)
    }

    #[test]
    fn test_channels_created_from_config() {
        let engine = engine();
        assert_eq!(engine.channel_count(), 8);
        assert_eq!(engine.channel(7).map(|c| c.index()), Some(7));
        assert!(engine.channel(8).is_none());
    }

    #[test]
    fn test_channel_out_of_range_rejected() {
        let engine = engine();
        assert_eq!(
            engine.create_pattern(8, "nope").unwrap_err(),
            EngineError::ChannelOutOfRange { channel: 8, count: 8 }
        );
        assert!(engine.set_channel_width(9, 0.5).is_err());
    }

    #[test]
    fn test_empty_length_rejected() {
        let engine = engine();
        let pattern = engine.create_pattern(0, "p").unwrap();
        assert_eq!(
            engine.schedule_recording(&pattern, Measure::ZERO, Measure::ZERO),
            Err(EngineError::EmptyLength)
        );
        assert_eq!(
            engine.schedule_playing(&pattern, Some(Measure::ZERO), Measure::ZERO),
            Err(EngineError::EmptyLength)
        );
    }

    #[test]
    fn test_generated_pattern_is_idle() {
        let engine = engine();
        let pattern = engine
            .generate_pattern(
                2,
                "orbit",
                &PatternGenerator::Static(Position::ORIGIN),
                Measure::bars(1),
            )
            .unwrap();
        assert_eq!(pattern.status(), PatternStatus::Idle);
        assert_eq!(pattern.len(), 512);
        assert_eq!(pattern.channel(), 2);
    }

    #[test]
    fn test_recording_position_input_never_fills_a_queue() {
        let engine = engine();
        for i in 0..(CONTROL_QUEUE_CAPACITY * 4) {
            engine.set_recording_position(Position::from_cartesian(i as f32, 0.0, 0.0));
        }
        assert_eq!(engine.recording_position().x(), (CONTROL_QUEUE_CAPACITY * 4 - 1) as f32);
        engine.release_recording_position();
        assert!(!engine.recording_position().is_valid());
    }

    #[test]
    fn test_timer_skips_ticks_while_core_is_held() {
        let engine = engine();
        let guard = engine.core.lock().unwrap();
        engine.start();
        std::thread::sleep(std::time::Duration::from_millis(30));
        // Joins the timer thread; would hang if the tick blocked on the core
        engine.stop();
        drop(guard);
        assert!(engine.clock().now().to_ticks(4) > 0);
    }

    #[test]
    fn test_pattern_ids_are_unique() {
        let engine = engine();
        let a = engine.create_pattern(0, "a").unwrap();
        let b = engine.create_pattern(0, "b").unwrap();
        assert_ne!(a.id(), b.id());
    }
}
