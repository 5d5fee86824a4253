//! The tempo-clock thread
//!
//! [`TimerCore`] owns everything the timer thread touches: the consumer side
//! of the registration queue, the handler lists and the running measure.
//! It is moved into the thread on start and handed back on stop, so nothing
//! here sits behind a lock while the clock runs.
//!
//! Each wake (every [`TIMER_INTERVAL`]) the core drains pending handler
//! registrations, then emits as many logical ticks as the elapsed wall time
//! covers. If the OS delays a wake, several ticks fire back to back rather
//! than musical time drifting behind real time.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::handler::{ClockEvent, HandlerSet, Registration};
use super::Measure;
use crate::queue::ControlReceiver;
use crate::types::{MAX_BPM, MIN_BPM, TICKS_PER_BEAT};
use crate::ui::UiSender;

/// Period of the timer thread
pub const TIMER_INTERVAL: Duration = Duration::from_millis(1);

/// Clock parameters shared between the public API and the timer thread
///
/// All fields are atomics so any thread can read or write them.
pub(crate) struct ClockShared {
    bpm_bits: AtomicU64,
    beats_per_bar: AtomicI32,
    /// Current measure packed as bar:32 | beat:16 | tick:16
    now: AtomicU64,
    reset_requested: AtomicBool,
    running: AtomicBool,
}

impl ClockShared {
    pub(crate) fn new(bpm: f64, beats_per_bar: i32) -> Self {
        Self {
            bpm_bits: AtomicU64::new(bpm.clamp(MIN_BPM, MAX_BPM).to_bits()),
            beats_per_bar: AtomicI32::new(beats_per_bar.max(1)),
            now: AtomicU64::new(pack(Measure::ZERO)),
            reset_requested: AtomicBool::new(true),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set_bpm(&self, bpm: f64) {
        self.bpm_bits
            .store(bpm.clamp(MIN_BPM, MAX_BPM).to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn beats_per_bar(&self) -> i32 {
        self.beats_per_bar.load(Ordering::Relaxed)
    }

    pub(crate) fn set_beats_per_bar(&self, beats: i32) {
        self.beats_per_bar.store(beats.max(1), Ordering::Relaxed);
    }

    pub(crate) fn now(&self) -> Measure {
        unpack(self.now.load(Ordering::Acquire))
    }

    pub(crate) fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Wall-clock length of one tick at the current tempo
    pub(crate) fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(60.0 / (self.bpm() * TICKS_PER_BEAT as f64))
    }

    fn publish(&self, measure: Measure) {
        self.now.store(pack(measure), Ordering::Release);
    }
}

fn pack(m: Measure) -> u64 {
    ((m.bar as u32 as u64) << 32) | ((m.beat as u16 as u64) << 16) | (m.tick as u16 as u64)
}

fn unpack(v: u64) -> Measure {
    Measure::new((v >> 32) as u32 as i32, (v >> 16) as u16 as i32, v as u16 as i32)
}

/// State owned by the timer thread
pub(crate) struct TimerCore {
    shared: Arc<ClockShared>,
    registrations: ControlReceiver<Registration>,
    handlers: HandlerSet,
    ui: UiSender,
    measure: Measure,
    /// Instant of the last emitted logical tick
    last_tick: Option<Instant>,
}

impl TimerCore {
    pub(crate) fn new(
        shared: Arc<ClockShared>,
        registrations: ControlReceiver<Registration>,
        ui: UiSender,
    ) -> Self {
        Self {
            shared,
            registrations,
            handlers: HandlerSet::default(),
            ui,
            measure: Measure::ZERO,
            last_tick: None,
        }
    }

    /// Thread body: tick until `stop` is raised, then hand the core back
    pub(crate) fn run(mut self, stop: Arc<AtomicBool>) -> Self {
        log::info!("Tempo clock thread started");
        while !stop.load(Ordering::Acquire) {
            self.process(Instant::now());
            thread::sleep(TIMER_INTERVAL);
        }
        // Acknowledge registrations that raced with the stop request
        self.drain_registrations();
        log::info!("Tempo clock thread stopped at {}", self.measure);
        self
    }

    /// Forget the reference instant so a restart does not catch up on the pause
    pub(crate) fn rewind(&mut self) {
        self.last_tick = None;
    }

    pub(crate) fn drain_registrations(&mut self) {
        let handlers = &mut self.handlers;
        self.registrations.drain(|registration| handlers.insert(registration));
    }

    /// One timer wake; returns the number of logical ticks emitted
    pub(crate) fn process(&mut self, now: Instant) -> u64 {
        self.drain_registrations();

        if self.shared.reset_requested.swap(false, Ordering::AcqRel) {
            self.measure = Measure::ZERO;
            self.last_tick = Some(now);
            self.shared.publish(self.measure);
            self.fire(ClockEvent::Tick);
            self.fire(ClockEvent::Beat);
            self.fire(ClockEvent::Bar);
            return 1;
        }

        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return 0;
        };

        let tick_secs = self.shared.tick_duration().as_secs_f64();
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        let ticks = (elapsed / tick_secs).floor() as u64;
        if ticks == 0 {
            return 0;
        }
        if ticks > 1 {
            log::trace!("Tempo clock catching up {} ticks", ticks);
        }

        self.last_tick = Some(last + Duration::from_secs_f64(tick_secs * ticks as f64));
        for _ in 0..ticks {
            self.advance();
        }
        ticks
    }

    fn advance(&mut self) {
        let beats_per_bar = self.shared.beats_per_bar();
        let mut beat_boundary = false;
        let mut bar_boundary = false;

        self.measure.tick += 1;
        if self.measure.tick >= TICKS_PER_BEAT {
            self.measure.tick = 0;
            self.measure.beat += 1;
            beat_boundary = true;
            if self.measure.beat >= beats_per_bar {
                self.measure.beat = 0;
                self.measure.bar += 1;
                bar_boundary = true;
            }
        }
        self.shared.publish(self.measure);

        self.fire(ClockEvent::Tick);
        if beat_boundary {
            self.fire(ClockEvent::Beat);
        }
        if bar_boundary {
            self.fire(ClockEvent::Bar);
        }
    }

    fn fire(&mut self, event: ClockEvent) {
        self.handlers.dispatch(event, self.measure, &self.ui);
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{control_queue, ControlSender, CONTROL_QUEUE_CAPACITY};
    use crate::timing::handler::{EventHandle, Execution, RegisteredHandler};
    use crate::ui::ui_channel;
    use std::sync::Mutex;

    struct Fixture {
        core: TimerCore,
        shared: Arc<ClockShared>,
        tx: ControlSender<Registration>,
    }

    fn fixture() -> Fixture {
        let (ui, _) = ui_channel();
        let shared = Arc::new(ClockShared::new(120.0, 4));
        let (tx, rx) = control_queue(CONTROL_QUEUE_CAPACITY);
        Fixture {
            core: TimerCore::new(Arc::clone(&shared), rx, ui),
            shared,
            tx,
        }
    }

    fn recorder(
        tx: &ControlSender<Registration>,
        event: ClockEvent,
    ) -> (EventHandle, Arc<Mutex<Vec<Measure>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = EventHandle::new(Arc::new(RegisteredHandler::new(
            Box::new(move |m| sink.lock().unwrap().push(m)),
            event,
            Execution::TimerThread,
        )));
        tx.push(Registration { handler: handle.downgrade(), ack: None });
        (handle, seen)
    }

    #[test]
    fn test_pack_roundtrip() {
        for m in [Measure::ZERO, Measure::new(123, 3, 127), Measure::new(70_000, 11, 64)] {
            assert_eq!(unpack(pack(m)), m);
        }
    }

    #[test]
    fn test_first_wake_fires_downbeat() {
        let mut f = fixture();
        let (_t, ticks) = recorder(&f.tx, ClockEvent::Tick);
        let (_b, bars) = recorder(&f.tx, ClockEvent::Bar);

        assert_eq!(f.core.process(Instant::now()), 1);
        assert_eq!(*ticks.lock().unwrap(), vec![Measure::ZERO]);
        assert_eq!(*bars.lock().unwrap(), vec![Measure::ZERO]);
        assert_eq!(f.shared.now(), Measure::ZERO);
    }

    #[test]
    fn test_burst_catch_up_is_monotonic() {
        let mut f = fixture();
        let (_t, ticks) = recorder(&f.tx, ClockEvent::Tick);
        let (_b, beats) = recorder(&f.tx, ClockEvent::Beat);

        let start = Instant::now();
        f.core.process(start);
        let tick = f.shared.tick_duration();

        // A stalled timer: 300 ticks worth of time arrive in one wake
        let emitted = f.core.process(start + tick * 300 + tick / 2);
        assert_eq!(emitted, 300);

        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 301);
        for pair in ticks.windows(2) {
            assert_eq!(pair[1].to_ticks(4), pair[0].to_ticks(4) + 1);
            assert!(pair[1].is_canonical(4));
        }
        // Downbeat plus the two beat boundaries at ticks 128 and 256
        assert_eq!(
            *beats.lock().unwrap(),
            vec![Measure::ZERO, Measure::new(0, 1, 0), Measure::new(0, 2, 0)]
        );
    }

    #[test]
    fn test_sub_tick_wakes_do_not_drift() {
        let mut f = fixture();
        let start = Instant::now();
        f.core.process(start);
        let tick = f.shared.tick_duration();

        let mut total = 0;
        for i in 1..=1000u32 {
            total += f.core.process(start + tick * i / 3);
        }
        assert_eq!(total, 333);
        assert_eq!(f.shared.now(), Measure::from_ticks(333, 4));
    }

    #[test]
    fn test_bar_rollover_order() {
        let mut f = fixture();
        f.shared.set_beats_per_bar(2);
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for event in [ClockEvent::Bar, ClockEvent::Beat, ClockEvent::Tick] {
            let order = Arc::clone(&order);
            let handle = EventHandle::new(Arc::new(RegisteredHandler::new(
                Box::new(move |m| {
                    if m.tick == 0 && m.beat == 0 && m.bar == 1 {
                        order.lock().unwrap().push(event);
                    }
                }),
                event,
                Execution::TimerThread,
            )));
            f.tx.push(Registration { handler: handle.downgrade(), ack: None });
            handles.push(handle);
        }

        let start = Instant::now();
        f.core.process(start);
        let tick = f.shared.tick_duration();
        f.core.process(start + tick * (2 * TICKS_PER_BEAT as u32));

        assert_eq!(
            *order.lock().unwrap(),
            vec![ClockEvent::Tick, ClockEvent::Beat, ClockEvent::Bar]
        );
    }

    #[test]
    fn test_reset_rezeroes_measure() {
        let mut f = fixture();
        let (_b, bars) = recorder(&f.tx, ClockEvent::Bar);
        let start = Instant::now();
        f.core.process(start);
        let tick = f.shared.tick_duration();
        f.core.process(start + tick * 200);
        assert_eq!(f.shared.now(), Measure::new(0, 1, 72));

        f.shared.request_reset();
        f.core.process(start + tick * 201);
        assert_eq!(f.shared.now(), Measure::ZERO);
        assert_eq!(bars.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_expired_handlers_pruned_on_dispatch() {
        let mut f = fixture();
        let (handle, _seen) = recorder(&f.tx, ClockEvent::Tick);
        let start = Instant::now();
        f.core.process(start);
        assert_eq!(f.core.handler_count(), 1);

        drop(handle);
        f.core.process(start + f.shared.tick_duration());
        assert_eq!(f.core.handler_count(), 0);
    }
}
