//! The public tempo clock
//!
//! [`TempoClock`] is the user-facing half of the clock. It owns the timer
//! thread while the clock runs and the parked [`TimerCore`] while it is
//! stopped, and forwards handler registrations through a control queue.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel;

use super::handler::{ClockEvent, EventHandle, Execution, RegisteredHandler, Registration};
use super::timer::{ClockShared, TimerCore};
use super::{Measure, TempoEstimator};
use crate::queue::{control_queue, ControlSender, CONTROL_QUEUE_CAPACITY};
use crate::types::{DEFAULT_BEATS_PER_BAR, DEFAULT_BPM};
use crate::ui::UiSender;

enum TimerSlot {
    Parked(TimerCore),
    Running {
        stop: Arc<AtomicBool>,
        thread: JoinHandle<TimerCore>,
    },
    /// The timer thread panicked; the core is gone
    Lost,
}

/// Musical clock driving ticks, beats and bars from a dedicated thread
///
/// Handlers are registered with
/// [`schedule_event_handler_addition`](Self::schedule_event_handler_addition)
/// and stay registered for as long as the returned [`EventHandle`] lives.
pub struct TempoClock {
    shared: Arc<ClockShared>,
    registrations: ControlSender<Registration>,
    timer: Mutex<TimerSlot>,
    estimator: Mutex<TempoEstimator>,
}

impl TempoClock {
    pub fn new(ui: UiSender) -> Self {
        Self::with_tempo(ui, DEFAULT_BPM, DEFAULT_BEATS_PER_BAR)
    }

    pub fn with_tempo(ui: UiSender, bpm: f64, beats_per_bar: i32) -> Self {
        let shared = Arc::new(ClockShared::new(bpm, beats_per_bar));
        let (registrations, rx) = control_queue(CONTROL_QUEUE_CAPACITY);
        let core = TimerCore::new(Arc::clone(&shared), rx, ui);
        Self {
            shared,
            registrations,
            timer: Mutex::new(TimerSlot::Parked(core)),
            estimator: Mutex::new(TempoEstimator::new()),
        }
    }

    /// Start the timer thread
    ///
    /// The first tick after a start is always the downbeat 0.0.0.
    pub fn start(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *slot, TimerSlot::Lost) {
            TimerSlot::Parked(mut core) => {
                self.shared.request_reset();
                core.rewind();
                let stop = Arc::new(AtomicBool::new(false));
                let thread_stop = Arc::clone(&stop);
                let thread = thread::Builder::new()
                    .name("tempo-clock".to_string())
                    .spawn(move || core.run(thread_stop))
                    .expect("Failed to spawn tempo clock thread");
                self.shared.set_running(true);
                log::info!("Tempo clock started at {:.2} BPM", self.shared.bpm());
                *slot = TimerSlot::Running { stop, thread };
            }
            running @ TimerSlot::Running { .. } => {
                log::debug!("Tempo clock already running");
                *slot = running;
            }
            TimerSlot::Lost => {
                log::error!("Tempo clock cannot start: timer thread was lost");
            }
        }
    }

    /// Stop the timer thread and wait for it to exit
    pub fn stop(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut *slot, TimerSlot::Lost) {
            TimerSlot::Running { stop, thread } => {
                stop.store(true, Ordering::Release);
                match thread.join() {
                    Ok(core) => *slot = TimerSlot::Parked(core),
                    Err(_) => log::error!("Tempo clock thread panicked"),
                }
                self.shared.set_running(false);
            }
            other => *slot = other,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Re-zero the measure; the next tick is the downbeat 0.0.0
    pub fn reset(&self) {
        self.shared.request_reset();
    }

    /// Current position, readable from any thread
    pub fn now(&self) -> Measure {
        self.shared.now()
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.shared.bpm()
    }

    /// Set the tempo (clamped to the supported range)
    pub fn set_tempo_bpm(&self, bpm: f64) {
        self.shared.set_bpm(bpm);
        log::debug!("Tempo set to {:.2} BPM", self.shared.bpm());
    }

    pub fn beats_per_bar(&self) -> i32 {
        self.shared.beats_per_bar()
    }

    pub fn set_beats_per_bar(&self, beats: i32) {
        self.shared.set_beats_per_bar(beats);
    }

    /// Feed a tap-tempo tap; returns true when the tempo was updated
    pub fn tap(&self, timestamp: Instant) -> bool {
        let estimate = self
            .estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tap(timestamp);
        match estimate {
            Some(bpm) => {
                self.set_tempo_bpm(bpm);
                true
            }
            None => false,
        }
    }

    /// Next bar boundary at or after `measure`
    pub fn next_down_beat(measure: Measure) -> Measure {
        measure.next_down_beat()
    }

    /// Register a handler for `event`
    ///
    /// The handler runs until the returned handle (and all its clones) is
    /// dropped. With `wait_for_ack` the call blocks until the timer thread
    /// has inserted the handler, so no event after the return is missed.
    /// Without it the handler becomes active at the next timer wake.
    ///
    /// Must not be called from a [`Execution::TimerThread`] handler with
    /// `wait_for_ack` set; the timer thread would wait on itself.
    pub fn schedule_event_handler_addition(
        &self,
        handler: impl Fn(Measure) + Send + Sync + 'static,
        event: ClockEvent,
        execution: Execution,
        wait_for_ack: bool,
    ) -> EventHandle {
        let handle = EventHandle::new(Arc::new(RegisteredHandler::new(
            Box::new(handler),
            event,
            execution,
        )));

        if !wait_for_ack {
            self.registrations.push(Registration {
                handler: handle.downgrade(),
                ack: None,
            });
            return handle;
        }

        let (ack_tx, ack_rx) = channel::bounded(1);
        let mut slot = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        self.registrations.push(Registration {
            handler: handle.downgrade(),
            ack: Some(ack_tx),
        });
        let running = match &mut *slot {
            // No thread to acknowledge; insert directly
            TimerSlot::Parked(core) => {
                core.drain_registrations();
                false
            }
            TimerSlot::Running { .. } => true,
            TimerSlot::Lost => false,
        };
        drop(slot);
        if running && ack_rx.recv().is_err() {
            log::warn!("Tempo clock exited before acknowledging handler");
        }
        handle
    }

    pub(crate) fn shared(&self) -> &Arc<ClockShared> {
        &self.shared
    }
}

impl Drop for TempoClock {
    fn drop(&mut self) {
        self.stop();
    }
}
