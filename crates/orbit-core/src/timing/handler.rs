//! Clock event handlers and their subscription handles
//!
//! The clock keeps only weak references to registered handlers. The caller
//! owns the strong side through an [`EventHandle`]; once every clone of the
//! handle is dropped, the next dispatch pass fails to upgrade the weak
//! reference and prunes the entry. No explicit unregister call exists.

use std::sync::{Arc, Weak};

use crossbeam::channel::Sender;

use super::Measure;
use crate::ui::UiSender;

/// Which clock boundary a handler listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEvent {
    /// Every tick
    Tick,
    /// Every beat boundary
    Beat,
    /// Every bar boundary
    Bar,
}

/// Where a handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Execution {
    /// Inline on the tempo-clock thread. Must be fast and must never block.
    TimerThread,
    /// Posted to the UI event loop with a snapshot of the measure
    UiThread,
}

pub(crate) type HandlerFn = dyn Fn(Measure) + Send + Sync + 'static;

pub(crate) struct RegisteredHandler {
    callback: Box<HandlerFn>,
    event: ClockEvent,
    execution: Execution,
}

impl RegisteredHandler {
    pub(crate) fn new(callback: Box<HandlerFn>, event: ClockEvent, execution: Execution) -> Self {
        Self {
            callback,
            event,
            execution,
        }
    }
}

/// Keeps a clock handler registered for as long as any clone is alive
#[derive(Clone)]
pub struct EventHandle {
    inner: Arc<RegisteredHandler>,
}

impl EventHandle {
    pub(crate) fn new(inner: Arc<RegisteredHandler>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RegisteredHandler> {
        Arc::downgrade(&self.inner)
    }

    pub fn event(&self) -> ClockEvent {
        self.inner.event
    }

    pub fn execution(&self) -> Execution {
        self.inner.execution
    }
}

impl std::fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandle")
            .field("event", &self.inner.event)
            .field("execution", &self.inner.execution)
            .finish()
    }
}

/// A pending insertion travelling through the registration queue
pub(crate) struct Registration {
    pub(crate) handler: Weak<RegisteredHandler>,
    /// Signalled once the timer thread has inserted the handler
    pub(crate) ack: Option<Sender<()>>,
}

/// Handler lists owned by the timer thread, one per event type
#[derive(Default)]
pub(crate) struct HandlerSet {
    tick: Vec<Weak<RegisteredHandler>>,
    beat: Vec<Weak<RegisteredHandler>>,
    bar: Vec<Weak<RegisteredHandler>>,
}

impl HandlerSet {
    pub(crate) fn insert(&mut self, registration: Registration) {
        let Registration { handler, ack } = registration;
        if let Some(strong) = handler.upgrade() {
            self.list_mut(strong.event).push(handler);
        }
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    /// Invoke all live handlers for `event`, pruning expired ones
    pub(crate) fn dispatch(&mut self, event: ClockEvent, measure: Measure, ui: &UiSender) {
        self.list_mut(event).retain(|weak| {
            let Some(handler) = weak.upgrade() else {
                return false;
            };
            match handler.execution {
                Execution::TimerThread => (handler.callback)(measure),
                Execution::UiThread => {
                    let weak = weak.clone();
                    ui.post(move || {
                        // The handle may have been dropped while the task was queued
                        if let Some(handler) = weak.upgrade() {
                            (handler.callback)(measure);
                        }
                    });
                }
            }
            true
        });
    }

    /// Registered entries, including expired ones not yet pruned
    pub(crate) fn len(&self) -> usize {
        self.tick.len() + self.beat.len() + self.bar.len()
    }

    fn list_mut(&mut self, event: ClockEvent) -> &mut Vec<Weak<RegisteredHandler>> {
        match event {
            ClockEvent::Tick => &mut self.tick,
            ClockEvent::Beat => &mut self.beat,
            ClockEvent::Bar => &mut self.bar,
        }
    }
}
