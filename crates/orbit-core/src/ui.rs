//! Marshalling work onto a single UI thread
//!
//! The tempo clock and the motion engine never call UI code from the timer
//! thread. Instead they post boxed tasks through a [`UiSender`]; whichever
//! thread owns the [`UiEventLoop`] runs them in order. A host application
//! pumps the loop from its own event loop or from a periodic tick timer.

use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

/// A unit of work to run on the UI thread
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected sender / event loop pair
pub fn ui_channel() -> (UiSender, UiEventLoop) {
    let (tx, rx) = channel::unbounded();
    (UiSender { tx }, UiEventLoop { rx })
}

/// Posting side, cloneable and usable from any thread (including the timer)
#[derive(Clone)]
pub struct UiSender {
    tx: Sender<UiTask>,
}

impl UiSender {
    /// Queue a task for the UI thread (never blocks)
    ///
    /// Returns false when the event loop has been dropped; the task is
    /// discarded in that case.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// Receiving side, owned by the UI thread
pub struct UiEventLoop {
    rx: Receiver<UiTask>,
}

impl UiEventLoop {
    /// Run every task posted so far; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            count += 1;
        }
        count
    }

    /// Run tasks as they arrive until `duration` has elapsed
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut count = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(task) => {
                    task();
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) => return count,
                Err(RecvTimeoutError::Disconnected) => return count,
            }
        }
    }

    /// Tasks waiting to run
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
