//! Pattern status listeners

use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::message::PatternStatusMessage;
use crate::ui::UiSender;

/// Receives pattern status changes on the UI thread
pub trait PatternStatusListener: Send + Sync {
    fn pattern_status_changed(&self, message: &PatternStatusMessage);
}

/// Weakly held listeners, notified through the UI dispatcher
///
/// Notifications never run on the timer thread. A listener dropped while a
/// notification is queued is skipped at delivery.
#[derive(Clone)]
pub(crate) struct ListenerRegistry {
    listeners: Arc<Mutex<Vec<Weak<dyn PatternStatusListener>>>>,
    ui: UiSender,
}

impl ListenerRegistry {
    pub(crate) fn new(ui: UiSender) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            ui,
        }
    }

    pub(crate) fn add(&self, listener: Weak<dyn PatternStatusListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Post `message` to every live listener (fire and forget)
    pub(crate) fn notify(&self, message: PatternStatusMessage) {
        let listeners = Arc::clone(&self.listeners);
        self.ui.post(move || {
            // Snapshot first so a listener may register others from its callback
            let live: Vec<Arc<dyn PatternStatusListener>> = {
                let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
                listeners.retain(|weak| weak.strong_count() > 0);
                listeners.iter().filter_map(Weak::upgrade).collect()
            };
            for listener in live {
                listener.pattern_status_changed(&message);
            }
        });
    }
}
