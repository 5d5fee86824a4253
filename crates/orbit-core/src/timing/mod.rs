//! Musical time: measures, tap tempo and the tempo clock

mod clock;
mod handler;
mod measure;
mod tempo;
mod timer;

pub use clock::TempoClock;
pub use handler::{ClockEvent, EventHandle, Execution};
pub use measure::Measure;
pub use tempo::TempoEstimator;
pub use timer::TIMER_INTERVAL;

pub(crate) use timer::ClockShared;
