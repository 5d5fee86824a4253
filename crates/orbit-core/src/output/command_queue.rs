//! Asynchronous egress from the timer thread to a spatial backend
//!
//! The timer thread must never wait on a socket. [`AsyncCommandQueue`] puts
//! a lock-free `rtrb` ring between the two: the engine pushes commands from
//! the tick and unparks the `spatial-egress` worker, which drains the ring
//! and performs the (possibly blocking) sink calls.
//!
//! ```text
//! tempo-clock ──push──► [ring] ──drain──► spatial-egress ──► SpatialSink
//!              unpark ─────────────────────►
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::sync::{Parker, Unparker};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use super::sink::{SinkError, SpatialSink};
use crate::geometry::Position;

/// A parameter update for one output channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialCommand {
    Position { channel: usize, position: Position },
    Width { channel: usize, width: f32 },
    AmbisonicsOrder { channel: usize, order: u32 },
}

impl SpatialCommand {
    pub fn channel(&self) -> usize {
        match *self {
            SpatialCommand::Position { channel, .. }
            | SpatialCommand::Width { channel, .. }
            | SpatialCommand::AmbisonicsOrder { channel, .. } => channel,
        }
    }

    fn apply(self, sink: &mut dyn SpatialSink) -> Result<(), SinkError> {
        match self {
            SpatialCommand::Position { channel, position } => sink.send_position(channel, position),
            SpatialCommand::Width { channel, width } => sink.send_width(channel, width),
            SpatialCommand::AmbisonicsOrder { channel, order } => {
                sink.send_ambisonics_order(channel, order)
            }
        }
    }
}

/// Single-producer command queue with a dedicated egress worker
pub struct AsyncCommandQueue {
    producer: Producer<SpatialCommand>,
    unparker: Unparker,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    capacity: usize,
}

impl AsyncCommandQueue {
    /// Spawn the egress worker around `sink`
    pub fn new(sink: Box<dyn SpatialSink>, capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        let parker = Parker::new();
        let unparker = parker.unparker().clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);

        let worker = thread::Builder::new()
            .name("spatial-egress".to_string())
            .spawn(move || egress_loop(consumer, sink, parker, worker_shutdown))
            .expect("Failed to spawn spatial egress thread");

        Self {
            producer,
            unparker,
            shutdown,
            worker: Some(worker),
            capacity,
        }
    }

    pub fn send_position(&mut self, channel: usize, position: Position) {
        self.push(SpatialCommand::Position { channel, position });
    }

    pub fn send_width(&mut self, channel: usize, width: f32) {
        self.push(SpatialCommand::Width { channel, width });
    }

    pub fn send_ambisonics_order(&mut self, channel: usize, order: u32) {
        self.push(SpatialCommand::AmbisonicsOrder { channel, order });
    }

    /// Enqueue a command and wake the worker
    ///
    /// # Panics
    ///
    /// When the ring is full. Callers that can fall behind the worker use
    /// [`try_push`](Self::try_push) instead.
    pub fn push(&mut self, command: SpatialCommand) {
        if !self.try_push(command) {
            panic!(
                "spatial command queue overflow: more than {} pending commands",
                self.capacity
            );
        }
    }

    /// Enqueue a command unless the ring is full; wakes the worker either way
    pub fn try_push(&mut self, command: SpatialCommand) -> bool {
        let pushed = !matches!(self.producer.push(command), Err(PushError::Full(_)));
        self.unparker.unpark();
        pushed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for AsyncCommandQueue {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.unparker.unpark();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Spatial egress thread panicked");
            }
        }
    }
}

fn egress_loop(
    mut consumer: Consumer<SpatialCommand>,
    mut sink: Box<dyn SpatialSink>,
    parker: Parker,
    shutdown: Arc<AtomicBool>,
) {
    log::info!("Spatial egress thread started ({})", sink.name());
    loop {
        // Read the flag before draining so commands pushed ahead of the
        // shutdown request are still delivered
        let stopping = shutdown.load(Ordering::Acquire);

        let available = consumer.slots();
        if available > 0 {
            if let Ok(chunk) = consumer.read_chunk(available) {
                for command in chunk {
                    if let Err(e) = command.apply(sink.as_mut()) {
                        log::warn!(
                            "{} rejected command for channel {}: {}",
                            sink.name(),
                            command.channel(),
                            e
                        );
                    }
                }
            }
        }

        if stopping {
            break;
        }
        parker.park();
    }
    log::info!("Spatial egress thread stopped");
}
