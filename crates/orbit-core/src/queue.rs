//! Lock-free control queues between user threads and the tempo-clock thread
//!
//! Every control path in Orbit (handler registration, pattern scheduling)
//! uses the same shape: a fixed-capacity `rtrb` ring buffer with one
//! consumer that never takes a lock, and a producer side wrapped in a mutex
//! so several user threads can share it. The mutex only serialises producers
//! among themselves; the consumer reads the already-written region without
//! ever touching it.
//!
//! # Overflow
//!
//! The queues do not apply backpressure. Control messages come in small
//! bursts and [`CONTROL_QUEUE_CAPACITY`] covers them generously; filling a
//! queue is a programming error and panics.
//!
//! # Usage
//!
//! ```ignore
//! let (tx, mut rx) = control_queue::<u32>(CONTROL_QUEUE_CAPACITY);
//!
//! // Any thread
//! tx.push(7);
//!
//! // Consumer thread (never blocks)
//! rx.drain(|value| println!("{}", value));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

pub use crate::types::CONTROL_QUEUE_CAPACITY;

/// Create a new control queue (sender/receiver pair)
pub fn control_queue<T>(capacity: usize) -> (ControlSender<T>, ControlReceiver<T>) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        ControlSender {
            producer: Arc::new(Mutex::new(producer)),
            capacity,
        },
        ControlReceiver { consumer },
    )
}

/// Producer side of a control queue, shareable between threads
pub struct ControlSender<T> {
    producer: Arc<Mutex<Producer<T>>>,
    capacity: usize,
}

impl<T> Clone for ControlSender<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            capacity: self.capacity,
        }
    }
}

impl<T> ControlSender<T> {
    /// Enqueue a message
    ///
    /// # Panics
    ///
    /// When the queue is full. Senders must keep bursts below the capacity.
    pub fn push(&self, value: T) {
        let mut producer = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(PushError::Full(_)) = producer.push(value) {
            panic!(
                "control queue overflow: more than {} pending messages",
                self.capacity
            );
        }
    }

    /// Free slots right now (racy by nature, for diagnostics)
    pub fn free_slots(&self) -> usize {
        self.producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer side of a control queue, owned by exactly one thread
pub struct ControlReceiver<T> {
    consumer: Consumer<T>,
}

impl<T> ControlReceiver<T> {
    /// Process every message written so far, in order
    ///
    /// The readable region may wrap around the end of the buffer; the read
    /// chunk covers both spans. Returns the number of messages handled.
    pub fn drain(&mut self, mut f: impl FnMut(T)) -> usize {
        let available = self.consumer.slots();
        if available == 0 {
            return 0;
        }
        match self.consumer.read_chunk(available) {
            Ok(chunk) => {
                for value in chunk {
                    f(value);
                }
                available
            }
            Err(_) => 0,
        }
    }

    /// Messages waiting to be drained
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
