//! Radio receive ring: interrupt-context producer, tick-context consumer.
//!
//! The radio driver's receive callback runs outside the control loop.  It
//! only copies the frame into a fixed-capacity single-producer /
//! single-consumer queue; all registry and bridge logic runs later, when the
//! tick drains the queue.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ radio rx cb  │────▶│ heapless::spsc   │────▶│ tick: drain  │
//! │ (producer)   │     │ (lock-free ring) │     │ (consumer)   │
//! └──────────────┘     └──────────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use heapless::spsc::{Consumer, Producer, Queue};

use crate::registry::MacAddress;

/// ESP-NOW payload limit.
pub const MAX_FRAME_LEN: usize = 250;

/// Ring slots.  `heapless::spsc::Queue<_, N>` holds `N - 1` items.
pub const RX_QUEUE_SLOTS: usize = 16;

/// One received radio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    pub src: MacAddress,
    pub data: heapless::Vec<u8, MAX_FRAME_LEN>,
}

impl RxFrame {
    /// `None` if `data` exceeds the radio payload limit.
    pub fn new(src: MacAddress, data: &[u8]) -> Option<Self> {
        let data = heapless::Vec::from_slice(data).ok()?;
        Some(Self { src, data })
    }
}

/// Producer half, owned by the receive callback.
pub struct RxProducer {
    inner: Producer<'static, RxFrame, RX_QUEUE_SLOTS>,
    dropped: Arc<AtomicU32>,
}

/// Consumer half, owned by the tick.
pub struct RxConsumer {
    inner: Consumer<'static, RxFrame, RX_QUEUE_SLOTS>,
    dropped: Arc<AtomicU32>,
}

impl RxConsumer {
    pub fn dequeue(&mut self) -> Option<RxFrame> {
        self.inner.dequeue()
    }

    /// Read and reset this ring's drop counter.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

/// Allocate a ring for the lifetime of the program and split it.
///
/// Called once per radio instance at boot.
pub fn rx_channel() -> (RxProducer, RxConsumer) {
    let queue: &'static mut Queue<RxFrame, RX_QUEUE_SLOTS> = Box::leak(Box::new(Queue::new()));
    let (producer, consumer) = queue.split();
    let dropped = Arc::new(AtomicU32::new(0));
    (
        RxProducer {
            inner: producer,
            dropped: Arc::clone(&dropped),
        },
        RxConsumer {
            inner: consumer,
            dropped,
        },
    )
}

/// Enqueue from the receive callback.  Lock-free; never blocks.
/// Returns `false` if the frame was dropped.
pub fn enqueue_frame(producer: &mut RxProducer, src: MacAddress, data: &[u8]) -> bool {
    let queued = RxFrame::new(src, data).is_some_and(|frame| producer.inner.enqueue(frame).is_ok());
    if !queued {
        producer.dropped.fetch_add(1, Ordering::Relaxed);
    }
    queued
}
