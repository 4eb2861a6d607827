//! Fixed-capacity message rings between the network and hardware sides
//!
//! Each direction is a lock-free single-producer/single-consumer ring. The
//! network side owns the inbound producer and the outbound consumer, the
//! hardware side the opposite ends.

use heapless::spsc::{Consumer, Producer, Queue};

use badgelink_protocol::ApplicationMessage;

/// Messages each direction holds
pub const BRIDGE_CAPACITY: usize = 32;

// heapless rings keep one slot empty
const RING_SIZE: usize = BRIDGE_CAPACITY + 1;

type Ring = Queue<ApplicationMessage, RING_SIZE>;

/// Enqueue on a full ring; the rejected message is handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull(pub ApplicationMessage);

/// Storage for both directions
///
/// Lives in a static and is split exactly once.
pub struct Bridge {
    inbound: Ring,
    outbound: Ring,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub const fn new() -> Self {
        Self {
            inbound: Queue::new(),
            outbound: Queue::new(),
        }
    }

    /// Hand out the two ends
    pub fn split(&mut self) -> (NetworkPort<'_>, HardwarePort<'_>) {
        let (inbound_tx, inbound_rx) = self.inbound.split();
        let (outbound_tx, outbound_rx) = self.outbound.split();

        (
            NetworkPort {
                inbound: Sender {
                    producer: inbound_tx,
                },
                outbound: Receiver {
                    consumer: outbound_rx,
                },
            },
            HardwarePort {
                outbound: Sender {
                    producer: outbound_tx,
                },
                inbound: Receiver {
                    consumer: inbound_rx,
                },
            },
        )
    }
}

/// Producing end of one direction
pub struct Sender<'a> {
    producer: Producer<'a, ApplicationMessage, RING_SIZE>,
}

impl Sender<'_> {
    /// Enqueue without waiting
    ///
    /// On a full ring the contents are left untouched and the message comes
    /// back inside the error.
    pub fn try_send(&mut self, message: ApplicationMessage) -> Result<(), QueueFull> {
        self.producer.enqueue(message).map_err(QueueFull)
    }

    pub fn is_full(&self) -> bool {
        !self.producer.ready()
    }

    /// Number of messages currently queued
    pub fn len(&self) -> usize {
        self.producer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consuming end of one direction
pub struct Receiver<'a> {
    consumer: Consumer<'a, ApplicationMessage, RING_SIZE>,
}

impl<'a> Receiver<'a> {
    /// Dequeue without waiting
    pub fn try_recv(&mut self) -> Option<ApplicationMessage> {
        self.consumer.dequeue()
    }

    /// Iterator that dequeues until the ring is empty
    pub fn drain(&mut self) -> Drain<'_, 'a> {
        Drain { receiver: self }
    }

    /// Drop everything queued, returning how many messages were discarded
    pub fn discard_all(&mut self) -> usize {
        self.drain().count()
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Draining iterator returned by [`Receiver::drain`]
pub struct Drain<'r, 'a> {
    receiver: &'r mut Receiver<'a>,
}

impl Iterator for Drain<'_, '_> {
    type Item = ApplicationMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.try_recv()
    }
}

/// Ends held by the connection session
pub struct NetworkPort<'a> {
    /// Decoded client commands, toward the hardware
    pub inbound: Sender<'a>,
    /// Messages to encode for the client
    pub outbound: Receiver<'a>,
}

/// Ends held by the hardware event loop
pub struct HardwarePort<'a> {
    /// Events and reports, toward the client
    pub outbound: Sender<'a>,
    /// Client commands to apply
    pub inbound: Receiver<'a>,
}
