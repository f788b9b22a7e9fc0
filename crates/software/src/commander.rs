//! The event-aggregation and addressing facade a node presents to the bus.
//!
//! A [`Commander`] owns a node's peripherals and the queue their events collect in. Whoever polls the node, be it the
//! bus (for a remote node) or the controller directly (for peripherals attached to the master), takes the whole queue
//! at once with [`Commander::drain`].

use crate::{
    board::Board,
    error::CapacityError,
    event::RawEvent,
    interface::{Interface, InterfaceKind, Peripheral, Sampler},
};
use embassy_time::Instant;
use num_traits::ToPrimitive;
use tinyvec::ArrayVec;

/// Number of events a commander holds between two drains.
pub const QUEUE_CAPACITY: usize = 32;

/// Number of peripherals a single commander can host.
pub const MAX_INTERFACES: usize = 8;

/// Pending events, oldest first.
pub type EventQueue = ArrayVec<[RawEvent; QUEUE_CAPACITY]>;

/// Appends `event` to `queue`, dropping it with a warning if the queue is full.
pub fn push_event(queue: &mut EventQueue, event: RawEvent) {
    if queue.try_push(event).is_some() {
        warn!("event queue full, dropping event tagged {}", event.tag());
    }
}

/// A node's set of peripherals and the events they have produced since the last drain.
#[derive(Debug)]
pub struct Commander {
    address: u8,
    local: bool,
    connected: bool,
    interfaces: heapless::Vec<Peripheral, MAX_INTERFACES>,
    pending: EventQueue,
}

impl Commander {
    /// Constructs a commander for peripherals wired to the bus master itself. It is connected from the start.
    pub fn local() -> Self {
        Self {
            address: 0,
            local: true,
            connected: true,
            interfaces: heapless::Vec::new(),
            pending: EventQueue::new(),
        }
    }

    /// Constructs a commander for a node that still has to negotiate its bus address.
    pub fn remote() -> Self {
        Self {
            connected: false,
            local: false,
            ..Self::local()
        }
    }

    /// Adds a peripheral. Peripherals keep the order they were added in.
    pub fn add(&mut self, interface: impl Into<Peripheral>) -> Result<(), CapacityError> {
        self.interfaces.push(interface.into()).map_err(|_| CapacityError)
    }

    /// Queues an event for the next drain.
    pub fn enqueue(&mut self, event: RawEvent) {
        push_event(&mut self.pending, event);
    }

    /// Hands over every pending event and leaves the queue empty.
    pub fn drain(&mut self) -> EventQueue {
        core::mem::take(&mut self.pending)
    }

    /// Number of events waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Getter.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Setter.
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Whether the commander's peripherals are wired to the bus master.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Whether the commander has an address to report events under.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Turns the commander into a remote one that still has to negotiate its address.
    pub fn detach(&mut self) {
        self.local = false;
        self.connected = false;
    }

    /// Marks the address negotiation as complete.
    pub fn set_connected(&mut self) {
        self.connected = true;
    }

    /// The peripherals, in the order they were added.
    pub fn interfaces(&self) -> &[Peripheral] {
        &self.interfaces
    }

    /// Returns the peripheral at `index`, if any.
    pub fn interface_mut(&mut self, index: usize) -> Option<&mut Peripheral> {
        self.interfaces.get_mut(index)
    }

    /// Whether any of the peripherals is an octave.
    pub fn has_octave(&self) -> bool {
        self.interfaces.iter().any(|i| i.kind() == InterfaceKind::Octave)
    }

    /// The identifier a node announces during negotiation: the dominant interface kind in the high byte, the
    /// interface count in the low byte.
    pub fn capability(&self) -> u16 {
        let kind = if self.has_octave() {
            InterfaceKind::Octave.to_u8()
        } else {
            self.interfaces.first().and_then(|i| i.kind().to_u8())
        };
        u16::from_be_bytes([kind.unwrap_or(0), self.interfaces.len() as u8])
    }

    /// Samples every peripheral once, queueing the resulting events.
    pub fn sample(&mut self, board: &mut dyn Board, now: Instant) {
        let Self {
            address,
            interfaces,
            pending,
            ..
        } = self;
        let mut sampler = Sampler::new(board, now, *address, pending);
        for interface in interfaces.iter_mut() {
            interface.sample(&mut sampler);
        }
    }
}
