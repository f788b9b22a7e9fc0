//! The byte-oriented two-party bus joining nodes to the master, and its reserved constants.
//!
//! The master addresses nodes: it writes to an address, or requests bytes from it. A node listens at exactly one
//! address at a time. Until negotiation hands it a unique address, every node listens at [`BOOTSTRAP_ADDRESS`], which
//! only ever holds one announcing node thanks to the daisy-chained ready signals.

use core::fmt::Debug;

/// Address of the bus master.
pub const MASTER_ADDRESS: u8 = 0;

/// Address unaddressed nodes listen at while announcing themselves.
pub const BOOTSTRAP_ADDRESS: u8 = 0xFE;

/// Broadcast by the master to release every connected node into runtime.
pub const ENGAGE_TOKEN: [u8; 3] = *b"###";

/// Size of the capability identifier a node announces.
pub const IDENTIFIER_SIZE: usize = 2;

/// Fills every byte of a reply the node did not supply. An undriven I2C data line reads the same.
pub const IDLE_BYTE: u8 = 0xFF;

/// What a read at the bootstrap address yields when no node is announcing.
pub const NO_ANNOUNCEMENT: u16 = u16::from_be_bytes([IDLE_BYTE; IDENTIFIER_SIZE]);

/// A node's side of the bus. Writes addressed to the node are buffered by the driver until read.
///
/// Requests from the master are answered separately through [`Node::on_request`](crate::node::Node::on_request), which
/// the driver calls on the node that owns it.
pub trait NodeBus {
    /// Starts answering at `address`, replacing any previous address.
    fn listen(&mut self, address: u8);

    /// Returns the next byte the master wrote to this node, if one is available.
    fn receive(&mut self) -> Option<u8>;

    /// Discards everything received so far.
    fn clear(&mut self) {
        while self.receive().is_some() {}
    }
}

/// The master's side of the bus.
pub trait MasterBus {
    /// Transport failure, e.g. no node acknowledged the address.
    type Error: Debug;

    /// Writes `bytes` to the node listening at `address`.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Asks the node listening at `address` for up to `buffer.len()` bytes. Returns how many it supplied.
    ///
    /// Transports that cannot tell may report the whole buffer; bytes the node did not supply then read as
    /// [`IDLE_BYTE`].
    fn request(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}
