//! The node side of bus negotiation and event relay.
//!
//! A node powers up holding its successor in the daisy chain back, waits for its predecessor to release it, then
//! announces its capability identifier at the bootstrap address. The master answers with a unique address; the node
//! moves there and releases its own successor. Once the master broadcasts the engage token every node samples its
//! peripherals and answers polls with batches of queued events.
//!
//! ```text
//! Off ──> Boot ──(ready in)──> Connect ──(address assigned)──> Wait ──("###")──> Runtime
//! ```

use crate::{
    board::Board,
    bus::{BOOTSTRAP_ADDRESS, ENGAGE_TOKEN, IDENTIFIER_SIZE, IDLE_BYTE, NodeBus},
    commander::{Commander, QUEUE_CAPACITY},
    error::CapacityError,
    event::MAX_WIRE_SIZE,
    state_machine::StateMachine,
};
use embassy_time::Instant;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

/// Largest batch a node hands over in one poll, in bytes.
pub const MAX_BATCH_SIZE: usize = QUEUE_CAPACITY * MAX_WIRE_SIZE;

/// Negotiation phases of a node.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeState {
    /// Not started.
    Off,
    /// Holding the successor back until the predecessor releases this node.
    Boot,
    /// Announcing at the bootstrap address and waiting for an address.
    Connect,
    /// Addressed; waiting for the master to finish discovering the chain.
    Wait,
    /// Sampling peripherals and answering polls.
    Runtime,
}

/// Everything the node's state machine operates on.
struct Link<B, I, O, D> {
    bus: B,
    ready_in: I,
    ready_out: O,
    board: D,
    commander: Commander,
    now: Instant,
    listening: bool,
    announce: bool,
    token: Vec<u8, 3>,
    batch: Vec<u8, MAX_BATCH_SIZE>,
    staged: bool,
}

impl<B, I, O, D> Link<B, I, O, D>
where
    B: NodeBus,
    I: InputPin,
    O: OutputPin,
    D: Board,
{
    fn power_up(&mut self) -> bool {
        true
    }

    fn hold_successor(&mut self) {
        if self.ready_out.set_low().is_err() {
            warn!("failed to hold the ready line");
        }
    }

    fn released(&mut self) -> bool {
        self.ready_in.is_high().unwrap_or(false)
    }

    fn announce_or_adopt(&mut self) {
        if !self.listening {
            self.bus.clear();
            self.bus.listen(BOOTSTRAP_ADDRESS);
            self.listening = true;
            self.announce = true;
            debug!("announcing {=u16:#x}", self.commander.capability());
            return;
        }
        if self.announce {
            return;
        }

        let Some(address) = self.bus.receive() else {
            return;
        };
        self.bus.listen(address);
        if self.ready_out.set_high().is_err() {
            warn!("failed to release the ready line");
        }
        self.commander.set_address(address);
        self.commander.set_connected();
        info!("assigned address {}", address);
    }

    fn connected(&mut self) -> bool {
        self.commander.is_connected()
    }

    fn engaged(&mut self) -> bool {
        while let Some(byte) = self.bus.receive() {
            // capacity equals the token length and the buffer is cleared once full
            let _ = self.token.push(byte);
            if self.token.len() < ENGAGE_TOKEN.len() {
                continue;
            }
            let engaged = self.token[..] == ENGAGE_TOKEN;
            self.token.clear();
            if engaged {
                return true;
            }
        }
        false
    }

    fn sample(&mut self) {
        self.commander.sample(&mut self.board, self.now);
    }

    fn stage_batch(&mut self) -> u8 {
        self.batch.clear();
        let mut count = 0;
        for event in self.commander.drain().iter() {
            let bytes = event.wire_bytes();
            if bytes.is_empty() || self.batch.extend_from_slice(bytes).is_err() {
                continue;
            }
            count += 1;
        }
        self.staged = count > 0;
        count
    }
}

/// A bus node: a [`Commander`] and the negotiation state machine connecting it to the master.
pub struct Node<B, I, O, D> {
    machine: StateMachine<NodeState, Link<B, I, O, D>>,
    link: Link<B, I, O, D>,
}

impl<B, I, O, D> Node<B, I, O, D>
where
    B: NodeBus,
    I: InputPin,
    O: OutputPin,
    D: Board,
{
    /// Constructs a node in [`NodeState::Off`].
    ///
    /// `ready_in` is asserted by the predecessor in the chain (tie it high on the first node); `ready_out` releases
    /// the successor. The commander is detached first, so it only counts as connected once the master has
    /// addressed it.
    pub fn new(bus: B, ready_in: I, ready_out: O, board: D, mut commander: Commander) -> Result<Self, CapacityError> {
        commander.detach();
        let mut machine = StateMachine::new(NodeState::Off);
        machine.add_transition(NodeState::Off, NodeState::Boot, Link::power_up)?;
        machine.add_transition(NodeState::Boot, NodeState::Connect, Link::released)?;
        machine.add_transition(NodeState::Connect, NodeState::Wait, Link::connected)?;
        machine.add_transition(NodeState::Wait, NodeState::Runtime, Link::engaged)?;
        machine.add_runtime_action(NodeState::Boot, Link::hold_successor)?;
        machine.add_runtime_action(NodeState::Connect, Link::announce_or_adopt)?;
        machine.add_runtime_action(NodeState::Runtime, Link::sample)?;

        Ok(Self {
            machine,
            link: Link {
                bus,
                ready_in,
                ready_out,
                board,
                commander,
                now: Instant::from_ticks(0),
                listening: false,
                announce: false,
                token: Vec::new(),
                batch: Vec::new(),
                staged: false,
            },
        })
    }

    /// Advances negotiation (or sampling, once in runtime) by one step. Returns the new state on a transition.
    pub fn tick(&mut self, now: Instant) -> Option<NodeState> {
        self.link.now = now;
        let next = self.machine.tick(&mut self.link);
        if let Some(state) = next {
            info!("node entered {}", state);
        }
        next
    }

    /// Answers a read request from the master, filling `reply` and returning how many bytes were written.
    ///
    /// While connecting, the first request receives the capability identifier (big-endian). In runtime, requests
    /// alternate between a one-byte event count, which hands the commander's queue over to a staged batch, and the
    /// batch itself. A zero count stages nothing, so the next request asks for a count again. Whatever part of
    /// `reply` is left over is filled with [`IDLE_BYTE`], so a second read at the bootstrap address yields
    /// [`NO_ANNOUNCEMENT`](crate::bus::NO_ANNOUNCEMENT).
    pub fn on_request(&mut self, reply: &mut [u8]) -> usize {
        let link = &mut self.link;
        let supplied = match self.machine.state() {
            NodeState::Connect if link.announce && reply.len() >= IDENTIFIER_SIZE => {
                link.announce = false;
                reply[..IDENTIFIER_SIZE].copy_from_slice(&link.commander.capability().to_be_bytes());
                IDENTIFIER_SIZE
            }
            NodeState::Runtime if link.staged => {
                link.staged = false;
                let len = link.batch.len().min(reply.len());
                reply[..len].copy_from_slice(&link.batch[..len]);
                len
            }
            NodeState::Runtime if !reply.is_empty() => {
                reply[0] = link.stage_batch();
                1
            }
            _ => 0,
        };
        reply[supplied..].fill(IDLE_BYTE);
        supplied
    }

    /// Getter.
    pub fn state(&self) -> NodeState {
        self.machine.state()
    }

    /// Getter.
    pub fn commander(&self) -> &Commander {
        &self.link.commander
    }

    /// Mutable access to the commander, e.g. to queue events by hand.
    pub fn commander_mut(&mut self) -> &mut Commander {
        &mut self.link.commander
    }

    /// Mutable access to the board the peripherals sample from.
    pub fn board_mut(&mut self) -> &mut D {
        &mut self.link.board
    }
}
