//! An in-memory bus daisy-chaining simulated nodes to a controller.
#![allow(dead_code)]

use core::convert::Infallible;
use embassy_time::{Duration, Instant};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use midikiti_lib::{
    board::Board,
    bus::{MasterBus, NodeBus},
    command::HostLink,
    commander::Commander,
    configuration::ControllerConfig,
    controller::{Controller, ControllerState},
    midi::MidiSink,
    node::{Node, NodeState},
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};
use wmidi::MidiMessage;

/// Time between two simulated ticks.
pub const STEP: Duration = Duration::from_millis(10);

/// Which node listens where, and what the master wrote to each node.
#[derive(Default)]
pub struct Wire {
    addresses: Vec<Option<u8>>,
    inboxes: Vec<VecDeque<u8>>,
}

impl Wire {
    fn listener(&self, address: u8) -> Option<usize> {
        self.addresses.iter().position(|&a| a == Some(address))
    }
}

/// The master's end of the wire. Requests are answered by calling straight into the addressed node.
///
/// A padding bus behaves like I2C: it cannot tell how many bytes the node supplied and reports the whole buffer.
pub struct SimMasterBus {
    wire: Rc<RefCell<Wire>>,
    nodes: Rc<RefCell<Vec<SimNode>>>,
    pad: bool,
}

#[derive(Debug, PartialEq)]
pub struct Nack;

impl MasterBus for SimMasterBus {
    type Error = Nack;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut wire = self.wire.borrow_mut();
        let node = wire.listener(address).ok_or(Nack)?;
        wire.inboxes[node].extend(bytes.iter().copied());
        Ok(())
    }

    fn request(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let node = self.wire.borrow().listener(address).ok_or(Nack)?;
        let supplied = self.nodes.borrow_mut()[node].on_request(buffer);
        Ok(if self.pad { buffer.len() } else { supplied })
    }
}

/// One node's end of the wire.
pub struct SimNodeBus {
    wire: Rc<RefCell<Wire>>,
    index: usize,
}

impl NodeBus for SimNodeBus {
    fn listen(&mut self, address: u8) {
        self.wire.borrow_mut().addresses[self.index] = Some(address);
    }

    fn receive(&mut self) -> Option<u8> {
        self.wire.borrow_mut().inboxes[self.index].pop_front()
    }
}

/// A ready line shared by the node driving it and the node reading it.
#[derive(Clone, Default)]
pub struct SimPin(Rc<Cell<bool>>);

impl SimPin {
    pub fn level(&self) -> bool {
        self.0.get()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

/// Inputs set by the test; the last digital write is recorded.
#[derive(Default)]
pub struct SimBoard {
    pub digital: bool,
    pub analog: u16,
    pub shift: u32,
    pub written: Option<(u8, bool)>,
}

impl Board for SimBoard {
    fn digital_read(&mut self, _pin: u8) -> bool {
        self.digital
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        self.written = Some((pin, high));
    }

    fn analog_read(&mut self, _pin: u8) -> u16 {
        self.analog
    }

    fn shift_in(&mut self, _register: u8) -> u32 {
        self.shift
    }
}

#[derive(Default)]
pub struct SimHost {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl HostLink for SimHost {
    fn read(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write(&mut self, byte: u8) {
        self.output.push(byte);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Vec<MidiMessage<'static>>,
}

impl MidiSink for RecordingSink {
    fn send(&mut self, message: MidiMessage<'static>) {
        self.messages.push(message);
    }
}

pub type SimNode = Node<SimNodeBus, SimPin, SimPin, SimBoard>;
pub type SimController = Controller<SimMasterBus, SimHost, RecordingSink, SimBoard, SimPin>;

/// A controller and the nodes chained behind it, ticked in lockstep.
pub struct Chain {
    pub controller: SimController,
    nodes: Rc<RefCell<Vec<SimNode>>>,
    now: Instant,
}

impl Chain {
    /// Chains one node per commander, in order, behind a fresh controller.
    pub fn new(commanders: Vec<Commander>) -> Self {
        Self::build(commanders, false)
    }

    /// Like [`Chain::new`], over a bus that always reports full replies.
    pub fn padded(commanders: Vec<Commander>) -> Self {
        Self::build(commanders, true)
    }

    fn build(commanders: Vec<Commander>, pad: bool) -> Self {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let nodes = Rc::new(RefCell::new(Vec::new()));

        let master_ready = SimPin::default();
        let mut ready_in = master_ready.clone();
        for (index, commander) in commanders.into_iter().enumerate() {
            wire.borrow_mut().addresses.push(None);
            wire.borrow_mut().inboxes.push(VecDeque::new());

            let ready_out = SimPin::default();
            let bus = SimNodeBus {
                wire: wire.clone(),
                index,
            };
            let node = Node::new(bus, ready_in, ready_out.clone(), SimBoard::default(), commander).unwrap();
            nodes.borrow_mut().push(node);
            ready_in = ready_out;
        }

        let bus = SimMasterBus {
            wire,
            nodes: nodes.clone(),
            pad,
        };
        let controller = Controller::new(
            bus,
            SimHost::default(),
            RecordingSink::default(),
            SimBoard::default(),
            master_ready,
            ControllerConfig::default(),
        )
        .unwrap();

        Self {
            controller,
            nodes,
            now: Instant::from_ticks(0),
        }
    }

    /// Advances time by one [`STEP`], ticking every node first and the controller last.
    pub fn step(&mut self) {
        self.now += STEP;
        for node in self.nodes.borrow_mut().iter_mut() {
            node.tick(self.now);
        }
        self.controller.tick(self.now);
    }

    /// Advances time by one [`STEP`], ticking only the controller.
    pub fn step_controller(&mut self) {
        self.now += STEP;
        self.controller.tick(self.now);
    }

    /// Steps until the controller reaches runtime and every node has been engaged.
    pub fn negotiate(&mut self) {
        for _ in 0..500 {
            self.step();
            if self.controller.state() == ControllerState::Runtime
                && self.node_states().iter().all(|&s| s == NodeState::Runtime)
            {
                return;
            }
        }
        panic!("chain did not negotiate");
    }

    pub fn node_states(&self) -> Vec<NodeState> {
        self.nodes.borrow().iter().map(|n| n.state()).collect()
    }

    /// Runs `f` against node `index`.
    pub fn with_node<T>(&self, index: usize, f: impl FnOnce(&mut SimNode) -> T) -> T {
        f(&mut self.nodes.borrow_mut()[index])
    }

    pub fn messages(&self) -> &[MidiMessage<'static>] {
        &self.controller.sink().messages
    }
}
