//! Hardware stand-ins for unit tests.

extern crate std;

use crate::{
    board::Board,
    bus::{MasterBus, NodeBus},
    command::HostLink,
    midi::MidiSink,
};
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::{collections::VecDeque, vec::Vec};
use wmidi::MidiMessage;

/// A board whose inputs are plain fields; the last digital write is recorded.
#[derive(Debug, Default)]
pub struct FakeBoard {
    pub digital: bool,
    pub analog: u16,
    pub shift: u32,
    pub written: Option<(u8, bool)>,
}

impl Board for FakeBoard {
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

/// A node bus fed by hand.
#[derive(Debug, Default)]
pub struct FakeBus {
    pub address: Option<u8>,
    pub inbox: VecDeque<u8>,
}

impl NodeBus for FakeBus {
    fn listen(&mut self, address: u8) {
        self.address = Some(address);
    }

    fn receive(&mut self) -> Option<u8> {
        self.inbox.pop_front()
    }
}

/// A pin that is both read and driven by the test.
#[derive(Debug)]
pub struct FakePin(bool);

impl FakePin {
    pub fn new(level: bool) -> Self {
        Self(level)
    }

    pub fn level(&self) -> bool {
        self.0
    }
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0)
    }
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0 = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0 = true;
        Ok(())
    }
}

/// A host link fed and inspected by the test.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl HostLink for FakeHost {
    fn read(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write(&mut self, byte: u8) {
        self.output.push(byte);
    }
}

/// A master bus with nobody on it: every transfer fails as if unacknowledged.
#[derive(Debug, Default)]
pub struct NoNodes;

impl MasterBus for NoNodes {
    type Error = ();

    fn write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(())
    }

    fn request(&mut self, _address: u8, _buffer: &mut [u8]) -> Result<usize, Self::Error> {
        Err(())
    }
}

/// Records every MIDI message sent.
#[derive(Debug, Default)]
pub struct FakeSink {
    pub messages: Vec<MidiMessage<'static>>,
}

impl MidiSink for FakeSink {
    fn send(&mut self, message: MidiMessage<'static>) {
        self.messages.push(message);
    }
}
