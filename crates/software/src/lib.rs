//! This crate contains architecture-agnostic logic for MidiKiti, a chain of musical-controller nodes (key octaves,
//! potentiometers, buttons) which negotiate addresses on a shared bus, relay their input events to a bus master, and
//! are translated into [MIDI](https://midi.org/midi-1-0) by that master.
//!
//! Hardware is reached exclusively through capability traits ([`board::Board`], [`bus::NodeBus`], [`bus::MasterBus`],
//! [`command::HostLink`], [`midi::MidiSink`]), so the whole negotiation and relay protocol can run on a host under test.

#![deny(missing_docs)]
#![no_std]

// must come first so the logging macros are visible to every module below
mod fmt;

pub mod board;
pub mod bus;
pub mod command;
pub mod commander;
pub mod configuration;
pub mod controller;
pub mod error;
pub mod event;
pub mod interface;
pub mod key;
pub mod midi;
pub mod node;
pub mod state_machine;

#[cfg(test)]
mod test_support;
