//! Peripherals a node can host, behind one common [`Interface`].
//!
//! Each peripheral samples its inputs once per tick through a [`Sampler`], which lends it the node's [`Board`], the
//! tick's timestamp, and the owning commander's event queue. Peripherals never hold a reference to their commander;
//! the commander owns them and hands out a fresh [`Sampler`] on every pass.

mod button;
pub use button::*;

mod octave;
pub use octave::*;

mod parameters;
pub use parameters::*;

mod pot;
pub use pot::*;

use crate::{
    board::Board,
    commander::{EventQueue, push_event},
    error::ParameterError,
    event::Event,
};
use embassy_time::Instant;
use enum_dispatch::enum_dispatch;
use num_derive::{FromPrimitive, ToPrimitive};

/// Identifies the kind of an interface on the host protocol and in parameter blobs.
#[derive(Clone, Copy, Debug, FromPrimitive, ToPrimitive, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterfaceKind {
    /// A piano-key octave.
    Octave = 0xF1,
    /// A potentiometer or slider.
    Pot = 0xF2,
    /// A push button.
    Button = 0xF3,
}

/// What the commander lends a peripheral for one sampling pass.
pub struct Sampler<'a> {
    /// The hardware to read from.
    pub board: &'a mut dyn Board,
    /// When this tick started.
    pub now: Instant,
    address: u8,
    queue: &'a mut EventQueue,
}

impl<'a> Sampler<'a> {
    /// Constructs a [`Sampler`] that stamps events with `address` and queues them on `queue`.
    pub fn new(board: &'a mut dyn Board, now: Instant, address: u8, queue: &'a mut EventQueue) -> Self {
        Self {
            board,
            now,
            address,
            queue,
        }
    }

    /// The bus address of the commander owning the peripheral.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Queues an event on the owning commander.
    pub fn emit(&mut self, event: Event) {
        push_event(self.queue, event.encode());
    }
}

/// The capability shared by every peripheral.
#[enum_dispatch]
pub trait Interface {
    /// Returns the kind tag reported to the host.
    fn kind(&self) -> InterfaceKind;

    /// Returns the current remote-configurable parameters.
    fn parameters(&self) -> Parameters;

    /// Applies a parameter blob. A blob that is too small or meant for another kind changes nothing.
    fn set_parameters(&mut self, blob: &[u8]) -> Result<(), ParameterError>;

    /// Reads the peripheral's inputs and queues any resulting events.
    fn sample(&mut self, sampler: &mut Sampler<'_>);
}

/// Any peripheral a commander can own.
#[enum_dispatch(Interface)]
#[derive(Clone, Debug)]
pub enum Peripheral {
    /// See [`Octave`].
    Octave(Octave),
    /// See [`Pot`].
    Pot(Pot),
    /// See [`Button`].
    Button(Button),
}
