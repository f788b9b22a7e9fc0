//! Events relayed from peripherals to the bus master, and their wire encoding.
//!
//! Every event travels as a [`RawEvent`]: eight bytes, the first of which is an [`EventKind`] tag and the second the
//! bus address of the node that produced it. The remaining bytes hold kind-specific fields in a fixed order. Only
//! the first [`EventKind::wire_size`] bytes are put on the bus; the rest are always zero.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Size of a [`RawEvent`], in bytes.
pub const RAW_EVENT_SIZE: usize = 8;

/// The largest number of bytes any event occupies on the bus.
pub const MAX_WIRE_SIZE: usize = 5;

/// Tags identifying the kind of an encoded event.
#[derive(Clone, Copy, Debug, FromPrimitive, ToPrimitive, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// A key of an octave was struck or released.
    Key = 1,
    /// A potentiometer moved to a new MIDI value.
    Pot = 2,
    /// A button was pressed, released or toggled.
    Button = 3,
}

impl EventKind {
    /// Number of meaningful bytes in an event of this kind, tag and address included.
    pub const fn wire_size(self) -> usize {
        match self {
            EventKind::Key => 5,
            EventKind::Pot => 5,
            EventKind::Button => 4,
        }
    }
}

/// Returns the number of bytes an event tagged `tag` occupies on the bus, or 0 for tags that are not recognized.
pub fn wire_size(tag: u8) -> usize {
    EventKind::from_u8(tag).map_or(0, EventKind::wire_size)
}

/// A key octave reports a key struck (`pressed`) or released.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    /// Bus address of the node hosting the octave.
    pub address: u8,
    /// MIDI note number of the key before octave transposition.
    pub key: u8,
    /// Strike velocity, 1 to 127; 0 on release.
    pub velocity: u8,
    /// `true` when the key was struck, `false` when released.
    pub pressed: bool,
}

/// A potentiometer moved far enough to change its MIDI value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PotEvent {
    /// Bus address of the node hosting the pot.
    pub address: u8,
    /// MIDI status nibble the value should be sent with, e.g. `0xB0` for Control Change.
    pub command: u8,
    /// Controller number.
    pub control: u8,
    /// Mapped MIDI value.
    pub value: u8,
}

/// A button changed state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    /// Bus address of the node hosting the button.
    pub address: u8,
    /// Controller number.
    pub control: u8,
    /// For momentary buttons, whether the button went down; for toggles, the new on/off state.
    pub pressed: bool,
}

/// Any event a peripheral can produce.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// See [`KeyEvent`].
    Key(KeyEvent),
    /// See [`PotEvent`].
    Pot(PotEvent),
    /// See [`ButtonEvent`].
    Button(ButtonEvent),
}

impl Event {
    /// Returns the tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Key(_) => EventKind::Key,
            Event::Pot(_) => EventKind::Pot,
            Event::Button(_) => EventKind::Button,
        }
    }

    /// Returns the bus address of the node that produced this event.
    pub fn address(&self) -> u8 {
        match self {
            Event::Key(e) => e.address,
            Event::Pot(e) => e.address,
            Event::Button(e) => e.address,
        }
    }

    /// Serializes the event field by field.
    pub fn encode(&self) -> RawEvent {
        let mut bytes = [0; RAW_EVENT_SIZE];
        bytes[0] = self.kind() as u8;
        bytes[1] = self.address();
        match *self {
            Event::Key(KeyEvent {
                key,
                velocity,
                pressed,
                ..
            }) => {
                bytes[2] = key;
                bytes[3] = velocity;
                bytes[4] = pressed.into();
            }
            Event::Pot(PotEvent {
                command,
                control,
                value,
                ..
            }) => {
                bytes[2] = command;
                bytes[3] = control;
                bytes[4] = value;
            }
            Event::Button(ButtonEvent { control, pressed, .. }) => {
                bytes[2] = control;
                bytes[3] = pressed.into();
            }
        }
        RawEvent(bytes)
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        event.encode()
    }
}

/// The fixed-size, self-describing encoding shared by every event kind.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawEvent([u8; RAW_EVENT_SIZE]);

impl RawEvent {
    /// Wraps eight bytes without interpreting them.
    pub const fn from_bytes(bytes: [u8; RAW_EVENT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; RAW_EVENT_SIZE] {
        &self.0
    }

    /// Returns the type tag.
    pub fn tag(&self) -> u8 {
        self.0[0]
    }

    /// Returns the bytes that travel on the bus; empty for unrecognized tags.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.0[..wire_size(self.tag())]
    }

    /// Interprets the bytes according to the tag. Unrecognized tags yield `None` rather than a guess.
    pub fn decode(&self) -> Option<Event> {
        let b = &self.0;
        let event = match EventKind::from_u8(b[0])? {
            EventKind::Key => Event::Key(KeyEvent {
                address: b[1],
                key: b[2],
                velocity: b[3],
                pressed: b[4] != 0,
            }),
            EventKind::Pot => Event::Pot(PotEvent {
                address: b[1],
                command: b[2],
                control: b[3],
                value: b[4],
            }),
            EventKind::Button => Event::Button(ButtonEvent {
                address: b[1],
                control: b[2],
                pressed: b[3] != 0,
            }),
        };
        Some(event)
    }

    /// Reads one event off the front of `bytes`, returning it with the number of bytes consumed.
    ///
    /// Returns `None` when the tag is unrecognized or the event is truncated; nothing past the tag's own wire size is
    /// ever read.
    pub fn from_wire(bytes: &[u8]) -> Option<(RawEvent, usize)> {
        let size = wire_size(*bytes.first()?);
        if size == 0 || bytes.len() < size {
            return None;
        }
        let mut raw = [0; RAW_EVENT_SIZE];
        raw[..size].copy_from_slice(&bytes[..size]);
        Some((RawEvent(raw), size))
    }
}
