//! Remote-configuration blobs exchanged with the host.
//!
//! A blob starts with the owning interface's [`InterfaceKind`] as a little-endian `u16`, followed by the kind's
//! fields packed little-endian with no padding.

use super::InterfaceKind;
use crate::error::ParameterError;
use core::ops::Deref;

/// Size of the largest blob, in bytes.
pub const MAX_PARAMETER_SIZE: usize = 12;

const TAG_SIZE: usize = 2;

/// Parameters of an octave. Octaves have nothing to configure yet; the blob is the tag alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OctaveParameters;

/// Tunable parameters of a potentiometer.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PotParameters {
    /// Controller number.
    pub control: u8,
    /// Analog reading at the top of the travel.
    pub high: u16,
    /// Analog reading at the bottom of the travel.
    pub low: u16,
    /// MIDI value sent at the top of the travel.
    pub midi_high: u8,
    /// MIDI value sent at the bottom of the travel.
    pub midi_low: u8,
    /// Analog change required before a new value is considered.
    pub threshold: u16,
    /// Swap the MIDI range end points.
    pub invert: bool,
}

/// Tunable parameters of a button.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonParameters {
    /// Controller number.
    pub control: u8,
    /// Latch on/off on each press instead of reporting press and release.
    pub toggle: bool,
}

/// The parameters of one interface, tagged by kind.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parameters {
    /// See [`OctaveParameters`].
    Octave(OctaveParameters),
    /// See [`PotParameters`].
    Pot(PotParameters),
    /// See [`ButtonParameters`].
    Button(ButtonParameters),
}

/// An encoded parameter blob, owned by whoever asked for it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterBlob {
    bytes: [u8; MAX_PARAMETER_SIZE],
    len: usize,
}

impl Deref for ParameterBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Parameters {
    /// Returns the kind of interface these parameters belong to.
    pub fn kind(&self) -> InterfaceKind {
        match self {
            Parameters::Octave(_) => InterfaceKind::Octave,
            Parameters::Pot(_) => InterfaceKind::Pot,
            Parameters::Button(_) => InterfaceKind::Button,
        }
    }

    /// Size of the encoded blob for an interface of `kind`, tag included.
    pub const fn size_of(kind: InterfaceKind) -> usize {
        TAG_SIZE
            + match kind {
                InterfaceKind::Octave => 0,
                InterfaceKind::Pot => 10,
                InterfaceKind::Button => 2,
            }
    }

    /// Encodes the parameters, tag first.
    pub fn to_blob(&self) -> ParameterBlob {
        let mut blob = ParameterBlob {
            bytes: [0; MAX_PARAMETER_SIZE],
            len: 0,
        };
        let mut put = |bytes: &[u8]| {
            blob.bytes[blob.len..blob.len + bytes.len()].copy_from_slice(bytes);
            blob.len += bytes.len();
        };

        put(&(self.kind() as u16).to_le_bytes());
        match self {
            Parameters::Octave(_) => {}
            Parameters::Pot(p) => {
                put(&[p.control]);
                put(&p.high.to_le_bytes());
                put(&p.low.to_le_bytes());
                put(&[p.midi_high, p.midi_low]);
                put(&p.threshold.to_le_bytes());
                put(&[u8::from(p.invert)]);
            }
            Parameters::Button(p) => {
                put(&[p.control, u8::from(p.toggle)]);
            }
        }
        blob
    }

    /// Decodes a blob meant for an interface of `kind`.
    ///
    /// Fails without reading any field if the buffer is smaller than the kind's blob or carries another kind's tag.
    /// Trailing bytes beyond the blob are ignored.
    pub fn parse(kind: InterfaceKind, bytes: &[u8]) -> Result<Self, ParameterError> {
        let expected = Self::size_of(kind);
        if bytes.len() < expected {
            return Err(ParameterError::Undersized {
                expected,
                actual: bytes.len(),
            });
        }

        let tag = u16::from_le_bytes([bytes[0], bytes[1]]);
        if tag != kind as u16 {
            return Err(ParameterError::WrongKind {
                expected: kind as u16,
                actual: tag,
            });
        }

        let f = &bytes[TAG_SIZE..expected];
        let u16_at = |i: usize| u16::from_le_bytes([f[i], f[i + 1]]);
        let parameters = match kind {
            InterfaceKind::Octave => Parameters::Octave(OctaveParameters),
            InterfaceKind::Pot => Parameters::Pot(PotParameters {
                control: f[0],
                high: u16_at(1),
                low: u16_at(3),
                midi_high: f[5],
                midi_low: f[6],
                threshold: u16_at(7),
                invert: f[9] != 0,
            }),
            InterfaceKind::Button => Parameters::Button(ButtonParameters {
                control: f[0],
                toggle: f[1] != 0,
            }),
        };
        Ok(parameters)
    }
}
