//! Error types shared across the crate.

use core::fmt;

/// Errors raised when a parameter blob cannot be applied to an interface.
///
/// Either way the interface's configuration is left exactly as it was.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParameterError {
    /// The buffer is shorter than the blob the interface expects.
    Undersized {
        /// Size of the blob the interface expects, in bytes.
        expected: usize,
        /// Size of the buffer that was supplied, in bytes.
        actual: usize,
    },
    /// The blob's type tag belongs to a different kind of interface.
    WrongKind {
        /// Tag of the interface receiving the blob.
        expected: u16,
        /// Tag found at the start of the blob.
        actual: u16,
    },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterError::Undersized { expected, actual } => {
                write!(f, "parameter blob too small: expected {} bytes, got {}", expected, actual)
            }
            ParameterError::WrongKind { expected, actual } => {
                write!(f, "parameter blob tagged {:#06x}, expected {:#06x}", actual, expected)
            }
        }
    }
}

/// A fixed-capacity table (transitions, interfaces, commanders, connections...) has no room left.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "capacity exhausted")
    }
}

/// A key contact was wired to a bit outside the 32-bit snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContactError {
    /// The offending bit index.
    pub bit: u8,
}

impl fmt::Display for ContactError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "contact bit {} is outside the snapshot", self.bit)
    }
}
