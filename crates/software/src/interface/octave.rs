//! A piano-key octave read through a chain of parallel-in shift registers.

use super::{Interface, InterfaceKind, OctaveParameters, Parameters, Sampler};
use crate::{
    error::{CapacityError, ParameterError},
    event::{Event, KeyEvent},
    key::{KeyTracker, KeyTransition},
};
use heapless::Vec;

/// Two contacts per key in a 32-bit snapshot.
pub const MAX_KEYS: usize = 16;

/// Keys in a chromatic octave.
pub const KEYS_PER_OCTAVE: u8 = 12;

/// Where an octave's contacts are wired.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OctaveConfig {
    /// Shift-register chain holding the key contacts.
    pub register: u8,
    /// Contacts pull their inputs low when closed.
    pub active_low: bool,
}

/// An ordered set of keys sharing one snapshot source.
#[derive(Clone, Debug)]
pub struct Octave {
    config: OctaveConfig,
    keys: Vec<KeyTracker, MAX_KEYS>,
    last: Option<u32>,
}

impl Octave {
    /// Constructs an octave with no keys.
    pub fn new(config: OctaveConfig) -> Self {
        Self {
            config,
            keys: Vec::new(),
            last: None,
        }
    }

    /// Constructs an octave of twelve consecutive notes starting at `base_note`, key `i` wired to bits `2i`
    /// (pressed) and `2i + 1` (down).
    pub fn chromatic(config: OctaveConfig, base_note: u8) -> Self {
        let mut octave = Self::new(config);
        for i in 0..KEYS_PER_OCTAVE {
            // twelve keys always fit, on bits 0 to 23
            if let Ok(key) = KeyTracker::new(base_note.saturating_add(i), 2 * i, 2 * i + 1) {
                let _ = octave.add_key(key);
            }
        }
        octave
    }

    /// Appends a key.
    pub fn add_key(&mut self, key: KeyTracker) -> Result<(), CapacityError> {
        self.keys.push(key).map_err(|_| CapacityError)
    }

    /// The keys, in wiring order.
    pub fn keys(&self) -> &[KeyTracker] {
        &self.keys
    }
}

impl Interface for Octave {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Octave
    }

    fn parameters(&self) -> Parameters {
        Parameters::Octave(OctaveParameters)
    }

    fn set_parameters(&mut self, blob: &[u8]) -> Result<(), ParameterError> {
        Parameters::parse(self.kind(), blob).map(|_| ())
    }

    fn sample(&mut self, sampler: &mut Sampler<'_>) {
        let raw = sampler.board.shift_in(self.config.register);
        let snapshot = if self.config.active_low { !raw } else { raw };
        if self.last == Some(snapshot) {
            return;
        }
        self.last = Some(snapshot);

        let (address, now) = (sampler.address(), sampler.now);
        for key in self.keys.iter_mut() {
            let (velocity, pressed) = match key.process(snapshot, now) {
                Some(KeyTransition::On { velocity }) => (velocity, true),
                Some(KeyTransition::Off) => (0, false),
                None => continue,
            };
            trace!("key {} pressed: {}, velocity {}", key.key(), pressed, velocity);
            sampler.emit(Event::Key(KeyEvent {
                address,
                key: key.key(),
                velocity,
                pressed,
            }));
        }
    }
}
