//! A potentiometer (or slider) mapped onto a MIDI controller.

use super::{Interface, InterfaceKind, Parameters, PotParameters, Sampler};
use crate::{
    error::ParameterError,
    event::{Event, PotEvent},
};

/// MIDI status nibble for Control Change.
pub const CONTROL_CHANGE: u8 = 0xB0;

/// How a pot is wired and mapped.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PotConfig {
    /// Analog input the wiper is read on.
    pub pin: u8,
    /// MIDI status nibble to send values with.
    pub command: u8,
    /// Controller number.
    pub control: u8,
    /// Swap the MIDI range end points, so the top of the travel sends `midi_low`.
    pub invert: bool,
    /// Analog reading at the bottom of the travel.
    pub low: u16,
    /// Analog reading at the top of the travel.
    pub high: u16,
    /// MIDI value at the bottom of the travel.
    pub midi_low: u8,
    /// MIDI value at the top of the travel.
    pub midi_high: u8,
    /// Analog change required before a new value is considered.
    pub threshold: u16,
}

impl Default for PotConfig {
    fn default() -> Self {
        Self {
            pin: 0,
            command: CONTROL_CHANGE,
            control: 0,
            invert: false,
            low: 0,
            high: 1023,
            midi_low: 0,
            midi_high: 127,
            threshold: 5,
        }
    }
}

/// A pot reporting MIDI values as it moves.
#[derive(Clone, Debug)]
pub struct Pot {
    config: PotConfig,
    last_reading: u16,
    last_value: Option<u8>,
}

impl Pot {
    /// Constructs a [`Pot`].
    pub fn new(config: PotConfig) -> Self {
        Self {
            config,
            last_reading: 0,
            last_value: None,
        }
    }

    /// Getter.
    pub fn config(&self) -> &PotConfig {
        &self.config
    }

    /// Maps an analog reading linearly from the configured input range onto the MIDI range.
    ///
    /// Readings outside the input range are clamped to it.
    pub fn calculate(&self, reading: u16) -> u8 {
        let c = &self.config;
        let (out_low, out_high) = if c.invert {
            (i32::from(c.midi_high), i32::from(c.midi_low))
        } else {
            (i32::from(c.midi_low), i32::from(c.midi_high))
        };
        let (low, high) = (i32::from(c.low), i32::from(c.high));
        if low == high {
            return out_low.clamp(0, 127) as u8;
        }

        let reading = i32::from(reading).clamp(low.min(high), low.max(high));
        let value = (reading - low) * (out_high - out_low) / (high - low) + out_low;
        value.clamp(0, 127) as u8
    }
}

impl Interface for Pot {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Pot
    }

    fn parameters(&self) -> Parameters {
        let c = &self.config;
        Parameters::Pot(PotParameters {
            control: c.control,
            high: c.high,
            low: c.low,
            midi_high: c.midi_high,
            midi_low: c.midi_low,
            threshold: c.threshold,
            invert: c.invert,
        })
    }

    fn set_parameters(&mut self, blob: &[u8]) -> Result<(), ParameterError> {
        if let Parameters::Pot(p) = Parameters::parse(self.kind(), blob)? {
            self.config = PotConfig {
                control: p.control,
                high: p.high,
                low: p.low,
                midi_high: p.midi_high,
                midi_low: p.midi_low,
                threshold: p.threshold,
                invert: p.invert,
                ..self.config
            };
        }
        Ok(())
    }

    fn sample(&mut self, sampler: &mut Sampler<'_>) {
        let reading = sampler.board.analog_read(self.config.pin);
        if reading.abs_diff(self.last_reading) <= self.config.threshold {
            return;
        }

        // the wiper may keep drifting without changing the MIDI value
        let value = self.calculate(reading);
        if self.last_value == Some(value) {
            return;
        }
        self.last_value = Some(value);
        self.last_reading = reading;

        sampler.emit(Event::Pot(PotEvent {
            address: sampler.address(),
            command: self.config.command,
            control: self.config.control,
            value,
        }));
    }
}
