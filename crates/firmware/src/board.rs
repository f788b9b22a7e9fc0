//! The Nucleo board's raw I/O, as seen by local peripherals.

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    gpio::{Input, Output},
    peripherals::ADC1,
};
use embassy_time::{Duration, block_for};
use midikiti_lib::board::Board;

/// Digital inputs, indexed by pin number.
pub const DIGITAL_INPUTS: usize = 1;
/// Digital outputs, indexed by pin number.
pub const DIGITAL_OUTPUTS: usize = 1;
/// Analog inputs, indexed by pin number.
pub const ANALOG_INPUTS: usize = 1;

// 74HC165 pulses are a few tens of nanoseconds at 3.3 V; a microsecond is plenty
const PULSE: Duration = Duration::from_micros(1);

/// A chain of 74HC165 parallel-in shift registers, bit-banged.
pub struct ShiftRegister {
    /// Parallel load, active low.
    pub load: Output<'static>,
    /// Clock inhibit, active high.
    pub clock_enable: Output<'static>,
    pub clock: Output<'static>,
    /// Serial output of the last register in the chain.
    pub data: Input<'static>,
    /// Number of inputs across the chain.
    pub width: u8,
}

impl ShiftRegister {
    /// Latches the inputs and clocks them out, first input in the lowest bit.
    pub fn read(&mut self) -> u32 {
        self.load.set_low();
        block_for(PULSE);
        self.load.set_high();
        self.clock_enable.set_low();

        let mut snapshot = 0;
        for bit in 0..self.width.min(32) {
            if self.data.is_high() {
                snapshot |= 1 << bit;
            }
            self.clock.set_high();
            block_for(PULSE);
            self.clock.set_low();
        }

        self.clock_enable.set_high();
        snapshot
    }
}

/// Pin-indexed access to the GPIO, ADC, and shift register wired to the master.
pub struct NucleoBoard {
    pub inputs: [Input<'static>; DIGITAL_INPUTS],
    pub outputs: [Output<'static>; DIGITAL_OUTPUTS],
    pub adc: Adc<'static, ADC1>,
    pub analog: [AnyAdcChannel<ADC1>; ANALOG_INPUTS],
    pub keys: ShiftRegister,
}

impl Board for NucleoBoard {
    fn digital_read(&mut self, pin: u8) -> bool {
        self.inputs.get(usize::from(pin)).is_some_and(|input| input.is_high())
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        if let Some(output) = self.outputs.get_mut(usize::from(pin)) {
            output.set_level(high.into());
        }
    }

    fn analog_read(&mut self, pin: u8) -> u16 {
        match self.analog.get_mut(usize::from(pin)) {
            // pots are calibrated for 10-bit readings
            Some(channel) => self.adc.blocking_read(channel) >> 2,
            None => 0,
        }
    }

    fn shift_in(&mut self, register: u8) -> u32 {
        match register {
            0 => self.keys.read(),
            _ => 0,
        }
    }
}
