//! The raw I/O a node's peripherals sample from.

/// Pin-indexed access to the hardware hosting a set of peripherals.
///
/// Every method must return promptly; reads report whatever the hardware shows right now.
pub trait Board {
    /// Returns `true` if the digital input `pin` reads high.
    fn digital_read(&mut self, pin: u8) -> bool;

    /// Drives the digital output `pin` high or low.
    fn digital_write(&mut self, pin: u8, high: bool);

    /// Returns the current reading of analog input `pin`.
    fn analog_read(&mut self, pin: u8) -> u16;

    /// Latches and shifts in the parallel inputs of shift-register chain `register`, returning one bit per input
    /// with the first input in the lowest bit.
    fn shift_in(&mut self, register: u8) -> u32;
}
