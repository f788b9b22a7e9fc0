//! The master's end of the node bus, over blocking I2C.

use embedded_hal::i2c::I2c;
use midikiti_lib::bus::{IDLE_BYTE, MasterBus};

/// Adapts any blocking I2C controller to [`MasterBus`].
///
/// Bus addresses are folded into the 7-bit I2C address space, so the bootstrap address `0xFE` goes out as `0x7E`. A
/// node that does not acknowledge surfaces as an error, which the controller treats as "nothing available".
/// I2C cannot tell how many bytes a node drove, so trailing [`IDLE_BYTE`]s count as not supplied.
pub struct I2cMaster<I> {
    i2c: I,
}

impl<I: I2c> I2cMaster<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }
}

fn i2c_address(address: u8) -> u8 {
    address & 0x7F
}

impl<I: I2c> MasterBus for I2cMaster<I> {
    type Error = I::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(i2c_address(address), bytes)
    }

    fn request(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.i2c.read(i2c_address(address), buffer)?;
        let idle = buffer.iter().rev().take_while(|&&byte| byte == IDLE_BYTE).count();
        Ok(buffer.len() - idle)
    }
}
