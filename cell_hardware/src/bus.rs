//! Thin Sensirion-style wrapper over an rppal I²C handle.

use std::thread;
use std::time::Duration;

use rppal::i2c::I2c;

use crate::error::{HwError, Result};
use crate::util::{command_frame, decode_words};

pub struct SensirionBus {
    i2c: I2c,
}

impl SensirionBus {
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(format!("address {address:#04x}: {e}")))?;
        Ok(Self { i2c })
    }

    pub fn write_command(&mut self, command: u16, args: &[u16]) -> Result<()> {
        let frame = command_frame(command, args);
        let n = self
            .i2c
            .write(&frame)
            .map_err(|e| HwError::I2c(format!("write {command:#06x}: {e}")))?;
        if n != frame.len() {
            return Err(HwError::I2c(format!(
                "short write for {command:#06x} ({n}/{} bytes)",
                frame.len()
            )));
        }
        Ok(())
    }

    pub fn read_words(&mut self, count: usize) -> Result<Vec<u16>> {
        let mut buf = vec![0u8; count * 3];
        let n = self
            .i2c
            .read(&mut buf)
            .map_err(|e| HwError::I2c(format!("read: {e}")))?;
        if n != buf.len() {
            return Err(HwError::I2c(format!("short read ({n}/{} bytes)", buf.len())));
        }
        decode_words(&buf)
    }

    /// Command, conversion wait, then `count` words back.
    pub fn command_then_read(&mut self, command: u16, wait: Duration, count: usize) -> Result<Vec<u16>> {
        self.write_command(command, &[])?;
        thread::sleep(wait);
        self.read_words(count)
    }

    /// Raw access for devices that do not use Sensirion framing.
    pub fn raw(&mut self) -> &mut I2c {
        &mut self.i2c
    }
}
