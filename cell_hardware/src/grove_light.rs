//! Grove base-hat analog light sensor (A2 input).

use cell_traits::{BoxError, Quantity, ReadError, Sample, Sensor};

use crate::bus::SensirionBus;
use crate::error::HwError;

const HAT_ADDRESS: u16 = 0x04;
const A2_OUTPUT_VOLTAGE: u8 = 0x30 + 2;

pub struct GroveLight {
    bus_number: u8,
    bus: Option<SensirionBus>,
}

impl GroveLight {
    pub fn new(bus_number: u8) -> Self {
        Self {
            bus_number,
            bus: None,
        }
    }
}

impl Sensor for GroveLight {
    fn name(&self) -> &'static str {
        "light"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.bus = Some(SensirionBus::open(self.bus_number, HAT_ADDRESS)?);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let fault = |msg: String| ReadError::Fault(Box::new(HwError::I2c(msg)));
        let i2c = self
            .bus
            .as_mut()
            .ok_or_else(|| fault("light sensor not initialised".into()))?
            .raw();
        i2c.write(&[A2_OUTPUT_VOLTAGE])
            .map_err(|e| fault(format!("light register select: {e}")))?;
        let mut buf = [0u8; 2];
        i2c.read(&mut buf)
            .map_err(|e| fault(format!("light read: {e}")))?;
        // millivolts, little-endian
        let mv = u16::from_le_bytes(buf);
        Ok(vec![Sample::new(Quantity::Luminosity, f64::from(mv))])
    }

    fn close(&mut self) {
        self.bus = None;
    }
}
