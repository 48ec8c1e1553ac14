pub mod clock;
pub mod quantity;

pub use clock::{Clock, MonotonicClock};
pub use quantity::{Quantity, Sample};

use std::sync::Arc;
use std::time::Duration;

/// Error type used at every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a failed measurement read.
#[derive(Debug)]
pub enum ReadError {
    /// The sensor has not produced a new value since the last read. Not a fault.
    NoNewData,
    /// Anything else. Fatal for the measurement engine.
    Fault(BoxError),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::NoNewData => f.write_str("no new data"),
            ReadError::Fault(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::NoNewData => None,
            ReadError::Fault(e) => Some(e.as_ref()),
        }
    }
}

impl From<BoxError> for ReadError {
    fn from(e: BoxError) -> Self {
        ReadError::Fault(e)
    }
}

/// One physical sensor on a bus.
pub trait Sensor {
    /// Short human name used in logs and error records.
    fn name(&self) -> &'static str;

    fn init(&mut self) -> Result<(), BoxError>;

    fn self_test(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Perform exactly one blocking read. A sensor may yield several quantities at once.
    fn read(&mut self) -> Result<Vec<Sample>, ReadError>;

    fn close(&mut self) {}
}

/// A CO₂ sensor that accepts environmental compensation values.
pub trait Co2Sensor: Sensor {
    /// Relative humidity in ticks, `RH% * 65535 / 100`.
    fn set_relative_humidity(&mut self, ticks: u16) -> Result<(), BoxError>;
    /// Absolute pressure in mbar.
    fn set_pressure(&mut self, mbar: u16) -> Result<(), BoxError>;
    /// Temperature in signed ticks, `°C * 200`.
    fn set_temperature(&mut self, ticks: i16) -> Result<(), BoxError>;
}

/// Bulk IN/OUT pipe to the oxygen probe. Shared between the request path and the
/// inbound dispatch loop, hence `Sync`.
pub trait ProbeLink: Send + Sync {
    /// Write one frame on the OUT endpoint.
    fn send(&self, frame: &[u8]) -> Result<(), BoxError>;

    /// Wait up to `timeout` for one inbound transfer. `Ok(None)` when nothing arrived.
    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>, BoxError>;
}

/// A freshly opened probe: its link plus the serial-number string descriptor.
pub struct OpenedProbe {
    pub link: Arc<dyn ProbeLink>,
    pub serial: String,
}

/// Locates and opens the probe (enumerate, match ids, open, read serial, claim interface).
pub trait ProbeConnector {
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<OpenedProbe, BoxError>;
}
