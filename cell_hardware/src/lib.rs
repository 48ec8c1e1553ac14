pub mod error;
pub mod sim_probe;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod bus;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod grove_light;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod shtc3;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod stc31;
#[cfg(feature = "hardware")]
pub mod usb;

pub use sim_probe::{SimulatedProbe, SimulatedProbeConnector};

use cell_traits::{BoxError, Co2Sensor, Quantity, ReadError, Sample, Sensor};
use error::HwError;
use std::sync::{Arc, Mutex};

/// Small deterministic oscillation so simulated series are not flat.
fn wobble(step: u32, amplitude: f64) -> f64 {
    amplitude * (f64::from(step) * 0.7).sin()
}

/// Shared knobs common to every simulated sensor.
#[derive(Debug, Default, Clone, Copy)]
struct SimState {
    step: u32,
    initialised: bool,
    fail_init: bool,
    fail_after: Option<u32>,
}

impl SimState {
    fn init(&mut self, name: &'static str) -> Result<(), BoxError> {
        if self.fail_init {
            return Err(Box::new(HwError::Simulated(name)));
        }
        self.initialised = true;
        self.step = 0;
        Ok(())
    }

    fn next(&mut self, name: &'static str) -> Result<u32, ReadError> {
        if !self.initialised {
            return Err(ReadError::Fault(Box::new(HwError::I2c(format!(
                "{name} read before init"
            )))));
        }
        if let Some(n) = self.fail_after
            && self.step >= n
        {
            return Err(ReadError::Fault(Box::new(HwError::Simulated(name))));
        }
        self.step = self.step.wrapping_add(1);
        Ok(self.step)
    }
}

/// Last compensation values written into a simulated CO₂ sensor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Compensation {
    pub humidity_ticks: Option<u16>,
    pub pressure_mbar: Option<u16>,
    pub temperature_ticks: Option<i16>,
}

/// Simulated CO₂ sensor (CO₂ vol% + temperature).
pub struct SimulatedCo2Sensor {
    state: SimState,
    co2_percent: f64,
    temperature_c: f64,
    compensation: Arc<Mutex<Compensation>>,
}

impl SimulatedCo2Sensor {
    pub fn new() -> Self {
        SimulatedCo2Sensor {
            state: SimState::default(),
            co2_percent: 0.04,
            temperature_c: 21.0,
            compensation: Arc::new(Mutex::new(Compensation::default())),
        }
    }

    /// Fail every read after `n` successful ones.
    pub fn with_fault_after(mut self, n: u32) -> Self {
        self.state.fail_after = Some(n);
        self
    }

    pub fn with_failing_init(mut self) -> Self {
        self.state.fail_init = true;
        self
    }

    /// Handle to observe compensation writes after the sensor has been boxed.
    pub fn compensation(&self) -> Arc<Mutex<Compensation>> {
        self.compensation.clone()
    }

    fn record(&self, f: impl FnOnce(&mut Compensation)) -> Result<(), BoxError> {
        let mut guard = self
            .compensation
            .lock()
            .map_err(|_| HwError::I2c("compensation state poisoned".into()))?;
        f(&mut guard);
        Ok(())
    }
}

impl Default for SimulatedCo2Sensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for SimulatedCo2Sensor {
    fn name(&self) -> &'static str {
        "co2"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.state.init(self.name())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let step = self.state.next(self.name())?;
        let co2 = self.co2_percent + wobble(step, 0.005);
        let temperature = self.temperature_c + wobble(step, 0.2);
        tracing::trace!(co2, temperature, "co2 sample (simulated)");
        Ok(vec![
            Sample::new(Quantity::Co2, co2),
            Sample::new(Quantity::Temperature, temperature),
        ])
    }
}

impl Co2Sensor for SimulatedCo2Sensor {
    fn set_relative_humidity(&mut self, ticks: u16) -> Result<(), BoxError> {
        self.record(|c| c.humidity_ticks = Some(ticks))
    }

    fn set_pressure(&mut self, mbar: u16) -> Result<(), BoxError> {
        self.record(|c| c.pressure_mbar = Some(mbar))
    }

    fn set_temperature(&mut self, ticks: i16) -> Result<(), BoxError> {
        self.record(|c| c.temperature_ticks = Some(ticks))
    }
}

/// Simulated temperature/humidity sensor.
#[derive(Default)]
pub struct SimulatedClimateSensor {
    state: SimState,
}

impl SimulatedClimateSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault_after(mut self, n: u32) -> Self {
        self.state.fail_after = Some(n);
        self
    }
}

impl Sensor for SimulatedClimateSensor {
    fn name(&self) -> &'static str {
        "climate"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.state.init(self.name())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let step = self.state.next(self.name())?;
        Ok(vec![
            Sample::new(Quantity::Temperature, 21.5 + wobble(step, 0.3)),
            Sample::new(Quantity::Humidity, 45.0 + wobble(step, 1.5)),
        ])
    }
}

/// Simulated barometer. Every fourth read reports "no new data", like a
/// sensor polled faster than its conversion time.
#[derive(Default)]
pub struct SimulatedBarometer {
    state: SimState,
}

impl SimulatedBarometer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sensor for SimulatedBarometer {
    fn name(&self) -> &'static str {
        "barometer"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.state.init(self.name())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let step = self.state.next(self.name())?;
        if step % 4 == 0 {
            return Err(ReadError::NoNewData);
        }
        Ok(vec![Sample::new(
            Quantity::Pressure,
            96_700.0 + wobble(step, 25.0),
        )])
    }
}

/// Simulated ambient light sensor.
#[derive(Default)]
pub struct SimulatedLightSensor {
    state: SimState,
}

impl SimulatedLightSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sensor for SimulatedLightSensor {
    fn name(&self) -> &'static str {
        "light"
    }

    fn init(&mut self) -> Result<(), BoxError> {
        self.state.init(self.name())
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let step = self.state.next(self.name())?;
        Ok(vec![Sample::new(
            Quantity::Luminosity,
            350.0 + wobble(step, 12.0),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_init_is_a_fault() {
        let mut s = SimulatedClimateSensor::new();
        assert!(matches!(s.read(), Err(ReadError::Fault(_))));
    }

    #[test]
    fn co2_sensor_reports_co2_and_temperature() {
        let mut s = SimulatedCo2Sensor::new();
        s.init().unwrap();
        let samples = s.read().unwrap();
        let kinds: Vec<_> = samples.iter().map(|s| s.quantity).collect();
        assert_eq!(kinds, vec![Quantity::Co2, Quantity::Temperature]);
    }

    #[test]
    fn co2_compensation_is_observable() {
        let mut s = SimulatedCo2Sensor::new();
        let handle = s.compensation();
        s.set_pressure(967).unwrap();
        s.set_temperature(-400).unwrap();
        let c = *handle.lock().unwrap();
        assert_eq!(c.pressure_mbar, Some(967));
        assert_eq!(c.temperature_ticks, Some(-400));
        assert_eq!(c.humidity_ticks, None);
    }

    #[test]
    fn fault_after_limit() {
        let mut s = SimulatedCo2Sensor::new().with_fault_after(2);
        s.init().unwrap();
        assert!(s.read().is_ok());
        assert!(s.read().is_ok());
        assert!(matches!(s.read(), Err(ReadError::Fault(_))));
    }

    #[test]
    fn climate_fault_survives_reinit() {
        let mut s = SimulatedClimateSensor::new().with_fault_after(1);
        s.init().unwrap();
        assert!(s.read().is_ok());
        assert!(matches!(s.read(), Err(ReadError::Fault(_))));
        // init restarts the step count, so one more good read follows
        s.init().unwrap();
        assert!(s.read().is_ok());
    }

    #[test]
    fn barometer_skips_every_fourth_read() {
        let mut s = SimulatedBarometer::new();
        s.init().unwrap();
        let results: Vec<_> = (0..4).map(|_| s.read()).collect();
        assert!(results[..3].iter().all(|r| r.is_ok()));
        assert!(matches!(results[3], Err(ReadError::NoNewData)));
    }

    #[test]
    fn failing_init_reports_error() {
        let mut s = SimulatedCo2Sensor::new().with_failing_init();
        assert!(s.init().is_err());
    }
}
