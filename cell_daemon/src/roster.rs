//! Sensor roster: the physical cell with `--features hardware` on Linux, simulators otherwise.

use cell_core::MeasureModuleBuilder;

/// Attach the CO₂ sensor, the remaining sensors (in reset order) and the probe.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn attach(builder: MeasureModuleBuilder, cfg: &cell_config::Config) -> MeasureModuleBuilder {
    use cell_hardware::{grove_light::GroveLight, shtc3::Shtc3, stc31::Stc31, usb::UsbProbeConnector};

    let bus = cfg.hardware.i2c_bus;
    tracing::info!(i2c_bus = bus, "using hardware sensor roster");
    // no on-board barometer: pressure comes from the oxygen probe only
    builder
        .with_co2_sensor(Stc31::new(bus))
        .with_sensor(Shtc3::new(bus))
        .with_sensor(GroveLight::new(bus))
        .with_probe(Box::new(UsbProbeConnector::new()))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn attach(builder: MeasureModuleBuilder, _cfg: &cell_config::Config) -> MeasureModuleBuilder {
    use cell_hardware::{
        SimulatedBarometer, SimulatedClimateSensor, SimulatedCo2Sensor, SimulatedLightSensor,
        SimulatedProbe, SimulatedProbeConnector,
    };

    tracing::info!("using simulated sensor roster");
    let probe = match std::env::var("CELL_SIM_PROBE").as_deref() {
        Ok("absent") => SimulatedProbeConnector::new(SimulatedProbe::new()).absent(),
        _ => SimulatedProbeConnector::new(SimulatedProbe::new()),
    };
    builder
        .with_co2_sensor(SimulatedCo2Sensor::new())
        .with_sensor(SimulatedClimateSensor::new())
        .with_sensor(SimulatedBarometer::new())
        .with_sensor(SimulatedLightSensor::new())
        .with_probe(Box::new(probe))
}
