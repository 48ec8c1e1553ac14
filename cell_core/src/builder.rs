//! Builder for [`MeasureModule`].
//!
//! Collects the sensor roster, the probe connector and the configuration,
//! validates them, and starts the polling tasks. The module comes up in the
//! `Uninitialized` state; call `reset()` to bring the sensors online.

use std::sync::Arc;

use cell_traits::{Clock, Co2Sensor, MonotonicClock, ProbeConnector, Sensor};

use crate::calibration::CalibrationConfig;
use crate::config::{ProbeCfg, SamplingCfg};
use crate::error::{BuildError, Result};
use crate::measure::{Engine, MeasureModule};
use crate::probe::ProbeDriver;

#[derive(Default)]
pub struct MeasureModuleBuilder {
    co2: Option<Box<dyn Co2Sensor + Send>>,
    sensors: Vec<Box<dyn Sensor + Send>>,
    probe: Option<Box<dyn ProbeConnector + Send>>,
    sampling: Option<SamplingCfg>,
    probe_cfg: Option<ProbeCfg>,
    calibration: Option<CalibrationConfig>,
    clock: Option<Arc<dyn Clock>>,
}

impl MeasureModule {
    pub fn builder() -> MeasureModuleBuilder {
        MeasureModuleBuilder::default()
    }
}

impl MeasureModuleBuilder {
    pub fn with_co2_sensor(mut self, sensor: impl Co2Sensor + Send + 'static) -> Self {
        self.co2 = Some(Box::new(sensor));
        self
    }

    /// Register an additional sensor. Sensors are initialised in registration order.
    pub fn with_sensor(mut self, sensor: impl Sensor + Send + 'static) -> Self {
        self.sensors.push(Box::new(sensor));
        self
    }

    pub fn with_boxed_sensor(mut self, sensor: Box<dyn Sensor + Send>) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_probe(mut self, connector: Box<dyn ProbeConnector + Send>) -> Self {
        self.probe = Some(connector);
        self
    }

    pub fn with_sampling(mut self, cfg: SamplingCfg) -> Self {
        self.sampling = Some(cfg);
        self
    }

    pub fn with_probe_cfg(mut self, cfg: ProbeCfg) -> Self {
        self.probe_cfg = Some(cfg);
        self
    }

    pub fn with_calibration(mut self, cfg: CalibrationConfig) -> Self {
        self.calibration = Some(cfg);
        self
    }

    /// Clock used by the probe timeout watcher.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Take sampling, probe and calibration settings from a loaded config file.
    pub fn from_config(self, cfg: &cell_config::Config) -> Self {
        self.with_sampling(SamplingCfg::from(cfg))
            .with_probe_cfg(ProbeCfg::from(&cfg.probe))
            .with_calibration(CalibrationConfig::from(&cfg.calibration))
    }

    pub fn try_build(self) -> Result<MeasureModule> {
        let co2 = self
            .co2
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCo2Sensor))?;
        let connector = self
            .probe
            .ok_or_else(|| eyre::Report::new(BuildError::MissingProbe))?;
        let sampling = self.sampling.unwrap_or_default();
        let probe_cfg = self.probe_cfg.unwrap_or_default();
        let calibration = self.calibration.unwrap_or_default();

        if sampling.n_sample < 3 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "n_sample must be >= 3",
            )));
        }
        if sampling.replicas.contains(&0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "replicas must be >= 1",
            )));
        }
        if sampling.sensor_period.is_zero() || sampling.calibration_period.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "task periods must be > 0",
            )));
        }
        if probe_cfg.response_timeout.is_zero() || probe_cfg.poll.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "probe timings must be > 0",
            )));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let probe = ProbeDriver::new(connector, probe_cfg, clock);
        let engine = Engine::new(sampling, calibration, co2, self.sensors, probe);
        let module = MeasureModule::start(engine)
            .map_err(|e| eyre::Report::new(e).wrap_err("cannot spawn measurement tasks"))?;
        tracing::info!(tasks = ?module.task_names(), "measurement module built");
        Ok(module)
    }
}
