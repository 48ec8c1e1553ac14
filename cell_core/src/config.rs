//! Runtime configuration for the measurement engine.
//!
//! Separate from the TOML-deserialized config in `cell_config`.

use std::time::Duration;

use cell_traits::Quantity;

/// Window sizing and task cadence.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Minimum samples before a window reports an average.
    pub n_sample: usize,
    /// Sensors feeding each quantity, indexed by `Quantity::index()`.
    pub replicas: [usize; Quantity::COUNT],
    pub sensor_period: Duration,
    pub calibration_period: Duration,
}

impl SamplingCfg {
    pub fn replicas(&self, q: Quantity) -> usize {
        self.replicas[q.index()]
    }
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self::from(&cell_config::Config::default())
    }
}

/// Oxygen probe addressing and timing.
#[derive(Debug, Clone)]
pub struct ProbeCfg {
    pub vendor_id: u16,
    pub product_id: u16,
    /// How long a request may stay unanswered before the probe is latched.
    pub response_timeout: Duration,
    /// Length of one inbound listen slice in the dispatch thread.
    pub poll: Duration,
}

impl Default for ProbeCfg {
    fn default() -> Self {
        Self::from(&cell_config::Probe::default())
    }
}
