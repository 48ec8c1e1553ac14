#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Measurement engine for the cell monitor (hardware-agnostic).
//!
//! All hardware goes through the `cell_traits` seams: `Sensor` and
//! `Co2Sensor` for the I²C roster, `ProbeConnector`/`ProbeLink` for the USB
//! oxygen probe.
//!
//! ## Architecture
//!
//! - **Windows**: one rolling [`SampleWindow`] per quantity, averaged after
//!   dropping one maximum and one minimum sample (`window` module)
//! - **Probe**: frame codec and the single-request driver with its timeout
//!   latch (`probe` module)
//! - **Oxygen**: two-site Stern-Volmer conversion from phase angle (`oxygen`)
//! - **Orchestration**: polling tasks, the shared fault domain and the error
//!   log ([`MeasureModule`], built with [`MeasureModuleBuilder`])

pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod measure;
pub mod mocks;
pub mod oxygen;
pub mod poller;
pub mod probe;
pub mod status;
pub mod types;
pub mod util;
pub mod window;

pub use builder::MeasureModuleBuilder;
pub use calibration::{CalibrationConfig, pressure_at_sea_level};
pub use config::{ProbeCfg, SamplingCfg};
pub use error::{BuildError, CellError, Report, Result};
pub use measure::MeasureModule;
pub use oxygen::{OxygenCalculation, OxygenInput};
pub use probe::{PacketReader, PacketWriter, ProbeAnswer, ProbeDriver};
pub use status::{DeviceState, NotReady};
pub use types::{ErrorRecord, Snapshot};
pub use window::SampleWindow;
