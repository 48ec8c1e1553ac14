use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CellError {
    /// Any non-transient failure from a sensor collaborator.
    #[error("bus fault on {sensor}: {message}")]
    BusFault { sensor: &'static str, message: String },
    #[error("no new data")]
    NoNewData,
    #[error("not enough samples for an accurate average ({have}/{need})")]
    InsufficientSamples { have: usize, need: usize },
    #[error("oxygen probe did not answer within {0} ms")]
    ProbeTimeout(u64),
    #[error("oxygen probe reported errors: {0}")]
    ProbeSensorFault(String),
    #[error("oxygen calculation produced a non-finite value")]
    CalculationError,
    #[error("oxygen probe is not connected")]
    ProbeNotConnected,
    #[error("oxygen probe is latched in critical error; reset required")]
    ProbeCritical,
    #[error("cannot connect to oxygen probe: {0}")]
    ProbeConnect(String),
    #[error("cannot derive device id from serial {0:?}")]
    InvalidSerial(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing co2 sensor")]
    MissingCo2Sensor,
    #[error("missing probe connector")]
    MissingProbe,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
