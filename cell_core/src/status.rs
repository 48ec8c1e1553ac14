//! Device state as seen by the control surface.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

impl DeviceState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::Initializing => "initializing",
            DeviceState::Running => "running",
            DeviceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `MeasureModule::get` refused to produce a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotReady {
    #[error("measurement module is still initialising")]
    Initializing,
    #[error("measurement module is halted; check the error log and reset")]
    Halted,
}
