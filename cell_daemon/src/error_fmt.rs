//! Human-readable error descriptions and structured JSON error formatting.

use cell_core::error::{BuildError, CellError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingCo2Sensor => {
                "What happened: No CO2 sensor was provided to the measurement engine.\nLikely causes: The sensor roster was not wired into the builder.\nHow to fix: Pass the CO2 sensor via with_co2_sensor(...).".to_string()
            }
            BuildError::MissingProbe => {
                "What happened: No oxygen probe connector was provided to the measurement engine.\nLikely causes: The probe connector was not wired into the builder.\nHow to fix: Pass a connector via with_probe(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CellError>() {
        return match ce {
            CellError::ProbeConnect(_) | CellError::ProbeNotConnected => format!(
                "What happened: {ce}.\nLikely causes: Probe unplugged, wrong probe.vendor_id/product_id, or missing USB permissions.\nHow to fix: Check the cable and the ids in the config, then reset."
            ),
            CellError::ProbeTimeout(_) | CellError::ProbeCritical => format!(
                "What happened: {ce}.\nLikely causes: Probe firmware hung or the cable was disturbed.\nHow to fix: Reset the module; consider raising probe.response_timeout_ms."
            ),
            _ => format!(
                "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(nr) = err.downcast_ref::<NotRunning>() {
        let listed: String = nr.errors.iter().map(|e| format!("\n  - {e}")).collect();
        return format!(
            "What happened: The measurement module did not come up (state: {}).\nErrors, newest first:{listed}\nHow to fix: Check the sensors named above, then rerun.",
            nr.state
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("config") {
        return format!(
            "What happened: Configuration could not be loaded ({msg}).\nLikely causes: Unreadable file, TOML syntax error, or a value rejected by validation.\nHow to fix: Fix the file passed via --config; every section is optional.\nDetail: {err:#}"
        );
    }

    if lower.contains("cannot listen") || lower.contains("address in use") {
        return format!(
            "What happened: The control socket could not be opened.\nLikely causes: Another daemon is running or the address is invalid.\nHow to fix: Stop the other instance or pass --bind.\nDetail: {err:#}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration problems, 3 for a module that did not come up, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<NotRunning>().is_some() {
        return 3;
    }
    if format!("{err:#}").to_ascii_lowercase().contains("config") {
        return 2;
    }
    1
}

/// The module ended `self-check`/`snapshot` in a state other than running.
#[derive(Debug)]
pub struct NotRunning {
    pub state: cell_core::DeviceState,
    pub errors: Vec<String>,
}

impl std::fmt::Display for NotRunning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "measurement module is {}", self.state)?;
        if let Some(first) = self.errors.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NotRunning {}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(nr) = err.downcast_ref::<NotRunning>() {
        return json!({
            "reason": "NotRunning",
            "state": nr.state.as_str(),
            "errors": nr.errors,
            "message": humanize(err),
        })
        .to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_map_to_config_exit_code() {
        let r = eyre::Report::new(BuildError::InvalidConfig("n_sample must be >= 3"));
        assert_eq!(exit_code_for_error(&r), 2);
        assert!(humanize(&r).contains("n_sample must be >= 3"));
    }

    #[test]
    fn not_running_is_reported_with_state() {
        let r = eyre::Report::new(NotRunning {
            state: cell_core::DeviceState::Stopped,
            errors: vec!["cannot initialise oxygen probe".into()],
        });
        assert_eq!(exit_code_for_error(&r), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&r)).unwrap();
        assert_eq!(v["state"], "stopped");
        assert_eq!(v["errors"][0], "cannot initialise oxygen probe");
    }
}
