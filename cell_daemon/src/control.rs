//! Control protocol: `<request-id> <COMMAND> [args…]` per line, one JSON answer per request.

use cell_core::{CalibrationConfig, MeasureModule, NotReady, Snapshot};
use cell_traits::Quantity;
use serde_json::{Value, json};

/// Not ready yet, or a snapshot with missing series.
pub const CODE_INITIALISING: u32 = 1;
/// Halted by a fault; the error log says why.
pub const CODE_HALTED: u32 = 2;
/// Malformed or unknown command.
pub const CODE_BAD_REQUEST: u32 = 3;

const SET_CONFIG_ARGS: [&str; 16] = [
    "altitude",
    "F1",
    "M",
    "DPHI1",
    "DPHI2",
    "DKSV1",
    "DKSV2",
    "pressure",
    "cal0",
    "cal2nd",
    "t0",
    "t2nd",
    "o2Cal2nd",
    "calibIsHumid",
    "enableTempFibox",
    "humidMode",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reset,
    SetConfig(CalibrationConfig),
    GetMeasure,
    GetErrors,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub code: u32,
    pub message: String,
}

impl ProtocolError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: CODE_BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_set_config(args: &[&str]) -> Result<CalibrationConfig, ProtocolError> {
    if args.len() != SET_CONFIG_ARGS.len() {
        return Err(ProtocolError::bad_request(format!(
            "SET_CONFIG takes {} arguments ({}), got {}",
            SET_CONFIG_ARGS.len(),
            SET_CONFIG_ARGS.join(" "),
            args.len()
        )));
    }
    let num = |i: usize| -> Result<f64, ProtocolError> {
        args[i]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ProtocolError::bad_request(format!(
                    "invalid {}: {:?} is not a number",
                    SET_CONFIG_ARGS[i], args[i]
                ))
            })
    };
    let flag = |i: usize| -> Result<bool, ProtocolError> {
        parse_bool(args[i]).ok_or_else(|| {
            ProtocolError::bad_request(format!(
                "invalid {}: {:?} is not a boolean",
                SET_CONFIG_ARGS[i], args[i]
            ))
        })
    };
    let cfg = CalibrationConfig {
        altitude: num(0)?,
        f1: num(1)?,
        m: num(2)?,
        dphi1: num(3)?,
        dphi2: num(4)?,
        dksv1: num(5)?,
        dksv2: num(6)?,
        pressure: num(7)?,
        cal0: num(8)?,
        cal2nd: num(9)?,
        t0: num(10)?,
        t2nd: num(11)?,
        o2_cal2nd: num(12)?,
        calib_is_humid: flag(13)?,
        enable_temp_fibox: flag(14)?,
        humid_mode: flag(15)?,
    };
    if cfg.m == 0.0 {
        return Err(ProtocolError::bad_request("invalid M: must be non-zero"));
    }
    Ok(cfg)
}

/// Split one request line into its id and command.
pub fn parse(line: &str) -> Result<(String, Command), (Option<String>, ProtocolError)> {
    let mut words = line.split_whitespace();
    let Some(id) = words.next() else {
        return Err((None, ProtocolError::bad_request("empty request")));
    };
    let id = id.to_string();
    let Some(name) = words.next() else {
        return Err((Some(id), ProtocolError::bad_request("missing command")));
    };
    let args: Vec<&str> = words.collect();
    let command = match name.to_ascii_uppercase().as_str() {
        "RESET" => Command::Reset,
        "SET_CONFIG" => match parse_set_config(&args) {
            Ok(cfg) => Command::SetConfig(cfg),
            Err(e) => return Err((Some(id), e)),
        },
        "GET_MEASURE" => Command::GetMeasure,
        "GET_ERRORS" => Command::GetErrors,
        "CLOSE" => Command::Close,
        other => {
            return Err((
                Some(id),
                ProtocolError::bad_request(format!("unknown command {other:?}")),
            ));
        }
    };
    Ok((id, command))
}

fn id_value(id: Option<&str>) -> Value {
    match id {
        Some(s) => s.parse::<u64>().map_or_else(|_| json!(s), |n| json!(n)),
        None => Value::Null,
    }
}

pub fn success(id: Option<&str>, data: Value) -> String {
    json!({ "id": id_value(id), "success": true, "data": data }).to_string()
}

pub fn failure(id: Option<&str>, err: &ProtocolError) -> String {
    json!({
        "id": id_value(id),
        "success": false,
        "error": { "code": err.code, "message": err.message },
    })
    .to_string()
}

fn key(q: Quantity) -> &'static str {
    match q {
        Quantity::Co2 => "CO2",
        Quantity::O2 => "O2",
        other => other.as_str(),
    }
}

pub fn snapshot_json(snap: &Snapshot) -> Value {
    let map: serde_json::Map<String, Value> = snap
        .iter()
        .map(|(q, v)| (key(q).to_string(), json!(v)))
        .collect();
    Value::Object(map)
}

fn not_ready(e: NotReady) -> ProtocolError {
    let code = match e {
        NotReady::Initializing => CODE_INITIALISING,
        NotReady::Halted => CODE_HALTED,
    };
    ProtocolError {
        code,
        message: e.to_string(),
    }
}

/// Outcome of one request: the answer line, and whether the connection should close.
pub struct Reply {
    pub line: String,
    pub close: bool,
}

/// Run `command` against `module` and render its answer.
pub fn execute(module: &MeasureModule, id: &str, command: Command) -> Reply {
    let id = Some(id);
    let line = match command {
        Command::Reset => {
            module.reset();
            success(id, Value::Null)
        }
        Command::SetConfig(cfg) => {
            module.set_config(cfg);
            success(id, Value::Null)
        }
        Command::GetMeasure => match module.get() {
            Ok(snap) if snap.is_complete() => success(id, snapshot_json(&snap)),
            Ok(snap) => {
                let missing: Vec<_> = snap.missing().into_iter().map(key).collect();
                failure(
                    id,
                    &ProtocolError {
                        code: CODE_INITIALISING,
                        message: format!("not enough data yet for {}", missing.join(", ")),
                    },
                )
            }
            Err(e) => failure(id, &not_ready(e)),
        },
        Command::GetErrors => {
            let list: Vec<Value> = module
                .get_errors()
                .iter()
                .map(|e| {
                    json!({
                        "date": e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        "message": e.message,
                    })
                })
                .collect();
            success(id, Value::Array(list))
        }
        Command::Close => {
            return Reply {
                line: success(id, Value::Null),
                close: true,
            };
        }
    };
    Reply { line, close: false }
}

/// Parse and execute one request line. Blank lines produce no answer.
pub fn handle_line(module: &MeasureModule, line: &str) -> Option<Reply> {
    if line.trim().is_empty() {
        return None;
    }
    Some(match parse(line) {
        Ok((id, command)) => {
            tracing::debug!(%id, ?command, "control request");
            execute(module, &id, command)
        }
        Err((id, e)) => {
            tracing::warn!(error = %e.message, "rejected control request");
            Reply {
                line: failure(id.as_deref(), &e),
                close: false,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DEFAULTS: &str =
        "237 0.808 30 -0.068 -0.00035 0.000371 0 967 60.22 26.82 20 20 100 1 0 0";

    #[test]
    fn set_config_arguments_map_in_order() {
        let (id, cmd) = parse(&format!("7 SET_CONFIG {DEFAULTS}")).unwrap();
        assert_eq!(id, "7");
        let Command::SetConfig(cfg) = cmd else {
            panic!("expected SET_CONFIG");
        };
        assert_eq!(cfg, CalibrationConfig::default());
    }

    #[test]
    fn set_config_names_the_bad_argument() {
        let line = DEFAULTS.replacen("0.808", "abc", 1);
        let (id, err) = parse(&format!("8 SET_CONFIG {line}")).unwrap_err();
        assert_eq!(id.as_deref(), Some("8"));
        assert!(err.message.contains("F1"), "{}", err.message);
    }

    #[test]
    fn set_config_checks_arity() {
        let (_, err) = parse("9 SET_CONFIG 1 2 3").unwrap_err();
        assert_eq!(err.code, CODE_BAD_REQUEST);
        assert!(err.message.contains("got 3"));
    }

    #[rstest]
    #[case("1 RESET", Command::Reset)]
    #[case("2 get_measure", Command::GetMeasure)]
    #[case("3   GET_ERRORS  ", Command::GetErrors)]
    #[case("4 CLOSE", Command::Close)]
    fn simple_commands(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse(line).unwrap().1, expected);
    }

    #[rstest]
    #[case("5 FLY")]
    #[case("5")]
    fn bad_commands(#[case] line: &str) {
        let (_, err) = parse(line).unwrap_err();
        assert_eq!(err.code, CODE_BAD_REQUEST);
    }

    #[test]
    fn failure_shape() {
        let s = failure(
            Some("12"),
            &ProtocolError {
                code: CODE_HALTED,
                message: "halted".into(),
            },
        );
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["id"], 12);
        assert_eq!(v["success"], false);
        assert_eq!(v["error"]["code"], 2);
    }

    #[test]
    fn snapshot_keys() {
        let mut snap = Snapshot::default();
        for q in Quantity::ALL {
            snap.set(q, Some(1.0));
        }
        let v = snapshot_json(&snap);
        for k in ["CO2", "O2", "temperature", "humidity", "pressure", "luminosity"] {
            assert_eq!(v[k], 1.0, "{k}");
        }
    }
}
