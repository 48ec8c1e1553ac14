//! Tracing subscriber setup: console layer plus an optional rolling file sink.

use std::path::Path;

use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::FILE_GUARD;

fn file_appender(path: &Path, rotation: Option<&str>) -> RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "cell_daemon.log".into(), |n| n.to_string_lossy().into_owned());
    match rotation {
        Some("daily") => rolling::daily(dir, name),
        Some("hourly") => rolling::hourly(dir, name),
        _ => rolling::never(dir, name),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` for the console.
/// The file sink always writes JSON lines at the configured `[logging] level`.
pub fn init(json: bool, level: &str, cfg: &cell_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| eyre::eyre!("invalid log level {level:?}: {e}"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match cfg.file.as_deref() {
        Some(path) => {
            let file_level = cfg.level.as_deref().unwrap_or("info");
            let filter = EnvFilter::try_new(file_level)
                .map_err(|e| eyre::eyre!("invalid logging.level {file_level:?}: {e}"))?;
            let (writer, guard) =
                tracing_appender::non_blocking(file_appender(Path::new(path), cfg.rotation.as_deref()));
            // first init wins; a second guard would be dropped immediately
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("cannot install tracing subscriber: {e}"))
}
