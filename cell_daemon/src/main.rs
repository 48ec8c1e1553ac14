mod cli;
mod control;
mod error_fmt;
mod logging;
mod roster;
mod server;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cell_core::{DeviceState, MeasureModule};
use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{NotRunning, exit_code_for_error, format_error_json, humanize};

fn load_config(cli: &Cli) -> eyre::Result<cell_config::Config> {
    match &cli.config {
        Some(path) => cell_config::load_file(path),
        None => Ok(cell_config::Config::default()),
    }
}

fn build_module(cfg: &cell_config::Config) -> eyre::Result<MeasureModule> {
    roster::attach(MeasureModule::builder().from_config(cfg), cfg).try_build()
}

fn not_running(module: &MeasureModule) -> eyre::Report {
    eyre::Report::new(NotRunning {
        state: module.state(),
        errors: module.get_errors().into_iter().map(|e| e.message).collect(),
    })
}

fn self_check(cfg: &cell_config::Config) -> eyre::Result<()> {
    let module = build_module(cfg)?;
    match module.reset_and_wait() {
        DeviceState::Running => {
            println!("self-check ok: all sensors and the oxygen probe initialised");
            Ok(())
        }
        _ => Err(not_running(&module)),
    }
}

fn snapshot(cfg: &cell_config::Config, wait: Duration) -> eyre::Result<()> {
    let module = build_module(cfg)?;
    if module.reset_and_wait() != DeviceState::Running {
        return Err(not_running(&module));
    }
    std::thread::sleep(wait);
    match module.get() {
        Ok(snap) => {
            println!("{}", control::snapshot_json(&snap));
            if !snap.is_complete() {
                tracing::warn!(missing = ?snap.missing(), "snapshot is incomplete");
            }
            Ok(())
        }
        Err(_) => Err(not_running(&module)),
    }
}

fn serve(cfg: &cell_config::Config, bind: Option<String>) -> eyre::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("cannot install Ctrl-C handler")?;
    }

    let addr = bind.unwrap_or_else(|| cfg.server.bind.clone());
    let server = server::Server::bind(&addr)?;
    let module = Arc::new(build_module(cfg)?);
    module.reset();
    tracing::info!(addr = %server.local_addr()?, "control socket listening");
    // stdout line lets supervisors and tests find the bound port
    println!("listening on {}", server.local_addr()?);

    server.run(module.clone(), shutdown)?;
    drop(module);
    tracing::info!("measurement stopped");
    Ok(())
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli)?;
    if let Err(e) = logging::init(cli.json, &cli.log_level, &cfg.logging) {
        eprintln!("logging disabled: {e:#}");
    }
    match cli.cmd {
        Commands::Serve { bind } => serve(&cfg, bind),
        Commands::SelfCheck => self_check(&cfg),
        Commands::Snapshot { wait_ms } => snapshot(&cfg, Duration::from_millis(wait_ms)),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
