//! Binary entry point.
//!
//! No CLI flags: the session is purely interactive, and configuration comes
//! from `config/default.toml` plus `OCVLOG_*` environment variables. Exits 0
//! only on an operator-confirmed quit; any fatal condition (no instruments,
//! wiring declined, bus failure) prints a one-line cause and exits non-zero.

use anyhow::Context;
use ocv_logger::{SessionController, Settings};
use std::io;
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("ERROR: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    let log_path = default_log_path().context("Failed to resolve the log file location")?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut session = SessionController::new(stdin.lock(), stdout.lock(), settings.clone());

    #[cfg(feature = "bus_visa")]
    let bus = ocv_logger::bus::VisaBus::new(&settings.bus)?;
    #[cfg(not(feature = "bus_visa"))]
    let bus = ocv_logger::bus::SerialBus::new(&settings.bus);

    session.run(&bus, &log_path)?;
    Ok(())
}

/// Fixed log location: a `data` subdirectory next to the executable,
/// filename `voltages.csv`. No per-run timestamped filenames; the log grows
/// forever across sessions.
fn default_log_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let dir = exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("data").join("voltages.csv"))
}
