//! `lembox` — multi-channel analog data collector.
//!
//! Designed to be driven as a subprocess by an orchestrating collector:
//! machine-parsable `OK:`/`ERROR:` status lines go to stdout, diagnostics
//! go to stderr via `tracing`, and the exit code is 0 on success (or a
//! successful `--check` probe) and 1 on any setup failure.
//!
//! # Usage
//!
//! Probe the device:
//! ```bash
//! lembox --check
//! ```
//!
//! Collect until `q` is pressed:
//! ```bash
//! lembox --collect run42.csv
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod controller;
mod settings;
mod status;
mod stop;

/// LEM transducer data collector.
#[derive(Parser)]
#[command(
    name = "lembox",
    about = "Multi-channel analog data collector for LEM transducer boxes",
    version
)]
struct Cli {
    /// Probe the acquisition device and exit.
    #[arg(long)]
    check: bool,

    /// Collect samples into the given CSV file until stopped (press 'q').
    #[arg(long, value_name = "FILE")]
    collect: Option<PathBuf>,

    /// Optional TOML settings file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop automatically after this many seconds.
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,
}

fn main() -> ExitCode {
    // Diagnostics on stderr; stdout carries only the status-line protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match settings::Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("could not load settings: {err:#}");
            status::error("CONFIG_INVALID");
            return ExitCode::FAILURE;
        }
    };

    let code = if cli.check {
        controller::run_check(&settings)
    } else if let Some(output) = cli.collect.as_deref() {
        controller::run_collect(&settings, output, cli.duration)
    } else {
        status::error("NO_OUTPUT_FILE");
        1
    };

    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
