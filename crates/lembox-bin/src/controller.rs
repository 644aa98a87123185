//! Lifecycle controller.
//!
//! Orchestrates one collection run end to end: open the output log (fail
//! fast — acquisition must not start without it), configure the device,
//! start the stream, run the engine, and report results through the
//! status-line protocol. Teardown falls out of ownership order: the engine
//! joins its writer after the final drain, the writer flushes before it
//! exits, and the device releases its pool when the source is dropped.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use lembox_core::{AcquisitionClock, AcquisitionEngine, DaqError, SampleSource};
use lembox_driver_sim::SimSource;
use lembox_storage::CsvStreamWriter;

use crate::settings::Settings;
use crate::status;
use crate::stop;

/// Status reason for a configuration-phase failure.
fn configure_failure_status(err: &DaqError) -> &'static str {
    match err {
        DaqError::DeviceNotFound { .. } => "BOARD_INIT_FAILED",
        DaqError::BufferPool { .. } => "BUFFER_ALLOC_FAILED",
        _ => "ADC_CONFIG_FAILED",
    }
}

/// `--check`: probe and configure the device, then exit.
pub fn run_check(settings: &Settings) -> i32 {
    let mut source = SimSource::new(settings.simulator.clone());
    match source.configure(&settings.acquisition) {
        Ok(()) => {
            status::ok("BOARD_CONNECTED");
            0
        }
        Err(err) => {
            error!(error = %err, "device probe failed");
            status::error("BOARD_INIT_FAILED");
            1
        }
    }
}

/// `--collect <FILE>`: acquire until the operator (or the duration timer)
/// requests a stop.
pub fn run_collect(settings: &Settings, output: &Path, duration: Option<f64>) -> i32 {
    // Clock base and monotonic zero for the whole run, captured before
    // anything else so the writer can synthesize timestamps from day one.
    let clock = Arc::new(AcquisitionClock::start_now());

    let writer = match CsvStreamWriter::create(
        output,
        &settings.acquisition.channels,
        Arc::clone(&clock),
        settings.writer.clone(),
    ) {
        Ok(writer) => writer,
        Err(err) => {
            error!(error = %err, path = %output.display(), "could not create output log");
            status::error("FILE_OPEN_FAILED");
            return 1;
        }
    };

    let engine = match AcquisitionEngine::new(settings.acquisition.clone(), clock) {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "invalid acquisition configuration");
            status::error("ADC_CONFIG_FAILED");
            return 1;
        }
    };

    let mut source = SimSource::new(settings.simulator.clone());
    if let Err(err) = engine.configure(&mut source) {
        error!(error = %err, "device configuration failed");
        status::error(configure_failure_status(&err));
        return 1;
    }

    stop::spawn_keypress_watcher(engine.stop_handle());
    if let Some(seconds) = duration {
        stop::spawn_duration_timer(engine.stop_handle(), seconds);
    }

    if let Err(err) = engine.start(&mut source) {
        error!(error = %err, "could not start acquisition");
        status::error("ACQUISITION_START_FAILED");
        return 1;
    }
    status::ok("ACQUISITION_STARTED");
    info!(path = %output.display(), "collecting; press 'q' to stop");

    match engine.run(&mut source, writer) {
        Ok(summary) => {
            if summary.fault_stop {
                warn!("run ended on a persistent hardware fault; captured data was flushed");
            }
            if summary.write_errors > 0 {
                warn!(rows = summary.write_errors, "rows were lost to storage errors");
            }
            if source.overruns() > 0 {
                warn!(overruns = source.overruns(), "device reported buffer overruns");
            }
            info!(
                samples = summary.samples_acquired,
                written = summary.samples_written,
                saturation_events = summary.queue_saturation_events,
                "collection finished"
            );
            status::ok("ACQUISITION_COMPLETE");
            status::samples(summary.samples_acquired);
            0
        }
        Err(err) => {
            error!(error = %err, "acquisition failed");
            status::error("ACQUISITION_FAILED");
            1
        }
    }
}
