//! Operator stop signal.
//!
//! A watcher thread reads stdin and requests a cooperative stop when the
//! operator presses `q`. The acquisition loop polls the stop flag once per
//! iteration, so the keypress never blocks the hardware path.

use std::io::Read as _;
use std::thread;
use std::time::Duration;

use tracing::debug;

use lembox_core::StopHandle;

/// Watch stdin for a `q`/`Q` keypress and request a stop.
///
/// The thread is detached: it either sees the key (or EOF) and exits, or
/// dies with the process.
pub fn spawn_keypress_watcher(stop: StopHandle) {
    let builder = thread::Builder::new().name("stop-watcher".to_string());
    let spawned = builder.spawn(move || {
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) => break, // stdin closed; stop can still come from --duration
                Ok(_) => {
                    if byte[0] == b'q' || byte[0] == b'Q' {
                        debug!("operator stop key received");
                        stop.request_stop();
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    if spawned.is_err() {
        tracing::warn!("could not spawn stop watcher; use --duration or SIGTERM to stop");
    }
}

/// Request a stop after `seconds` of acquisition.
pub fn spawn_duration_timer(stop: StopHandle, seconds: f64) {
    let builder = thread::Builder::new().name("duration-timer".to_string());
    let spawned = builder.spawn(move || {
        thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
        debug!(seconds, "duration elapsed; requesting stop");
        stop.request_stop();
    });
    if spawned.is_err() {
        tracing::warn!("could not spawn duration timer");
    }
}
