//! Machine-parsable status lines.
//!
//! One line per event on stdout, `OK:<EVENT>` or `ERROR:<REASON>`, flushed
//! immediately so an orchestrating parent process sees events as they
//! happen. Everything else the collector prints goes to stderr.

use std::io::Write as _;

/// Report a successful event.
pub fn ok(event: &str) {
    emit(format_args!("OK:{event}"));
}

/// Report a failure.
pub fn error(reason: &str) {
    emit(format_args!("ERROR:{reason}"));
}

/// Report the final sample count.
pub fn samples(count: u64) {
    emit(format_args!("SAMPLES:{count}"));
}

fn emit(line: std::fmt::Arguments<'_>) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}
