//! Capability seam for persistence.

use crate::error::DaqResult;
use crate::sample::Sample;

/// Consumer side of the pipeline: formats and persists samples.
///
/// Implementations own their write buffering; `append` may defer I/O until
/// an internal threshold is reached, and `flush` forces everything out. The
/// batched writer task calls `flush` one final time at shutdown.
pub trait SampleSink {
    /// Consume one sample.
    fn append(&mut self, sample: &Sample) -> DaqResult<()>;

    /// Force buffered rows out to the underlying resource.
    fn flush(&mut self) -> DaqResult<()>;
}
