//! Capability seam for the acquisition hardware.
//!
//! The pipeline never talks to a vendor SDK directly. A device integration
//! implements [`SampleSource`] and owns the buffer pool: filled blocks are
//! handed out by `poll_buffer` and must come back through `return_buffer`
//! before the pool runs dry, or the device overruns and drops data on its
//! side. That timing constraint is the design invariant the acquisition
//! loop is built around; it is not enforced by a lock.

use crate::config::AcquisitionConfig;
use crate::error::DaqResult;

/// A filled block of raw codes handed over by the device.
///
/// Values are interleaved in scan order: `ch0, ch1, …, ch0, ch1, …`.
/// Ownership cycles between the device (while filling) and the acquisition
/// loop (while draining); returning the buffer hands the allocation back to
/// the pool.
#[derive(Debug)]
pub struct RawBuffer {
    /// Interleaved raw codes. Length is a multiple of the channel count
    /// for every complete scan; a trailing partial scan is ignored.
    pub data: Vec<u16>,
}

impl RawBuffer {
    /// Number of complete scans for the given channel count.
    pub fn scans(&self, n_channels: usize) -> usize {
        if n_channels == 0 {
            0
        } else {
            self.data.len() / n_channels
        }
    }
}

/// A continuous multi-channel sample stream (the hardware collaborator).
pub trait SampleSource {
    /// Apply the acquisition configuration and allocate the buffer pool.
    fn configure(&mut self, config: &AcquisitionConfig) -> DaqResult<()>;

    /// Start the hardware stream.
    fn start(&mut self) -> DaqResult<()>;

    /// Stop the hardware stream. Buffers already filled may still be
    /// retrieved with `poll_buffer` afterwards.
    fn stop(&mut self) -> DaqResult<()>;

    /// Non-blocking poll for the next filled buffer.
    ///
    /// `Ok(None)` means no buffer is ready this instant; an error means the
    /// stream faulted for this poll (the caller decides whether the fault
    /// is persistent).
    fn poll_buffer(&mut self) -> DaqResult<Option<RawBuffer>>;

    /// Return a drained buffer to the device pool.
    fn return_buffer(&mut self, buffer: RawBuffer) -> DaqResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_rounds_down_partial_scans() {
        let buffer = RawBuffer {
            data: vec![0; 7],
        };
        assert_eq!(buffer.scans(2), 3);
        assert_eq!(buffer.scans(0), 0);
    }
}
