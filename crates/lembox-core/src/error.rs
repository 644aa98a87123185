//! Error types for the acquisition pipeline.
//!
//! A single [`DaqError`] enum covers every failure mode the pipeline can
//! report: device discovery, configuration rejection, buffer-pool setup,
//! hardware stream faults and storage I/O. Library code returns
//! [`DaqResult`]; the binary maps variants onto its machine-parsable status
//! lines.

use thiserror::Error;

/// Result type alias for acquisition operations.
pub type DaqResult<T> = std::result::Result<T, DaqError>;

/// Errors reported by the acquisition pipeline.
#[derive(Error, Debug)]
pub enum DaqError {
    /// No acquisition device could be found or opened.
    #[error("Device not found: {message}")]
    DeviceNotFound { message: String },

    /// The device rejected the requested configuration, or the
    /// configuration failed semantic validation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The hardware buffer pool could not be allocated or submitted.
    #[error("Buffer pool error: {message}")]
    BufferPool { message: String },

    /// Fault reported by the device mid-stream.
    #[error("Hardware error: {message}")]
    Hardware { message: String },

    /// An operation was attempted in the wrong lifecycle state.
    #[error("Invalid state: expected {expected}, was {actual}")]
    InvalidState { expected: String, actual: String },

    /// The batched writer task terminated abnormally.
    #[error("Writer task failed: {message}")]
    Writer { message: String },

    /// I/O error from the output resource or the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaqError {
    /// Shorthand for a configuration rejection.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Shorthand for a mid-stream hardware fault.
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = DaqError::invalid_config("sample_rate must be positive");
        assert!(err.to_string().contains("sample_rate"));
    }

    #[test]
    fn io_error_converts() {
        fn open_missing() -> DaqResult<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/lembox")?)
        }
        assert!(matches!(open_missing(), Err(DaqError::Io(_))));
    }
}
