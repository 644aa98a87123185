//! Acquisition configuration.
//!
//! Defaults reproduce the collector's production setup: two ±10 V channels
//! (voltage and current taps of the LEM transducer) scanned at 20 kHz,
//! 16-bit binary encoding, a pool of 240 hardware buffers of 4000 scans
//! each, and a 400 000-slot sample queue.

use serde::{Deserialize, Serialize};

use crate::convert::{Encoding, InputRange};
use crate::error::{DaqError, DaqResult};

/// Default per-channel scan rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 20_000.0;
/// Default scans per hardware buffer.
pub const DEFAULT_SAMPLES_PER_BUFFER: usize = 4000;
/// Default hardware buffer pool size.
pub const DEFAULT_NUM_BUFFERS: usize = 240;
/// Default sample queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 400_000;

/// One analog input channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Hardware channel number.
    pub channel: u32,
    /// Label used in the output header (e.g. "Voltage").
    pub label: String,
    /// Units used in the output header (e.g. "V").
    #[serde(default = "default_units")]
    pub units: String,
    /// Full-scale input range.
    #[serde(default)]
    pub range: InputRange,
}

fn default_units() -> String {
    "V".to_string()
}

impl ChannelConfig {
    /// Create a channel with the given full-scale range and "V" units.
    pub fn new(channel: u32, label: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            channel,
            label: label.into(),
            units: default_units(),
            range: InputRange { min, max },
        }
    }

    /// Set the units shown in the output header.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }
}

/// Complete acquisition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Per-channel scan rate in Hz.
    pub sample_rate: f64,
    /// Scans per hardware buffer.
    pub samples_per_buffer: usize,
    /// Number of buffers in the hardware pool.
    pub num_buffers: usize,
    /// Capacity of the producer/consumer sample queue.
    pub queue_capacity: usize,
    /// Converter resolution in bits (raw codes are `resolution_bits` wide).
    pub resolution_bits: u32,
    /// Raw code encoding.
    pub encoding: Encoding,
    /// Channels scanned per sample, in scan order.
    pub channels: Vec<ChannelConfig>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelConfig::new(0, "Voltage", -10.0, 10.0),
                ChannelConfig::new(1, "Current", -10.0, 10.0).with_units("A"),
            ],
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples_per_buffer: DEFAULT_SAMPLES_PER_BUFFER,
            num_buffers: DEFAULT_NUM_BUFFERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            resolution_bits: 16,
            encoding: Encoding::Binary,
        }
    }
}

impl AcquisitionConfig {
    /// Create a new builder.
    pub fn builder() -> AcquisitionConfigBuilder {
        AcquisitionConfigBuilder::default()
    }

    /// Nominal interval between consecutive scans, in seconds.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Raw values per hardware buffer (scans × channels).
    pub fn buffer_len(&self) -> usize {
        self.samples_per_buffer * self.channels.len()
    }

    /// Semantic validation, applied after parsing.
    pub fn validate(&self) -> DaqResult<()> {
        if self.channels.is_empty() {
            return Err(DaqError::invalid_config("at least one channel is required"));
        }
        if !(self.sample_rate > 0.0) {
            return Err(DaqError::invalid_config(format!(
                "invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.samples_per_buffer == 0 {
            return Err(DaqError::invalid_config(
                "samples_per_buffer must be greater than 0",
            ));
        }
        if self.num_buffers == 0 {
            return Err(DaqError::invalid_config("num_buffers must be greater than 0"));
        }
        if self.queue_capacity == 0 {
            return Err(DaqError::invalid_config(
                "queue_capacity must be greater than 0",
            ));
        }
        if self.resolution_bits == 0 || self.resolution_bits > 16 {
            return Err(DaqError::invalid_config(format!(
                "resolution_bits must be in 1..=16, got {}",
                self.resolution_bits
            )));
        }
        Ok(())
    }
}

/// Builder for [`AcquisitionConfig`].
#[derive(Debug, Default)]
pub struct AcquisitionConfigBuilder {
    config: AcquisitionConfig,
}

impl AcquisitionConfigBuilder {
    /// Set the channel list.
    pub fn channels(mut self, channels: Vec<ChannelConfig>) -> Self {
        self.config.channels = channels;
        self
    }

    /// Set the per-channel scan rate in Hz.
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Set the scans per hardware buffer.
    pub fn samples_per_buffer(mut self, scans: usize) -> Self {
        self.config.samples_per_buffer = scans;
        self
    }

    /// Set the hardware buffer pool size.
    pub fn num_buffers(mut self, n: usize) -> Self {
        self.config.num_buffers = n;
        self
    }

    /// Set the sample queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the converter resolution in bits.
    pub fn resolution_bits(mut self, bits: u32) -> Self {
        self.config.resolution_bits = bits;
        self
    }

    /// Set the raw code encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Validate and build.
    pub fn build(self) -> DaqResult<AcquisitionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
