//! Row-oriented CSV stream writer.
//!
//! Output schema (two default channels shown):
//!
//! ```text
//! Sample,PerfTime(s),Timestamp,VoltageRaw,Voltage(V),CurrentRaw,Current(A)
//! 0,0.000013,2024-03-15 09:30:00.000013,8000,0.000000,8000,0.000000
//! ```
//!
//! One row per sample: sequence number, monotonic elapsed seconds, the
//! synthesized absolute timestamp, then raw code (uppercase hex, four
//! digits) and converted value per channel. Rows accumulate in a
//! fixed-capacity write buffer; the buffer is flushed when its occupied
//! length crosses `capacity - ROW_MARGIN`, after every
//! [`CsvWriterConfig::flush_batch_rows`] rows, and unconditionally at
//! shutdown.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lembox_core::{AcquisitionClock, ChannelConfig, DaqError, DaqResult, Sample, SampleSink};

/// Default write buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 32_768;
/// Default row batch count between flushes.
pub const DEFAULT_FLUSH_BATCH_ROWS: usize = 1000;

/// Space reserved at the end of the buffer for the next formatted row.
const ROW_MARGIN: usize = 256;

/// Tunables for the CSV stream writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvWriterConfig {
    /// Write buffer capacity in bytes.
    pub buffer_capacity: usize,
    /// Flush after this many rows regardless of buffer occupancy.
    pub flush_batch_rows: usize,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush_batch_rows: DEFAULT_FLUSH_BATCH_ROWS,
        }
    }
}

/// Counters maintained by the writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterStats {
    /// Rows formatted into the buffer.
    pub rows_written: u64,
    /// Bytes flushed to the file.
    pub bytes_flushed: u64,
    /// Flush operations performed.
    pub flushes: u64,
}

/// Streaming CSV writer with a fixed-capacity write buffer.
pub struct CsvStreamWriter {
    file: File,
    path: PathBuf,
    clock: Arc<AcquisitionClock>,
    config: CsvWriterConfig,
    buf: Vec<u8>,
    row: String,
    rows_since_flush: usize,
    stats: WriterStats,
}

impl CsvStreamWriter {
    /// Create the output file, write the header and return the writer.
    ///
    /// Fails fast if the file cannot be created — acquisition must not
    /// start without a writable log.
    pub fn create(
        path: &Path,
        channels: &[ChannelConfig],
        clock: Arc<AcquisitionClock>,
        config: CsvWriterConfig,
    ) -> DaqResult<Self> {
        if config.buffer_capacity <= ROW_MARGIN {
            return Err(DaqError::invalid_config(format!(
                "write buffer capacity {} must exceed the {} byte row margin",
                config.buffer_capacity, ROW_MARGIN
            )));
        }
        if channels.is_empty() {
            return Err(DaqError::invalid_config(
                "at least one channel is required for the output schema",
            ));
        }

        let mut file = File::create(path)?;
        let mut header = String::from("Sample,PerfTime(s),Timestamp");
        for channel in channels {
            let _ = write!(header, ",{}Raw,{}({})", channel.label, channel.label, channel.units);
        }
        header.push('\n');
        file.write_all(header.as_bytes())?;
        info!(path = %path.display(), channels = channels.len(), "created output log");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            clock,
            buf: Vec::with_capacity(config.buffer_capacity),
            row: String::with_capacity(ROW_MARGIN),
            rows_since_flush: 0,
            stats: WriterStats::default(),
            config,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the writer counters.
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Format one sample into the write buffer.
    fn format_row(&mut self, sample: &Sample) {
        self.row.clear();
        let _ = write!(
            self.row,
            "{},{:.6},{}",
            sample.sequence,
            sample.elapsed,
            self.clock.format_timestamp(sample.elapsed)
        );
        for reading in &sample.readings {
            let _ = write!(self.row, ",{:04X},{:.6}", reading.raw, reading.value);
        }
        self.row.push('\n');
        self.buf.extend_from_slice(self.row.as_bytes());
    }

    /// Write the buffer out to the file.
    ///
    /// The buffer is cleared even when the write fails, so a persistent
    /// storage error cannot grow it without bound; the rows it held are
    /// lost and the error is reported to the caller.
    fn flush_buffer(&mut self) -> DaqResult<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let len = self.buf.len();
        let result = self.file.write_all(&self.buf);
        self.buf.clear();
        self.rows_since_flush = 0;
        result?;
        self.stats.bytes_flushed += len as u64;
        self.stats.flushes += 1;
        debug!(bytes = len, "flushed write buffer");
        Ok(())
    }
}

impl SampleSink for CsvStreamWriter {
    fn append(&mut self, sample: &Sample) -> DaqResult<()> {
        self.format_row(sample);
        self.stats.rows_written += 1;
        self.rows_since_flush += 1;

        let nearly_full = self.buf.len() > self.config.buffer_capacity - ROW_MARGIN;
        if nearly_full || self.rows_since_flush >= self.config.flush_batch_rows {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> DaqResult<()> {
        self.flush_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lembox_core::ChannelReading;
    use tempfile::TempDir;

    fn fixed_clock() -> Arc<AcquisitionClock> {
        let base = chrono::Utc
            .with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
            .single()
            .unwrap();
        Arc::new(AcquisitionClock::with_base(base))
    }

    fn default_channels() -> Vec<ChannelConfig> {
        vec![
            ChannelConfig::new(0, "Voltage", -10.0, 10.0),
            ChannelConfig::new(1, "Current", -10.0, 10.0).with_units("A"),
        ]
    }

    fn sample(sequence: u64, elapsed: f64, readings: &[(u16, f64)]) -> Sample {
        Sample::new(
            sequence,
            elapsed,
            readings
                .iter()
                .map(|&(raw, value)| ChannelReading { raw, value })
                .collect(),
        )
    }

    #[test]
    fn header_names_every_channel_pair() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = CsvStreamWriter::create(
            &path,
            &default_channels(),
            fixed_clock(),
            CsvWriterConfig::default(),
        )
        .unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            "Sample,PerfTime(s),Timestamp,VoltageRaw,Voltage(V),CurrentRaw,Current(A)"
        );
    }

    #[test]
    fn rows_are_formatted_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = CsvStreamWriter::create(
            &path,
            &default_channels(),
            fixed_clock(),
            CsvWriterConfig::default(),
        )
        .unwrap();

        writer
            .append(&sample(0, 1.5, &[(0x8000, 0.0), (0xFFFF, 9.999695)]))
            .unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().nth(1).unwrap(),
            "0,1.500000,2024-03-15 09:30:01.500000,8000,0.000000,FFFF,9.999695"
        );
    }

    #[test]
    fn batch_count_triggers_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let config = CsvWriterConfig {
            flush_batch_rows: 2,
            ..CsvWriterConfig::default()
        };
        let mut writer =
            CsvStreamWriter::create(&path, &default_channels(), fixed_clock(), config).unwrap();

        writer.append(&sample(0, 0.0, &[(0, -10.0), (0, -10.0)])).unwrap();
        // One row buffered, nothing beyond the header on disk yet.
        let after_one = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after_one.lines().count(), 1);

        writer.append(&sample(1, 0.1, &[(0, -10.0), (0, -10.0)])).unwrap();
        // Second row crossed the batch count: both rows are on disk.
        let after_two = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after_two.lines().count(), 3);
        assert_eq!(writer.stats().flushes, 1);
    }

    #[test]
    fn near_capacity_triggers_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        // Capacity barely above the margin: every row crosses the threshold.
        let config = CsvWriterConfig {
            buffer_capacity: ROW_MARGIN + 16,
            flush_batch_rows: 1_000_000,
        };
        let mut writer =
            CsvStreamWriter::create(&path, &default_channels(), fixed_clock(), config).unwrap();

        writer.append(&sample(0, 0.0, &[(1, -9.9), (2, -9.8)])).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2, "row should have been flushed");
    }

    #[test]
    fn final_flush_writes_the_remainder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = CsvStreamWriter::create(
            &path,
            &default_channels(),
            fixed_clock(),
            CsvWriterConfig::default(),
        )
        .unwrap();

        for i in 0..5 {
            writer
                .append(&sample(i, i as f64 * 5e-5, &[(0x8000, 0.0), (0x8000, 0.0)]))
                .unwrap();
        }
        // Under both thresholds: still buffered.
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);

        writer.flush().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 6);
        assert!(contents.ends_with('\n'));
        assert_eq!(writer.stats().rows_written, 5);
    }

    #[test]
    fn create_fails_for_unwritable_path() {
        let result = CsvStreamWriter::create(
            Path::new("/nonexistent-dir/out.csv"),
            &default_channels(),
            fixed_clock(),
            CsvWriterConfig::default(),
        );
        assert!(matches!(result, Err(DaqError::Io(_))));
    }

    #[test]
    fn create_rejects_degenerate_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let config = CsvWriterConfig {
            buffer_capacity: ROW_MARGIN,
            ..CsvWriterConfig::default()
        };
        let result =
            CsvStreamWriter::create(&path, &default_channels(), fixed_clock(), config);
        assert!(matches!(result, Err(DaqError::InvalidConfig { .. })));
    }
}
