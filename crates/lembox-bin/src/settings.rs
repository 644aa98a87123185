//! Collector settings.
//!
//! A single optional TOML file with `[acquisition]`, `[writer]` and
//! `[simulator]` sections. Every field defaults to the production setup, so
//! an empty (or absent) file is a valid configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lembox_core::AcquisitionConfig;
use lembox_driver_sim::SimSettings;
use lembox_storage::CsvWriterConfig;

/// Top-level settings for the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub acquisition: AcquisitionConfig,
    pub writer: CsvWriterConfig,
    pub simulator: SimSettings,
}

impl Settings {
    /// Load settings from `path`, or the defaults when no file is given.
    /// Parsed settings are validated semantically before use.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing settings file {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.acquisition.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.acquisition.channels.len(), 2);
        assert_eq!(settings.writer.flush_batch_rows, 1000);
        assert!(settings.simulator.realtime);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[acquisition]\nsample_rate = 1000.0\n\n[simulator]\nrealtime = false\n"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.acquisition.sample_rate, 1000.0);
        assert!(!settings.simulator.realtime);
        // Untouched sections keep their defaults.
        assert_eq!(settings.acquisition.samples_per_buffer, 4000);
        assert_eq!(settings.writer.buffer_capacity, 32_768);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[acquisition]\nsample_rate = -5.0\n").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[acquisition\nsample_rate = ").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
