//! Simulated acquisition device.
//!
//! [`SimSource`] implements [`SampleSource`] the way a DT9816-class board
//! behaves behind its driver: a fixed pool of pre-allocated buffers cycles
//! between "in flight with hardware" and "held by the acquisition loop",
//! buffers fill at the configured scan rate, and a pool that runs dry
//! counts an overrun on the device side — exactly the failure the real
//! collector avoids by returning buffers promptly.
//!
//! The synthesized signal is a mains-style sine (voltage on channel 0,
//! phase-shifted current on channel 1) with seeded, reproducible noise, so
//! integration tests can assert on byte-identical output.
//!
//! Two pacing modes:
//!
//! - **realtime** — buffers become available against the wall clock at the
//!   nominal rate, for end-to-end tests of sustained throughput;
//! - **immediate** — every poll yields the next buffer, for fast unit tests
//!   and backpressure scenarios.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lembox_core::{units_to_raw, AcquisitionConfig, DaqError, DaqResult, RawBuffer, SampleSource};

/// Settings for the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Frequency of the synthesized waveform in Hz.
    pub signal_frequency_hz: f64,
    /// Peak amplitude of the synthesized waveform, in engineering units.
    pub amplitude: f64,
    /// Peak amplitude of the additive noise, in engineering units.
    pub noise: f64,
    /// Seed for the noise generator; the same seed reproduces the same
    /// stream.
    pub seed: u64,
    /// Pace buffer delivery against the wall clock at the nominal rate.
    /// When false, every poll yields the next buffer immediately.
    pub realtime: bool,
    /// Stop producing after this many buffers (`None` = continuous).
    pub total_buffers: Option<u64>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            signal_frequency_hz: 50.0,
            amplitude: 8.0,
            noise: 0.05,
            seed: 0x1EB0,
            realtime: true,
            total_buffers: None,
        }
    }
}

/// Simulated sample stream.
pub struct SimSource {
    settings: SimSettings,
    config: Option<AcquisitionConfig>,
    pool: VecDeque<Vec<u16>>,
    started_at: Option<Instant>,
    delivered: u64,
    overruns: u64,
    running: bool,
    rng: ChaCha8Rng,
}

impl SimSource {
    /// Create a simulated device with the given settings.
    pub fn new(settings: SimSettings) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        Self {
            settings,
            config: None,
            pool: VecDeque::new(),
            started_at: None,
            delivered: 0,
            overruns: 0,
            running: false,
            rng,
        }
    }

    /// Buffers delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Device-side overruns: a buffer came due while the pool was empty.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// True once a finite stream has delivered its last buffer.
    pub fn is_exhausted(&self) -> bool {
        self.settings
            .total_buffers
            .is_some_and(|total| self.delivered >= total)
    }

    /// Number of buffers that should have been delivered by now.
    fn buffers_due(&self, config: &AcquisitionConfig) -> u64 {
        let due = if self.settings.realtime {
            match self.started_at {
                Some(started) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    (elapsed * config.sample_rate / config.samples_per_buffer as f64) as u64
                }
                None => 0,
            }
        } else {
            u64::MAX
        };
        match self.settings.total_buffers {
            Some(total) => due.min(total),
            None => due,
        }
    }

    /// Fill `data` with one buffer's worth of interleaved raw codes.
    fn fill_block(&mut self, config: &AcquisitionConfig, data: &mut Vec<u16>) {
        let period = config.sample_period();
        let omega = TAU * self.settings.signal_frequency_hz;
        let first_scan = self.delivered * config.samples_per_buffer as u64;
        for scan in 0..config.samples_per_buffer {
            let t = (first_scan + scan as u64) as f64 * period;
            for (idx, channel) in config.channels.iter().enumerate() {
                // Quarter-turn phase shift per channel: current lags voltage.
                let phase = idx as f64 * (TAU / 4.0);
                let noise = self.rng.gen_range(-1.0..=1.0) * self.settings.noise;
                let value = self.settings.amplitude * (omega * t + phase).sin() + noise;
                data.push(units_to_raw(
                    value,
                    config.resolution_bits,
                    config.encoding,
                    channel.range,
                ));
            }
        }
    }
}

impl SampleSource for SimSource {
    fn configure(&mut self, config: &AcquisitionConfig) -> DaqResult<()> {
        config.validate()?;
        self.pool = (0..config.num_buffers)
            .map(|_| Vec::with_capacity(config.buffer_len()))
            .collect();
        info!(
            num_buffers = config.num_buffers,
            buffer_len = config.buffer_len(),
            realtime = self.settings.realtime,
            "simulated device configured"
        );
        self.config = Some(config.clone());
        Ok(())
    }

    fn start(&mut self) -> DaqResult<()> {
        if self.config.is_none() {
            return Err(DaqError::InvalidState {
                expected: "configured".to_string(),
                actual: "idle".to_string(),
            });
        }
        self.started_at = Some(Instant::now());
        self.delivered = 0;
        self.running = true;
        debug!("simulated stream started");
        Ok(())
    }

    fn stop(&mut self) -> DaqResult<()> {
        self.running = false;
        debug!(delivered = self.delivered, overruns = self.overruns, "simulated stream stopped");
        Ok(())
    }

    fn poll_buffer(&mut self) -> DaqResult<Option<RawBuffer>> {
        if !self.running {
            return Ok(None);
        }
        let config = match self.config.as_ref() {
            Some(config) => config.clone(),
            None => return Err(DaqError::hardware("polled before configuration")),
        };
        if self.delivered >= self.buffers_due(&config) {
            return Ok(None);
        }
        let mut data = match self.pool.pop_front() {
            Some(mut block) => {
                block.clear();
                block
            }
            None => {
                // Real hardware would overwrite unreturned buffers and drop
                // data upstream; count it and deliver nothing.
                self.overruns += 1;
                warn!(overruns = self.overruns, "buffer pool exhausted; device overrun");
                return Ok(None);
            }
        };
        self.fill_block(&config, &mut data);
        self.delivered += 1;
        Ok(Some(RawBuffer { data }))
    }

    fn return_buffer(&mut self, buffer: RawBuffer) -> DaqResult<()> {
        self.pool.push_back(buffer.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lembox_core::{raw_to_units, ChannelConfig, Encoding, InputRange};
    use std::time::Duration;

    fn test_config() -> AcquisitionConfig {
        AcquisitionConfig::builder()
            .channels(vec![
                ChannelConfig::new(0, "Voltage", -10.0, 10.0),
                ChannelConfig::new(1, "Current", -10.0, 10.0).with_units("A"),
            ])
            .sample_rate(20_000.0)
            .samples_per_buffer(100)
            .num_buffers(4)
            .queue_capacity(1000)
            .build()
            .unwrap()
    }

    fn immediate(total: Option<u64>) -> SimSettings {
        SimSettings {
            realtime: false,
            total_buffers: total,
            ..SimSettings::default()
        }
    }

    #[test]
    fn finite_stream_delivers_exact_count() {
        let mut source = SimSource::new(immediate(Some(3)));
        source.configure(&test_config()).unwrap();
        source.start().unwrap();

        let mut buffers = Vec::new();
        while let Some(buffer) = source.poll_buffer().unwrap() {
            assert_eq!(buffer.data.len(), 200);
            buffers.push(buffer);
        }
        assert_eq!(buffers.len(), 3);
        assert!(source.is_exhausted());
        for buffer in buffers {
            source.return_buffer(buffer).unwrap();
        }
    }

    #[test]
    fn pool_exhaustion_counts_overruns() {
        let config = AcquisitionConfig::builder()
            .channels(vec![ChannelConfig::new(0, "Voltage", -10.0, 10.0)])
            .sample_rate(20_000.0)
            .samples_per_buffer(10)
            .num_buffers(2)
            .queue_capacity(100)
            .build()
            .unwrap();
        let mut source = SimSource::new(immediate(None));
        source.configure(&config).unwrap();
        source.start().unwrap();

        let a = source.poll_buffer().unwrap().unwrap();
        let _b = source.poll_buffer().unwrap().unwrap();
        // Pool is dry: the device overruns instead of delivering.
        assert!(source.poll_buffer().unwrap().is_none());
        assert_eq!(source.overruns(), 1);

        // Returning a block lets delivery resume.
        source.return_buffer(a).unwrap();
        assert!(source.poll_buffer().unwrap().is_some());
    }

    #[test]
    fn same_seed_reproduces_the_stream() {
        let config = test_config();
        let mut first = SimSource::new(immediate(Some(2)));
        let mut second = SimSource::new(immediate(Some(2)));
        first.configure(&config).unwrap();
        second.configure(&config).unwrap();
        first.start().unwrap();
        second.start().unwrap();

        loop {
            match (
                first.poll_buffer().unwrap(),
                second.poll_buffer().unwrap(),
            ) {
                (Some(a), Some(b)) => {
                    assert_eq!(a.data, b.data);
                    first.return_buffer(a).unwrap();
                    second.return_buffer(b).unwrap();
                }
                (None, None) => break,
                _ => panic!("streams diverged"),
            }
        }
    }

    #[test]
    fn waveform_stays_within_range() {
        let config = test_config();
        let mut source = SimSource::new(immediate(Some(5)));
        source.configure(&config).unwrap();
        source.start().unwrap();

        while let Some(buffer) = source.poll_buffer().unwrap() {
            for &raw in &buffer.data {
                let v = raw_to_units(raw, 16, Encoding::Binary, InputRange::bipolar_10v());
                assert!((-10.0..10.0).contains(&v), "decoded value {v} out of range");
            }
            source.return_buffer(buffer).unwrap();
        }
    }

    #[test]
    fn realtime_mode_paces_delivery() {
        let config = AcquisitionConfig::builder()
            .channels(vec![ChannelConfig::new(0, "Voltage", -10.0, 10.0)])
            .sample_rate(1_000.0)
            .samples_per_buffer(50)
            .num_buffers(4)
            .queue_capacity(1000)
            .build()
            .unwrap();
        let mut source = SimSource::new(SimSettings {
            realtime: true,
            ..SimSettings::default()
        });
        source.configure(&config).unwrap();
        source.start().unwrap();

        // A 50-scan buffer at 1 kHz takes 50 ms to fill.
        assert!(source.poll_buffer().unwrap().is_none());
        std::thread::sleep(Duration::from_millis(70));
        assert!(source.poll_buffer().unwrap().is_some());
    }

    #[test]
    fn start_requires_configuration() {
        let mut source = SimSource::new(SimSettings::default());
        assert!(matches!(
            source.start(),
            Err(DaqError::InvalidState { .. })
        ));
    }

    #[test]
    fn stopped_stream_yields_nothing() {
        let mut source = SimSource::new(immediate(None));
        source.configure(&test_config()).unwrap();
        source.start().unwrap();
        assert!(source.poll_buffer().unwrap().is_some());
        source.stop().unwrap();
        assert!(source.poll_buffer().unwrap().is_none());
    }
}
