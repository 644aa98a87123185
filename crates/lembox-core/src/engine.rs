//! The acquisition engine: producer loop, batched writer task and the run
//! state machine.
//!
//! One engine drives one acquisition run:
//!
//! 1. [`AcquisitionEngine::configure`] pushes the configuration to the
//!    device (`Idle → Configured`).
//! 2. [`AcquisitionEngine::start`] starts the hardware stream
//!    (`Configured → Running`).
//! 3. [`AcquisitionEngine::run`] spawns the writer task, executes the
//!    producer loop on the calling thread, and on a stop request drains the
//!    remaining stream and queue before returning
//!    (`Running → Stopping → Stopped`).
//!
//! The producer loop drains every filled hardware buffer eagerly and
//! returns each block to the device *before* applying backpressure, so the
//! device pool keeps cycling even while the queue is saturated. Exactly one
//! producer assigns sequence numbers and the queue is FIFO, so rows reach
//! the sink in acquisition order under any scheduling.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::AcquisitionClock;
use crate::config::AcquisitionConfig;
use crate::convert::raw_to_units;
use crate::error::{DaqError, DaqResult};
use crate::queue::SampleQueue;
use crate::sample::{ChannelReading, Sample};
use crate::sink::SampleSink;
use crate::source::{RawBuffer, SampleSource};

/// Producer sleep when no buffer was available this pass.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);
/// Producer wait on "not full" while the queue is saturated.
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(1);
/// Writer wait on "not empty" between drain passes.
const WRITER_POLL: Duration = Duration::from_millis(1);
/// Progress report cadence.
const REPORT_INTERVAL: Duration = Duration::from_millis(500);
/// Saturation warnings are throttled to every Nth event.
const SATURATION_LOG_EVERY: u64 = 10_000;
/// Consecutive buffer-fetch failures before the stream is declared dead.
const PERSISTENT_FAULT_LIMIT: u64 = 500;

/// Lifecycle state of an acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RunState {
    #[default]
    Idle = 0,
    Configured = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Configured,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: RunState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: RunState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Cloneable handle used to request a cooperative stop.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the producer loop to stop at its next iteration.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Counters {
    samples_acquired: AtomicU64,
    samples_written: AtomicU64,
    write_errors: AtomicU64,
    saturation_events: AtomicU64,
    hardware_faults: AtomicU64,
}

/// Point-in-time snapshot of engine counters.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Samples enqueued by the producer so far.
    pub samples_acquired: u64,
    /// Samples the writer has handed to the sink.
    pub samples_written: u64,
    /// Rows lost to storage errors (acquisition continued).
    pub write_errors: u64,
    /// Times the producer found the queue full.
    pub queue_saturation_events: u64,
    /// Buffer fetch/return faults reported by the device.
    pub hardware_faults: u64,
    /// Samples currently queued.
    pub queue_depth: usize,
    /// Current lifecycle state.
    pub state: RunState,
}

/// Final accounting for a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub samples_acquired: u64,
    pub samples_written: u64,
    pub write_errors: u64,
    pub queue_saturation_events: u64,
    pub hardware_faults: u64,
    /// True when the run ended because the hardware stream faulted
    /// persistently rather than by operator request.
    pub fault_stop: bool,
}

/// Drives one acquisition run from configuration to final flush.
pub struct AcquisitionEngine {
    config: AcquisitionConfig,
    clock: Arc<AcquisitionClock>,
    queue: Arc<SampleQueue>,
    stop: Arc<AtomicBool>,
    state: StateCell,
    counters: Arc<Counters>,
}

impl AcquisitionEngine {
    /// Validate the configuration and allocate the sample queue.
    pub fn new(config: AcquisitionConfig, clock: Arc<AcquisitionClock>) -> DaqResult<Self> {
        config.validate()?;
        let queue = Arc::new(SampleQueue::with_capacity(config.queue_capacity));
        Ok(Self {
            config,
            clock,
            queue,
            stop: Arc::new(AtomicBool::new(false)),
            state: StateCell::new(RunState::Idle),
            counters: Arc::new(Counters::default()),
        })
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Handle for requesting a cooperative stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            samples_acquired: self.counters.samples_acquired.load(Ordering::Relaxed),
            samples_written: self.counters.samples_written.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            queue_saturation_events: self.counters.saturation_events.load(Ordering::Relaxed),
            hardware_faults: self.counters.hardware_faults.load(Ordering::Relaxed),
            queue_depth: self.queue.len(),
            state: self.state.get(),
        }
    }

    /// Push the configuration to the device. `Idle → Configured`.
    pub fn configure<S: SampleSource>(&self, source: &mut S) -> DaqResult<()> {
        self.expect_state(RunState::Idle)?;
        source.configure(&self.config)?;
        self.state.set(RunState::Configured);
        info!(
            channels = self.config.channels.len(),
            sample_rate = self.config.sample_rate,
            samples_per_buffer = self.config.samples_per_buffer,
            num_buffers = self.config.num_buffers,
            "device configured"
        );
        Ok(())
    }

    /// Start the hardware stream. `Configured → Running`.
    pub fn start<S: SampleSource>(&self, source: &mut S) -> DaqResult<()> {
        self.expect_state(RunState::Configured)?;
        source.start()?;
        self.state.set(RunState::Running);
        info!("hardware stream started");
        Ok(())
    }

    /// Run the producer loop until a stop is requested, then drain
    /// everything and flush the sink. `Running → Stopping → Stopped`.
    ///
    /// The writer task runs on its own thread for the whole span and keeps
    /// draining after the producer stops until the queue is empty, so no
    /// acquired sample is ever lost at shutdown.
    pub fn run<S, K>(&self, source: &mut S, sink: K) -> DaqResult<RunSummary>
    where
        S: SampleSource,
        K: SampleSink + Send + 'static,
    {
        self.expect_state(RunState::Running)?;

        let producer_done = Arc::new(AtomicBool::new(false));
        let writer = self.spawn_writer(sink, Arc::clone(&producer_done))?;

        let fault_stop = self.producer_loop(source);

        producer_done.store(true, Ordering::Release);
        let writer_result = writer.join();
        self.state.set(RunState::Stopped);
        if writer_result.is_err() {
            return Err(DaqError::Writer {
                message: "writer thread panicked".to_string(),
            });
        }

        let summary = RunSummary {
            samples_acquired: self.counters.samples_acquired.load(Ordering::Relaxed),
            samples_written: self.counters.samples_written.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            queue_saturation_events: self.counters.saturation_events.load(Ordering::Relaxed),
            hardware_faults: self.counters.hardware_faults.load(Ordering::Relaxed),
            fault_stop,
        };
        info!(
            samples = summary.samples_acquired,
            written = summary.samples_written,
            "acquisition run finished"
        );
        Ok(summary)
    }

    fn expect_state(&self, expected: RunState) -> DaqResult<()> {
        let actual = self.state.get();
        if actual != expected {
            return Err(DaqError::InvalidState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn spawn_writer<K>(
        &self,
        mut sink: K,
        producer_done: Arc<AtomicBool>,
    ) -> DaqResult<thread::JoinHandle<()>>
    where
        K: SampleSink + Send + 'static,
    {
        let queue = Arc::clone(&self.queue);
        let counters = Arc::clone(&self.counters);
        let handle = thread::Builder::new()
            .name("batched-writer".to_string())
            .spawn(move || {
                loop {
                    while let Some(sample) = queue.dequeue() {
                        match sink.append(&sample) {
                            Ok(()) => {
                                counters.samples_written.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => {
                                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                                warn!(
                                    sequence = sample.sequence,
                                    error = %err,
                                    "row write failed; acquisition continues"
                                );
                            }
                        }
                    }
                    if producer_done.load(Ordering::Acquire) && queue.is_empty() {
                        break;
                    }
                    queue.wait_not_empty(WRITER_POLL);
                }
                if let Err(err) = sink.flush() {
                    counters.write_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "final flush failed");
                }
            })?;
        Ok(handle)
    }

    /// Producer loop body. Returns true when the run ended on a persistent
    /// hardware fault.
    fn producer_loop<S: SampleSource>(&self, source: &mut S) -> bool {
        let mut sequence: u64 = 0;
        let mut next_elapsed: f64 = 0.0;
        let mut pending: Vec<Sample> = Vec::with_capacity(self.config.samples_per_buffer);
        let mut consecutive_faults: u64 = 0;
        let mut fault_stop = false;
        let mut last_report = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            let mut processed = false;
            // Drain every filled buffer before anything can block. The stop
            // flag is re-checked inside so a device that always has a buffer
            // ready cannot starve the stop request.
            loop {
                if self.stop.load(Ordering::Acquire) {
                    break;
                }
                match source.poll_buffer() {
                    Ok(Some(buffer)) => {
                        processed = true;
                        consecutive_faults = 0;
                        next_elapsed =
                            self.stage_block(&buffer, next_elapsed, &mut sequence, &mut pending);
                        // The pool must keep cycling: hand the block back
                        // before any backpressure wait.
                        if let Err(err) = source.return_buffer(buffer) {
                            self.counters.hardware_faults.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %err, "buffer return failed");
                        }
                        self.enqueue_pending(&mut pending);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        self.counters.hardware_faults.fetch_add(1, Ordering::Relaxed);
                        consecutive_faults += 1;
                        warn!(error = %err, "buffer fetch failed; treating as empty poll");
                        if consecutive_faults >= PERSISTENT_FAULT_LIMIT {
                            warn!(
                                faults = consecutive_faults,
                                "persistent hardware fault; stopping acquisition"
                            );
                            fault_stop = true;
                            self.stop.store(true, Ordering::Release);
                        }
                        break;
                    }
                }
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                info!(
                    samples = self.counters.samples_acquired.load(Ordering::Relaxed),
                    queue = self.queue.len(),
                    "acquisition progress"
                );
                last_report = Instant::now();
            }

            if !processed {
                thread::sleep(IDLE_BACKOFF);
            }
        }

        self.state.set(RunState::Stopping);
        debug!("stop requested; stopping hardware stream");
        if let Err(err) = source.stop() {
            self.counters.hardware_faults.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "device stop reported an error");
        }

        // Pick up blocks the device finished filling before the stop took
        // hold, so they are not truncated from the log.
        loop {
            match source.poll_buffer() {
                Ok(Some(buffer)) => {
                    next_elapsed =
                        self.stage_block(&buffer, next_elapsed, &mut sequence, &mut pending);
                    if let Err(err) = source.return_buffer(buffer) {
                        warn!(error = %err, "buffer return failed during final drain");
                    }
                    self.enqueue_pending(&mut pending);
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        fault_stop
    }

    /// Convert one raw block into staged samples.
    ///
    /// The first sample is stamped with the elapsed time at buffer pickup,
    /// clamped to the end of the previous block so several buffers drained
    /// in one pass cannot run time backwards; later samples are offset by
    /// their scan index times the nominal period. Returns the elapsed time
    /// just past this block.
    fn stage_block(
        &self,
        buffer: &RawBuffer,
        next_elapsed: f64,
        sequence: &mut u64,
        pending: &mut Vec<Sample>,
    ) -> f64 {
        let n_channels = self.config.channels.len();
        let scans = buffer.scans(n_channels);
        let period = self.config.sample_period();
        let base = self.clock.elapsed().max(next_elapsed);

        for scan in 0..scans {
            let mut readings = Vec::with_capacity(n_channels);
            for (idx, channel) in self.config.channels.iter().enumerate() {
                let raw = buffer.data[scan * n_channels + idx];
                let value = raw_to_units(
                    raw,
                    self.config.resolution_bits,
                    self.config.encoding,
                    channel.range,
                );
                readings.push(ChannelReading { raw, value });
            }
            pending.push(Sample::new(*sequence, base + scan as f64 * period, readings));
            *sequence += 1;
        }

        base + scans as f64 * period
    }

    /// Move staged samples into the queue, waiting (never dropping) while
    /// the queue is full. Safe to block here: the hardware buffer has
    /// already been returned.
    fn enqueue_pending(&self, pending: &mut Vec<Sample>) {
        for sample in pending.drain(..) {
            let mut item = sample;
            loop {
                match self.queue.try_enqueue(item) {
                    Ok(()) => {
                        self.counters.samples_acquired.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Err(back) => {
                        item = back;
                        let events =
                            self.counters.saturation_events.fetch_add(1, Ordering::Relaxed) + 1;
                        if events == 1 || events % SATURATION_LOG_EVERY == 0 {
                            warn!(
                                events,
                                depth = self.queue.len(),
                                "sample queue saturated; producer waiting"
                            );
                        }
                        self.queue.wait_not_full(BACKPRESSURE_WAIT);
                    }
                }
            }
        }
    }
}
