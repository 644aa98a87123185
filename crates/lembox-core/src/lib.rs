//! Core types and the acquisition pipeline for the LEMBox collector.
//!
//! This crate contains everything that is independent of a concrete device
//! or storage backend:
//!
//! - [`Sample`] and the raw-code-to-engineering-units conversion
//! - [`AcquisitionClock`], the dual-clock timestamp synthesizer
//! - [`SampleQueue`], the bounded FIFO between producer and consumer
//! - [`SampleSource`] / [`SampleSink`], the capability seams for hardware
//!   and persistence
//! - [`AcquisitionEngine`], the producer loop plus the batched writer task
//!
//! # Architecture
//!
//! ```text
//! SampleSource ──► AcquisitionEngine ──► SampleQueue ──► writer task ──► SampleSink
//!   (device)        (producer loop)       (bounded FIFO)  (consumer)      (CSV log)
//! ```
//!
//! The engine never blocks between fetching a hardware buffer and returning
//! it to the device; backpressure is absorbed after the buffer has been
//! handed back, so the device pool can keep cycling even when storage is
//! slow.

pub mod clock;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod queue;
pub mod sample;
pub mod sink;
pub mod source;

pub use clock::AcquisitionClock;
pub use config::{AcquisitionConfig, ChannelConfig};
pub use convert::{raw_to_units, units_to_raw, Encoding, InputRange};
pub use engine::{AcquisitionEngine, EngineStats, RunState, RunSummary, StopHandle};
pub use error::{DaqError, DaqResult};
pub use queue::SampleQueue;
pub use sample::{ChannelReading, Sample};
pub use sink::SampleSink;
pub use source::{RawBuffer, SampleSource};
