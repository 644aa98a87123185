//! Storage backends for the LEMBox collector.
//!
//! Currently a single backend: the row-oriented CSV stream writer used by
//! the production collector. The writer owns a fixed-capacity byte buffer
//! and amortizes disk I/O by flushing on a capacity margin and on a row
//! batch count, with a final unconditional flush at shutdown.

pub mod csv_writer;

pub use csv_writer::{CsvStreamWriter, CsvWriterConfig, WriterStats};
