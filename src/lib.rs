//! Live telemetry decoding from an externally populated shared-memory buffer.
//!
//! The binary layout of the buffer is not hard-coded. It is inferred at startup
//! from a C structure definition (such as a game's `SharedMemory.h`), compiled
//! into a decode plan, and then applied to the buffer on every poll tick.
//!
//! # Example
//!
//! ```no_run
//! use shmem_telemetry::source::MmapSource;
//! use shmem_telemetry::poll::{Poller, DEFAULT_INTERVAL};
//! use shmem_telemetry::structdef::{ParserOptions, SnapshotDecoder};
//! use shmem_telemetry::TelemetryLayout;
//!
//! let plan = TelemetryLayout::from_file("SharedMemory.h", &ParserOptions::default())?;
//! let source = MmapSource::open("/dev/shm/$pcars$")?;
//! let mut poller = Poller::new(source, SnapshotDecoder::new(plan), DEFAULT_INTERVAL);
//!
//! poller.tick()?;
//! println!("speed = {}", poller.store().value("mSpeed")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Field types
//!
//! | C declaration | Kind | Polars type |
//! |---------------|------|-------------|
//! | `int x;` | `Int32` | `Int32` |
//! | `unsigned int x;` | `UInt32` | `UInt32` |
//! | `float x;` | `Float32` | `Float32` |
//! | `char x[STRING_LENGTH_MAX];` | `FixedString(256)` | `String` |
//!
//! Fields are packed back to back with no alignment padding. Declarations
//! that fit none of the forms above (arrays sized by other constants,
//! comments, nested braces) are skipped.

pub mod config;
pub mod error;
pub mod poll;
pub mod recorder;
pub mod source;
pub mod store;
pub mod structdef;

pub use error::{Result, TelemetryError};
pub use polars::prelude::DataFrame;

use config::TelemetryConfig;
use std::path::Path;
use structdef::{DecodePlan, LayoutCompiler, ParserOptions, SchemaParser, SnapshotDecoder};

/// Main entry point for turning a structure definition into a decode plan.
pub struct TelemetryLayout;

impl TelemetryLayout {
    /// Parses structure-definition text and compiles its decode plan.
    ///
    /// # Example
    ///
    /// ```
    /// use shmem_telemetry::TelemetryLayout;
    /// use shmem_telemetry::structdef::ParserOptions;
    ///
    /// let header = "typedef struct\n{\n  float mSpeed;\n  unsigned int mGear;\n} SharedMemory;\n";
    /// let plan = TelemetryLayout::from_text(header, &ParserOptions::default())?;
    /// assert_eq!(plan.total_size(), 8);
    /// # Ok::<(), shmem_telemetry::TelemetryError>(())
    /// ```
    pub fn from_text(text: &str, options: &ParserOptions) -> Result<DecodePlan> {
        let schema = SchemaParser::new(options.clone()).parse(text)?;
        LayoutCompiler::compile(&schema)
    }

    /// Reads a header file from disk and compiles its decode plan.
    pub fn from_file<P: AsRef<Path>>(path: P, options: &ParserOptions) -> Result<DecodePlan> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text, options)
    }
}

/// Builds a decoder for the header, struct options and byte order in `config`.
pub fn decoder_from_config(config: &TelemetryConfig) -> Result<SnapshotDecoder> {
    let plan = TelemetryLayout::from_file(&config.schema.path, &config.parser_options())?;
    Ok(SnapshotDecoder::with_endianness(
        plan,
        config.schema.byte_order,
    ))
}
