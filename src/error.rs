//! Error types for the telemetry pipeline.

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors that can occur while inferring a layout or decoding telemetry.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The structure text never contains the start marker
    #[error("Schema parse error: start marker '{0}' not found")]
    MissingStartMarker(String),

    /// The start marker was found but the closing `} Name;` line never was
    #[error("Schema parse error: end marker for struct '{0}' not found")]
    MissingEndMarker(String),

    /// The struct body contains no recognizable field declarations
    #[error("Schema parse error: struct '{0}' declares no recognizable fields")]
    EmptySchema(String),

    /// A field declaration uses a type name outside the supported set
    #[error("Schema parse error: unknown type '{type_name}' on line {line}")]
    UnknownType { type_name: String, line: usize },

    /// A field kind that cannot be laid out
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// The buffer is shorter than the decode plan requires
    #[error("Buffer too small: expected at least {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    /// Lookup of a field name absent from the current snapshot
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Lookup before any snapshot has been published
    #[error("Value store not initialized: no snapshot published yet")]
    NotInitialized,

    /// The external buffer is no longer accessible
    #[error("Buffer source unavailable: {0}")]
    SourceUnavailable(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed TOML configuration
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error during DataFrame construction
    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
}

impl TelemetryError {
    /// Returns true if the error means the buffer source is gone for good.
    pub fn is_source_loss(&self) -> bool {
        matches!(self, TelemetryError::SourceUnavailable(_))
    }

    /// Returns true for errors raised while turning structure text into a plan.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            TelemetryError::MissingStartMarker(_)
                | TelemetryError::MissingEndMarker(_)
                | TelemetryError::EmptySchema(_)
                | TelemetryError::UnknownType { .. }
                | TelemetryError::UnsupportedType(_)
        )
    }
}
