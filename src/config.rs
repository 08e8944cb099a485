//! Runtime configuration, loaded from TOML with built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TelemetryError};
use crate::structdef::{Endianness, ParserOptions};

/// Largest accepted fixed-string width, in bytes.
pub const MAX_STRING_LENGTH: usize = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub schema: SchemaConfig,
    pub source: SourceConfig,
    pub poll: PollConfig,
}

/// Where the struct definition lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub path: PathBuf,
    pub struct_name: String,
    pub string_constant: String,
    pub string_length: usize,
    pub byte_order: Endianness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let parser = ParserOptions::default();
        Self {
            path: PathBuf::from("SharedMemory.h"),
            struct_name: parser.struct_name,
            string_constant: parser.string_constant,
            string_length: parser.string_length,
            byte_order: Endianness::Little,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/shm/$pcars$"),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl TelemetryConfig {
    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.string_length == 0 {
            return Err(TelemetryError::Config(
                "schema.string_length must be greater than zero".to_string(),
            ));
        }
        if self.schema.string_length > MAX_STRING_LENGTH {
            return Err(TelemetryError::Config(format!(
                "schema.string_length must be at most {}",
                MAX_STRING_LENGTH
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(TelemetryError::Config(
                "poll.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.schema.struct_name.trim().is_empty() {
            return Err(TelemetryError::Config(
                "schema.struct_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            struct_name: self.schema.struct_name.clone(),
            string_constant: self.schema.string_constant.clone(),
            string_length: self.schema.string_length,
            ..ParserOptions::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }
}
