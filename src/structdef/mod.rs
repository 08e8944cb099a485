//! Layout inference from C struct definitions.
//!
//! This module turns the text of a header such as `SharedMemory.h` into a decode
//! plan, and applies that plan to raw shared-memory bytes.

pub mod decoder;
pub mod layout;
pub mod parser;
pub mod types;

pub use decoder::SnapshotDecoder;
pub use layout::LayoutCompiler;
pub use parser::{ParserOptions, SchemaParser};
pub use types::*;
