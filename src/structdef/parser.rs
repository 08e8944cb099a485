//! Parser for C struct definitions describing the shared-memory layout.
//!
//! Only the body of one `typedef struct { ... } Name;` block is read. Each line of
//! the body is split on whitespace and classified by a fixed cascade of rules:
//!
//! 1. `<any> name[CONST];` where `CONST` is the string-length constant: fixed string
//! 2. `<type> name;`: single-word type
//! 3. `<type> <type> name;`: two-word type such as `unsigned int`
//!
//! The first matching rule wins. Lines matching none of them are skipped, which
//! covers comments, braces and arrays sized by other constants.

use super::types::*;
use crate::error::{Result, TelemetryError};
use tracing::debug;

/// Options controlling how a struct definition is recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Name that closes the definition, as in `} SharedMemory;`
    pub struct_name: String,
    /// Text that opens the definition window
    pub start_marker: String,
    /// Array-size constant that marks a fixed-length string field
    pub string_constant: String,
    /// Byte length of fixed-length string fields
    pub string_length: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            struct_name: "SharedMemory".to_string(),
            start_marker: "typedef struct".to_string(),
            string_constant: "STRING_LENGTH_MAX".to_string(),
            string_length: 256,
        }
    }
}

/// Parser for struct definition text.
#[derive(Debug, Clone, Default)]
pub struct SchemaParser {
    options: ParserOptions,
}

impl SchemaParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse the full text of a header into an ordered schema.
    pub fn parse(&self, text: &str) -> Result<Schema> {
        let mut lines = text.lines().enumerate();

        if !lines
            .by_ref()
            .any(|(_, line)| line.contains(self.options.start_marker.as_str()))
        {
            return Err(TelemetryError::MissingStartMarker(
                self.options.start_marker.clone(),
            ));
        }

        let mut fields = Vec::new();
        let mut closed = false;

        for (index, line) in lines {
            if self.is_end_marker(line) {
                closed = true;
                break;
            }

            if let Some(field) = self.classify_line(line, index + 1)? {
                fields.push(field);
            }
        }

        if !closed {
            return Err(TelemetryError::MissingEndMarker(
                self.options.struct_name.clone(),
            ));
        }

        if fields.is_empty() {
            return Err(TelemetryError::EmptySchema(self.options.struct_name.clone()));
        }

        Ok(Schema {
            struct_name: self.options.struct_name.clone(),
            fields,
        })
    }

    /// Matches `}` followed by the struct name and `;`, ignoring whitespace.
    fn is_end_marker(&self, line: &str) -> bool {
        let compact: String = line.split_whitespace().collect();
        compact.contains(&format!("}}{};", self.options.struct_name))
    }

    /// Apply the classification cascade to one line of the struct body.
    fn classify_line(&self, line: &str, line_number: usize) -> Result<Option<FieldDescriptor>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Ok(None);
        }

        if let Some(name) = self.match_string_declaration(tokens[1]) {
            let kind = FieldKind::FixedString(self.options.string_length);
            return Ok(Some(FieldDescriptor::new(name, kind)));
        }

        if let Some(name) = match_terminated_identifier(tokens[1]) {
            return Self::resolve(tokens[0], name, line_number).map(Some);
        }

        if tokens.len() >= 3 {
            if let Some(name) = match_terminated_identifier(tokens[2]) {
                let type_name = format!("{} {}", tokens[0], tokens[1]);
                return Self::resolve(&type_name, name, line_number).map(Some);
            }
        }

        if tokens.iter().any(|t| t.ends_with(';')) {
            debug!(line = line_number, text = line.trim(), "skipping declaration");
        }

        Ok(None)
    }

    /// Matches `name[CONST];` for the configured string constant.
    fn match_string_declaration<'t>(&self, token: &'t str) -> Option<&'t str> {
        let body = token.strip_suffix("];")?;
        let (name, constant) = body.split_once('[')?;
        (constant == self.options.string_constant && is_identifier(name)).then_some(name)
    }

    fn resolve(type_name: &str, name: &str, line_number: usize) -> Result<FieldDescriptor> {
        let kind = FieldKind::from_c_type(type_name).ok_or_else(|| TelemetryError::UnknownType {
            type_name: type_name.to_string(),
            line: line_number,
        })?;
        Ok(FieldDescriptor::new(name, kind))
    }
}

/// Matches `name;` and returns `name`.
fn match_terminated_identifier(token: &str) -> Option<&str> {
    token.strip_suffix(';').filter(|name| is_identifier(name))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
