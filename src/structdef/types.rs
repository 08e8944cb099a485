//! Core types for struct-definition driven decoding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Width in bytes of every numeric field kind.
pub const NUMERIC_WIDTH: usize = 4;

/// Binary kind of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int32,
    UInt32,
    Float32,
    /// Null-padded character array of a fixed length
    FixedString(usize),
}

impl FieldKind {
    /// Maps a C type name to a numeric kind.
    pub fn from_c_type(type_name: &str) -> Option<Self> {
        match type_name {
            "int" => Some(FieldKind::Int32),
            "unsigned int" => Some(FieldKind::UInt32),
            "float" => Some(FieldKind::Float32),
            _ => None,
        }
    }

    /// Get the size in bytes of this field kind.
    pub fn width(self) -> usize {
        match self {
            FieldKind::Int32 | FieldKind::UInt32 | FieldKind::Float32 => NUMERIC_WIDTH,
            FieldKind::FixedString(length) => length,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Int32 => write!(f, "int"),
            FieldKind::UInt32 => write!(f, "unsigned int"),
            FieldKind::Float32 => write!(f, "float"),
            FieldKind::FixedString(length) => write!(f, "char[{}]", length),
        }
    }
}

/// A named field, as declared in the struct definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field list; declaration order is binary offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub struct_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = FieldKind> + '_ {
        self.fields.iter().map(|f| f.kind)
    }
}

/// One field of a compiled decode plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    pub kind: FieldKind,
    pub offset: usize,
}

impl PlanEntry {
    pub fn width(&self) -> usize {
        self.kind.width()
    }

    /// Byte span of this field within the buffer.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.width()
    }
}

/// Schema compiled into concrete offsets and widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePlan {
    pub(crate) entries: Vec<PlanEntry>,
    pub(crate) total_size: usize,
}

impl DecodePlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Minimum buffer length required to decode this plan.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last entry declared under `name`, matching which value a snapshot keeps.
    pub fn entry(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().rev().find(|e| e.name == name)
    }
}

/// Byte order of numeric fields in the producer's buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    /// Raw bytes up to the first null (or the full field width)
    Text(Vec<u8>),
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text value as a string, replacing invalid UTF-8 sequences.
    pub fn as_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Text(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// One decoded instant of every field, keyed by name in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    values: IndexMap<String, Value>,
}

impl Snapshot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }

    /// Inserts a value; a repeated name keeps its first position but takes the new value.
    pub fn insert(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
