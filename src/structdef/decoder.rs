//! Binary decoder applying a compiled plan to a buffer snapshot.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::types::*;
use crate::error::{Result, TelemetryError};

/// Decodes raw buffers into snapshots according to a fixed plan.
#[derive(Debug, Clone)]
pub struct SnapshotDecoder {
    plan: DecodePlan,
    endianness: Endianness,
}

impl SnapshotDecoder {
    /// Create a little-endian decoder for the given plan.
    pub fn new(plan: DecodePlan) -> Self {
        Self::with_endianness(plan, Endianness::Little)
    }

    pub fn with_endianness(plan: DecodePlan, endianness: Endianness) -> Self {
        Self { plan, endianness }
    }

    pub fn plan(&self) -> &DecodePlan {
        &self.plan
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Decode every field of the plan from `data`.
    ///
    /// Bytes past the plan's total size are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<Snapshot> {
        self.check_len(data, self.plan.total_size())?;

        let mut snapshot = Snapshot::with_capacity(self.plan.len());
        for entry in self.plan.entries() {
            let value = self.decode_unchecked(entry, data);
            snapshot.insert(entry.name.clone(), value);
        }

        Ok(snapshot)
    }

    /// Decode a single plan entry from `data`.
    pub fn decode_field(&self, entry: &PlanEntry, data: &[u8]) -> Result<Value> {
        self.check_len(data, entry.range().end)?;
        Ok(self.decode_unchecked(entry, data))
    }

    fn check_len(&self, data: &[u8], required: usize) -> Result<()> {
        if data.len() < required {
            return Err(TelemetryError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn decode_unchecked(&self, entry: &PlanEntry, data: &[u8]) -> Value {
        let bytes = &data[entry.range()];
        match self.endianness {
            Endianness::Little => decode_with::<LittleEndian>(entry.kind, bytes),
            Endianness::Big => decode_with::<BigEndian>(entry.kind, bytes),
        }
    }
}

/// Decode one field's bytes; `bytes` is exactly the field's width.
fn decode_with<B: ByteOrder>(kind: FieldKind, bytes: &[u8]) -> Value {
    match kind {
        FieldKind::Int32 => Value::Int32(B::read_i32(bytes)),
        FieldKind::UInt32 => Value::UInt32(B::read_u32(bytes)),
        FieldKind::Float32 => Value::Float32(B::read_f32(bytes)),
        FieldKind::FixedString(_) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Text(bytes[..end].to_vec())
        }
    }
}
