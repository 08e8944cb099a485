//! Layout compilation: schema to byte offsets.
//!
//! Fields are packed back to back in declaration order with no alignment
//! padding. A producer whose compiler inserts padding between fields of
//! different widths will be misread from the first gap onward; nothing here
//! detects that.

use super::types::*;
use crate::error::{Result, TelemetryError};
use tracing::info;

/// Compiles schemas into decode plans.
pub struct LayoutCompiler;

impl LayoutCompiler {
    /// Calculate the offset of every field and the total struct size.
    pub fn compile(schema: &Schema) -> Result<DecodePlan> {
        let mut offset = 0;
        let mut entries = Vec::with_capacity(schema.len());

        for field in &schema.fields {
            let size = Self::field_size(&field.name, field.kind)?;
            entries.push(PlanEntry {
                name: field.name.clone(),
                kind: field.kind,
                offset,
            });
            offset = offset.checked_add(size).ok_or_else(|| {
                TelemetryError::UnsupportedType(format!(
                    "field '{}' ends past the addressable range",
                    field.name
                ))
            })?;
        }

        info!(
            struct_name = schema.struct_name.as_str(),
            fields = entries.len(),
            total_size = offset,
            "compiled decode plan"
        );

        Ok(DecodePlan {
            entries,
            total_size: offset,
        })
    }

    fn field_size(name: &str, kind: FieldKind) -> Result<usize> {
        match kind {
            FieldKind::FixedString(0) => Err(TelemetryError::UnsupportedType(format!(
                "zero-length string field '{}'",
                name
            ))),
            kind => Ok(kind.width()),
        }
    }
}
