//! Accumulates published snapshots into a Polars DataFrame.
//!
//! One row is appended per publish: a `timestamp` column (microseconds since
//! the recorder was created) followed by one column per field name, in plan
//! order. A field missing from a snapshot is recorded as null.

use polars::prelude::*;
use std::time::Instant;

use crate::error::Result;
use crate::poll::SnapshotConsumer;
use crate::store::ValueStore;
use crate::structdef::{DecodePlan, FieldKind, Snapshot, Value};

/// A builder for a single telemetry column.
struct ColumnBuilder {
    name: String,
    kind: FieldKind,
    values: Vec<Option<Value>>,
}

impl ColumnBuilder {
    fn new(name: String, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            values: Vec::new(),
        }
    }

    fn push(&mut self, value: Option<Value>) {
        self.values.push(value);
    }

    /// Builds a Polars Series from the accumulated values.
    fn build(self) -> Series {
        let name = self.name.as_str().into();
        match self.kind {
            FieldKind::Int32 => {
                let values: Vec<Option<i32>> = self
                    .values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(Value::as_i32))
                    .collect();
                Series::new(name, values)
            }
            FieldKind::UInt32 => {
                let values: Vec<Option<u32>> = self
                    .values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(Value::as_u32))
                    .collect();
                Series::new(name, values)
            }
            FieldKind::Float32 => {
                let values: Vec<Option<f32>> = self
                    .values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(Value::as_f32))
                    .collect();
                Series::new(name, values)
            }
            FieldKind::FixedString(_) => {
                let values: Vec<Option<String>> = self
                    .values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(Value::as_text))
                    .collect();
                Series::new(name, values)
            }
        }
    }
}

/// Records every published snapshot as a DataFrame row.
pub struct SnapshotRecorder {
    started: Instant,
    timestamps: Vec<i64>,
    columns: Vec<ColumnBuilder>,
}

impl SnapshotRecorder {
    /// Create a recorder with one column per distinct field name of `plan`.
    pub fn new(plan: &DecodePlan) -> Self {
        let mut columns: Vec<ColumnBuilder> = Vec::with_capacity(plan.len());
        for entry in plan.entries() {
            // A repeated name keeps its first position and its last kind,
            // matching what a snapshot holds for it.
            match columns.iter_mut().find(|c| c.name == entry.name) {
                Some(column) => column.kind = entry.kind,
                None => columns.push(ColumnBuilder::new(entry.name.clone(), entry.kind)),
            }
        }

        Self {
            started: Instant::now(),
            timestamps: Vec::new(),
            columns,
        }
    }

    /// Append a row stamped with the time elapsed since creation.
    pub fn record(&mut self, snapshot: &Snapshot) {
        let timestamp = self.started.elapsed().as_micros() as i64;
        self.record_at(timestamp, snapshot);
    }

    /// Append a row with an explicit timestamp in microseconds.
    pub fn record_at(&mut self, timestamp: i64, snapshot: &Snapshot) {
        self.timestamps.push(timestamp);
        for column in self.columns.iter_mut() {
            column.push(snapshot.get(&column.name).cloned());
        }
    }

    /// Number of rows recorded so far.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Builds a Polars DataFrame from the recorded rows.
    pub fn build(self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Series::new("timestamp".into(), self.timestamps).into());

        for builder in self.columns {
            columns.push(builder.build().into());
        }

        Ok(DataFrame::new(columns)?)
    }
}

impl SnapshotConsumer for SnapshotRecorder {
    fn notify(&mut self, store: &ValueStore) {
        if let Some(snapshot) = store.current() {
            self.record(&snapshot);
        }
    }
}
