//! Test fixtures for integration tests
//!
//! This module provides a representative structure-definition header and
//! helpers for laying out buffers the way a producer would.

#![allow(dead_code)]

use shmem_telemetry::structdef::{DecodePlan, FieldKind, Value};

/// A trimmed racing-game header: scalar fields, fixed strings, vector and
/// per-tyre arrays, and trailing comments on most lines.
pub const SHARED_MEMORY_H: &str = r#"/*************************************************************************************************
  Shared memory layout for the telemetry API.
*************************************************************************************************/
#pragma once

// Header version number to test against
enum
{
  SHARED_MEMORY_VERSION = 5
};

#define STRING_LENGTH_MAX 256

// Tyres
enum
{
  TYRE_FRONT_LEFT = 0,
  TYRE_FRONT_RIGHT,
  TYRE_REAR_LEFT,
  TYRE_REAR_RIGHT,
  TYRE_MAX
};

// (Type#1) GameState (to be used with 'mGameState')
enum
{
  GAME_EXITED = 0,
  GAME_FRONT_END,
  GAME_INGAME_PLAYING,
  GAME_INGAME_PAUSED,
  GAME_MAX
};

typedef struct
{
  // Version Number
  unsigned int mVersion;                           // [ RANGE = 0->... ]

  // Session type
  unsigned int mGameState;                         // [ enum (Type#1) Game state ]
  unsigned int mSessionState;                      // [ enum (Type#2) Session state ]

  // Unfiltered Input
  float mUnfilteredThrottle;                       // [ RANGE = 0.0f->1.0f ]
  float mUnfilteredBrake;                          // [ RANGE = 0.0f->1.0f ]

  // One Time Session
  char mPlayerName[STRING_LENGTH_MAX];             // [ string ]
  char mCarName[STRING_LENGTH_MAX];                // [ string ]
  char mTrackName[STRING_LENGTH_MAX];              // [ string ]

  // Timing & Scoring
  float mBestLapTime;                              // [ UNITS = seconds ]   [ UNSET = -1.0f ]
  float mLastLapTime;                              // [ UNITS = seconds ]   [ UNSET = 0.0f ]

  // Race Info
  unsigned int mLapsInEvent;                       // [ RANGE = 0->... ]   [ UNSET = 0 ]
  unsigned int mCurrentLap;                        // [ RANGE = 0->... ]   [ UNSET = 0 ]

  // Car State
  float mSpeed;                                    // [ UNITS = Metres per-second ]
  float mRpm;                                      // [ UNITS = Revolutions per minute ]
  int mGear;                                       // [ RANGE = -1 (Reverse)  0 (Neutral)  1 (Gear 1) ]

  // Motion & Device Related
  float mWorldPosition[VEC_MAX];                   // [ UNITS = World Space  X  Y  Z ]
  float mOrientation[VEC_MAX];                     // [ UNITS = Euler Angles ]

  // Wheels / Tyres
  unsigned int mTyreFlags[TYRE_MAX];               // [ enum (Type#7) Tyre Flags ]
  float mTyreTemp[TYRE_MAX];                       // [ UNITS = Celsius ]   [ UNSET = 0.0f ]

  // Weather
  float mAmbientTemperature;                       // [ UNITS = Celsius ]   [ UNSET = 25.0f ]
  float mTrackTemperature;                         // [ UNITS = Celsius ]   [ UNSET = 30.0f ]
} SharedMemory;
"#;

/// Field names the header above yields, in declaration order.
pub const SHARED_MEMORY_FIELDS: [&str; 17] = [
    "mVersion",
    "mGameState",
    "mSessionState",
    "mUnfilteredThrottle",
    "mUnfilteredBrake",
    "mPlayerName",
    "mCarName",
    "mTrackName",
    "mBestLapTime",
    "mLastLapTime",
    "mLapsInEvent",
    "mCurrentLap",
    "mSpeed",
    "mRpm",
    "mGear",
    "mAmbientTemperature",
    "mTrackTemperature",
];

/// Wrap field declarations in the `SharedMemory` struct markers.
pub fn header(body: &str) -> String {
    format!("typedef struct\n{{\n{}\n}} SharedMemory;\n", body)
}

/// Lays out little-endian values at their plan offsets, standing in for the
/// producer process.
pub struct BufferWriter<'a> {
    plan: &'a DecodePlan,
    data: Vec<u8>,
}

impl<'a> BufferWriter<'a> {
    /// A zeroed buffer exactly as large as the plan.
    pub fn new(plan: &'a DecodePlan) -> Self {
        Self::with_len(plan, plan.total_size())
    }

    pub fn with_len(plan: &'a DecodePlan, len: usize) -> Self {
        Self {
            plan,
            data: vec![0u8; len],
        }
    }

    /// Write `value` into the slot of the last field called `name`.
    pub fn set(mut self, name: &str, value: &Value) -> Self {
        let plan = self.plan;
        let entry = plan
            .entry(name)
            .unwrap_or_else(|| panic!("no field named {}", name));
        let slot = &mut self.data[entry.range()];

        match (entry.kind, value) {
            (FieldKind::Int32, Value::Int32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (FieldKind::UInt32, Value::UInt32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (FieldKind::Float32, Value::Float32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (FieldKind::FixedString(_), Value::Text(bytes)) => {
                slot.fill(0);
                let n = bytes.len().min(slot.len());
                slot[..n].copy_from_slice(&bytes[..n]);
            }
            (kind, value) => panic!("cannot write {:?} into a {} field", value, kind),
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wraps_body() {
        let text = header("  float mSpeed;");
        assert!(text.starts_with("typedef struct"));
        assert!(text.contains("} SharedMemory;"));
    }

    #[test]
    fn test_field_list_is_unique() {
        let mut names = SHARED_MEMORY_FIELDS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), SHARED_MEMORY_FIELDS.len());
    }
}
