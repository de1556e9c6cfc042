// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Popup settings (window geometry, timing, volume step).
//!
//! Fields are validated one by one: a missing, mistyped or out-of-range
//! entry falls back to its default without affecting its neighbours.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;
use toml::{Table, Value};

pub const WINDOW_SIZE_RANGE: RangeInclusive<i64> = 50..=4000;
pub const OFFSET_RANGE: RangeInclusive<i64> = -4000..=4000;
pub const DURATION_RANGE: RangeInclusive<i64> = 100..=60_000;
pub const FADE_RANGE: RangeInclusive<i64> = 0..=5000;
pub const VOLUME_STEP_RANGE: RangeInclusive<i64> = 1..=20;

/// Complete popup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Popup width in pixels.
    pub window_width: u32,
    /// Popup height in pixels.
    pub window_height: u32,
    /// Horizontal anchor: 0 centres, positive is inset from the right edge,
    /// negative is inset from the left edge.
    pub x_offset: i32,
    /// Vertical anchor: 0 centres, positive is inset from the bottom edge,
    /// negative is inset from the top edge.
    pub y_offset: i32,
    /// How long the popup stays fully visible after the last update.
    pub duration_ms: u32,
    /// Fade-out length once the display time has elapsed.
    pub fade_ms: u32,
    /// Percent change applied by `--volume-up` / `--volume-down`.
    pub volume_step: u32,
    /// Command (plus leading arguments) that makes a sink the default.
    pub sink_switch_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: 300,
            window_height: 300,
            x_offset: 40,
            y_offset: 40,
            duration_ms: 2000,
            fade_ms: 500,
            volume_step: 5,
            sink_switch_command: "pactl set-default-sink".to_string(),
        }
    }
}

/// A field that could not be used and was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub key: &'static str,
    pub reason: String,
}

impl Settings {
    /// Build settings from a parsed TOML table, recovering per field.
    pub fn from_table(table: &Table) -> (Self, Vec<FieldIssue>) {
        let defaults = Self::default();
        let mut issues = Vec::new();

        let settings = Self {
            window_width: int_field(
                table,
                "window_width",
                WINDOW_SIZE_RANGE,
                defaults.window_width as i64,
                &mut issues,
            ) as u32,
            window_height: int_field(
                table,
                "window_height",
                WINDOW_SIZE_RANGE,
                defaults.window_height as i64,
                &mut issues,
            ) as u32,
            x_offset: int_field(table, "x_offset", OFFSET_RANGE, defaults.x_offset as i64, &mut issues)
                as i32,
            y_offset: int_field(table, "y_offset", OFFSET_RANGE, defaults.y_offset as i64, &mut issues)
                as i32,
            duration_ms: int_field(
                table,
                "duration_ms",
                DURATION_RANGE,
                defaults.duration_ms as i64,
                &mut issues,
            ) as u32,
            fade_ms: int_field(table, "fade_ms", FADE_RANGE, defaults.fade_ms as i64, &mut issues)
                as u32,
            volume_step: int_field(
                table,
                "volume_step",
                VOLUME_STEP_RANGE,
                defaults.volume_step as i64,
                &mut issues,
            ) as u32,
            sink_switch_command: string_field(
                table,
                "sink_switch_command",
                defaults.sink_switch_command,
                &mut issues,
            ),
        };

        (settings, issues)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms as u64)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms as u64)
    }

    /// Popup size as (width, height).
    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

fn int_field(
    table: &Table,
    key: &'static str,
    range: RangeInclusive<i64>,
    default: i64,
    issues: &mut Vec<FieldIssue>,
) -> i64 {
    let raw = match table.get(key) {
        None => {
            issues.push(FieldIssue {
                key,
                reason: "missing".to_string(),
            });
            return default;
        }
        Some(raw) => raw,
    };

    let parsed = match raw {
        Value::Integer(n) => Some(*n),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if range.contains(&n) => n,
        Some(n) => {
            issues.push(FieldIssue {
                key,
                reason: format!("{} outside {}..={}", n, range.start(), range.end()),
            });
            default
        }
        None => {
            issues.push(FieldIssue {
                key,
                reason: format!("expected integer, found {}", raw.type_str()),
            });
            default
        }
    }
}

fn string_field(
    table: &Table,
    key: &'static str,
    default: String,
    issues: &mut Vec<FieldIssue>,
) -> String {
    match table.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(other) => {
            issues.push(FieldIssue {
                key,
                reason: format!("expected non-empty string, found {}", other.type_str()),
            });
            default
        }
        None => {
            issues.push(FieldIssue {
                key,
                reason: "missing".to_string(),
            });
            default
        }
    }
}
