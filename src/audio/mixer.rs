// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Volume and mute control using pactl.
//!
//! Backs the `--volume-up`, `--volume-down` and `--volume-mute` flags: the
//! default sink is adjusted, then its new state is turned into an
//! [`UpdateRequest`] for the popup.

use crate::render::VOLUME_MAX;
use serde::Deserialize;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};
use volosd_ipc::{SinkInfo, UpdateRequest};

#[derive(Debug, Error)]
pub enum MixerError {
    #[error("Failed to execute pactl: {0}")]
    PactlFailed(String),
    #[error("Mixer operation failed: {0}")]
    OperationFailed(String),
    #[error("No default sink available")]
    NoSink,
    #[error("Could not parse pactl output: {0}")]
    Parse(String),
}

/// Convenience action requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeAction {
    Up,
    Down,
    ToggleMute,
}

/// Apply `action` to the default sink and describe the result.
pub fn apply(action: VolumeAction, step: u32, debug: bool) -> Result<UpdateRequest, MixerError> {
    let sink = default_sink()?;

    match action {
        VolumeAction::Up | VolumeAction::Down => {
            let current = sink_volume(&sink)?;
            let target = step_volume(current, step, action == VolumeAction::Up);
            debug!("Volume {}% -> {}% on {}", current, target, sink);
            pactl(&["set-sink-volume", &sink, &format!("{}%", target)])?;
        }
        VolumeAction::ToggleMute => {
            pactl(&["set-sink-mute", &sink, "toggle"])?;
        }
    }

    let sinks = match list_sinks(&sink) {
        Ok(sinks) => sinks,
        Err(e) => {
            warn!("Sink list unavailable: {}", e);
            Vec::new()
        }
    };

    Ok(UpdateRequest {
        template: "volume".to_string(),
        value: Some(sink_volume(&sink)? as f64),
        muted: sink_muted(&sink)?,
        sinks,
        debug,
    })
}

/// New volume after one step, clamped to the displayable range.
pub fn step_volume(current: u32, step: u32, up: bool) -> u32 {
    let max = VOLUME_MAX as u32;
    if up {
        current.saturating_add(step).min(max)
    } else {
        current.saturating_sub(step).min(max)
    }
}

fn default_sink() -> Result<String, MixerError> {
    let name = pactl(&["get-default-sink"])?.trim().to_string();
    if name.is_empty() {
        return Err(MixerError::NoSink);
    }
    Ok(name)
}

fn sink_volume(sink: &str) -> Result<u32, MixerError> {
    parse_volume_percent(&pactl(&["get-sink-volume", sink])?)
}

fn sink_muted(sink: &str) -> Result<bool, MixerError> {
    parse_mute(&pactl(&["get-sink-mute", sink])?)
}

fn list_sinks(default: &str) -> Result<Vec<SinkInfo>, MixerError> {
    parse_sink_list(&pactl(&["--format=json", "list", "sinks"])?, default)
}

fn pactl(args: &[&str]) -> Result<String, MixerError> {
    let output = Command::new("pactl")
        .args(args)
        .output()
        .map_err(|e| MixerError::PactlFailed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MixerError::OperationFailed(stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First percentage in `pactl get-sink-volume` output.
pub fn parse_volume_percent(output: &str) -> Result<u32, MixerError> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_suffix('%')?.parse::<u32>().ok())
        .ok_or_else(|| MixerError::Parse(output.trim().to_string()))
}

/// Mute flag from `pactl get-sink-mute` output.
pub fn parse_mute(output: &str) -> Result<bool, MixerError> {
    match output.trim().strip_prefix("Mute:").map(str::trim) {
        Some("yes") => Ok(true),
        Some("no") => Ok(false),
        _ => Err(MixerError::Parse(output.trim().to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct PactlSink {
    name: String,
    #[serde(default)]
    description: String,
}

/// Sinks from `pactl --format=json list sinks`, marking `default` active.
pub fn parse_sink_list(json: &str, default: &str) -> Result<Vec<SinkInfo>, MixerError> {
    let sinks: Vec<PactlSink> =
        serde_json::from_str(json).map_err(|e| MixerError::Parse(e.to_string()))?;
    Ok(sinks
        .into_iter()
        .map(|s| {
            let active = s.name == default;
            SinkInfo::new(s.name, s.description, active)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume_percent() {
        let out = "Volume: front-left: 32768 /  50% / -18.06 dB,   front-right: 32768 /  50% / -18.06 dB\n        balance 0.00\n";
        assert_eq!(parse_volume_percent(out).unwrap(), 50);
        assert!(parse_volume_percent("garbage").is_err());
    }

    #[test]
    fn test_parse_mute() {
        assert!(parse_mute("Mute: yes\n").unwrap());
        assert!(!parse_mute("Mute: no").unwrap());
        assert!(parse_mute("Muted?").is_err());
    }

    #[test]
    fn test_parse_sink_list() {
        let json = r#"[
            {"index": 1, "name": "alsa_output.pci", "description": "Built-in Audio"},
            {"index": 2, "name": "bluez_output.headset"}
        ]"#;
        let sinks = parse_sink_list(json, "bluez_output.headset").unwrap();
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].display_name(), "Built-in Audio");
        assert!(!sinks[0].active);
        assert!(sinks[1].active);
        assert_eq!(sinks[1].display_name(), "bluez_output.headset");
    }

    #[test]
    fn test_step_volume_clamps() {
        assert_eq!(step_volume(50, 5, true), 55);
        assert_eq!(step_volume(148, 5, true), 150);
        assert_eq!(step_volume(3, 5, false), 0);
        assert_eq!(step_volume(200, 5, false), 150);
    }
}
