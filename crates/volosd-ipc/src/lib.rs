// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared IPC types and wire codec for volosd.
//!
//! Short-lived client invocations deliver one [`UpdateRequest`] per
//! connection to the long-lived display server over a Unix domain socket.
//! Each request is flattened into a single JSON line. Decoding is lenient:
//! only the template name is mandatory, everything else falls back to a
//! placeholder so a bad payload can never take the server down.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Wire protocol version carried in every message.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for a single encoded request.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// File name of the socket inside the runtime directory.
pub const ENDPOINT_FILE: &str = "volosd.sock";

/// Template used when the caller does not name one.
pub const DEFAULT_TEMPLATE: &str = "volume";

/// Information about an audio output device (sink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkInfo {
    /// Stable identifier (node name as reported by the sound server).
    pub name: String,
    /// Human-readable label.
    pub description: String,
    /// Whether this is the current default output.
    pub active: bool,
}

impl SinkInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            active,
        }
    }

    /// Get the display name for the device.
    pub fn display_name(&self) -> &str {
        if !self.description.is_empty() {
            &self.description
        } else {
            &self.name
        }
    }
}

/// A single display request, one per client invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    /// Template name (e.g. "volume").
    pub template: String,
    /// Value in percent. `None` when absent or unparsable.
    pub value: Option<f64>,
    /// Whether the output is muted.
    pub muted: bool,
    /// Available outputs in display order.
    pub sinks: Vec<SinkInfo>,
    /// Verbose logging and diagnostic footer.
    pub debug: bool,
}

impl UpdateRequest {
    /// Create a request for the given template with no payload.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    /// Encode as a single wire line, including the trailing newline.
    pub fn to_wire(&self) -> String {
        let sinks: Vec<Value> = self
            .sinks
            .iter()
            .map(|s| json!({ "name": s.name, "description": s.description, "active": s.active }))
            .collect();
        let mut line = json!({
            "v": PROTOCOL_VERSION,
            "template": self.template,
            "value": self.value,
            "muted": self.muted,
            "debug": self.debug,
            "sinks": sinks,
        })
        .to_string();
        line.push('\n');
        line
    }

    /// Decode a wire line.
    ///
    /// Fails when the line is not a JSON object, carries no template name or
    /// declares a protocol version other than [`PROTOCOL_VERSION`]. A missing
    /// `v` is accepted. Every other field degrades to its placeholder.
    pub fn from_wire(line: &str) -> Result<Self, IpcError> {
        if line.len() > MAX_MESSAGE_BYTES {
            return Err(IpcError::TooLarge(line.len()));
        }
        let root: Value = serde_json::from_str(line.trim())?;
        let obj = root.as_object().ok_or(IpcError::NotAnObject)?;

        if let Some(version) = obj.get("v") {
            if version.as_u64() != Some(PROTOCOL_VERSION as u64) {
                return Err(IpcError::UnsupportedVersion(version.to_string()));
            }
        }

        let template = obj
            .get("template")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(IpcError::MissingTemplate)?
            .to_string();

        Ok(Self {
            template,
            value: obj.get("value").and_then(lenient_number),
            muted: lenient_bool(obj, "muted"),
            sinks: obj.get("sinks").map(parse_sinks).unwrap_or_default(),
            debug: lenient_bool(obj, "debug"),
        })
    }

    /// Index of the active sink, if any.
    pub fn active_sink(&self) -> Option<usize> {
        self.sinks.iter().position(|s| s.active)
    }
}

/// Write a request to a connected stream.
pub fn write_request<W: Write>(writer: &mut W, request: &UpdateRequest) -> Result<(), IpcError> {
    writer.write_all(request.to_wire().as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_value_text(s),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn lenient_bool(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Parse a user-supplied value such as `"42"`, `"42.5"` or `"42%"`.
pub fn parse_value_text(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_end_matches('%').trim();
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a sink list given as JSON text (the `--sinks` argument).
///
/// Malformed text yields an empty list.
pub fn parse_sinks_text(text: &str) -> Vec<SinkInfo> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_sinks(&value),
        Err(_) => Vec::new(),
    }
}

/// Parse a sink list from its structured form.
///
/// Accepts an array of objects or a string holding such an array. Entries
/// without a name are dropped and only the first active entry stays active.
pub fn parse_sinks(value: &Value) -> Vec<SinkInfo> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::String(text) => return parse_sinks_text(text),
        _ => return Vec::new(),
    };

    let mut seen_active = false;
    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let name = obj.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or(name);
            let mut active = lenient_bool(obj, "active");
            if active && seen_active {
                active = false;
            }
            seen_active |= active;
            Some(SinkInfo::new(name, description, active))
        })
        .collect()
}

/// Default socket location for the current user session.
///
/// Uses `$XDG_RUNTIME_DIR` when available, otherwise a per-user file in the
/// system temporary directory.
pub fn default_endpoint() -> PathBuf {
    match dirs::runtime_dir() {
        Some(dir) => dir.join(ENDPOINT_FILE),
        None => {
            let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
            std::env::temp_dir().join(format!("volosd-{}.sock", user))
        }
    }
}

/// Path of the advisory lock file guarding server election for `endpoint`.
pub fn lock_path(endpoint: &Path) -> PathBuf {
    let mut name = endpoint.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Errors from encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Message is not a JSON object")]
    NotAnObject,
    #[error("Message has no template name")]
    MissingTemplate,
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(String),
    #[error("Message too large: {0} bytes")]
    TooLarge(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UpdateRequest {
        UpdateRequest {
            template: "volume".to_string(),
            value: Some(42.0),
            muted: true,
            sinks: vec![
                SinkInfo::new("a", "A", true),
                SinkInfo::new("b", "B", false),
            ],
            debug: false,
        }
    }

    #[test]
    fn test_wire_is_single_line() {
        let line = sample().to_wire();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_round_trip() {
        let req = sample();
        let decoded = UpdateRequest::from_wire(&req.to_wire()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_missing_template_rejected() {
        let err = UpdateRequest::from_wire(r#"{"value": 10}"#).unwrap_err();
        assert!(matches!(err, IpcError::MissingTemplate));
        assert!(matches!(
            UpdateRequest::from_wire("[1,2]").unwrap_err(),
            IpcError::NotAnObject
        ));
        assert!(matches!(
            UpdateRequest::from_wire("not json").unwrap_err(),
            IpcError::Malformed(_)
        ));
    }

    #[test]
    fn test_protocol_version_checked() {
        let req = UpdateRequest::from_wire(r#"{"v":1,"template":"volume"}"#).unwrap();
        assert_eq!(req.template, "volume");
        assert!(UpdateRequest::from_wire(r#"{"template":"volume"}"#).is_ok());

        for line in [
            r#"{"v":2,"template":"volume"}"#,
            r#"{"v":"1","template":"volume"}"#,
            r#"{"v":null,"template":"volume"}"#,
        ] {
            assert!(matches!(
                UpdateRequest::from_wire(line).unwrap_err(),
                IpcError::UnsupportedVersion(_)
            ));
        }
    }

    #[test]
    fn test_value_degrades_to_none() {
        let req = UpdateRequest::from_wire(r#"{"template":"volume","value":"loud"}"#).unwrap();
        assert_eq!(req.value, None);

        let req = UpdateRequest::from_wire(r#"{"template":"volume"}"#).unwrap();
        assert_eq!(req.value, None);

        let req = UpdateRequest::from_wire(r#"{"template":"volume","value":"55%"}"#).unwrap();
        assert_eq!(req.value, Some(55.0));
    }

    #[test]
    fn test_out_of_range_value_is_kept() {
        let req = UpdateRequest::from_wire(r#"{"template":"volume","value":900}"#).unwrap();
        assert_eq!(req.value, Some(900.0));
    }

    #[test]
    fn test_sinks_tolerated_in_every_shape() {
        let absent = UpdateRequest::from_wire(r#"{"template":"volume"}"#).unwrap();
        assert!(absent.sinks.is_empty());

        let garbage = UpdateRequest::from_wire(r#"{"template":"volume","sinks":42}"#).unwrap();
        assert!(garbage.sinks.is_empty());

        let bad_text =
            UpdateRequest::from_wire(r#"{"template":"volume","sinks":"[{oops"}"#).unwrap();
        assert!(bad_text.sinks.is_empty());

        let as_text = UpdateRequest::from_wire(
            r#"{"template":"volume","sinks":"[{\"name\":\"a\",\"active\":true}]"}"#,
        )
        .unwrap();
        assert_eq!(as_text.sinks, vec![SinkInfo::new("a", "a", true)]);
    }

    #[test]
    fn test_only_first_active_sink_kept() {
        let sinks = parse_sinks_text(
            r#"[{"name":"a","active":true},{"name":"b","active":true},{"description":"nameless"}]"#,
        );
        assert_eq!(sinks.len(), 2);
        assert!(sinks[0].active);
        assert!(!sinks[1].active);
    }

    #[test]
    fn test_parse_value_text() {
        assert_eq!(parse_value_text(" 12.5 "), Some(12.5));
        assert_eq!(parse_value_text("abc"), None);
        assert_eq!(parse_value_text("NaN"), None);
        assert_eq!(parse_value_text(""), None);
    }

    #[test]
    fn test_lock_path() {
        let lock = lock_path(Path::new("/run/user/1000/volosd.sock"));
        assert_eq!(lock, PathBuf::from("/run/user/1000/volosd.sock.lock"));
    }

    #[test]
    fn test_write_request() {
        let mut buf = Vec::new();
        write_request(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(UpdateRequest::from_wire(&text).unwrap(), sample());
    }
}
