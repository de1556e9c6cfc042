// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Template rendering: turns an [`UpdateRequest`] into displayable content.
//!
//! The output is a plain view model; the widgets that draw it live in
//! [`crate::ui`]. Bad payloads never fail here, they render placeholders.

use volosd_ipc::UpdateRequest;

/// Upper end of the volume bar, in percent.
pub const VOLUME_MAX: f64 = 150.0;

/// Nominal full volume, in percent. Anything above is over-amplified.
pub const VOLUME_NOMINAL: f64 = 100.0;

/// Shown in place of a missing or unparsable value.
pub const VALUE_PLACEHOLDER: &str = "—";

/// Templates known to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Volume,
    /// Name that matches no template.
    Missing(String),
}

impl Template {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "volume" => Template::Volume,
            _ => Template::Missing(name.to_string()),
        }
    }
}

/// Fill fractions of the volume bar, each relative to the full bar width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBar {
    /// Portion up to 100 %.
    pub standard: f32,
    /// Portion above 100 %.
    pub excess: f32,
}

impl VolumeBar {
    pub fn for_value(value: Option<f64>) -> Self {
        let v = value.unwrap_or(0.0).clamp(0.0, VOLUME_MAX);
        Self {
            standard: (v.min(VOLUME_NOMINAL) / VOLUME_MAX) as f32,
            excess: ((v - VOLUME_NOMINAL).max(0.0) / VOLUME_MAX) as f32,
        }
    }

    /// Unfilled remainder of the bar.
    pub fn empty(&self) -> f32 {
        (1.0 - self.standard - self.excess).max(0.0)
    }
}

/// One row in the output selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEntry {
    pub name: String,
    pub label: String,
    pub active: bool,
}

/// Everything the popup needs to draw one update.
#[derive(Debug, Clone, PartialEq)]
pub enum OsdContent {
    Volume {
        label: String,
        bar: VolumeBar,
        muted: bool,
        sinks: Vec<SinkEntry>,
        debug_line: Option<String>,
    },
    Missing {
        template: String,
    },
}

impl OsdContent {
    /// Whether the content has clickable elements.
    pub fn is_interactive(&self) -> bool {
        matches!(self, OsdContent::Volume { sinks, .. } if !sinks.is_empty())
    }

    /// Mark `name` as the active sink. Returns false if it is not listed.
    pub fn mark_active(&mut self, name: &str) -> bool {
        let OsdContent::Volume { sinks, .. } = self else {
            return false;
        };
        if !sinks.iter().any(|s| s.name == name) {
            return false;
        }
        for sink in sinks.iter_mut() {
            sink.active = sink.name == name;
        }
        true
    }

    /// Sink entries, empty for templates without a selector.
    pub fn sinks(&self) -> &[SinkEntry] {
        match self {
            OsdContent::Volume { sinks, .. } => sinks,
            OsdContent::Missing { .. } => &[],
        }
    }
}

/// Render a request with its template.
pub fn render(request: &UpdateRequest) -> OsdContent {
    match Template::parse(&request.template) {
        Template::Volume => OsdContent::Volume {
            label: value_label(request.value),
            bar: VolumeBar::for_value(request.value),
            muted: request.muted,
            sinks: request
                .sinks
                .iter()
                .map(|s| SinkEntry {
                    name: s.name.clone(),
                    label: s.display_name().to_string(),
                    active: s.active,
                })
                .collect(),
            debug_line: request.debug.then(|| {
                format!(
                    "{} value={:?} muted={} sinks={}",
                    request.template,
                    request.value,
                    request.muted,
                    request.sinks.len()
                )
            }),
        },
        Template::Missing(template) => OsdContent::Missing { template },
    }
}

fn value_label(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v.round() as i64),
        None => VALUE_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volosd_ipc::SinkInfo;

    fn volume(value: Option<f64>) -> UpdateRequest {
        UpdateRequest {
            value,
            ..UpdateRequest::new("volume")
        }
    }

    #[test]
    fn test_template_parse() {
        assert_eq!(Template::parse("volume"), Template::Volume);
        assert_eq!(Template::parse(" Volume "), Template::Volume);
        assert_eq!(
            Template::parse("brightness"),
            Template::Missing("brightness".to_string())
        );
    }

    #[test]
    fn test_bar_fractions() {
        let bar = VolumeBar::for_value(Some(75.0));
        assert!((bar.standard - 0.5).abs() < 1e-6);
        assert_eq!(bar.excess, 0.0);

        let bar = VolumeBar::for_value(Some(125.0));
        assert!((bar.standard - 100.0 / 150.0).abs() < 1e-6);
        assert!((bar.excess - 25.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_bar_clamps_out_of_range() {
        let bar = VolumeBar::for_value(Some(900.0));
        assert!((bar.standard + bar.excess - 1.0).abs() < 1e-6);
        assert!(bar.empty() < 1e-6);

        let bar = VolumeBar::for_value(Some(-20.0));
        assert_eq!(bar.standard, 0.0);
        assert_eq!(bar.empty(), 1.0);
    }

    #[test]
    fn test_missing_value_renders_placeholder() {
        match render(&volume(None)) {
            OsdContent::Volume { label, bar, .. } => {
                assert_eq!(label, VALUE_PLACEHOLDER);
                assert_eq!(bar.standard, 0.0);
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_value_label_rounds() {
        match render(&volume(Some(42.6))) {
            OsdContent::Volume { label, .. } => assert_eq!(label, "43"),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_unknown_template() {
        let content = render(&UpdateRequest::new("brightness"));
        assert_eq!(
            content,
            OsdContent::Missing {
                template: "brightness".to_string()
            }
        );
        assert!(!content.is_interactive());
    }

    #[test]
    fn test_single_active_sink() {
        let mut request = volume(Some(30.0));
        request.sinks = vec![SinkInfo::new("a", "A", true), SinkInfo::new("b", "B", false)];
        let content = render(&request);
        assert!(content.is_interactive());
        assert_eq!(content.sinks().iter().filter(|s| s.active).count(), 1);
        assert_eq!(content.sinks()[1].label, "B");
    }

    #[test]
    fn test_mark_active() {
        let mut request = volume(Some(30.0));
        request.sinks = vec![SinkInfo::new("a", "A", true), SinkInfo::new("b", "B", false)];
        let mut content = render(&request);
        assert!(content.mark_active("b"));
        assert!(!content.sinks()[0].active);
        assert!(content.sinks()[1].active);
        assert!(!content.mark_active("zzz"));
        assert!(content.sinks()[1].active);
    }

    #[test]
    fn test_debug_line() {
        let mut request = volume(Some(10.0));
        assert!(matches!(render(&request), OsdContent::Volume { debug_line: None, .. }));
        request.debug = true;
        assert!(matches!(render(&request), OsdContent::Volume { debug_line: Some(_), .. }));
    }
}
