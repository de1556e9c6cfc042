// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface.

use crate::audio::VolumeAction;
use clap::Parser;
use std::path::PathBuf;
use volosd_ipc::{parse_sinks_text, parse_value_text, UpdateRequest, DEFAULT_TEMPLATE};

#[derive(Debug, Parser)]
#[command(name = "volosd", version, about = "Volume on-screen display")]
pub struct Args {
    /// Template to render.
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Value to display, in percent. Unparsable values show a placeholder.
    #[arg(long, allow_hyphen_values = true)]
    pub value: Option<String>,

    /// Show the muted state.
    #[arg(long)]
    pub muted: bool,

    /// Output list as a JSON array of {name, description, active}.
    #[arg(long)]
    pub sinks: Option<String>,

    /// Verbose logging and a diagnostic footer in the popup.
    #[arg(long)]
    pub debug: bool,

    /// Start the display server without showing anything.
    #[arg(long, conflicts_with_all = ["volume_up", "volume_down", "volume_mute"])]
    pub start: bool,

    /// Raise the default output by the configured step.
    #[arg(long, conflicts_with_all = ["volume_down", "volume_mute"])]
    pub volume_up: bool,

    /// Lower the default output by the configured step.
    #[arg(long, conflicts_with = "volume_mute")]
    pub volume_down: bool,

    /// Toggle mute on the default output.
    #[arg(long)]
    pub volume_mute: bool,

    /// Socket path of the display server.
    #[arg(long, value_name = "PATH")]
    pub endpoint: Option<PathBuf>,
}

impl Args {
    /// Mixer action requested by the `--volume-*` flags.
    pub fn volume_action(&self) -> Option<VolumeAction> {
        if self.volume_up {
            Some(VolumeAction::Up)
        } else if self.volume_down {
            Some(VolumeAction::Down)
        } else if self.volume_mute {
            Some(VolumeAction::ToggleMute)
        } else {
            None
        }
    }

    /// Display request described by the direct flags.
    pub fn to_request(&self) -> UpdateRequest {
        UpdateRequest {
            value: self.value.as_deref().and_then(parse_value_text),
            muted: self.muted,
            sinks: self.sinks.as_deref().map(parse_sinks_text).unwrap_or_default(),
            debug: self.debug,
            ..UpdateRequest::new(self.template.clone())
        }
    }
}
