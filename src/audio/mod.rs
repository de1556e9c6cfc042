// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Thin wrappers around the sound server's command-line tools.
//!
//! The display server never talks to the audio stack directly; it only
//! shells out to switch the default sink. The mixer helpers back the
//! `--volume-*` convenience flags on the client side.

pub mod mixer;
pub mod sink_switch;

pub use mixer::{MixerError, VolumeAction};
pub use sink_switch::{switch_sink, SinkSwitchError};
