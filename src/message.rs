// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message types for the display server.

use crate::bridge::BridgeCall;
use crate::channel::ChannelEvent;
use crate::position::ScreenLayout;
use crate::state::TimerToken;
use iced::{window, Size};

/// All messages in the application.
#[derive(Debug, Clone)]
pub enum Message {
    // ==================== Update Channel ====================
    /// Event from the client socket.
    Channel(ChannelEvent),
    /// SIGTERM/SIGINT received.
    Shutdown,

    // ==================== Window ====================
    /// The popup surface finished opening.
    WindowOpened(window::Id),
    /// The popup surface was destroyed.
    WindowClosed(window::Id),
    /// Pointer and monitor query finished (`None` on failure).
    LayoutResolved(Option<ScreenLayout>),
    /// Fallback monitor size from the windowing backend.
    MonitorSize(Option<Size>),

    // ==================== Visibility ====================
    /// Hide timer elapsed for the given arming.
    HideTimerFired(TimerToken),
    /// Animation frame while fading out.
    FadeTick,
    /// Pointer entered the popup.
    PointerEntered,
    /// Pointer left the popup.
    PointerLeft,

    // ==================== Bridge ====================
    /// Call from content, with its 0-based attempt number.
    Bridge(BridgeCall, u32),
    /// External sink switch finished.
    SinkSwitched {
        name: String,
        result: Result<(), String>,
    },
    /// Toast lifetime elapsed.
    ToastExpired(u64),
}
