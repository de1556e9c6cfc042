// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pointer and monitor discovery on X11.

use crate::position::{ScreenLayout, ScreenRect};
use thiserror::Error;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError};
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::xproto::ConnectionExt;

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("Cannot connect to X server: {0}")]
    Connect(#[from] ConnectError),
    #[error("X connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("X request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("X server reported no screen {0}")]
    NoScreen(usize),
}

/// Query the pointer position and monitor geometry.
///
/// This performs blocking round-trips to the X server; call it from a
/// blocking task, not from the UI loop.
pub fn query_layout() -> Result<ScreenLayout, ScreenError> {
    let (conn, screen_num) = x11rb::connect(None)?;
    let (root, root_width, root_height) = {
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or(ScreenError::NoScreen(screen_num))?;
        (screen.root, screen.width_in_pixels, screen.height_in_pixels)
    };

    let pointer = conn.query_pointer(root)?.reply()?;
    let pointer = (pointer.root_x as i32, pointer.root_y as i32);

    let mut screens = Vec::new();
    let mut primary = 0;
    match monitors(&conn, root) {
        Ok(monitors) => {
            for (index, monitor) in monitors.iter().enumerate() {
                if monitor.primary {
                    primary = index;
                }
                screens.push(ScreenRect::new(
                    monitor.x as i32,
                    monitor.y as i32,
                    monitor.width as u32,
                    monitor.height as u32,
                ));
            }
        }
        Err(e) => debug!("RandR monitor list unavailable: {}", e),
    }

    if screens.is_empty() {
        screens.push(ScreenRect::new(0, 0, root_width as u32, root_height as u32));
        primary = 0;
    }

    debug!(
        "Pointer at {:?}, {} screen(s), primary #{}",
        pointer,
        screens.len(),
        primary
    );

    Ok(ScreenLayout {
        pointer,
        screens,
        primary,
    })
}

fn monitors(
    conn: &impl Connection,
    root: u32,
) -> Result<Vec<x11rb::protocol::randr::MonitorInfo>, ScreenError> {
    Ok(conn.randr_get_monitors(root, true)?.reply()?.monitors)
}
