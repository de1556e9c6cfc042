// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Popup placement relative to the screen under the pointer.

/// A screen (monitor) rectangle in root-window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the point lies inside this rectangle (right/bottom exclusive).
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && py >= self.y
            && (px as i64) < self.x as i64 + self.width as i64
            && (py as i64) < self.y as i64 + self.height as i64
    }
}

/// Pointer position plus the monitor layout at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    pub pointer: (i32, i32),
    pub screens: Vec<ScreenRect>,
    /// Index into `screens` of the primary monitor.
    pub primary: usize,
}

impl ScreenLayout {
    /// Screen containing the pointer, else the primary one.
    pub fn screen_under_pointer(&self) -> Option<ScreenRect> {
        let (px, py) = self.pointer;
        self.screens
            .iter()
            .find(|s| s.contains(px, py))
            .or_else(|| self.screens.get(self.primary))
            .or_else(|| self.screens.first())
            .copied()
    }
}

/// Top-left origin of a `size` window on `screen` for the given offsets.
///
/// Per axis: an offset of 0 centres the window, a positive offset insets it
/// from the right (bottom) edge and a negative offset insets it from the
/// left (top) edge.
pub fn place(screen: ScreenRect, size: (u32, u32), x_offset: i32, y_offset: i32) -> (i32, i32) {
    (
        axis_origin(screen.x, screen.width, size.0, x_offset),
        axis_origin(screen.y, screen.height, size.1, y_offset),
    )
}

fn axis_origin(start: i32, extent: u32, window: u32, offset: i32) -> i32 {
    let start = start as i64;
    let free = extent as i64 - window as i64;
    let origin = match offset {
        0 => start + free / 2,
        o if o > 0 => start + free - o as i64,
        o => start - o as i64,
    };
    origin.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HD: ScreenRect = ScreenRect::new(0, 0, 1920, 1080);

    #[test]
    fn test_top_right_inset() {
        let (x, y) = place(FULL_HD, (300, 200), 40, -40);
        // Top-right corner of the window sits 40px inside the screen corner.
        assert_eq!(x + 300, 1920 - 40);
        assert_eq!(y, 40);
    }

    #[test]
    fn test_default_bottom_right() {
        assert_eq!(place(FULL_HD, (300, 300), 40, 40), (1580, 740));
    }

    #[test]
    fn test_zero_offset_centres() {
        assert_eq!(place(FULL_HD, (300, 200), 0, 0), (810, 440));
    }

    #[test]
    fn test_negative_x_anchors_left() {
        assert_eq!(place(FULL_HD, (300, 200), -25, 0).0, 25);
    }

    #[test]
    fn test_offset_screen() {
        let right = ScreenRect::new(1920, 0, 2560, 1440);
        assert_eq!(place(right, (300, 300), 40, 40), (1920 + 2560 - 340, 1440 - 340));
    }

    #[test]
    fn test_screen_under_pointer() {
        let layout = ScreenLayout {
            pointer: (2000, 100),
            screens: vec![FULL_HD, ScreenRect::new(1920, 0, 2560, 1440)],
            primary: 0,
        };
        assert_eq!(layout.screen_under_pointer(), Some(ScreenRect::new(1920, 0, 2560, 1440)));
    }

    #[test]
    fn test_pointer_off_screen_uses_primary() {
        let layout = ScreenLayout {
            pointer: (-500, -500),
            screens: vec![FULL_HD, ScreenRect::new(1920, 0, 2560, 1440)],
            primary: 1,
        };
        assert_eq!(layout.screen_under_pointer(), Some(ScreenRect::new(1920, 0, 2560, 1440)));
    }

    #[test]
    fn test_no_screens() {
        let layout = ScreenLayout {
            pointer: (0, 0),
            screens: Vec::new(),
            primary: 0,
        };
        assert_eq!(layout.screen_under_pointer(), None);
    }

    #[test]
    fn test_contains_edges() {
        assert!(FULL_HD.contains(0, 0));
        assert!(FULL_HD.contains(1919, 1079));
        assert!(!FULL_HD.contains(1920, 0));
    }
}
