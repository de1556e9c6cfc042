// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Theme constants and styling for the popup.

use iced::theme::Palette;
use iced::{Border, Color, Theme};

// ============================================================================
// Color Constants (Dark Theme)
// ============================================================================

/// Popup card background.
pub const SURFACE: Color = Color::from_rgba(0.10, 0.10, 0.12, 0.88);

/// Lighter surface for hover states and the empty bar track.
pub const SURFACE_LIGHT: Color = Color::from_rgb(0.24, 0.24, 0.26);

/// Primary accent color (cyan), used for the standard volume range.
pub const PRIMARY: Color = Color::from_rgb(0.20, 0.80, 0.90);

/// Over-amplification segment of the volume bar (red).
pub const EXCESS: Color = Color::from_rgb(0.90, 0.30, 0.30);

/// Main text color.
pub const TEXT: Color = Color::from_rgb(0.90, 0.90, 0.92);

/// Dimmed text color.
pub const TEXT_DIM: Color = Color::from_rgb(0.60, 0.60, 0.65);

/// Muted/error indicator (red).
pub const MUTED_COLOR: Color = Color::from_rgb(0.85, 0.30, 0.30);

/// Success/active indicator (green).
pub const SUCCESS: Color = Color::from_rgb(0.40, 0.75, 0.40);

/// Warning indicator (yellow).
pub const WARNING: Color = Color::from_rgb(0.90, 0.75, 0.20);

// ============================================================================
// Theme Palette
// ============================================================================

/// Palette with a transparent background so only the card is drawn.
pub const THEME_PALETTE: Palette = Palette {
    background: Color::TRANSPARENT,
    text: TEXT,
    primary: PRIMARY,
    success: SUCCESS,
    danger: MUTED_COLOR,
    warning: WARNING,
};

/// Get the popup theme.
pub fn osd_theme() -> Theme {
    Theme::custom("volosd".to_string(), THEME_PALETTE)
}

// ============================================================================
// Style Helpers
// ============================================================================

pub const BORDER_RADIUS: f32 = 6.0;
pub const BORDER_RADIUS_LARGE: f32 = 14.0;

pub const SPACING: f32 = 10.0;
pub const SPACING_SMALL: f32 = 5.0;

pub const PADDING: f32 = 18.0;

/// Height of the volume bar.
pub const BAR_HEIGHT: f32 = 8.0;

/// Size of the percentage readout.
pub const VALUE_TEXT_SIZE: f32 = 48.0;

/// Scale a color's alpha by the popup opacity.
pub fn faded(color: Color, opacity: f32) -> Color {
    Color {
        a: color.a * opacity.clamp(0.0, 1.0),
        ..color
    }
}

/// Border of the popup card.
pub fn card_border(opacity: f32) -> Border {
    Border::default()
        .rounded(BORDER_RADIUS_LARGE)
        .color(faded(SURFACE_LIGHT, opacity))
        .width(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faded() {
        assert_eq!(faded(TEXT, 1.0), TEXT);
        assert_eq!(faded(TEXT, 0.5).a, 0.5);
        assert_eq!(faded(SURFACE, 2.0).a, SURFACE.a);
        assert_eq!(faded(TEXT, -1.0).a, 0.0);
    }
}
