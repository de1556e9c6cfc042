// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Popup state machine.
//!
//! ```text
//!            update                 timer (fade_ms > 0)
//!   Hidden ─────────► Showing ─────────────────────────► Fading
//!     ▲                ▲   │ update: replace + re-arm      │
//!     │                │   └──────┘                        │
//!     │                └────────────── update ─────────────┤
//!     └───────────── timer (fade_ms = 0) / fade done ──────┘
//! ```
//!
//! Every arm of the hide timer gets a fresh [`TimerToken`]. A timer that
//! fires with an outdated token is ignored, so a cancelled timer that races
//! with its replacement can never hide the popup early.

use crate::render::OsdContent;
use std::time::{Duration, Instant};

/// Lifetime of a toast message.
pub const TOAST_LIFETIME: Duration = Duration::from_millis(2500);

/// Most toasts shown at once; older ones are dropped first.
pub const MAX_TOASTS: usize = 3;

/// Identifies one arming of the hide timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Visibility phase of the popup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Hidden,
    Showing,
    /// Fading out since `started`.
    Fading { started: Instant },
}

/// Result of applying an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shown {
    /// The popup was hidden before this update and must be made visible.
    pub was_hidden: bool,
    /// Token for the freshly armed hide timer, `None` while hover-held.
    pub timer: Option<TimerToken>,
}

/// What to do when a hide timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The timer was cancelled or superseded.
    Stale,
    /// Begin the fade-out animation.
    StartFade,
    /// Hide right away.
    Hide,
}

/// Pure visibility/content state of the single popup.
#[derive(Debug, Clone)]
pub struct PopupState {
    phase: Phase,
    content: Option<OsdContent>,
    generation: u64,
    armed: Option<TimerToken>,
    hovered: bool,
}

impl Default for PopupState {
    fn default() -> Self {
        Self::new()
    }
}

impl PopupState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Hidden,
            content: None,
            generation: 0,
            armed: None,
            hovered: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.phase, Phase::Hidden)
    }

    pub fn content(&self) -> Option<&OsdContent> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut OsdContent> {
        self.content.as_mut()
    }

    /// Replace the content and (re)arm the hide timer.
    pub fn apply_update(&mut self, content: OsdContent) -> Shown {
        let was_hidden = !self.is_visible();
        self.content = Some(content);
        self.phase = Phase::Showing;
        if was_hidden {
            self.hovered = false;
        }
        Shown {
            was_hidden,
            timer: self.rearm(),
        }
    }

    /// Cancel any pending timer and arm a new one.
    ///
    /// Returns `None` when hidden or while the pointer holds the popup open.
    pub fn rearm(&mut self) -> Option<TimerToken> {
        self.cancel_timer();
        if !self.is_visible() || self.hovered {
            return None;
        }
        self.phase = Phase::Showing;
        let token = TimerToken(self.generation);
        self.armed = Some(token);
        Some(token)
    }

    /// Invalidate the pending timer, if any.
    pub fn cancel_timer(&mut self) {
        self.generation += 1;
        self.armed = None;
    }

    /// Pointer entered the popup: keep it on screen until it leaves.
    pub fn hold(&mut self) {
        if !self.is_visible() {
            return;
        }
        self.hovered = true;
        self.phase = Phase::Showing;
        self.cancel_timer();
    }

    /// Pointer left the popup: start a full display period.
    pub fn release(&mut self) -> Option<TimerToken> {
        self.hovered = false;
        self.rearm()
    }

    /// Hide timer fired.
    pub fn on_timer(&mut self, token: TimerToken, fade: Duration, now: Instant) -> TimerOutcome {
        if self.armed != Some(token) || self.phase != Phase::Showing {
            return TimerOutcome::Stale;
        }
        self.armed = None;
        if fade.is_zero() {
            self.hide();
            TimerOutcome::Hide
        } else {
            self.phase = Phase::Fading { started: now };
            TimerOutcome::StartFade
        }
    }

    /// Opacity at `now` (1.0 when fully shown).
    pub fn opacity(&self, fade: Duration, now: Instant) -> f32 {
        match self.phase {
            Phase::Hidden => 0.0,
            Phase::Showing => 1.0,
            Phase::Fading { started } => {
                if fade.is_zero() {
                    return 0.0;
                }
                let elapsed = now.saturating_duration_since(started).as_secs_f32();
                (1.0 - elapsed / fade.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    /// Advance the fade. Returns true once the popup has become hidden.
    pub fn fade_tick(&mut self, fade: Duration, now: Instant) -> bool {
        match self.phase {
            Phase::Fading { .. } if self.opacity(fade, now) <= 0.0 => {
                self.hide();
                true
            }
            _ => false,
        }
    }

    /// Force the hidden state. Content is kept for reuse.
    pub fn hide(&mut self) {
        self.phase = Phase::Hidden;
        self.hovered = false;
        self.cancel_timer();
    }
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// A transient message shown inside the popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

/// Queue of live toasts.
#[derive(Debug, Clone, Default)]
pub struct Toasts {
    next_id: u64,
    items: Vec<Toast>,
}

impl Toasts {
    /// Add a toast and return its id.
    pub fn push(&mut self, kind: ToastKind, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Toast {
            id,
            kind,
            message: message.into(),
        });
        if self.items.len() > MAX_TOASTS {
            let excess = self.items.len() - MAX_TOASTS;
            self.items.drain(..excess);
        }
        id
    }

    pub fn expire(&mut self, id: u64) {
        self.items.retain(|t| t.id != id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;
    use volosd_ipc::UpdateRequest;

    const FADE: Duration = Duration::from_millis(500);

    fn content(value: f64) -> OsdContent {
        render(&UpdateRequest {
            value: Some(value),
            ..UpdateRequest::new("volume")
        })
    }

    #[test]
    fn test_first_update_shows() {
        let mut state = PopupState::new();
        let shown = state.apply_update(content(10.0));
        assert!(shown.was_hidden);
        assert!(shown.timer.is_some());
        assert_eq!(state.phase(), Phase::Showing);
    }

    #[test]
    fn test_burst_replaces_in_place() {
        let mut state = PopupState::new();
        let mut shows = 0;
        let mut tokens = Vec::new();
        for v in 1..=20 {
            let shown = state.apply_update(content(v as f64));
            if shown.was_hidden {
                shows += 1;
            }
            tokens.push(shown.timer.unwrap());
        }
        assert_eq!(shows, 1);
        assert_eq!(state.content(), Some(&content(20.0)));

        // Only the last timer is live.
        let now = Instant::now();
        for token in &tokens[..tokens.len() - 1] {
            assert_eq!(state.on_timer(*token, FADE, now), TimerOutcome::Stale);
            assert!(state.is_visible());
        }
        assert_eq!(
            state.on_timer(*tokens.last().unwrap(), FADE, now),
            TimerOutcome::StartFade
        );
    }

    #[test]
    fn test_timer_without_fade_hides() {
        let mut state = PopupState::new();
        let token = state.apply_update(content(10.0)).timer.unwrap();
        assert_eq!(
            state.on_timer(token, Duration::ZERO, Instant::now()),
            TimerOutcome::Hide
        );
        assert!(!state.is_visible());
        // Content survives for reuse.
        assert!(state.content().is_some());
    }

    #[test]
    fn test_fade_completes() {
        let mut state = PopupState::new();
        let token = state.apply_update(content(10.0)).timer.unwrap();
        let start = Instant::now();
        state.on_timer(token, FADE, start);

        let half = start + FADE / 2;
        let opacity = state.opacity(FADE, half);
        assert!(opacity > 0.4 && opacity < 0.6);
        assert!(!state.fade_tick(FADE, half));

        assert!(state.fade_tick(FADE, start + FADE));
        assert_eq!(state.phase(), Phase::Hidden);
    }

    #[test]
    fn test_update_during_fade_restores_without_flicker() {
        let mut state = PopupState::new();
        let token = state.apply_update(content(10.0)).timer.unwrap();
        let start = Instant::now();
        state.on_timer(token, FADE, start);

        let shown = state.apply_update(content(15.0));
        assert!(!shown.was_hidden);
        assert_eq!(state.phase(), Phase::Showing);
        assert_eq!(state.opacity(FADE, start + FADE), 1.0);
        assert!(!state.fade_tick(FADE, start + FADE));
    }

    #[test]
    fn test_update_after_hide_shows_again() {
        let mut state = PopupState::new();
        let token = state.apply_update(content(10.0)).timer.unwrap();
        state.on_timer(token, Duration::ZERO, Instant::now());
        assert!(state.apply_update(content(20.0)).was_hidden);
    }

    #[test]
    fn test_hover_holds_popup() {
        let mut state = PopupState::new();
        let token = state.apply_update(content(10.0)).timer.unwrap();
        state.hold();
        assert_eq!(state.on_timer(token, FADE, Instant::now()), TimerOutcome::Stale);

        // Updates while held keep it open without a timer.
        assert_eq!(state.apply_update(content(11.0)).timer, None);

        let token = state.release().unwrap();
        assert_eq!(state.on_timer(token, FADE, Instant::now()), TimerOutcome::StartFade);
    }

    #[test]
    fn test_hold_while_hidden_is_ignored() {
        let mut state = PopupState::new();
        state.hold();
        assert_eq!(state.release(), None);
        assert!(!state.is_visible());
    }

    #[test]
    fn test_rearm_when_hidden() {
        let mut state = PopupState::new();
        assert_eq!(state.rearm(), None);
    }

    #[test]
    fn test_toasts_bounded() {
        let mut toasts = Toasts::default();
        let first = toasts.push(ToastKind::Success, "one");
        for i in 0..MAX_TOASTS {
            toasts.push(ToastKind::Error, format!("more {}", i));
        }
        assert_eq!(toasts.iter().count(), MAX_TOASTS);
        assert!(toasts.iter().all(|t| t.id != first));

        let last = toasts.iter().last().unwrap().id;
        toasts.expire(last);
        assert_eq!(toasts.iter().count(), MAX_TOASTS - 1);
    }
}
