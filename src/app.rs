// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Iced daemon implementation of the display server.
//!
//! [`VolOsd`] is the server state owned by the event loop. It keeps one
//! popup window for the whole process lifetime and only toggles, moves and
//! resizes it; updates never open a second surface.

use crate::audio::switch_sink;
use crate::bridge::{Bridge, BridgeCall, Dispatch, BRIDGE_VERSION, METHODS};
use crate::channel::{self, ChannelEvent};
use crate::config::{Settings, SettingsStore};
use crate::message::Message;
use crate::position::{place, ScreenLayout, ScreenRect};
use crate::render::{render, OsdContent};
use crate::screens;
use crate::single_instance::EndpointGuard;
use crate::state::{Phase, PopupState, TimerOutcome, TimerToken, ToastKind, Toasts, TOAST_LIFETIME};
use crate::ui;
use iced::task::Handle;
use iced::widget::Space;
use iced::{window, Element, Point, Size, Subscription, Task, Theme};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use volosd_ipc::UpdateRequest;

/// Frame interval while fading out.
const FADE_FRAME: Duration = Duration::from_millis(16);

/// How this process serves popups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Owns the endpoint and keeps running between popups.
    Server,
    /// Shows a single popup and exits once it hides.
    OneShot,
}

/// Everything the daemon needs at boot.
#[derive(Debug, Clone)]
pub struct Launch {
    pub mode: Mode,
    pub store: SettingsStore,
    /// Request to show right away (the invocation's own request).
    pub initial: Option<UpdateRequest>,
    /// Endpoint ownership, released on shutdown.
    pub endpoint: Arc<Mutex<Option<EndpointGuard>>>,
}

/// What has been pushed to the window so far.
#[derive(Debug, Default)]
struct Applied {
    visible: bool,
    origin: Option<(i32, i32)>,
    size: Option<(u32, u32)>,
    passthrough: Option<bool>,
}

/// Display server state.
pub struct VolOsd {
    mode: Mode,
    store: SettingsStore,
    settings: Settings,
    endpoint: Arc<Mutex<Option<EndpointGuard>>>,
    /// The single popup surface.
    window: window::Id,
    opened: bool,
    popup: PopupState,
    /// Pending hide timer task.
    hide_timer: Option<Handle>,
    /// Delay the pending hide timer was armed with.
    armed_delay: Option<Duration>,
    bridge: Bridge,
    toasts: Toasts,
    /// Origin computed for the current showing.
    origin: Option<(i32, i32)>,
    /// Stay hidden until the first placement of this showing arrives.
    placement_pending: bool,
    /// A placement query is owed once the window exists.
    placement_wanted: bool,
    applied: Applied,
}

impl VolOsd {
    /// Create the server and open its (hidden) popup window.
    pub fn new(launch: Launch) -> (Self, Task<Message>) {
        let settings = launch.store.load();
        let (width, height) = settings.window_size();

        let (window, open) = window::open(window::Settings {
            size: Size::new(width as f32, height as f32),
            visible: false,
            resizable: false,
            decorations: false,
            transparent: true,
            level: window::Level::AlwaysOnTop,
            exit_on_close_request: false,
            platform_specific: window::settings::PlatformSpecific {
                application_id: "volosd".to_string(),
                override_redirect: true,
            },
            ..window::Settings::default()
        });

        info!(
            "Display server starting ({:?}, {}x{}, {} ms)",
            launch.mode, width, height, settings.duration_ms
        );
        debug!("Settings file {}", launch.store.path().display());
        debug!(
            "Bridge v{} methods: {}",
            BRIDGE_VERSION,
            METHODS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
        );

        let app = Self {
            mode: launch.mode,
            store: launch.store,
            settings,
            endpoint: launch.endpoint,
            window,
            opened: false,
            popup: PopupState::new(),
            hide_timer: None,
            armed_delay: None,
            bridge: Bridge::new(),
            toasts: Toasts::default(),
            origin: None,
            placement_pending: false,
            placement_wanted: false,
            applied: Applied {
                size: Some((width, height)),
                ..Applied::default()
            },
        };

        let mut tasks = vec![open.map(Message::WindowOpened)];
        if let Some(request) = launch.initial {
            tasks.push(Task::done(Message::Channel(ChannelEvent::Request(request))));
        }

        (app, Task::batch(tasks))
    }

    /// Window title.
    pub fn title(&self, _window: window::Id) -> String {
        "volosd".to_string()
    }

    /// Handle messages.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            // ==================== Update Channel ====================
            Message::Channel(ChannelEvent::Request(request)) => self.show(request),
            Message::Channel(ChannelEvent::Closed) => {
                warn!("Update channel closed, no further requests will arrive");
                Task::none()
            }
            Message::Shutdown => self.shutdown(),

            // ==================== Window ====================
            Message::WindowOpened(id) => {
                if id != self.window {
                    return Task::none();
                }
                debug!("Popup window ready");
                self.opened = true;
                self.bridge.wire();
                let placement = if self.placement_wanted {
                    self.request_placement()
                } else {
                    Task::none()
                };
                Task::batch([placement, self.sync_window()])
            }
            Message::WindowClosed(id) => {
                if id != self.window {
                    return Task::none();
                }
                error!("Popup window was destroyed");
                self.opened = false;
                self.bridge.unwire();
                self.shutdown()
            }
            Message::LayoutResolved(Some(layout)) => {
                self.place_on(&layout);
                self.sync_window()
            }
            Message::LayoutResolved(None) => {
                if self.opened {
                    window::monitor_size(self.window).map(Message::MonitorSize)
                } else {
                    self.placement_pending = false;
                    self.sync_window()
                }
            }
            Message::MonitorSize(size) => {
                match size {
                    Some(size) => self.place_on(&ScreenLayout {
                        pointer: (0, 0),
                        screens: vec![ScreenRect::new(0, 0, size.width as u32, size.height as u32)],
                        primary: 0,
                    }),
                    None => {
                        warn!("No monitor geometry available, keeping the last position");
                        self.placement_pending = false;
                    }
                }
                self.sync_window()
            }

            // ==================== Visibility ====================
            Message::HideTimerFired(token) => {
                match self.popup.on_timer(token, self.settings.fade(), Instant::now()) {
                    TimerOutcome::Stale => Task::none(),
                    TimerOutcome::StartFade => {
                        self.hide_timer = None;
                        debug!("Fading out over {} ms", self.settings.fade_ms);
                        Task::none()
                    }
                    TimerOutcome::Hide => self.on_hidden(),
                }
            }
            Message::FadeTick => {
                if self.popup.fade_tick(self.settings.fade(), Instant::now()) {
                    self.on_hidden()
                } else {
                    Task::none()
                }
            }
            Message::PointerEntered => {
                self.popup.hold();
                self.arm_hide_timer(None)
            }
            Message::PointerLeft => {
                let token = self.popup.release();
                self.arm_hide_timer(token)
            }

            // ==================== Bridge ====================
            Message::Bridge(call, attempt) => match self.bridge.dispatch(call, attempt) {
                Dispatch::Run(call) => self.run_bridge(call),
                Dispatch::Retry {
                    call,
                    attempt,
                    after,
                } => {
                    debug!("Bridge not ready for {}, retry {} in {:?}", call.method(), attempt, after);
                    Task::perform(tokio::time::sleep(after), move |_| {
                        Message::Bridge(call, attempt)
                    })
                }
                Dispatch::GiveUp(call) => {
                    warn!("Bridge call {} dropped after retries", call.method());
                    self.toast(
                        ToastKind::Error,
                        format!("Could not {}: popup not ready", call.method()),
                    )
                }
            },
            Message::SinkSwitched { name, result } => match result {
                Ok(()) => {
                    info!("Default sink is now {}", name);
                    let label = self
                        .popup
                        .content()
                        .and_then(|c| c.sinks().iter().find(|s| s.name == name))
                        .map(|s| s.label.clone())
                        .unwrap_or_else(|| name.clone());
                    if let Some(content) = self.popup.content_mut() {
                        content.mark_active(&name);
                    }
                    self.toast(ToastKind::Success, format!("Switched to {}", label))
                }
                Err(e) => {
                    error!("Switching to {} failed: {}", name, e);
                    self.toast(ToastKind::Error, format!("Could not switch output: {}", e))
                }
            },
            Message::ToastExpired(id) => {
                self.toasts.expire(id);
                Task::none()
            }
        }
    }

    /// Render the popup window.
    pub fn view(&self, window: window::Id) -> Element<'_, Message> {
        if window != self.window {
            return Space::new().into();
        }
        let opacity = self.popup.opacity(self.settings.fade(), Instant::now());
        ui::popup(self.popup.content(), &self.toasts, opacity)
    }

    /// Get the application theme.
    pub fn theme(&self, _window: window::Id) -> Theme {
        ui::theme::osd_theme()
    }

    /// Subscriptions for external events.
    pub fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            window::close_events().map(Message::WindowClosed),
            channel::shutdown_subscription().map(|()| Message::Shutdown),
        ];
        if self.mode == Mode::Server {
            subscriptions.push(channel::update_subscription().map(Message::Channel));
        }
        if matches!(self.popup.phase(), Phase::Fading { .. }) {
            subscriptions.push(iced::time::every(FADE_FRAME).map(|_| Message::FadeTick));
        }
        Subscription::batch(subscriptions)
    }

    /// Apply one update request.
    fn show(&mut self, request: UpdateRequest) -> Task<Message> {
        self.settings = self.store.load();
        if request.debug {
            info!("Request: {:?}", request);
        }

        let shown = self.popup.apply_update(render(&request));
        if shown.was_hidden {
            self.placement_pending = true;
            self.toasts.clear();
        }

        let timer = self.arm_hide_timer(shown.timer);
        let placement = self.request_placement();
        Task::batch([timer, placement, self.sync_window()])
    }

    /// Replace the running hide timer with one for `token`.
    fn arm_hide_timer(&mut self, token: Option<TimerToken>) -> Task<Message> {
        if let Some(handle) = self.hide_timer.take() {
            handle.abort();
        }
        self.armed_delay = None;
        let Some(token) = token else {
            return Task::none();
        };
        let delay = self.settings.duration();
        let (task, handle) = Task::future(hide_after(delay, token)).abortable();
        self.hide_timer = Some(handle);
        self.armed_delay = Some(delay);
        task
    }

    fn request_placement(&mut self) -> Task<Message> {
        if !self.opened {
            self.placement_wanted = true;
            return Task::none();
        }
        self.placement_wanted = false;
        Task::perform(resolve_layout(), Message::LayoutResolved)
    }

    fn place_on(&mut self, layout: &ScreenLayout) {
        self.placement_pending = false;
        let Some(screen) = layout.screen_under_pointer() else {
            warn!("No screen to place the popup on");
            return;
        };
        let origin = place(
            screen,
            self.settings.window_size(),
            self.settings.x_offset,
            self.settings.y_offset,
        );
        debug!("Placing popup at {:?} on {:?}", origin, screen);
        self.origin = Some(origin);
    }

    /// Push size, position, passthrough and visibility to the window,
    /// issuing only the changes.
    fn sync_window(&mut self) -> Task<Message> {
        if !self.opened {
            return Task::none();
        }
        let id = self.window;
        let mut tasks = Vec::new();

        let size = self.settings.window_size();
        if self.applied.size != Some(size) {
            debug!("Resizing popup to {}x{}", size.0, size.1);
            tasks.push(window::resize(id, Size::new(size.0 as f32, size.1 as f32)));
            self.applied.size = Some(size);
        }

        if let Some(origin) = self.origin {
            if self.applied.origin != Some(origin) {
                tasks.push(window::move_to(id, Point::new(origin.0 as f32, origin.1 as f32)));
                self.applied.origin = Some(origin);
            }
        }

        let passthrough = !self.popup.content().is_some_and(OsdContent::is_interactive);
        if self.applied.passthrough != Some(passthrough) {
            tasks.push(if passthrough {
                window::enable_mouse_passthrough(id)
            } else {
                window::disable_mouse_passthrough(id)
            });
            self.applied.passthrough = Some(passthrough);
        }

        let visible = self.popup.is_visible() && !self.placement_pending;
        if self.applied.visible != visible {
            let mode = if visible {
                window::Mode::Windowed
            } else {
                window::Mode::Hidden
            };
            tasks.push(window::set_mode(id, mode));
            self.applied.visible = visible;
        }

        Task::batch(tasks)
    }

    fn on_hidden(&mut self) -> Task<Message> {
        debug!("Popup hidden");
        self.toasts.clear();
        let timer = self.arm_hide_timer(None);
        let sync = self.sync_window();
        match self.mode {
            Mode::Server => Task::batch([timer, sync]),
            Mode::OneShot => Task::batch([timer, sync, iced::exit()]),
        }
    }

    fn run_bridge(&mut self, call: BridgeCall) -> Task<Message> {
        match call {
            BridgeCall::SelectSink { name } => {
                info!("Switching default sink to {}", name);
                let command = self.settings.sink_switch_command.clone();
                Task::perform(switch_sink(command, name.clone()), move |result| {
                    Message::SinkSwitched {
                        name,
                        result: result.map_err(|e| e.to_string()),
                    }
                })
            }
            BridgeCall::Log { message } => {
                info!(target: "volosd::bridge", "{}", message);
                Task::none()
            }
        }
    }

    /// Show a toast and keep the popup up long enough to read it.
    fn toast(&mut self, kind: ToastKind, message: impl Into<String>) -> Task<Message> {
        let id = self.toasts.push(kind, message);
        let token = self.popup.rearm();
        let timer = self.arm_hide_timer(token);
        let expire = Task::perform(tokio::time::sleep(TOAST_LIFETIME), move |_| {
            Message::ToastExpired(id)
        });
        Task::batch([timer, expire, self.sync_window()])
    }

    fn shutdown(&mut self) -> Task<Message> {
        if let Some(guard) = self.endpoint.lock().take() {
            info!("Releasing endpoint {}", guard.path().display());
        }
        if let Some(handle) = self.hide_timer.take() {
            handle.abort();
        }
        iced::exit()
    }
}

/// Hide timer for one arming; fires `delay` after it is first polled.
async fn hide_after(delay: Duration, token: TimerToken) -> Message {
    tokio::time::sleep(delay).await;
    Message::HideTimerFired(token)
}

/// Query pointer and monitors off the event loop.
async fn resolve_layout() -> Option<ScreenLayout> {
    match tokio::task::spawn_blocking(screens::query_layout).await {
        Ok(Ok(layout)) => Some(layout),
        Ok(Err(e)) => {
            warn!("Screen query failed: {}", e);
            None
        }
        Err(e) => {
            warn!("Screen query task failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PopupState;
    use std::fs;
    use std::pin::pin;
    use std::task::Poll;
    use tempfile::TempDir;

    fn launch(dir: &TempDir) -> Launch {
        Launch {
            mode: Mode::Server,
            store: SettingsStore::at(dir.path().join("settings.toml")),
            initial: None,
            endpoint: Arc::new(Mutex::new(None)),
        }
    }

    fn volume(value: f64) -> Message {
        Message::Channel(ChannelEvent::Request(UpdateRequest {
            value: Some(value),
            ..UpdateRequest::new("volume")
        }))
    }

    fn token() -> TimerToken {
        let mut popup = PopupState::new();
        let content = render(&UpdateRequest::new("volume"));
        popup.apply_update(content).timer.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_timer_fires_after_duration() {
        let delay = Duration::from_millis(700);
        let token = token();
        let mut timer = pin!(hide_after(delay, token));

        assert!(futures::poll!(timer.as_mut()).is_pending());
        tokio::time::advance(delay - Duration::from_millis(1)).await;
        assert!(futures::poll!(timer.as_mut()).is_pending());

        tokio::time::advance(Duration::from_millis(1)).await;
        match futures::poll!(timer.as_mut()) {
            Poll::Ready(Message::HideTimerFired(fired)) => assert_eq!(fired, token),
            other => panic!("timer did not fire: {:?}", other),
        }
    }

    #[test]
    fn test_update_arms_reloaded_duration() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = VolOsd::new(launch(&dir));
        assert_eq!(app.armed_delay, None);

        let _ = app.update(volume(10.0));
        assert_eq!(
            app.armed_delay,
            Some(Duration::from_millis(Settings::default().duration_ms as u64))
        );

        // Edited between two updates: the next arming uses the new value.
        let edited = Settings {
            duration_ms: 700,
            ..Settings::default()
        };
        fs::write(dir.path().join("settings.toml"), edited.to_toml().unwrap()).unwrap();
        let _ = app.update(volume(15.0));
        assert_eq!(app.armed_delay, Some(Duration::from_millis(700)));
    }

    #[test]
    fn test_hover_disarms_timer() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = VolOsd::new(launch(&dir));
        let _ = app.update(volume(10.0));
        assert!(app.armed_delay.is_some());

        let _ = app.update(Message::PointerEntered);
        assert_eq!(app.armed_delay, None);
        let _ = app.update(Message::PointerLeft);
        assert!(app.armed_delay.is_some());
    }
}
