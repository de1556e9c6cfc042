// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! volosd - Volume on-screen display for Linux desktops.
//!
//! The first invocation becomes a long-lived display server; later ones
//! hand their request to it over a Unix socket and exit immediately.

mod app;
mod audio;
mod bridge;
mod channel;
mod cli;
mod config;
mod logging;
mod message;
mod position;
mod render;
mod screens;
mod single_instance;
mod state;
mod ui;

use app::{Launch, Mode, VolOsd};
use audio::MixerError;
use clap::Parser;
use cli::Args;
use config::SettingsStore;
use parking_lot::Mutex;
use single_instance::{claim, Role};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use volosd_ipc::{default_endpoint, UpdateRequest};

/// Exit status when no output device can be resolved.
const EXIT_NO_SINK: u8 = 2;

/// Exit status when the endpoint could neither be bound nor reached.
const EXIT_NO_CHANNEL: u8 = 3;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.debug);

    let endpoint = args.endpoint.clone().unwrap_or_else(default_endpoint);
    let store = SettingsStore::locate();

    let request = match args.volume_action() {
        Some(action) => {
            let settings = store.load();
            match audio::mixer::apply(action, settings.volume_step, args.debug) {
                Ok(request) => Some(request),
                Err(MixerError::NoSink) => {
                    error!("No default output device found");
                    return ExitCode::from(EXIT_NO_SINK);
                }
                Err(e) => {
                    error!("Volume change failed: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None if args.start => None,
        None => Some(args.to_request()),
    };

    match claim(&endpoint, request.as_ref()) {
        Role::Forwarded => {
            info!("Request delivered to running server");
            ExitCode::SUCCESS
        }
        Role::AlreadyRunning => {
            info!("Server already running");
            ExitCode::SUCCESS
        }
        Role::Server(mut guard) => {
            if let Some(listener) = guard.take_listener() {
                channel::install_listener(listener);
            }
            let endpoint = Arc::new(Mutex::new(Some(guard)));
            let code = run_display(Mode::Server, store, request, endpoint.clone());
            // Unlink the socket before the process goes away.
            drop(endpoint.lock().take());
            code
        }
        Role::OneShot => match request {
            Some(request) => {
                run_display(Mode::OneShot, store, Some(request), Arc::new(Mutex::new(None)));
                ExitCode::from(EXIT_NO_CHANNEL)
            }
            None => {
                error!("Cannot start the display server at {}", endpoint.display());
                ExitCode::from(EXIT_NO_CHANNEL)
            }
        },
    }
}

fn run_display(
    mode: Mode,
    store: SettingsStore,
    initial: Option<UpdateRequest>,
    endpoint: Arc<Mutex<Option<single_instance::EndpointGuard>>>,
) -> ExitCode {
    let launch = Launch {
        mode,
        store,
        initial,
        endpoint,
    };

    let result = iced::daemon(move || VolOsd::new(launch.clone()), VolOsd::update, VolOsd::view)
        .title(VolOsd::title)
        .subscription(VolOsd::subscription)
        .theme(VolOsd::theme)
        .run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Display failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
