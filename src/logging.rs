// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Logging setup: stderr plus a shared log file when one can be opened.

use directories::ProjectDirs;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Shared log file, writable by every user.
pub const LOG_FILE: &str = "/tmp/volosd.log";

/// Install the global subscriber. Never fails the caller.
pub fn init(debug: bool) {
    let directive = if debug { "volosd=debug" } else { "volosd=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let mut problems = Vec::new();
    let file = match open_shared(Path::new(LOG_FILE)) {
        Ok(file) => Some((file, PathBuf::from(LOG_FILE))),
        Err(e) => {
            problems.push(format!("{}: {}", LOG_FILE, e));
            match fallback_path() {
                Some(path) => match open_private(&path) {
                    Ok(file) => Some((file, path)),
                    Err(e) => {
                        problems.push(format!("{}: {}", path.display(), e));
                        None
                    }
                },
                None => None,
            }
        }
    };

    let (file_layer, file_path) = match file {
        Some((file, path)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            Some(path),
        ),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return;
    }

    for problem in problems {
        warn!("Cannot open log file {}", problem);
    }
    match file_path {
        Some(path) => debug!("Logging to {}", path.display()),
        None => warn!("File logging unavailable, using stderr only"),
    }
}

/// Open `path` for appending; a file created here is made world-writable.
///
/// Symlinks are never followed, so a link planted in a shared directory
/// cannot redirect the log.
fn open_shared(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).custom_flags(libc::O_NOFOLLOW);

    match options.clone().create_new(true).open(path) {
        Ok(file) => {
            // Another user may own the next server process.
            file.set_permissions(Permissions::from_mode(0o666))?;
            Ok(file)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => options.open(path),
        Err(e) => Err(e),
    }
}

fn open_private(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Per-user log location.
fn fallback_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "volosd")?;
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.cache_dir());
    Some(dir.join("volosd.log"))
}
