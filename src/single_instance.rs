// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Single-instance mechanism using a Unix domain socket.
//!
//! Every invocation first tries to hand its request to a running server.
//! If nobody answers, it tries to become the server by binding the socket
//! path; `bind(2)` fails with `EADDRINUSE` when the path exists, which makes
//! the bind itself the election. The whole decision runs under an advisory
//! lock on `<endpoint>.lock` so concurrent first invocations are serialized
//! and a stale socket left by a crashed server can be unlinked safely.

use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::os::unix::fs::MetadataExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use volosd_ipc::{lock_path, write_request, IpcError, UpdateRequest};

/// Bind/connect rounds before giving up on the socket.
pub const MAX_ATTEMPTS: u32 = 5;

/// Backoff unit between rounds; round `n` waits `n` units.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// How long a client waits for the server to take its request.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to bind {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },
    #[error("Failed to deliver request: {0}")]
    Deliver(#[from] IpcError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of the startup protocol for this process.
#[derive(Debug)]
pub enum Role {
    /// The request went to the running server; nothing else to do.
    Forwarded,
    /// A server answered and there was no request to send (`--start`).
    AlreadyRunning,
    /// This process won the election and owns the endpoint.
    Server(EndpointGuard),
    /// No server reachable and the endpoint could not be bound.
    OneShot,
}

/// Ownership of the bound endpoint.
///
/// Dropping the guard unlinks the socket file, but only if the path still
/// refers to the socket this process created.
#[derive(Debug)]
pub struct EndpointGuard {
    path: PathBuf,
    listener: Option<UnixListener>,
    identity: Option<(u64, u64)>,
}

impl EndpointGuard {
    fn new(path: &Path, listener: UnixListener) -> Self {
        let identity = fs::symlink_metadata(path).ok().map(|m| (m.dev(), m.ino()));
        Self {
            path: path.to_path_buf(),
            listener: Some(listener),
            identity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the listening socket to the accept loop. Yields it only once.
    pub fn take_listener(&mut self) -> Option<UnixListener> {
        self.listener.take()
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        let current = fs::symlink_metadata(&self.path)
            .ok()
            .map(|m| (m.dev(), m.ino()));
        if current.is_some() && current == self.identity {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed endpoint {}", self.path.display()),
                Err(e) => warn!("Failed to remove endpoint {}: {}", self.path.display(), e),
            }
        }
    }
}

/// Run the startup protocol for `endpoint`.
///
/// With `request = None` (pre-warm mode) a reachable server is simply left
/// alone.
pub fn claim(endpoint: &Path, request: Option<&UpdateRequest>) -> Role {
    match try_deliver(endpoint, request) {
        Ok(true) => return delivered(request),
        Ok(false) => {}
        Err(e) => warn!("Running server did not take the request: {}", e),
    }

    let _lock = ElectionLock::acquire(endpoint);

    for attempt in 0..MAX_ATTEMPTS {
        match UnixListener::bind(endpoint) {
            Ok(listener) => {
                info!("Listening on {}", endpoint.display());
                return Role::Server(EndpointGuard::new(endpoint, listener));
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => match UnixStream::connect(endpoint) {
                Ok(stream) => {
                    debug!("Lost the election, forwarding to the winner");
                    match deliver(stream, request) {
                        Ok(()) => return delivered(request),
                        Err(e) => warn!("Delivery to new server failed: {}", e),
                    }
                }
                Err(ce) if is_stale(&ce) => {
                    info!("Removing stale endpoint {}", endpoint.display());
                    if let Err(e) = fs::remove_file(endpoint) {
                        if e.kind() != ErrorKind::NotFound {
                            warn!("Could not remove stale endpoint: {}", e);
                        }
                    }
                    continue;
                }
                Err(ce) => warn!("Endpoint busy but unreachable: {}", ce),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = endpoint.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        warn!("Cannot create {}: {}", parent.display(), e);
                    }
                }
                continue;
            }
            Err(e) => warn!(
                "{}",
                ChannelError::Bind {
                    path: endpoint.to_path_buf(),
                    source: e,
                }
            ),
        }
        thread::sleep(RETRY_BACKOFF * (attempt + 1));
    }

    warn!(
        "Could not bind or reach {} after {} attempts, showing a one-shot popup",
        endpoint.display(),
        MAX_ATTEMPTS
    );
    Role::OneShot
}

fn delivered(request: Option<&UpdateRequest>) -> Role {
    if request.is_some() {
        Role::Forwarded
    } else {
        Role::AlreadyRunning
    }
}

/// Connection failures that mean "file exists but nobody listens".
fn is_stale(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound)
}

/// Fast path: `Ok(true)` if a server took the request.
fn try_deliver(endpoint: &Path, request: Option<&UpdateRequest>) -> Result<bool, ChannelError> {
    match UnixStream::connect(endpoint) {
        Ok(stream) => {
            deliver(stream, request)?;
            Ok(true)
        }
        Err(e) => {
            debug!("No server at {}: {}", endpoint.display(), e);
            Ok(false)
        }
    }
}

fn deliver(mut stream: UnixStream, request: Option<&UpdateRequest>) -> Result<(), ChannelError> {
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    if let Some(request) = request {
        write_request(&mut stream, request)?;
    }
    Ok(())
}

/// Advisory lock serializing elections; released when dropped.
struct ElectionLock {
    _file: File,
}

impl ElectionLock {
    fn acquire(endpoint: &Path) -> Option<Self> {
        let path = lock_path(endpoint);
        let file = match File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot open election lock {}: {}", path.display(), e);
                return None;
            }
        };
        match file.lock() {
            Ok(()) => Some(Self { _file: file }),
            Err(e) => {
                warn!("Cannot take election lock {}: {}", path.display(), e);
                None
            }
        }
    }
}
