// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Server side of the update channel.
//!
//! The listening socket won by [`crate::single_instance`] is parked in a
//! global slot before the UI starts; the subscription stream picks it up
//! and accepts one request per connection. Connections are handled in
//! arrival order, one at a time, so updates are never reordered.

use parking_lot::Mutex;
use std::io;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};
use volosd_ipc::{IpcError, UpdateRequest, MAX_MESSAGE_BYTES};

/// How long a connected client may take to send its line.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Listening socket waiting to be picked up by the subscription.
static PENDING_LISTENER: Mutex<Option<StdUnixListener>> = Mutex::new(None);

/// Events produced by the update channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A client delivered a request.
    Request(UpdateRequest),
    /// The accept loop ended and no further requests will arrive.
    Closed,
}

/// Park the listener for the subscription.
pub fn install_listener(listener: StdUnixListener) {
    *PENDING_LISTENER.lock() = Some(listener);
}

/// Iced subscription delivering requests from clients.
pub fn update_subscription() -> iced::Subscription<ChannelEvent> {
    iced::Subscription::run(update_stream)
}

/// Iced subscription firing once on SIGTERM or SIGINT.
pub fn shutdown_subscription() -> iced::Subscription<()> {
    iced::Subscription::run(shutdown_stream)
}

fn update_stream() -> impl futures::Stream<Item = ChannelEvent> + Send {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let pending = PENDING_LISTENER.lock().take();

    tokio::spawn(async move {
        let Some(std_listener) = pending else {
            debug!("No listener installed, update channel idle");
            return;
        };

        let listener = match into_tokio(std_listener) {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to register listener with the runtime: {}", e);
                let _ = tx.send(ChannelEvent::Closed);
                return;
            }
        };

        info!("Update channel ready");

        loop {
            match listener.accept().await {
                Ok((stream, _)) => match read_request(stream).await {
                    Ok(Some(request)) => {
                        if tx.send(ChannelEvent::Request(request)).is_err() {
                            debug!("UI gone, stopping update channel");
                            return;
                        }
                    }
                    Ok(None) => debug!("Empty connection (probe)"),
                    Err(e) => warn!("Dropped malformed request: {}", e),
                },
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    });

    tokio_stream::wrappers::UnboundedReceiverStream::new(rx)
}

fn into_tokio(listener: StdUnixListener) -> io::Result<UnixListener> {
    listener.set_nonblocking(true)?;
    UnixListener::from_std(listener)
}

/// Read one request line. `Ok(None)` for a connection that sent nothing.
pub async fn read_request(stream: UnixStream) -> Result<Option<UpdateRequest>, IpcError> {
    let mut line = String::new();
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES as u64 + 1));

    match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(result) => {
            result?;
        }
        Err(_) => {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "client sent no complete line",
            )))
        }
    }

    if line.len() > MAX_MESSAGE_BYTES {
        return Err(IpcError::TooLarge(line.len()));
    }
    if line.trim().is_empty() {
        return Ok(None);
    }
    UpdateRequest::from_wire(&line).map(Some)
}

fn shutdown_stream() -> impl futures::Stream<Item = ()> + Send {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Cannot install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
        let _ = tx.send(());
    });

    tokio_stream::wrappers::UnboundedReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    async fn pair(dir: &TempDir) -> (UnixStream, UnixStream) {
        let path = dir.path().join("osd.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let client = UnixStream::connect(&path).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_reads_one_request() {
        let dir = TempDir::new().unwrap();
        let (mut client, server) = pair(&dir).await;
        let request = UpdateRequest {
            value: Some(70.0),
            ..UpdateRequest::new("volume")
        };
        client.write_all(request.to_wire().as_bytes()).await.unwrap();
        assert_eq!(read_request(server).await.unwrap(), Some(request));
    }

    #[tokio::test]
    async fn test_empty_connection() {
        let dir = TempDir::new().unwrap();
        let (client, server) = pair(&dir).await;
        drop(client);
        assert_eq!(read_request(server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_without_newline_accepted_at_eof() {
        let dir = TempDir::new().unwrap();
        let (mut client, server) = pair(&dir).await;
        client.write_all(br#"{"template":"volume"}"#).await.unwrap();
        drop(client);
        let request = read_request(server).await.unwrap().unwrap();
        assert_eq!(request.template, "volume");
        assert_eq!(request.value, None);
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let dir = TempDir::new().unwrap();
        let (_client, server) = pair(&dir).await;
        let err = read_request(server).await.unwrap_err();
        assert!(matches!(err, IpcError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut client, server) = pair(&dir).await;
        let writer = tokio::spawn(async move {
            let junk = vec![b'x'; MAX_MESSAGE_BYTES + 10];
            let _ = client.write_all(&junk).await;
        });
        let err = read_request(server).await.unwrap_err();
        assert!(matches!(err, IpcError::TooLarge(_)));
        writer.abort();
    }
}
