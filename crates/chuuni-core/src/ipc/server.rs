//! IPC server: accept loop and per-connection handler.
//!
//! Each accepted connection carries exactly one request line and receives
//! exactly one response line. The accept loop polls with a short timeout so
//! it notices the cooperative shutdown flag without a dedicated wakeup.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info};

use super::types::*;
use crate::admission::AdmissionController;
use crate::daemon::ShutdownFlag;

/// How long `accept` may block before the shutdown flag is re-checked.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Budget for reading one request from a connection.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Budget for writing the response back.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared state accessible to every connection handler.
#[derive(Debug)]
pub struct IpcState {
    pub controller: Arc<AdmissionController>,
    pub shutdown: ShutdownFlag,
}

/// Accept connections until the shutdown flag is set.
///
/// Returns an error only if `accept` itself fails; the caller owns socket
/// cleanup either way.
pub async fn serve(listener: &UnixListener, state: Arc<IpcState>) -> std::io::Result<()> {
    while !state.shutdown.is_requested() {
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok((stream, _addr))) => {
                tokio::spawn(handle_connection(stream, Arc::clone(&state)));
            }
            Ok(Err(e)) => {
                error!(error = %e, "accept failed, leaving accept loop");
                return Err(e);
            }
        }
    }
    info!("shutdown requested, accept loop stopped");
    Ok(())
}

/// Serve one request on `stream`. Never propagates a failure.
pub async fn handle_connection(mut stream: UnixStream, state: Arc<IpcState>) {
    if let Err(e) = respond(&mut stream, &state).await {
        debug!(error = %e, "connection closed with error");
    }
}

async fn respond(stream: &mut UnixStream, state: &IpcState) -> std::io::Result<()> {
    let response = match read_message(stream).await? {
        Incoming::Nothing => return Ok(()),
        Incoming::Oversized => Response::from(ProtocolError::TooLarge),
        Incoming::Line(line) => match Request::decode(&line) {
            Ok(request) => dispatch(request, state),
            Err(e) => {
                debug!(error = %e, "rejecting malformed request");
                Response::from(e)
            }
        },
    };

    let bytes = response.encode().map_err(std::io::Error::other)?;
    timeout(WRITE_TIMEOUT, stream.write_all(&bytes))
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
    stream.shutdown().await.ok();
    Ok(())
}

/// What a connection delivered within [`READ_TIMEOUT`].
#[derive(Debug, PartialEq)]
enum Incoming {
    /// A complete message, newline stripped.
    Line(Vec<u8>),
    /// More than [`MAX_MESSAGE_BYTES`] without a newline.
    Oversized,
    /// Timeout without a newline, or only whitespace before EOF.
    Nothing,
}

async fn read_message(stream: &mut UnixStream) -> std::io::Result<Incoming> {
    let deadline = Instant::now() + READ_TIMEOUT;
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
            Err(_) => return Ok(Incoming::Nothing),
            Ok(read) => read?,
        };
        if n == 0 {
            return Ok(non_blank(data));
        }
        data.extend_from_slice(&chunk[..n]);
        if let Some(end) = data.iter().position(|b| *b == b'\n') {
            data.truncate(end);
            return Ok(non_blank(data));
        }
        if data.len() > MAX_MESSAGE_BYTES {
            return Ok(Incoming::Oversized);
        }
    }
}

fn non_blank(data: Vec<u8>) -> Incoming {
    if data.iter().all(u8::is_ascii_whitespace) {
        Incoming::Nothing
    } else {
        Incoming::Line(data)
    }
}

/// Route a decoded request to its handler.
pub fn dispatch(request: Request, state: &IpcState) -> Response {
    match request {
        Request::Play(play) => state
            .controller
            .evaluate_play(&play.event, &play.audio_path, play.volume)
            .into(),
        Request::Status => Response::status(
            state.controller.queue_size(),
            state.controller.session_counts(),
            state.controller.session_limits().clone(),
        ),
        Request::SessionReset => {
            state.controller.session_reset();
            info!("session counts reset");
            Response::ok()
        }
        Request::Stop => {
            info!("stop requested via IPC");
            state.shutdown.request();
            Response::ok()
        }
    }
}
