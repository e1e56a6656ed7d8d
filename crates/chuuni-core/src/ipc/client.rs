//! IPC client: one request per connection over the daemon's Unix socket.
//!
//! Every call connects, writes a single JSON line, reads a single JSON line
//! back and closes. The whole exchange is bounded by the client timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::types::*;

/// Default budget for a complete request/response exchange.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors from the IPC client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("daemon closed the connection without a response")]
    EmptyResponse,

    #[error("audio path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

impl IpcClientError {
    /// Whether the daemon could not be reached at all, as opposed to
    /// answering with something unexpected.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::NotRunning(_)
                | Self::Connect { .. }
                | Self::Timeout(_)
                | Self::Io(_)
                | Self::EmptyResponse
        )
    }
}

/// Client for the chuuni daemon.
#[derive(Debug, Clone)]
pub struct IpcClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl IpcClient {
    /// Create a client targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send `request` and wait for the daemon's reply.
    pub async fn send(&self, request: &Request) -> Result<Response, IpcClientError> {
        if !self.daemon_available() {
            return Err(IpcClientError::NotRunning(self.socket_path.clone()));
        }
        let payload = request.encode()?;

        tokio::time::timeout(self.timeout, self.exchange(&payload))
            .await
            .map_err(|_| IpcClientError::Timeout(self.timeout))?
    }

    async fn exchange(&self, payload: &[u8]) -> Result<Response, IpcClientError> {
        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| IpcClientError::Connect {
                    path: self.socket_path.clone(),
                    source,
                })?;

        stream.write_all(payload).await?;

        let mut line = String::new();
        BufReader::new(&mut stream).read_line(&mut line).await?;
        if line.trim().is_empty() {
            return Err(IpcClientError::EmptyResponse);
        }
        debug!(response = line.trim_end(), "IPC response");
        Ok(serde_json::from_str(&line)?)
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// Ask the daemon to admit and queue a clip.
    pub async fn play(
        &self,
        event: &str,
        audio_path: &Path,
        volume: f64,
    ) -> Result<Response, IpcClientError> {
        let path = audio_path
            .to_str()
            .ok_or_else(|| IpcClientError::NonUtf8Path(audio_path.to_path_buf()))?;
        self.send(&Request::play(event, path, volume)).await
    }

    pub async fn status(&self) -> Result<Response, IpcClientError> {
        self.send(&Request::Status).await
    }

    pub async fn session_reset(&self) -> Result<Response, IpcClientError> {
        self.send(&Request::SessionReset).await
    }

    /// Request daemon shutdown.
    pub async fn stop(&self) -> Result<Response, IpcClientError> {
        self.send(&Request::Stop).await
    }

    /// Health probe: true only if a daemon answered `ok`.
    pub async fn is_running(&self) -> bool {
        matches!(self.status().await, Ok(resp) if resp.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    #[test]
    fn test_client_creation() {
        let client = IpcClient::new("/tmp/test-chuuni-missing.sock");
        assert!(!client.daemon_available());
        assert_eq!(client.timeout, DEFAULT_CLIENT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        let client = IpcClient::new("/tmp/nonexistent-chuuni.sock");
        let err = client.status().await.unwrap_err();
        assert!(matches!(err, IpcClientError::NotRunning(_)));
        assert!(err.is_unreachable());
        assert!(!client.is_running().await);
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());

        let err = IpcClient::new(&path).status().await.unwrap_err();
        assert!(matches!(err, IpcClientError::Connect { .. }));
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink).await;
        });

        let client = IpcClient::new(&path).with_timeout(Duration::from_millis(100));
        let err = client.status().await.unwrap_err();
        assert!(matches!(err, IpcClientError::Timeout(_)));
        assert!(err.is_unreachable());
        server.abort();
    }

    #[tokio::test]
    async fn test_garbled_reply_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbled.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"definitely not json\n").await.unwrap();
        });

        let err = IpcClient::new(&path).status().await.unwrap_err();
        assert!(matches!(err, IpcClientError::Parse(_)));
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_rejecting_status_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refusing.sock");
        let listener = UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"{\"ok\":false}\n").await.unwrap();
        });

        assert!(!IpcClient::new(&path).is_running().await);
    }

    #[tokio::test]
    async fn test_non_utf8_audio_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unused.sock");
        let _listener = UnixListener::bind(&path).unwrap();
        let audio = Path::new(OsStr::from_bytes(b"/clips/\xffcoding.mp3"));

        let err = IpcClient::new(&path)
            .play("coding", audio, 0.8)
            .await
            .unwrap_err();
        assert!(matches!(err, IpcClientError::NonUtf8Path(_)), "got {err:?}");
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_request_line_reaches_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut line = String::new();
            BufReader::new(read_half).read_line(&mut line).await.unwrap();
            write_half.write_all(b"{\"ok\":true}\n").await.unwrap();
            line
        });

        let resp = IpcClient::new(&path)
            .play("coding", Path::new("/clips/a.mp3"), 0.5)
            .await
            .unwrap();
        assert!(resp.ok);

        let line = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["type"], "play");
        assert_eq!(sent["event"], "coding");
        assert_eq!(sent["audio_path"], "/clips/a.mp3");
        assert_eq!(sent["volume"], 0.5);
    }
}
