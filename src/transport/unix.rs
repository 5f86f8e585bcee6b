use crate::error::{TransportError, TransportResult};
use crate::transport::{FrameConfig, StreamFrameTransport};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

/// Unix domain socket frame transport.
pub type UnixFrameTransport = StreamFrameTransport<UnixStream>;

/// Connect to a Unix socket at the given path.
pub async fn connect(
    path: impl AsRef<Path>,
    connect_timeout: Duration,
    config: FrameConfig,
) -> TransportResult<UnixFrameTransport> {
    let path = path.as_ref();
    let stream = tokio::time::timeout(connect_timeout, UnixStream::connect(path))
        .await
        .map_err(|_| TransportError::Timeout {
            duration_ms: connect_timeout.as_millis() as u64,
            operation: format!("connecting to {}", path.display()),
        })?
        .map_err(|e| TransportError::ConnectionFailed {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(StreamFrameTransport::new(
        stream,
        format!("unix:{}", path.display()),
        config,
    ))
}

/// Unix socket listener for accepting incoming connections.
///
/// Ownership of the path is held through an exclusive advisory lock on a
/// sibling `<path>.lock` file. Dropping the listener removes the socket file
/// and releases the lock; the lock file itself stays so that every binder
/// always locks the same inode.
#[derive(Debug)]
pub struct UnixFrameListener {
    listener: UnixListener,
    config: FrameConfig,
    path: PathBuf,
    _lock: File,
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Open the lock file, reporting whether this call created it.
fn open_lock_file(path: &Path, lock_path: &Path) -> TransportResult<(File, bool)> {
    let opened = match OpenOptions::new().create_new(true).write(true).open(lock_path) {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => OpenOptions::new()
            .write(true)
            .open(lock_path)
            .map(|file| (file, false)),
        Err(e) => Err(e),
    };
    opened.map_err(|e| TransportError::ConnectionFailed {
        name: path.display().to_string(),
        reason: format!("Failed to open lock file: {}", e),
    })
}

fn in_use(path: &Path) -> TransportError {
    TransportError::ConnectionFailed {
        name: path.display().to_string(),
        reason: "address already in use".to_string(),
    }
}

/// Bind the socket once the path lock is held.
async fn bind_locked(path: &Path) -> TransportResult<UnixListener> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_socket() {
            return Err(TransportError::ConnectionFailed {
                name: path.display().to_string(),
                reason: "path exists and is not a socket".to_string(),
            });
        }

        // Bound by something that does not take the lock
        if UnixStream::connect(path).await.is_ok() {
            return Err(in_use(path));
        }

        debug!(path = %path.display(), "removing stale socket file");
        std::fs::remove_file(path).map_err(|e| TransportError::ConnectionFailed {
            name: path.display().to_string(),
            reason: format!("Failed to remove stale socket: {}", e),
        })?;
    }

    UnixListener::bind(path).map_err(|e| TransportError::ConnectionFailed {
        name: path.display().to_string(),
        reason: format!("Failed to bind: {}", e),
    })
}

impl UnixFrameListener {
    /// Bind to a Unix socket path.
    ///
    /// Fails if another listener holds the path lock, if a socket at the path
    /// still accepts connections, or if the path exists and is not a socket.
    /// A socket file left behind by a dead process is replaced.
    pub async fn bind(path: impl AsRef<Path>, config: FrameConfig) -> TransportResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = lock_path_for(&path);

        let (lock, created) = open_lock_file(&path, &lock_path)?;
        lock.try_lock_exclusive().map_err(|_| in_use(&path))?;

        match bind_locked(&path).await {
            Ok(listener) => Ok(Self {
                listener,
                config,
                path,
                _lock: lock,
            }),
            Err(e) => {
                // Still locked here, so nobody else can be relying on this file
                if created {
                    let _ = std::fs::remove_file(&lock_path);
                }
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> TransportResult<UnixFrameTransport> {
        let (stream, _addr) =
            self.listener
                .accept()
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    name: self.path.display().to_string(),
                    reason: format!("Failed to accept connection: {}", e),
                })?;

        Ok(StreamFrameTransport::new(
            stream,
            format!("unix:{}", self.path.display()),
            self.config.clone(),
        ))
    }
}

impl Drop for UnixFrameListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FrameTransport;

    fn socket_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("statelink.sock")
    }

    #[tokio::test]
    async fn test_unix_send_recv() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let listener = UnixFrameListener::bind(&path, FrameConfig::default())
            .await
            .unwrap();

        let path_clone = path.clone();
        let client_task = tokio::spawn(async move {
            connect(&path_clone, Duration::from_secs(1), FrameConfig::default()).await
        });

        let server = listener.accept().await.unwrap();
        let client = client_task.await.unwrap().unwrap();

        client.send_frame(b"Hello, Unix!").await.unwrap();
        assert_eq!(server.recv_frame().await.unwrap().as_ref(), b"Hello, Unix!");

        server.send_frame(b"Hello back!").await.unwrap();
        assert_eq!(client.recv_frame().await.unwrap().as_ref(), b"Hello back!");
    }

    #[tokio::test]
    async fn test_bind_in_use_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let _first = UnixFrameListener::bind(&path, FrameConfig::default())
            .await
            .unwrap();
        let second = UnixFrameListener::bind(&path, FrameConfig::default()).await;

        assert!(matches!(
            second,
            Err(TransportError::ConnectionFailed { .. })
        ));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let listener = UnixFrameListener::bind(&path, FrameConfig::default()).await;
        assert!(listener.is_ok());
    }

    #[tokio::test]
    async fn test_regular_file_is_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        std::fs::write(&path, b"keep me").unwrap();

        let result = UnixFrameListener::bind(&path, FrameConfig::default()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_failed_bind_leaves_no_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        std::fs::write(&path, b"not a socket").unwrap();

        assert!(UnixFrameListener::bind(&path, FrameConfig::default()).await.is_err());
        assert!(!lock_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_in_use_bind_keeps_owner_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let first = UnixFrameListener::bind(&path, FrameConfig::default())
            .await
            .unwrap();
        assert!(UnixFrameListener::bind(&path, FrameConfig::default()).await.is_err());
        assert!(lock_path_for(&path).exists());

        drop(first);
        assert!(UnixFrameListener::bind(&path, FrameConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);

        let listener = UnixFrameListener::bind(&path, FrameConfig::default())
            .await
            .unwrap();
        assert!(path.exists());
        drop(listener);
        assert!(!path.exists());
        assert!(lock_path_for(&path).exists());

        let rebound = UnixFrameListener::bind(&path, FrameConfig::default()).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_connect_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = connect(
            socket_path(&dir),
            Duration::from_millis(200),
            FrameConfig::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed { .. })
        ));
    }
}
