use crate::error::{TransportError, TransportResult};
use crate::transport::{FrameTransport, TransportStats};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::Mutex;

/// Length prefix size: 4 bytes, big-endian
const LEN_PREFIX: usize = 4;

/// Largest payload the length prefix can describe.
pub const MAX_FRAME_LEN: usize = u32::MAX as usize;

/// Configuration for length-prefixed stream framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Read timeout (None for no timeout)
    pub read_timeout: Option<Duration>,
    /// Write timeout (None for no timeout)
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Sizes above [`MAX_FRAME_LEN`] are capped to it.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.min(MAX_FRAME_LEN);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Frame transport over any byte stream (Unix socket, TCP socket, in-memory duplex).
///
/// Each frame is a 4-byte big-endian length followed by the payload.
#[derive(Debug)]
pub struct StreamFrameTransport<S> {
    config: FrameConfig,
    stream: Mutex<S>,
    name: String,
    connected: AtomicBool,
    stats: SyncMutex<TransportStats>,
}

impl<S> StreamFrameTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Debug,
{
    pub fn new(stream: S, name: impl Into<String>, config: FrameConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(stream),
            name: name.into(),
            connected: AtomicBool::new(true),
            stats: SyncMutex::new(TransportStats::default()),
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Poll the read side once without waiting. End of stream, a read error,
    /// or bytes nobody asked for all mean the connection is finished.
    async fn poll_liveness(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        // Let the driver deliver a pending hangup before polling
        tokio::task::yield_now().await;

        let Ok(mut stream) = self.stream.try_lock() else {
            return true;
        };
        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        let polled = std::future::poll_fn(|cx| {
            Poll::Ready(Pin::new(&mut *stream).poll_read(cx, &mut buf))
        })
        .await;

        match polled {
            Poll::Pending => true,
            Poll::Ready(_) => {
                self.disconnect();
                false
            }
        }
    }

    /// Run `op` under an optional deadline. A timed out operation leaves the
    /// stream mid-frame, so the transport is marked disconnected.
    async fn with_deadline<T>(
        &self,
        timeout: Option<Duration>,
        operation: &str,
        op: impl Future<Output = TransportResult<T>>,
    ) -> TransportResult<T> {
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, op).await {
                Ok(result) => result,
                Err(_) => {
                    self.disconnect();
                    Err(TransportError::Timeout {
                        duration_ms: timeout.as_millis() as u64,
                        operation: format!("{} {}", self.name, operation),
                    })
                }
            },
            None => op.await,
        }
    }

    async fn send_bytes(&self, data: &[u8]) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        if data.len() > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                max: self.config.max_message_size,
            });
        }

        let len = u32::try_from(data.len()).map_err(|_| TransportError::MessageTooLarge {
            size: data.len(),
            max: MAX_FRAME_LEN,
        })?;
        let len_bytes = len.to_be_bytes();

        let write_op = async {
            let mut stream = self.stream.lock().await;
            let io = async {
                stream.write_all(&len_bytes).await?;
                stream.write_all(data).await?;
                stream.flush().await?;
                Ok::<(), std::io::Error>(())
            };
            io.await.map_err(|e| {
                self.disconnect();
                TransportError::SendFailed(e.to_string())
            })
        };

        let result = self
            .with_deadline(self.config.write_timeout, "write", write_op)
            .await;

        let mut stats = self.stats.lock();
        match result {
            Ok(()) => {
                stats.messages_sent += 1;
                stats.bytes_sent += (data.len() + LEN_PREFIX) as u64;
                Ok(())
            }
            Err(e) => {
                stats.send_errors += 1;
                Err(e)
            }
        }
    }

    async fn recv_bytes(&self) -> TransportResult<Bytes> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let max = self.config.max_message_size;

        let read_op = async {
            let mut stream = self.stream.lock().await;

            let mut len_bytes = [0u8; LEN_PREFIX];
            stream.read_exact(&mut len_bytes).await.map_err(|e| {
                self.disconnect();
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    return TransportError::ReceiveFailed("peer closed the connection".to_string());
                }
                TransportError::ReceiveFailed(e.to_string())
            })?;

            let len = u32::from_be_bytes(len_bytes) as usize;
            if len > max {
                self.disconnect();
                return Err(TransportError::MessageTooLarge { size: len, max });
            }

            let mut buffer = vec![0u8; len];
            stream.read_exact(&mut buffer).await.map_err(|e| {
                self.disconnect();
                TransportError::ReceiveFailed(e.to_string())
            })?;

            Ok::<Vec<u8>, TransportError>(buffer)
        };

        let result = self
            .with_deadline(self.config.read_timeout, "read", read_op)
            .await;

        let mut stats = self.stats.lock();
        match result {
            Ok(buffer) => {
                stats.messages_received += 1;
                stats.bytes_received += (buffer.len() + LEN_PREFIX) as u64;
                Ok(Bytes::from(buffer))
            }
            Err(e) => {
                stats.recv_errors += 1;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<S> FrameTransport for StreamFrameTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Debug,
{
    async fn send_frame(&self, data: &[u8]) -> TransportResult<()> {
        self.send_bytes(data).await
    }

    async fn recv_frame(&self) -> TransportResult<Bytes> {
        self.recv_bytes().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn is_alive(&self) -> bool {
        self.poll_liveness().await
    }

    async fn close(&self) -> TransportResult<()> {
        if self.connected.swap(false, Ordering::AcqRel) {
            let mut stream = self.stream.lock().await;
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn stats(&self) -> Option<TransportStats> {
        Some(self.stats.lock().clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
