use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::error::TransportResult;

pub mod frame;
pub mod listener;
pub mod tcp;
#[cfg(unix)]
pub mod unix;

pub use frame::{FrameConfig, MAX_FRAME_LEN, StreamFrameTransport};
pub use listener::{Listener, connect};

/// Whole-buffer transport: one `send_frame` is delivered as exactly one
/// `recv_frame` on the other side.
#[async_trait]
pub trait FrameTransport: Send + Sync + Debug {
    /// Send one buffer
    async fn send_frame(&self, data: &[u8]) -> TransportResult<()>;

    /// Receive one buffer
    async fn recv_frame(&self) -> TransportResult<Bytes>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Check, without waiting, that the peer has not hung up since the
    /// last frame
    async fn is_alive(&self) -> bool {
        self.is_connected()
    }

    /// Close the transport
    async fn close(&self) -> TransportResult<()>;

    /// Get transport statistics
    fn stats(&self) -> Option<TransportStats> {
        None
    }

    /// Get transport name/identifier
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Statistics collected by transport implementations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &TransportStats) {
        self.messages_sent += other.messages_sent;
        self.messages_received += other.messages_received;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.send_errors += other.send_errors;
        self.recv_errors += other.recv_errors;
    }
}

impl std::fmt::Display for TransportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Transport Statistics:")?;
        writeln!(f, "  Messages sent:     {}", self.messages_sent)?;
        writeln!(f, "  Messages received: {}", self.messages_received)?;
        writeln!(f, "  Bytes sent:        {}", self.bytes_sent)?;
        writeln!(f, "  Bytes received:    {}", self.bytes_received)?;
        writeln!(f, "  Send errors:       {}", self.send_errors)?;
        writeln!(f, "  Receive errors:    {}", self.recv_errors)?;
        Ok(())
    }
}

#[async_trait]
impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    async fn send_frame(&self, data: &[u8]) -> TransportResult<()> {
        (**self).send_frame(data).await
    }

    async fn recv_frame(&self) -> TransportResult<Bytes> {
        (**self).recv_frame().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn is_alive(&self) -> bool {
        (**self).is_alive().await
    }

    async fn close(&self) -> TransportResult<()> {
        (**self).close().await
    }

    fn stats(&self) -> Option<TransportStats> {
        (**self).stats()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
