use crate::error::{TransportError, TransportResult};
use crate::transport::{FrameConfig, StreamFrameTransport};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// TCP frame transport.
pub type TcpFrameTransport = StreamFrameTransport<TcpStream>;

fn wrap(stream: TcpStream, config: FrameConfig) -> TransportResult<TcpFrameTransport> {
    // Disable Nagle's algorithm for lower latency
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::Protocol(format!("Failed to set TCP_NODELAY: {}", e)))?;

    let peer_addr = stream
        .peer_addr()
        .map_err(|e| TransportError::Protocol(format!("Failed to get peer address: {}", e)))?;

    Ok(StreamFrameTransport::new(
        stream,
        format!("tcp:{}", peer_addr),
        config,
    ))
}

/// Connect to a TCP host/port.
pub async fn connect(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    config: FrameConfig,
) -> TransportResult<TcpFrameTransport> {
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TransportError::Timeout {
            duration_ms: connect_timeout.as_millis() as u64,
            operation: format!("connecting to {}:{}", host, port),
        })?
        .map_err(|e| TransportError::ConnectionFailed {
            name: format!("{}:{}", host, port),
            reason: e.to_string(),
        })?;

    wrap(stream, config)
}

/// TCP listener for accepting incoming connections.
#[derive(Debug)]
pub struct TcpFrameListener {
    listener: TcpListener,
    config: FrameConfig,
}

impl TcpFrameListener {
    /// Bind to a host/port. Port 0 picks an ephemeral port.
    pub async fn bind(host: &str, port: u16, config: FrameConfig) -> TransportResult<Self> {
        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            TransportError::ConnectionFailed {
                name: format!("{}:{}", host, port),
                reason: format!("Failed to bind: {}", e),
            }
        })?;

        Ok(Self { listener, config })
    }

    /// Get the local address the listener is bound to
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::Protocol(format!("Failed to get local address: {}", e)))
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> TransportResult<TcpFrameTransport> {
        let (stream, _addr) =
            self.listener
                .accept()
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    name: "tcp_listener".to_string(),
                    reason: format!("Failed to accept connection: {}", e),
                })?;

        wrap(stream, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FrameTransport;

    #[tokio::test]
    async fn test_tcp_send_recv() {
        let listener = TcpFrameListener::bind("127.0.0.1", 0, FrameConfig::default())
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let client_task = tokio::spawn(async move {
            connect("127.0.0.1", port, Duration::from_secs(1), FrameConfig::default()).await
        });

        let server = listener.accept().await.unwrap();
        let client = client_task.await.unwrap().unwrap();

        client.send_frame(b"Hello, TCP!").await.unwrap();
        assert_eq!(server.recv_frame().await.unwrap().as_ref(), b"Hello, TCP!");

        let large = vec![0xAB; 1024 * 1024];
        server.send_frame(&large).await.unwrap();
        assert_eq!(client.recv_frame().await.unwrap().as_ref(), large.as_slice());

        assert!(client.name().starts_with("tcp:"));
    }

    #[tokio::test]
    async fn test_tcp_bind_in_use_fails() {
        let first = TcpFrameListener::bind("127.0.0.1", 0, FrameConfig::default())
            .await
            .unwrap();
        let port = first.local_addr().unwrap().port();

        let second = TcpFrameListener::bind("127.0.0.1", port, FrameConfig::default()).await;
        assert!(matches!(
            second,
            Err(TransportError::ConnectionFailed { .. })
        ));
    }
}
