//! Address-driven bind/connect over the concrete socket transports.

use std::time::Duration;

use crate::address::Address;
use crate::error::{TransportError, TransportResult};
use crate::transport::tcp::TcpFrameListener;
#[cfg(unix)]
use crate::transport::unix::UnixFrameListener;
use crate::transport::{FrameConfig, FrameTransport};

/// A bound listener for either scheme.
#[derive(Debug)]
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixFrameListener),
    Tcp(TcpFrameListener),
}

impl Listener {
    pub async fn bind(address: &Address, config: FrameConfig) -> TransportResult<Self> {
        match address {
            #[cfg(unix)]
            Address::Ipc(path) => Ok(Listener::Unix(UnixFrameListener::bind(path, config).await?)),
            #[cfg(not(unix))]
            Address::Ipc(_) => Err(TransportError::Protocol(
                "ipc addresses are only supported on unix".to_string(),
            )),
            Address::Tcp { .. } => {
                let (host, port) = address.bind_target().ok_or_else(|| {
                    TransportError::Protocol(format!("not a tcp address: {}", address))
                })?;
                Ok(Listener::Tcp(TcpFrameListener::bind(&host, port, config).await?))
            }
        }
    }

    /// The address actually bound; resolves an ephemeral TCP port.
    pub fn local_address(&self) -> TransportResult<Address> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => Ok(Address::ipc(listener.path())),
            Listener::Tcp(listener) => {
                let addr = listener.local_addr()?;
                Ok(Address::tcp(addr.ip().to_string(), addr.port()))
            }
        }
    }

    pub async fn accept(&self) -> TransportResult<Box<dyn FrameTransport>> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => Ok(Box::new(listener.accept().await?)),
            Listener::Tcp(listener) => Ok(Box::new(listener.accept().await?)),
        }
    }
}

/// Connect to a bound listener at `address`.
pub async fn connect(
    address: &Address,
    connect_timeout: Duration,
    config: FrameConfig,
) -> TransportResult<Box<dyn FrameTransport>> {
    match address {
        #[cfg(unix)]
        Address::Ipc(path) => Ok(Box::new(
            crate::transport::unix::connect(path, connect_timeout, config).await?,
        )),
        #[cfg(not(unix))]
        Address::Ipc(_) => Err(TransportError::Protocol(
            "ipc addresses are only supported on unix".to_string(),
        )),
        Address::Tcp { .. } => {
            let (host, port) = address.connect_target().ok_or_else(|| {
                TransportError::Protocol(format!("not a tcp address: {}", address))
            })?;
            Ok(Box::new(
                crate::transport::tcp::connect(&host, port, connect_timeout, config).await?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_ephemeral_port_is_resolved() {
        let listener = Listener::bind(&Address::tcp("127.0.0.1", 0), FrameConfig::default())
            .await
            .unwrap();
        let local = listener.local_address().unwrap();

        match &local {
            Address::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_ne!(*port, 0);
            }
            other => panic!("unexpected address {other}"),
        }

        let client = tokio::spawn({
            let local = local.clone();
            async move { connect(&local, Duration::from_secs(1), FrameConfig::default()).await }
        });
        let server = listener.accept().await.unwrap();
        let client = client.await.unwrap().unwrap();

        client.send_frame(b"ping").await.unwrap();
        assert_eq!(server.recv_frame().await.unwrap().as_ref(), b"ping");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ipc_bind_and_connect() {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::ipc(dir.path().join("listener.sock"));

        let listener = Listener::bind(&address, FrameConfig::default()).await.unwrap();
        assert_eq!(listener.local_address().unwrap(), address);

        let client = tokio::spawn({
            let address = address.clone();
            async move { connect(&address, Duration::from_secs(1), FrameConfig::default()).await }
        });
        let server = listener.accept().await.unwrap();
        let client = client.await.unwrap().unwrap();

        server.send_frame(b"pong").await.unwrap();
        assert_eq!(client.recv_frame().await.unwrap().as_ref(), b"pong");
    }
}
