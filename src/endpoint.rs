use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::codec::{Codec, JsonCodec};
use crate::config::{EndpointSettings, ExchangeConfig};
use crate::error::{ExchangeError, Result, TransportError, TransportResult};
use crate::transport::{FrameTransport, Listener, TransportStats};

/// The bound, requesting side of a request/reply channel.
///
/// An endpoint owns one listening socket and at most one connected peer.
/// Each [`exchange`](Endpoint::exchange) is exactly one request followed by
/// exactly one reply; `&mut self` keeps use exclusive to one caller.
///
/// The send phase (waiting for a peer to connect, then writing the request)
/// is bounded by `send_timeout`; the receive phase by `recv_timeout`. Any
/// failure discards the current peer connection, so a reply that arrives
/// after a timeout is never handed to a later exchange.
#[derive(Debug)]
pub struct Endpoint<C: Codec = JsonCodec> {
    listener: Listener,
    address: Address,
    config: ExchangeConfig,
    codec: C,
    peer: Option<Box<dyn FrameTransport>>,
    retired: TransportStats,
}

impl Endpoint<JsonCodec> {
    /// Bind to `address` (`ipc://<path>` or `tcp://<host>:<port>`).
    pub async fn bind(
        address: &str,
        send_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<Self> {
        let address = Address::parse(address)?;
        Self::bind_with_config(address, ExchangeConfig::new(send_timeout, recv_timeout)).await
    }

    pub async fn bind_with_config(address: Address, config: ExchangeConfig) -> Result<Self> {
        Self::bind_with_codec(address, config, JsonCodec).await
    }

    pub async fn from_settings(settings: EndpointSettings) -> Result<Self> {
        let (address, config) = settings.into_parts()?;
        Self::bind_with_config(address, config).await
    }
}

impl<C: Codec> Endpoint<C> {
    pub async fn bind_with_codec(
        address: Address,
        config: ExchangeConfig,
        codec: C,
    ) -> Result<Self> {
        config.validate()?;

        let listener = Listener::bind(&address, config.frame_config())
            .await
            .map_err(|e| ExchangeError::bind(address.to_string(), e))?;
        let local = listener
            .local_address()
            .map_err(|e| ExchangeError::bind(address.to_string(), e))?;

        info!(
            address = %local,
            send_timeout_ms = config.send_timeout.as_millis() as u64,
            recv_timeout_ms = config.recv_timeout.as_millis() as u64,
            "endpoint bound"
        );

        Ok(Self {
            listener,
            address: local,
            config,
            codec,
            peer: None,
            retired: TransportStats::default(),
        })
    }

    /// The bound address, with any ephemeral TCP port resolved.
    pub fn local_address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn has_peer(&self) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer.is_connected())
    }

    /// Totals across every peer this endpoint has talked to.
    pub fn stats(&self) -> TransportStats {
        let mut stats = self.retired.clone();
        if let Some(current) = self.peer.as_ref().and_then(|peer| peer.stats()) {
            stats.merge(&current);
        }
        stats
    }

    /// Serialize `state` and exchange it for the peer's reply bytes.
    pub async fn exchange<S: Serialize + ?Sized>(&mut self, state: &S) -> Result<Bytes> {
        let text = self.codec.encode(state)?;
        self.exchange_bytes(text.as_bytes()).await
    }

    /// Exchange an already serialized text payload.
    pub async fn exchange_text(&mut self, text: &str) -> Result<Bytes> {
        self.exchange_bytes(text.as_bytes()).await
    }

    /// Exchange `state` and decode the reply with the endpoint's codec.
    pub async fn exchange_json<S, R>(&mut self, state: &S) -> Result<R>
    where
        S: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let reply = self.exchange(state).await?;
        self.codec.decode(&reply)
    }

    /// Close the current peer and release the bound address.
    pub async fn close(mut self) -> Result<()> {
        if let Some(peer) = self.peer.take() {
            peer.close().await?;
        }
        info!(address = %self.address, "endpoint closed");
        Ok(())
    }

    async fn exchange_bytes(&mut self, payload: &[u8]) -> Result<Bytes> {
        if payload.len() > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: payload.len(),
                max: self.config.max_message_size,
            }
            .into());
        }

        let send_timeout = self.config.send_timeout;
        let send_phase = async {
            let peer = self.ready_peer().await?;
            peer.send_frame(payload).await?;
            Ok::<(), TransportError>(())
        };
        let sent = tokio::time::timeout(send_timeout, send_phase).await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.discard_peer("send failed");
                return Err(e.into());
            }
            Err(_) => {
                self.retired.send_errors += 1;
                self.discard_peer("send timed out");
                warn!(
                    address = %self.address,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "request not delivered in time"
                );
                return Err(ExchangeError::Timeout {
                    duration_ms: send_timeout.as_millis() as u64,
                    operation: format!("sending request on {}", self.address),
                });
            }
        }

        let recv_timeout = self.config.recv_timeout;
        let recv_phase = async {
            let peer = self.peer.as_deref().ok_or(TransportError::NotConnected)?;
            let reply = peer.recv_frame().await?;
            Ok::<Bytes, TransportError>(reply)
        };
        let received = tokio::time::timeout(recv_timeout, recv_phase).await;
        match received {
            Ok(Ok(reply)) => {
                debug!(
                    address = %self.address,
                    request_bytes = payload.len(),
                    reply_bytes = reply.len(),
                    "exchange complete"
                );
                Ok(reply)
            }
            Ok(Err(e)) => {
                self.discard_peer("receive failed");
                Err(e.into())
            }
            Err(_) => {
                self.retired.recv_errors += 1;
                self.discard_peer("reply timed out");
                warn!(
                    address = %self.address,
                    timeout_ms = recv_timeout.as_millis() as u64,
                    "no reply in time"
                );
                Err(ExchangeError::Timeout {
                    duration_ms: recv_timeout.as_millis() as u64,
                    operation: format!("waiting for reply on {}", self.address),
                })
            }
        }
    }

    /// Current peer, accepting a new connection if there is none.
    async fn ready_peer(&mut self) -> TransportResult<&dyn FrameTransport> {
        let gone = match self.peer.as_deref() {
            Some(peer) => !peer.is_alive().await,
            None => false,
        };
        if gone {
            self.discard_peer("peer hung up");
        }

        if self.peer.is_none() {
            let peer = self.listener.accept().await?;
            debug!(address = %self.address, peer = peer.name(), "peer connected");
            self.peer = Some(peer);
        }

        self.peer.as_deref().ok_or(TransportError::NotConnected)
    }

    fn discard_peer(&mut self, reason: &str) {
        if let Some(peer) = self.peer.take() {
            debug!(address = %self.address, peer = peer.name(), reason, "discarding peer");
            if let Some(stats) = peer.stats() {
                self.retired.merge(&stats);
            }
        }
    }
}
