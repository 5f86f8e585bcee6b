use bytes::Bytes;
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::codec::{Codec, JsonCodec};
use crate::config::ResponderConfig;
use crate::error::{ExchangeError, Result, TransportError};
use crate::transport::{FrameTransport, connect};

/// The connecting, replying side of a request/reply channel.
///
/// Requests and replies strictly alternate: every [`recv_request`] must be
/// answered by one [`reply`] before the next request is read.
///
/// [`recv_request`]: Responder::recv_request
/// [`reply`]: Responder::reply
#[derive(Debug)]
pub struct Responder {
    transport: Box<dyn FrameTransport>,
    address: Address,
    config: ResponderConfig,
    reply_owed: bool,
}

impl Responder {
    pub async fn connect(address: &Address, config: ResponderConfig) -> Result<Self> {
        let transport = connect(address, config.connect_timeout, config.frame_config()).await?;
        info!(address = %address, "responder connected");

        Ok(Self {
            transport,
            address: address.clone(),
            config,
            reply_owed: false,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Wait for the next request buffer.
    pub async fn recv_request(&mut self) -> Result<Bytes> {
        if self.reply_owed {
            return Err(TransportError::Protocol(
                "previous request has not been answered".to_string(),
            )
            .into());
        }

        let request = self.transport.recv_frame().await?;
        self.reply_owed = true;
        Ok(request)
    }

    /// Wait for the next request and decode it as JSON.
    pub async fn recv_json<T: for<'de> Deserialize<'de>>(&mut self) -> Result<T> {
        let request = self.recv_request().await?;
        JsonCodec.decode(&request)
    }

    /// Answer the outstanding request.
    pub async fn reply(&mut self, data: &[u8]) -> Result<()> {
        if !self.reply_owed {
            return Err(TransportError::Protocol("no request to reply to".to_string()).into());
        }

        self.reply_owed = false;
        self.transport.send_frame(data).await?;
        Ok(())
    }

    /// Answer requests with `handler`.
    ///
    /// The endpoint drops its peer after a timed out exchange. With
    /// `reconnect` set (the default) the responder then connects again and
    /// keeps serving; otherwise `serve` returns once the endpoint disconnects.
    pub async fn serve<F, Fut, R>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(Bytes) -> Fut,
        Fut: Future<Output = R>,
        R: AsRef<[u8]>,
    {
        loop {
            self.serve_connection(&mut handler).await?;
            if !self.config.reconnect {
                return Ok(());
            }
            self.reconnect().await;
        }
    }

    async fn serve_connection<F, Fut, R>(&mut self, handler: &mut F) -> Result<()>
    where
        F: FnMut(Bytes) -> Fut,
        Fut: Future<Output = R>,
        R: AsRef<[u8]>,
    {
        loop {
            let request = match self.recv_request().await {
                Ok(request) => request,
                Err(e) => return self.finish(e),
            };
            debug!(address = %self.address, bytes = request.len(), "request received");

            let response = handler(request).await;
            if let Err(e) = self.reply(response.as_ref()).await {
                return self.finish(e);
            }
        }
    }

    /// Replace the dropped connection, retrying until the endpoint accepts.
    async fn reconnect(&mut self) {
        let _ = self.transport.close().await;
        self.reply_owed = false;

        loop {
            tokio::time::sleep(self.config.reconnect_interval).await;
            match connect(
                &self.address,
                self.config.connect_timeout,
                self.config.frame_config(),
            )
            .await
            {
                Ok(transport) => {
                    info!(address = %self.address, "responder reconnected");
                    self.transport = transport;
                    return;
                }
                Err(e) => warn!(address = %self.address, error = %e, "reconnect failed"),
            }
        }
    }

    /// A dropped connection ends `serve` cleanly; anything else is an error.
    fn finish(&self, err: ExchangeError) -> Result<()> {
        let disconnected = matches!(
            err,
            ExchangeError::Transport(TransportError::ReceiveFailed(_))
                | ExchangeError::Transport(TransportError::SendFailed(_))
        ) && !self.is_connected();

        if disconnected {
            info!(address = %self.address, "endpoint disconnected");
            Ok(())
        } else {
            Err(err)
        }
    }

    pub async fn close(self) -> Result<()> {
        self.transport.close().await?;
        Ok(())
    }
}
