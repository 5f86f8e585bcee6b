//! Thread-blocking wrapper around [`Endpoint`].
//!
//! Owns a current-thread tokio runtime; every call parks the calling thread
//! until the exchange completes or times out. Must not be used from inside
//! an async context.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use crate::address::Address;
use crate::codec::{Codec, JsonCodec};
use crate::config::{EndpointSettings, ExchangeConfig};
use crate::endpoint::Endpoint;
use crate::error::{ExchangeError, Result};
use crate::transport::TransportStats;

#[derive(Debug)]
pub struct BlockingEndpoint<C: Codec = JsonCodec> {
    inner: Endpoint<C>,
    runtime: Runtime,
}

fn runtime_for(address: &str) -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExchangeError::bind(address, format!("failed to start runtime: {}", e)))
}

impl BlockingEndpoint<JsonCodec> {
    pub fn bind(address: &str, send_timeout: Duration, recv_timeout: Duration) -> Result<Self> {
        let runtime = runtime_for(address)?;
        let inner = runtime.block_on(Endpoint::bind(address, send_timeout, recv_timeout))?;
        Ok(Self { inner, runtime })
    }

    pub fn bind_with_config(address: Address, config: ExchangeConfig) -> Result<Self> {
        let runtime = runtime_for(&address.to_string())?;
        let inner = runtime.block_on(Endpoint::bind_with_config(address, config))?;
        Ok(Self { inner, runtime })
    }

    pub fn from_settings(settings: EndpointSettings) -> Result<Self> {
        let runtime = runtime_for(&settings.address)?;
        let inner = runtime.block_on(Endpoint::from_settings(settings))?;
        Ok(Self { inner, runtime })
    }
}

impl<C: Codec> BlockingEndpoint<C> {
    pub fn local_address(&self) -> &Address {
        self.inner.local_address()
    }

    pub fn config(&self) -> &ExchangeConfig {
        self.inner.config()
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.stats()
    }

    pub fn exchange<S: Serialize + ?Sized>(&mut self, state: &S) -> Result<Bytes> {
        self.runtime.block_on(self.inner.exchange(state))
    }

    pub fn exchange_text(&mut self, text: &str) -> Result<Bytes> {
        self.runtime.block_on(self.inner.exchange_text(text))
    }

    pub fn exchange_json<S, R>(&mut self, state: &S) -> Result<R>
    where
        S: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        self.runtime.block_on(self.inner.exchange_json(state))
    }

    pub fn close(self) -> Result<()> {
        let Self { inner, runtime } = self;
        runtime.block_on(inner.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FrameConfig, FrameTransport, connect};
    use std::time::Instant;

    #[test]
    fn test_blocking_exchange_with_threaded_peer() {
        let mut endpoint = BlockingEndpoint::bind(
            "tcp://127.0.0.1:0",
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .unwrap();
        let address = endpoint.local_address().clone();

        let peer = std::thread::spawn(move || {
            let runtime = Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let peer = connect(&address, Duration::from_secs(1), FrameConfig::default())
                    .await
                    .unwrap();
                for _ in 0..2 {
                    let request = peer.recv_frame().await.unwrap();
                    peer.send_frame(&request).await.unwrap();
                }
            });
        });

        let first = endpoint.exchange(&serde_json::json!({"n": 1})).unwrap();
        let second = endpoint.exchange(&serde_json::json!({"n": 2})).unwrap();
        assert_eq!(first.as_ref(), br#"{"n":1}"#);
        assert_eq!(second.as_ref(), br#"{"n":2}"#);

        peer.join().unwrap();
        endpoint.close().unwrap();
    }

    #[test]
    fn test_blocking_timeout_without_peer() {
        let mut endpoint = BlockingEndpoint::bind(
            "tcp://127.0.0.1:0",
            Duration::from_millis(150),
            Duration::from_millis(150),
        )
        .unwrap();

        let started = Instant::now();
        let err = endpoint.exchange_text("{}").unwrap_err();
        assert!(err.is_timeout());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(350), "took {elapsed:?}");
    }
}
