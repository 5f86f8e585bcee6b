//! Endpoint and responder configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::address::Address;
use crate::error::{ExchangeError, Result};
use crate::transport::{FrameConfig, MAX_FRAME_LEN};

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Timeouts and limits for a bound endpoint. Fixed at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Bound on waiting for a peer plus writing the request
    pub send_timeout: Duration,
    /// Bound on waiting for the reply
    pub recv_timeout: Duration,
    /// Maximum request or reply size in bytes
    pub max_message_size: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::from_millis(DEFAULT_TIMEOUT_MS, DEFAULT_TIMEOUT_MS)
    }
}

impl ExchangeConfig {
    pub fn new(send_timeout: Duration, recv_timeout: Duration) -> Self {
        Self {
            send_timeout,
            recv_timeout,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn from_millis(send_timeout_ms: u64, recv_timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(send_timeout_ms),
            Duration::from_millis(recv_timeout_ms),
        )
    }

    /// Sizes above [`MAX_FRAME_LEN`] are capped to it.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.min(MAX_FRAME_LEN);
        self
    }

    /// Reject values the endpoint cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.send_timeout.is_zero() || self.recv_timeout.is_zero() {
            return Err(ExchangeError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        check_message_size(self.max_message_size)
    }

    /// Phase deadlines are applied by the endpoint, not the frame layer.
    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig::default().with_max_message_size(self.max_message_size)
    }
}

/// Settings for the connecting reply side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderConfig {
    pub connect_timeout: Duration,
    /// Write timeout for replies (None for no timeout)
    pub reply_timeout: Option<Duration>,
    pub max_message_size: usize,
    /// Connect again when the endpoint drops the connection during `serve`
    pub reconnect: bool,
    /// Pause between reconnect attempts
    pub reconnect_interval: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reply_timeout: Some(Duration::from_secs(5)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reconnect: true,
            reconnect_interval: Duration::from_millis(100),
        }
    }
}

impl ResponderConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sizes above [`MAX_FRAME_LEN`] are capped to it.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.min(MAX_FRAME_LEN);
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig::default()
            .with_max_message_size(self.max_message_size)
            .with_write_timeout(self.reply_timeout)
    }
}

/// Startup settings for an endpoint, as read from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// `ipc://<path>` or `tcp://<host>:<port>`
    pub address: String,

    #[serde(default = "default_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub recv_timeout_ms: u64,

    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn check_message_size(size: usize) -> Result<()> {
    if size == 0 || size > MAX_FRAME_LEN {
        return Err(ExchangeError::Config(format!(
            "max_message_size must be between 1 and {} bytes, got {}",
            MAX_FRAME_LEN, size
        )));
    }
    Ok(())
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl EndpointSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            send_timeout_ms: DEFAULT_TIMEOUT_MS,
            recv_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| ExchangeError::Config(e.to_string()))
    }

    /// Validate and split into a parsed address and an exchange config.
    pub fn into_parts(self) -> Result<(Address, ExchangeConfig)> {
        debug!(address = %self.address, "EndpointSettings::into_parts");

        check_message_size(self.max_message_size)?;

        let address = Address::parse(&self.address)?;
        let config = ExchangeConfig::from_millis(self.send_timeout_ms, self.recv_timeout_ms)
            .with_max_message_size(self.max_message_size);
        config.validate()?;
        Ok((address, config))
    }
}
