use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { duration_ms: u64, operation: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(TransportError),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { duration_ms: u64, operation: String },

    #[error("Connection to {name} failed: {reason}")]
    ConnectionFailed { name: String, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Transport not connected")]
    NotConnected,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
pub type TransportResult<T> = std::result::Result<T, TransportError>;

impl ExchangeError {
    pub fn bind(address: impl Into<String>, reason: impl ToString) -> Self {
        ExchangeError::Bind {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Timeout { .. })
    }
}

impl From<TransportError> for ExchangeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout {
                duration_ms,
                operation,
            } => ExchangeError::Timeout {
                duration_ms,
                operation,
            },
            other => ExchangeError::Transport(other),
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_timeout_becomes_exchange_timeout() {
        let err: ExchangeError = TransportError::Timeout {
            duration_ms: 250,
            operation: "read reply".to_string(),
        }
        .into();
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Operation timed out after 250ms: read reply"
        );
    }

    #[test]
    fn test_other_transport_errors_are_wrapped() {
        let err: ExchangeError = TransportError::NotConnected.into();
        assert!(matches!(
            err,
            ExchangeError::Transport(TransportError::NotConnected)
        ));
    }
}
