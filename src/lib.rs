//! statelink - timeout-bounded request/reply state exchange over Unix and TCP sockets
pub mod address;
pub mod blocking;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod responder;
pub mod transport;

pub use address::Address;
pub use blocking::BlockingEndpoint;
pub use codec::{Codec, JsonCodec};
pub use config::{EndpointSettings, ExchangeConfig, ResponderConfig};
pub use endpoint::Endpoint;
pub use error::{ExchangeError, Result, TransportError, TransportResult};
pub use responder::Responder;
pub use transport::{FrameConfig, FrameTransport, StreamFrameTransport, TransportStats};

#[cfg(unix)]
pub use transport::unix::{UnixFrameListener, UnixFrameTransport};
pub use transport::tcp::{TcpFrameListener, TcpFrameTransport};
