//! Endpoint address parsing.
//!
//! Two schemes are understood: `ipc://<path>` for Unix domain sockets and
//! `tcp://<host>:<port>` for TCP. A `*` host binds every interface.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ExchangeError;

const IPC_SCHEME: &str = "ipc://";
const TCP_SCHEME: &str = "tcp://";
const ANY_HOST: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Ipc(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Address {
    pub fn ipc(path: impl AsRef<Path>) -> Self {
        Address::Ipc(path.as_ref().to_path_buf())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Address::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ExchangeError> {
        if let Some(path) = s.strip_prefix(IPC_SCHEME) {
            if path.is_empty() {
                return Err(ExchangeError::bind(s, "empty ipc path"));
            }
            return Ok(Address::Ipc(PathBuf::from(path)));
        }

        if let Some(rest) = s.strip_prefix(TCP_SCHEME) {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| ExchangeError::bind(s, "missing port"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(ExchangeError::bind(s, "empty host"));
            }
            let port = port
                .parse::<u16>()
                .map_err(|e| ExchangeError::bind(s, format!("invalid port: {}", e)))?;
            return Ok(Address::tcp(host, port));
        }

        Err(ExchangeError::bind(
            s,
            "unsupported scheme (expected ipc:// or tcp://)",
        ))
    }

    /// Host/port pair suitable for binding a listener.
    pub(crate) fn bind_target(&self) -> Option<(String, u16)> {
        match self {
            Address::Tcp { host, port } if host == ANY_HOST => Some(("0.0.0.0".to_string(), *port)),
            Address::Tcp { host, port } => Some((host.clone(), *port)),
            Address::Ipc(_) => None,
        }
    }

    /// Host/port pair suitable for connecting; `*` resolves to loopback.
    pub(crate) fn connect_target(&self) -> Option<(String, u16)> {
        match self {
            Address::Tcp { host, port } if host == ANY_HOST => {
                Some(("127.0.0.1".to_string(), *port))
            }
            Address::Tcp { host, port } => Some((host.clone(), *port)),
            Address::Ipc(_) => None,
        }
    }
}

impl FromStr for Address {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipc(path) => write!(f, "{}{}", IPC_SCHEME, path.display()),
            Address::Tcp { host, port } if host.contains(':') => {
                write!(f, "{}[{}]:{}", TCP_SCHEME, host, port)
            }
            Address::Tcp { host, port } => write!(f, "{}{}:{}", TCP_SCHEME, host, port),
        }
    }
}
