use std::time::Duration;

use remote_api_protocol::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("path doesn't start with a slash: {0}")]
    InvalidPath(String),
    #[error("{method} {url} failed: {source}")]
    Http {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read response from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("response from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: usize },
    #[error("host fetch of {url} failed: {source}")]
    HostFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The remote endpoint rejected a well-formed call.
    #[error("remote API call {service}.{method} failed with code {code}: {detail}")]
    Application {
        service: String,
        method: String,
        code: i32,
        detail: String,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("malformed response to {service}.{method}: {detail}")]
    Protocol {
        service: String,
        method: String,
        detail: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("call pool has been shut down")]
    ShutDown,
    #[error("timed out after {timeout_ms}ms waiting for call result")]
    Timeout { timeout_ms: u64 },
    #[error("call result is no longer available")]
    Disconnected,
    #[error("call panicked before producing a result")]
    Panicked,
}

impl PoolError {
    pub(crate) fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
