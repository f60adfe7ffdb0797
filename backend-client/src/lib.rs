#![deny(clippy::unwrap_used, clippy::expect_used)]

mod error;
mod host_fetch;
mod http;
mod pool;
mod rpc;
mod transport;

pub use error::PoolError;
pub use error::RpcError;
pub use error::TransportError;
pub use host_fetch::HostFetch;
pub use host_fetch::HostFetchTransport;
pub use http::HttpTransport;
pub use pool::CallPool;
pub use pool::PendingCall;
pub use rpc::DEFAULT_REMOTE_API_PATH;
pub use rpc::RpcChannel;
pub use transport::Endpoint;
pub use transport::Response;
pub use transport::TransportClient;
