//! Runs platform API calls made by a standalone process against a remote
//! application.
//!
//! [`RemoteApiInstaller`] logs in and installs a [`RemoteApiDelegate`] into
//! an [`ApiScope`]. From then on every call made through the scope goes over
//! HTTP to the application's remote API handler, with datastore
//! transactions emulated on the client so that a series of remote reads and
//! writes still commits atomically.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod app_id;
mod config;
mod delegate;
mod environment;
mod error;
mod host_fetch;
mod installer;
mod remote_datastore;
mod remote_delegate;
mod transaction;

pub use app_id::discover_app_id;
pub use app_id::parse_yaml_map;
pub use config::DEFAULT_MAX_CONCURRENT_REQUESTS;
pub use config::DEFAULT_MAX_HTTP_RESPONSE_SIZE;
pub use config::DEFAULT_PORT;
pub use config::DEVELOPMENT_SERVER_EMAIL;
pub use config::RemoteApiOptions;
pub use delegate::ApiScope;
pub use delegate::Delegate;
pub use environment::Environment;
pub use environment::LogLevel;
pub use environment::LogRecord;
pub use error::RemoteApiError;
pub use error::Result;
pub use installer::RemoteApiInstaller;
pub use remote_delegate::RemoteApiDelegate;
pub use transaction::Snapshot;
pub use transaction::TransactionEmulator;

pub use remote_api_client::PendingCall;
pub use remote_api_protocol::remote_datastore::HashConvention;
