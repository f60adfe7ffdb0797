use std::io;
use std::path::PathBuf;

use remote_api_client::PoolError;
use remote_api_client::RpcError;
use remote_api_client::TransportError;
use remote_api_login::LoginError;
use remote_api_protocol::CodecError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteApiError>;

#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// The identity endpoint or the application refused the login.
    #[error("{0}")]
    LoginFailure(String),

    /// Network or file failure while logging in.
    #[error(transparent)]
    Login(LoginError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote service answered with an application error, or the remote
    /// API handler answered with a non-success status (in which case `code`
    /// is the HTTP status).
    #[error("remote API call {service}.{method} failed with code {code}: {detail}")]
    Application {
        service: String,
        method: String,
        code: i32,
        detail: String,
    },

    /// A commit precondition no longer held. Nothing was written; the whole
    /// transaction has to be redone.
    #[error("transaction {handle} aborted: {detail}")]
    TransactionAborted { handle: u64, detail: String },

    #[error("{0}")]
    IllegalState(String),

    /// The calling environment belongs to a different user than the session.
    #[error("{0}")]
    SecurityViolation(String),

    #[error("{0}")]
    InvalidArgument(String),

    /// Serialized credentials that don't parse or don't belong to the caller.
    #[error("{0}")]
    Credentials(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The server answered with something this client can't interpret.
    #[error("{0}")]
    Protocol(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to parse {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RemoteApiError {
    /// Application error code, when the failure carries one.
    pub fn application_code(&self) -> Option<i32> {
        match self {
            Self::Application { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<LoginError> for RemoteApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Failure(message) => Self::LoginFailure(message),
            LoginError::InvalidArgument(message) => Self::InvalidArgument(message),
            LoginError::Credentials(message) => Self::Credentials(message),
            LoginError::Io(err) => Self::Io(err),
            other @ LoginError::Transport { .. } => Self::Login(other),
        }
    }
}

impl From<RpcError> for RemoteApiError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport(err) => Self::Transport(err),
            RpcError::Application {
                service,
                method,
                code,
                detail,
            } => Self::Application {
                service,
                method,
                code,
                detail,
            },
            RpcError::Codec(err) => Self::Codec(err),
            RpcError::Protocol {
                service,
                method,
                detail,
            } => Self::Protocol(format!("malformed response to {service}.{method}: {detail}")),
        }
    }
}
