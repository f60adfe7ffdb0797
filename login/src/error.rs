use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoginError>;

#[derive(Debug, Error)]
pub enum LoginError {
    /// Bad credentials or an unexpected response from the login endpoints.
    #[error("{0}")]
    Failure(String),
    #[error("{0}")]
    InvalidArgument(String),
    /// Serialized credentials that are malformed or belong to someone else.
    #[error("{0}")]
    Credentials(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoginError {
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }
}
