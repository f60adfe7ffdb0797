use std::fmt;
use std::path::Path;

use remote_api_client::DEFAULT_REMOTE_API_PATH;
use remote_api_login::CLIENT_LOGIN_URL;
use remote_api_login::ServerAddress;
use remote_api_protocol::remote_datastore::HashConvention;
use serde::Deserialize;
use serde::Serialize;

use crate::RemoteApiError;
use crate::Result;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;
pub const DEFAULT_MAX_HTTP_RESPONSE_SIZE: usize = 33 * 1024 * 1024;

/// Email used by [`RemoteApiOptions::use_development_server_credential`].
pub const DEVELOPMENT_SERVER_EMAIL: &str = "test@example.com";

/// Everything needed to reach and authenticate against a remote
/// application. Every field has a default so a TOML file only needs the
/// values it changes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteApiOptions {
    pub host: Option<String>,
    pub port: u16,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Output of a previous session's credential serialization. Takes
    /// precedence over the password.
    pub credentials_to_reuse: Option<String>,
    pub remote_api_path: String,
    /// Worker threads available to asynchronous calls.
    pub max_concurrent_requests: usize,
    pub max_http_response_size: usize,
    /// Set when running inside the platform itself, which then provides the
    /// outbound fetch and the `urlfetch` service.
    pub host_container: bool,
    pub identity_endpoint: String,
    pub hash_convention: HashConvention,
}

impl Default for RemoteApiOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            email: None,
            password: None,
            credentials_to_reuse: None,
            remote_api_path: DEFAULT_REMOTE_API_PATH.to_string(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_http_response_size: DEFAULT_MAX_HTTP_RESPONSE_SIZE,
            host_container: false,
            identity_endpoint: CLIENT_LOGIN_URL.to_string(),
            hash_convention: HashConvention::default(),
        }
    }
}

// Keeps passwords and session cookies out of logs.
impl fmt::Debug for RemoteApiOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "credentials_to_reuse",
                &self.credentials_to_reuse.as_ref().map(|_| "<redacted>"),
            )
            .field("remote_api_path", &self.remote_api_path)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_http_response_size", &self.max_http_response_size)
            .field("host_container", &self.host_container)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("hash_convention", &self.hash_convention)
            .finish()
    }
}

impl RemoteApiOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads options from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|source| RemoteApiError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = port;
        self
    }

    pub fn credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self.credentials_to_reuse = None;
        self
    }

    pub fn reuse_credentials(
        mut self,
        email: impl Into<String>,
        serialized_credentials: impl Into<String>,
    ) -> Self {
        self.email = Some(email.into());
        self.password = None;
        self.credentials_to_reuse = Some(serialized_credentials.into());
        self
    }

    /// Credentials accepted by a local development server, which checks
    /// neither email nor password.
    pub fn use_development_server_credential(self) -> Self {
        self.credentials(DEVELOPMENT_SERVER_EMAIL, "")
    }

    pub fn remote_api_path(mut self, path: impl Into<String>) -> Self {
        self.remote_api_path = path.into();
        self
    }

    pub fn max_concurrent_requests(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests;
        self
    }

    pub fn max_http_response_size(mut self, max_http_response_size: usize) -> Self {
        self.max_http_response_size = max_http_response_size;
        self
    }

    pub fn host_container(mut self, host_container: bool) -> Self {
        self.host_container = host_container;
        self
    }

    pub fn identity_endpoint(mut self, identity_endpoint: impl Into<String>) -> Self {
        self.identity_endpoint = identity_endpoint.into();
        self
    }

    pub fn hash_convention(mut self, hash_convention: HashConvention) -> Self {
        self.hash_convention = hash_convention;
        self
    }

    pub fn server_address(&self) -> Result<ServerAddress> {
        let host = self
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| RemoteApiError::InvalidArgument("server not set in options".to_string()))?;
        Ok(ServerAddress::new(host, self.port))
    }

    pub fn user_email(&self) -> Result<&str> {
        self.email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                RemoteApiError::InvalidArgument("credentials not set in options".to_string())
            })
    }

    /// Checks that the options describe a usable session.
    pub fn validate(&self) -> Result<()> {
        self.server_address()?;
        self.user_email()?;
        if !self.remote_api_path.starts_with('/') {
            return Err(RemoteApiError::InvalidArgument(format!(
                "remote API path doesn't start with a slash: {}",
                self.remote_api_path
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RemoteApiError::InvalidArgument(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
