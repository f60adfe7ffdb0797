use crate::LoginError;
use crate::Result;

/// Host name that selects the development-server login shortcut.
pub const LOCALHOST: &str = "localhost";

/// Where the remote application is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Port 443 is spoken to over TLS, everything else over plain HTTP.
    pub fn scheme(&self) -> &'static str {
        if self.port == 443 { "https" } else { "http" }
    }

    pub fn is_localhost(&self) -> bool {
        self.host == LOCALHOST
    }

    /// Absolute URL for `path`, which must start with a slash.
    pub fn url_for(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Err(LoginError::InvalidArgument(format!(
                "path doesn't start with a slash: {path}"
            )));
        }
        Ok(format!(
            "{}://{}:{}{path}",
            self.scheme(),
            self.host,
            self.port
        ))
    }
}
