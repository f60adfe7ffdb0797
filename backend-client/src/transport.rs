use std::sync::Arc;

use remote_api_login::Cookie;
use remote_api_login::ServerAddress;
use remote_api_login::cookie_header;
use remote_api_protocol::envelope::API_VERSION;
use remote_api_protocol::envelope::API_VERSION_HEADER;

use crate::HostFetch;
use crate::HostFetchTransport;
use crate::HttpTransport;
use crate::TransportError;

/// The remote application plus the session used to talk to it. Shared by
/// both transport implementations so they build identical requests.
#[derive(Debug, Clone)]
pub struct Endpoint {
    server: ServerAddress,
    cookie_header: Option<String>,
    max_response_size: usize,
}

impl Endpoint {
    pub fn new(server: ServerAddress, cookies: &[Cookie], max_response_size: usize) -> Self {
        Self {
            server,
            cookie_header: cookie_header(cookies),
            max_response_size,
        }
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    pub fn max_response_size(&self) -> usize {
        self.max_response_size
    }

    pub(crate) fn url(&self, path: &str) -> Result<String, TransportError> {
        self.server
            .url_for(path)
            .map_err(|_| TransportError::InvalidPath(path.to_string()))
    }

    pub(crate) fn headers_for_get(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(API_VERSION_HEADER, API_VERSION.to_string())];
        if let Some(cookies) = &self.cookie_header {
            headers.push(("Cookie", cookies.clone()));
        }
        headers
    }

    pub(crate) fn headers_for_post(&self, mime_type: &str) -> Vec<(&'static str, String)> {
        let mut headers = self.headers_for_get();
        headers.push(("Content-Type", mime_type.to_string()));
        headers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: Vec<u8>,
    charset: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: Vec<u8>, charset: Option<String>) -> Self {
        Self {
            status,
            body,
            charset,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Body decoded as text. Bodies in other charsets are decoded lossily.
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Extracts the `charset` parameter of a `Content-Type` value.
pub(crate) fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

/// Issues authenticated requests to the remote application. The variant is
/// chosen once, when the session is set up.
///
/// Redirects are never followed: a redirect usually means the session has
/// expired, and callers need to see it as a status code.
#[derive(Debug)]
pub enum TransportClient {
    /// Ordinary HTTP stack, for standalone client processes.
    Http(HttpTransport),
    /// The embedding platform's own outbound fetch.
    HostFetch(HostFetchTransport),
}

impl TransportClient {
    pub fn http(endpoint: Endpoint) -> Result<Self, TransportError> {
        Ok(Self::Http(HttpTransport::new(endpoint)?))
    }

    pub fn host_fetch(endpoint: Endpoint, fetch: Arc<dyn HostFetch>) -> Self {
        Self::HostFetch(HostFetchTransport::new(endpoint, fetch))
    }

    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::Http(transport) => transport.endpoint(),
            Self::HostFetch(transport) => transport.endpoint(),
        }
    }

    pub fn is_host_native(&self) -> bool {
        matches!(self, Self::HostFetch(_))
    }

    pub fn get(&self, path: &str) -> Result<Response, TransportError> {
        match self {
            Self::Http(transport) => transport.get(path),
            Self::HostFetch(transport) => transport.get(path),
        }
    }

    pub fn post(
        &self,
        path: &str,
        mime_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, TransportError> {
        match self {
            Self::Http(transport) => transport.post(path, mime_type, body),
            Self::HostFetch(transport) => transport.post(path, mime_type, body),
        }
    }
}
