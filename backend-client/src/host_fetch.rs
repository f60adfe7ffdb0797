use std::fmt;
use std::sync::Arc;

use remote_api_protocol::urlfetch::FetchMethod;
use remote_api_protocol::urlfetch::FetchRequest;
use remote_api_protocol::urlfetch::FetchResponse;
use remote_api_protocol::urlfetch::Header;

use crate::Endpoint;
use crate::Response;
use crate::TransportError;
use crate::transport::charset_from_content_type;

/// Outbound fetch offered by a hosting platform.
pub trait HostFetch: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse>;
}

/// Transport used when running inside a host container, where outbound
/// traffic goes through the platform's fetch service.
#[derive(Clone)]
pub struct HostFetchTransport {
    fetch: Arc<dyn HostFetch>,
    endpoint: Endpoint,
}

impl fmt::Debug for HostFetchTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFetchTransport")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HostFetchTransport {
    pub fn new(endpoint: Endpoint, fetch: Arc<dyn HostFetch>) -> Self {
        Self { fetch, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn get(&self, path: &str) -> Result<Response, TransportError> {
        let url = self.endpoint.url(path)?;
        let headers = to_fetch_headers(self.endpoint.headers_for_get());
        self.fetch(FetchMethod::Get, url, headers, None)
    }

    pub fn post(
        &self,
        path: &str,
        mime_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, TransportError> {
        let url = self.endpoint.url(path)?;
        let headers = to_fetch_headers(self.endpoint.headers_for_post(mime_type));
        self.fetch(FetchMethod::Post, url, headers, Some(body))
    }

    fn fetch(
        &self,
        method: FetchMethod,
        url: String,
        headers: Vec<Header>,
        payload: Option<Vec<u8>>,
    ) -> Result<Response, TransportError> {
        let request = FetchRequest {
            method,
            url: url.clone(),
            headers,
            payload,
            follow_redirects: false,
        };
        let response = self
            .fetch
            .fetch(request)
            .map_err(|source| TransportError::HostFetch {
                url: url.clone(),
                source,
            })?;

        let limit = self.endpoint.max_response_size();
        if response.content_was_truncated || response.content.len() > limit {
            return Err(TransportError::ResponseTooLarge { url, limit });
        }
        let charset = response
            .header("Content-Type")
            .and_then(charset_from_content_type);
        Ok(Response::new(response.status_code, response.content, charset))
    }
}

fn to_fetch_headers(headers: Vec<(&'static str, String)>) -> Vec<Header> {
    headers
        .into_iter()
        .map(|(name, value)| Header::new(name, value))
        .collect()
}
