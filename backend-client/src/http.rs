use std::io::Read;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::trace;

use crate::Endpoint;
use crate::Response;
use crate::TransportError;
use crate::transport::charset_from_content_type;

/// Transport over the process's own HTTP stack.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    endpoint: Endpoint,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint) -> Result<Self, TransportError> {
        let http = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|source| TransportError::Http {
                method: "BUILD",
                url: String::new(),
                source,
            })?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn get(&self, path: &str) -> Result<Response, TransportError> {
        let url = self.endpoint.url(path)?;
        let mut request = self.http.get(&url);
        for (name, value) in self.endpoint.headers_for_get() {
            request = request.header(name, value);
        }
        self.send("GET", url, request)
    }

    pub fn post(
        &self,
        path: &str,
        mime_type: &str,
        body: Vec<u8>,
    ) -> Result<Response, TransportError> {
        let url = self.endpoint.url(path)?;
        let mut request = self.http.post(&url).body(body);
        for (name, value) in self.endpoint.headers_for_post(mime_type) {
            request = request.header(name, value);
        }
        self.send("POST", url, request)
    }

    fn send(
        &self,
        method: &'static str,
        url: String,
        request: RequestBuilder,
    ) -> Result<Response, TransportError> {
        trace!("{method} {url}");
        let response = request.send().map_err(|source| TransportError::Http {
            method,
            url: url.clone(),
            source,
        })?;
        let status = response.status().as_u16();
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_from_content_type);

        let limit = self.endpoint.max_response_size();
        let mut body = Vec::new();
        response
            .take(limit as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|source| TransportError::Read {
                url: url.clone(),
                source,
            })?;
        if body.len() > limit {
            return Err(TransportError::ResponseTooLarge { url, limit });
        }
        Ok(Response::new(status, body, charset))
    }
}
