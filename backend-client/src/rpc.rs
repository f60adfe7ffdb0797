use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use remote_api_protocol::Request;
use remote_api_protocol::Response;
use remote_api_protocol::decode;
use remote_api_protocol::encode;
use remote_api_protocol::envelope::RPC_MIME_TYPE;
use tracing::debug;

use crate::RpcError;
use crate::TransportClient;

pub const DEFAULT_REMOTE_API_PATH: &str = "/remote_api";

/// Turns a service call into one envelope POST against the remote API path.
#[derive(Debug)]
pub struct RpcChannel {
    transport: Arc<TransportClient>,
    remote_api_path: String,
    call_count: AtomicUsize,
}

impl RpcChannel {
    pub fn new(transport: Arc<TransportClient>, remote_api_path: impl Into<String>) -> Self {
        Self {
            transport,
            remote_api_path: remote_api_path.into(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn transport(&self) -> &Arc<TransportClient> {
        &self.transport
    }

    pub fn remote_api_path(&self) -> &str {
        &self.remote_api_path
    }

    /// Performs `service.method` remotely and returns the serialized
    /// response payload. A non-empty `transaction_id` is forwarded as is.
    pub fn call(
        &self,
        service: &str,
        method: &str,
        transaction_id: Option<&str>,
        request: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            "remote API call {service}.{method} ({} bytes)",
            request.len()
        );

        let envelope = Request::new(service, method, transaction_id, request.to_vec());
        let body = encode(&envelope)?;
        let response = self
            .transport
            .post(&self.remote_api_path, RPC_MIME_TYPE, body)?;

        if !response.is_success() {
            let status = response.status();
            return Err(RpcError::Application {
                service: service.to_string(),
                method: method.to_string(),
                code: i32::from(status),
                detail: format!("HTTP {status}: {}", response.body_as_string()),
            });
        }

        let envelope: Response = decode(response.body())?;
        if let Some(error) = envelope.application_error {
            debug!(
                "remote API call {service}.{method} raised application error {}",
                error.code
            );
            return Err(RpcError::Application {
                service: service.to_string(),
                method: method.to_string(),
                code: error.code,
                detail: error.detail,
            });
        }
        envelope.response.ok_or_else(|| RpcError::Protocol {
            service: service.to_string(),
            method: method.to_string(),
            detail: "response carries neither a payload nor an error".to_string(),
        })
    }

    /// Number of calls issued since creation or the last reset.
    pub fn rpc_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn reset_rpc_count(&self) {
        self.call_count.store(0, Ordering::Relaxed);
    }
}
