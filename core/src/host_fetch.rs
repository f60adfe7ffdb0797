use std::sync::Arc;

use remote_api_client::HostFetch;
use remote_api_protocol::decode;
use remote_api_protocol::encode;
use remote_api_protocol::urlfetch::FETCH_METHOD;
use remote_api_protocol::urlfetch::FetchRequest;
use remote_api_protocol::urlfetch::FetchResponse;
use remote_api_protocol::urlfetch::URLFETCH_SERVICE;

use crate::Delegate;
use crate::Environment;

/// Outbound fetch through the host platform's own `urlfetch` service.
pub(crate) struct DelegateFetch {
    delegate: Arc<dyn Delegate>,
    env: Arc<Environment>,
}

impl DelegateFetch {
    pub(crate) fn new(delegate: Arc<dyn Delegate>, env: Arc<Environment>) -> Self {
        Self { delegate, env }
    }
}

impl HostFetch for DelegateFetch {
    fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        let bytes = self.delegate.make_sync_call(
            &self.env,
            URLFETCH_SERVICE,
            FETCH_METHOD,
            &encode(&request)?,
        )?;
        Ok(decode(&bytes)?)
    }
}
