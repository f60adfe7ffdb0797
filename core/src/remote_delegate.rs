use std::fmt;
use std::sync::Arc;

use remote_api_client::CallPool;
use remote_api_client::PendingCall;
use remote_api_client::RpcChannel;
use remote_api_protocol::datastore::DATASTORE_SERVICE;
use remote_api_protocol::urlfetch::URLFETCH_SERVICE;

use crate::Delegate;
use crate::Environment;
use crate::LogRecord;
use crate::RemoteApiError;
use crate::RemoteApiOptions;
use crate::Result;
use crate::delegate::log_record;
use crate::remote_datastore::RemoteDatastore;

/// Sends API calls to the remote application.
///
/// Datastore calls go through transaction emulation, `urlfetch` stays local
/// when a local delegate is available, and everything else is forwarded
/// untouched.
pub struct RemoteApiDelegate {
    router: Arc<CallRouter>,
    pool: Option<CallPool>,
}

struct CallRouter {
    rpc: Arc<RpcChannel>,
    email: String,
    local: Option<Arc<dyn Delegate>>,
    datastore: RemoteDatastore,
}

impl fmt::Debug for RemoteApiDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiDelegate")
            .field("email", &self.router.email)
            .field("has_local", &self.router.local.is_some())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl RemoteApiDelegate {
    /// `local` is the delegate that was active before this one; it keeps
    /// serving `urlfetch` and, in a host container, is required.
    pub fn new(
        rpc: Arc<RpcChannel>,
        options: &RemoteApiOptions,
        local: Option<Arc<dyn Delegate>>,
    ) -> Result<Self> {
        let email = options.user_email()?.to_string();
        let pool = if options.host_container {
            if local.is_none() {
                return Err(RemoteApiError::InvalidArgument(
                    "options indicate we are running in a host container but its services are not available"
                        .to_string(),
                ));
            }
            None
        } else {
            Some(CallPool::new(options.max_concurrent_requests)?)
        };
        let datastore = RemoteDatastore::new(rpc.clone(), options.hash_convention);
        Ok(Self {
            router: Arc::new(CallRouter {
                rpc,
                email,
                local,
                datastore,
            }),
            pool,
        })
    }

    pub fn rpc(&self) -> &Arc<RpcChannel> {
        &self.router.rpc
    }

    pub fn rpc_count(&self) -> usize {
        self.router.rpc.rpc_count()
    }

    pub fn reset_rpc_count(&self) {
        self.router.rpc.reset_rpc_count();
    }

    /// Transactions begun and neither committed nor rolled back.
    pub fn open_transactions(&self) -> usize {
        self.router.datastore.open_transactions()
    }

    /// Waits for queued asynchronous calls and stops the call runtime.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }
}

impl CallRouter {
    fn call(
        &self,
        env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        if env.email != self.email {
            return Err(RemoteApiError::SecurityViolation(format!(
                "remote API call: user '{}' can't use client that's logged in as '{}'",
                env.email, self.email
            )));
        }

        if service == URLFETCH_SERVICE
            && let Some(local) = &self.local
        {
            return local.make_sync_call(env, service, method, request);
        }
        if service == DATASTORE_SERVICE {
            return self.datastore.handle_call(method, request);
        }
        Ok(self.rpc.call(service, method, None, request)?)
    }
}

impl Delegate for RemoteApiDelegate {
    fn make_sync_call(
        &self,
        env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        self.router.call(env, service, method, request)
    }

    fn make_async_call(
        &self,
        env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> PendingCall<Result<Vec<u8>>> {
        let Some(pool) = &self.pool else {
            return PendingCall::ready(self.router.call(env, service, method, request));
        };
        let router = self.router.clone();
        let env = env.clone();
        let service = service.to_string();
        let method = method.to_string();
        let request = request.to_vec();
        pool.submit(move || router.call(&env, &service, &method, &request))
            .unwrap_or_else(|err| PendingCall::ready(Err(err.into())))
    }

    fn log(&self, env: &Environment, record: &LogRecord) {
        log_record(env, record);
    }
}
