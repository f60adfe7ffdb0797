use std::fmt;
use std::sync::Arc;

use remote_api_client::PendingCall;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::Environment;
use crate::LogLevel;
use crate::LogRecord;
use crate::RemoteApiError;
use crate::Result;

/// Receives every outgoing API call.
pub trait Delegate: Send + Sync {
    fn make_sync_call(
        &self,
        env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>>;

    /// Starts a call and returns a handle to its result. Runs the call
    /// inline unless the implementation has somewhere better to run it.
    fn make_async_call(
        &self,
        env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> PendingCall<Result<Vec<u8>>> {
        PendingCall::ready(self.make_sync_call(env, service, method, request))
    }

    fn log(&self, env: &Environment, record: &LogRecord) {
        log_record(env, record);
    }
}

/// Forwards an application log record to `tracing` at the matching level.
pub(crate) fn log_record(env: &Environment, record: &LogRecord) {
    let app_id = env.app_id.as_str();
    let timestamp = record.timestamp_usec;
    let message = record.message.as_str();
    match record.level {
        LogLevel::Debug => debug!(app_id, "[{timestamp}] {message}"),
        LogLevel::Info => info!(app_id, "[{timestamp}] {message}"),
        LogLevel::Warn => warn!(app_id, "[{timestamp}] {message}"),
        LogLevel::Error | LogLevel::Fatal => error!(app_id, "[{timestamp}] {message}"),
    }
}

/// The delegate and environment that API calls made through this scope
/// use. Owned by the caller and handed to whatever installs a delegate.
#[derive(Clone, Default)]
pub struct ApiScope {
    delegate: Option<Arc<dyn Delegate>>,
    environment: Option<Arc<Environment>>,
}

impl fmt::Debug for ApiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiScope")
            .field("has_delegate", &self.delegate.is_some())
            .field("environment", &self.environment)
            .finish()
    }
}

impl ApiScope {
    pub fn new(delegate: Option<Arc<dyn Delegate>>, environment: Option<Arc<Environment>>) -> Self {
        Self {
            delegate,
            environment,
        }
    }

    pub fn delegate(&self) -> Option<&Arc<dyn Delegate>> {
        self.delegate.as_ref()
    }

    pub fn environment(&self) -> Option<&Arc<Environment>> {
        self.environment.as_ref()
    }

    /// Replaces the delegate, returning the previous one.
    pub fn set_delegate(
        &mut self,
        delegate: Option<Arc<dyn Delegate>>,
    ) -> Option<Arc<dyn Delegate>> {
        std::mem::replace(&mut self.delegate, delegate)
    }

    /// Replaces the environment, returning the previous one.
    pub fn set_environment(
        &mut self,
        environment: Option<Arc<Environment>>,
    ) -> Option<Arc<Environment>> {
        std::mem::replace(&mut self.environment, environment)
    }

    pub fn make_sync_call(&self, service: &str, method: &str, request: &[u8]) -> Result<Vec<u8>> {
        let (delegate, env) = self.bound()?;
        delegate.make_sync_call(env, service, method, request)
    }

    pub fn make_async_call(
        &self,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> Result<PendingCall<Result<Vec<u8>>>> {
        let (delegate, env) = self.bound()?;
        Ok(delegate.make_async_call(env, service, method, request))
    }

    pub fn log(&self, record: &LogRecord) -> Result<()> {
        let (delegate, env) = self.bound()?;
        delegate.log(env, record);
        Ok(())
    }

    fn bound(&self) -> Result<(&Arc<dyn Delegate>, &Environment)> {
        let delegate = self
            .delegate
            .as_ref()
            .ok_or_else(|| RemoteApiError::IllegalState("no API delegate installed".to_string()))?;
        let env = self
            .environment
            .as_deref()
            .ok_or_else(|| RemoteApiError::IllegalState("no API environment set".to_string()))?;
        Ok((delegate, env))
    }
}
