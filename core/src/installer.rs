use std::fmt;
use std::sync::Arc;

use remote_api_client::Endpoint;
use remote_api_client::RpcChannel;
use remote_api_client::TransportClient;
use remote_api_login::AuthenticationClient;
use remote_api_login::Credentials;
use remote_api_login::ServerAddress;
use tracing::info;

use crate::ApiScope;
use crate::Delegate;
use crate::Environment;
use crate::RemoteApiDelegate;
use crate::RemoteApiError;
use crate::RemoteApiOptions;
use crate::Result;
use crate::app_id::discover_app_id;
use crate::host_fetch::DelegateFetch;

/// Routes the calls of an [`ApiScope`] to a remote application for as long
/// as it is installed, then puts the scope back the way it was.
///
/// Meant to be driven from a single thread.
#[derive(Debug, Default)]
pub struct RemoteApiInstaller {
    installed: Option<Installation>,
}

struct Installation {
    credentials: Credentials,
    app_id: String,
    delegate: Arc<RemoteApiDelegate>,
    installed_delegate: Arc<dyn Delegate>,
    installed_env: Arc<Environment>,
    saved: ApiScope,
}

impl fmt::Debug for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("host", &self.credentials.host)
            .field("email", &self.credentials.email)
            .field("app_id", &self.app_id)
            .field("delegate", &self.delegate)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

impl RemoteApiInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs in, discovers the remote app id and swaps a remote delegate and
    /// a matching environment into `scope`.
    ///
    /// `scope` is only modified once everything else has succeeded.
    pub fn install(&mut self, options: &RemoteApiOptions, scope: &mut ApiScope) -> Result<()> {
        options.validate()?;
        if self.installed.is_some() {
            return Err(RemoteApiError::IllegalState(
                "remote API is already installed".to_string(),
            ));
        }
        let server = options.server_address()?;
        let email = options.user_email()?;

        let credentials = login(options, &server, email)?;
        let transport = Arc::new(connect(options, server, &credentials, scope)?);
        let app_id = discover_app_id(&transport, &options.remote_api_path)?;
        let rpc = Arc::new(RpcChannel::new(transport, &options.remote_api_path));

        let saved = scope.clone();
        let delegate = Arc::new(RemoteApiDelegate::new(
            rpc,
            options,
            saved.delegate().cloned(),
        )?);
        let installed_delegate: Arc<dyn Delegate> = delegate.clone();
        let installed_env = Arc::new(Environment::for_tool(&app_id, email));

        scope.set_delegate(Some(installed_delegate.clone()));
        scope.set_environment(Some(installed_env.clone()));
        info!(
            host = %credentials.host,
            app_id = %app_id,
            "remote API installed for {email}"
        );

        self.installed = Some(Installation {
            credentials,
            app_id,
            delegate,
            installed_delegate,
            installed_env,
            saved,
        });
        Ok(())
    }

    /// Restores the delegate and environment `scope` had before
    /// [`RemoteApiInstaller::install`] and waits for outstanding
    /// asynchronous calls. Does nothing when not installed.
    pub fn uninstall(&mut self, scope: &mut ApiScope) -> Result<()> {
        let Some(installation) = &self.installed else {
            return Ok(());
        };
        let delegate_unchanged = scope
            .delegate()
            .is_some_and(|current| Arc::ptr_eq(current, &installation.installed_delegate));
        if !delegate_unchanged {
            return Err(RemoteApiError::IllegalState(
                "Can't uninstall because the current delegate has been modified.".to_string(),
            ));
        }
        let env_unchanged = scope
            .environment()
            .is_some_and(|current| Arc::ptr_eq(current, &installation.installed_env));
        if !env_unchanged {
            return Err(RemoteApiError::IllegalState(
                "Can't uninstall because the current environment has been modified.".to_string(),
            ));
        }

        if let Some(installation) = self.installed.take() {
            scope.set_delegate(installation.saved.delegate().cloned());
            scope.set_environment(installation.saved.environment().cloned());
            installation.delegate.shutdown();
            info!(host = %installation.credentials.host, "remote API uninstalled");
        }
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    /// Session cookies in the form accepted by
    /// [`RemoteApiOptions::reuse_credentials`].
    ///
    /// The result grants the logged-in user's access to whoever holds it.
    pub fn serialize_credentials(&self) -> Result<String> {
        Ok(self.installation()?.credentials.serialize())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.installed
            .as_ref()
            .map(|installation| &installation.credentials)
    }

    pub fn app_id(&self) -> Option<&str> {
        self.installed
            .as_ref()
            .map(|installation| installation.app_id.as_str())
    }

    pub fn delegate(&self) -> Option<&Arc<RemoteApiDelegate>> {
        self.installed
            .as_ref()
            .map(|installation| &installation.delegate)
    }

    /// Remote calls made since install or the last reset.
    pub fn rpc_count(&self) -> Result<usize> {
        Ok(self.installation()?.delegate.rpc_count())
    }

    pub fn reset_rpc_count(&self) -> Result<()> {
        self.installation()?.delegate.reset_rpc_count();
        Ok(())
    }

    fn installation(&self) -> Result<&Installation> {
        self.installed
            .as_ref()
            .ok_or_else(|| RemoteApiError::IllegalState("remote API is not installed".to_string()))
    }
}

/// Reused credentials win over the development-server shortcut, which wins
/// over a password login.
fn login(options: &RemoteApiOptions, server: &ServerAddress, email: &str) -> Result<Credentials> {
    if let Some(serialized) = &options.credentials_to_reuse {
        return Ok(Credentials::parse(email, &server.host, serialized)?);
    }
    let client = AuthenticationClient::with_identity_endpoint(&options.identity_endpoint)?;
    let password = options.password.as_deref().unwrap_or_default();
    Ok(client.login(server, email, password)?)
}

fn connect(
    options: &RemoteApiOptions,
    server: ServerAddress,
    credentials: &Credentials,
    scope: &ApiScope,
) -> Result<TransportClient> {
    let endpoint = Endpoint::new(server, &credentials.cookies, options.max_http_response_size);
    if !options.host_container {
        return Ok(TransportClient::http(endpoint)?);
    }
    let (Some(delegate), Some(env)) = (scope.delegate(), scope.environment()) else {
        return Err(RemoteApiError::InvalidArgument(
            "options indicate we are running in a host container but its services are not available"
                .to_string(),
        ));
    };
    let fetch = DelegateFetch::new(delegate.clone(), env.clone());
    Ok(TransportClient::host_fetch(endpoint, Arc::new(fetch)))
}
