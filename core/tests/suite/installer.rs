use std::sync::Arc;

use pretty_assertions::assert_eq;
use remote_api_core::ApiScope;
use remote_api_core::Delegate;
use remote_api_core::Environment;
use remote_api_core::RemoteApiError;
use remote_api_core::RemoteApiInstaller;
use remote_api_core::RemoteApiOptions;
use remote_api_core::Result;
use remote_api_test_support::ECHO_SERVICE;
use remote_api_test_support::TEST_APP_ID;
use remote_api_test_support::TEST_EMAIL;
use remote_api_test_support::TestServer;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

/// Stands in for whatever delegate the process had before installing.
struct LocalDelegate;

impl Delegate for LocalDelegate {
    fn make_sync_call(
        &self,
        _env: &Environment,
        service: &str,
        method: &str,
        _request: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(format!("local {service}.{method}").into_bytes())
    }
}

fn local_scope() -> (ApiScope, Arc<dyn Delegate>, Arc<Environment>) {
    let delegate: Arc<dyn Delegate> = Arc::new(LocalDelegate);
    let env = Arc::new(Environment::for_tool("local-app", TEST_EMAIL));
    let scope = ApiScope::new(Some(delegate.clone()), Some(env.clone()));
    (scope, delegate, env)
}

#[test]
fn install_routes_scope_to_remote_and_uninstall_restores_it() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let (mut scope, local_delegate, local_env) = local_scope();
    let mut installer = RemoteApiInstaller::new();

    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    assert!(installer.is_installed());
    assert_eq!(installer.app_id(), Some(TEST_APP_ID));
    let env = scope.environment().expect("environment installed");
    assert_eq!(env.app_id, TEST_APP_ID);
    assert_eq!(env.email, TEST_EMAIL);
    assert!(env.is_admin);

    let reply = scope.make_sync_call(ECHO_SERVICE, "Say", b"hello")?;
    assert_eq!(reply, b"hello".to_vec());
    assert_eq!(installer.rpc_count()?, 1);
    installer.reset_rpc_count()?;
    assert_eq!(installer.rpc_count()?, 0);

    installer.uninstall(&mut scope)?;
    assert!(!installer.is_installed());
    assert!(Arc::ptr_eq(scope.delegate().expect("delegate restored"), &local_delegate));
    assert!(Arc::ptr_eq(scope.environment().expect("environment restored"), &local_env));
    assert_eq!(
        scope.make_sync_call(ECHO_SERVICE, "Say", b"hello")?,
        b"local echo.Say".to_vec()
    );
    Ok(())
}

#[test]
fn install_twice_is_rejected() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;

    let err = installer
        .install(&server.options(TEST_EMAIL), &mut scope)
        .expect_err("second install must fail");
    assert!(matches!(err, RemoteApiError::IllegalState(_)));
    assert_eq!(err.to_string(), "remote API is already installed");

    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn uninstall_without_install_is_a_no_op() -> anyhow::Result<()> {
    let (mut scope, local_delegate, _) = local_scope();
    let mut installer = RemoteApiInstaller::new();
    installer.uninstall(&mut scope)?;
    assert!(Arc::ptr_eq(scope.delegate().expect("delegate kept"), &local_delegate));
    Ok(())
}

#[test]
fn reinstall_gets_an_independent_session() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();

    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    scope.make_sync_call(ECHO_SERVICE, "Say", b"one")?;
    let first = installer.delegate().cloned().expect("installed");
    installer.uninstall(&mut scope)?;
    assert!(scope.delegate().is_none());

    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    let second = installer.delegate().cloned().expect("installed");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(installer.rpc_count()?, 0);
    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn uninstall_refuses_a_modified_scope() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;

    let installed_env = scope.set_environment(Some(Arc::new(Environment::for_tool(
        TEST_APP_ID,
        TEST_EMAIL,
    ))));
    let err = installer.uninstall(&mut scope).expect_err("modified scope");
    assert_eq!(
        err.to_string(),
        "Can't uninstall because the current environment has been modified."
    );
    assert!(installer.is_installed());

    scope.set_environment(installed_env);
    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn serialized_credentials_reinstall_without_login_traffic() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    let serialized = installer.serialize_credentials()?;
    installer.uninstall(&mut scope)?;

    let options = RemoteApiOptions::new()
        .server(server.host(), server.port())
        .reuse_credentials(TEST_EMAIL, serialized.clone());
    installer.install(&options, &mut scope)?;
    assert_eq!(installer.serialize_credentials()?, serialized);
    // Only the app-id lookups reached the server; no login endpoint exists.
    assert_eq!(server.requests_with_method("GET"), 2);
    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn credentials_for_another_user_are_rejected() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    let options = RemoteApiOptions::new()
        .server(server.host(), server.port())
        .reuse_credentials("someone@example.com", server.serialized_credentials(TEST_EMAIL));

    let err = installer
        .install(&options, &mut scope)
        .expect_err("foreign credentials");
    assert!(matches!(err, RemoteApiError::Credentials(_)));
    assert!(!installer.is_installed());
    assert!(scope.delegate().is_none());
    assert_eq!(server.requests_with_method("GET"), 0);
    Ok(())
}

#[test]
fn failed_app_id_lookup_leaves_scope_untouched() -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/remote_api"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/_ah/login"))
            .mount(&server)
            .await;
        server
    });
    let address = server.address();
    let (mut scope, local_delegate, _) = local_scope();
    let mut installer = RemoteApiInstaller::new();
    let options = RemoteApiOptions::new()
        .server(address.ip().to_string(), address.port())
        .reuse_credentials(
            TEST_EMAIL,
            format!("host={}\nemail={TEST_EMAIL}\ncookie=SACSID=stale\n", address.ip()),
        );

    let err = installer
        .install(&options, &mut scope)
        .expect_err("lookup fails");
    assert_eq!(
        err.to_string(),
        "can't get appId from remote api; status code = 302"
    );
    assert!(!installer.is_installed());
    assert!(Arc::ptr_eq(scope.delegate().expect("delegate kept"), &local_delegate));
    Ok(())
}

#[test]
fn missing_server_or_email_is_an_invalid_argument() {
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    let err = installer
        .install(&RemoteApiOptions::new(), &mut scope)
        .expect_err("no server");
    assert!(matches!(err, RemoteApiError::InvalidArgument(_)));
    assert!(matches!(
        installer.serialize_credentials(),
        Err(RemoteApiError::IllegalState(_))
    ));
}
