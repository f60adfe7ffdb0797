use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use pretty_assertions::assert_eq;
use remote_api_core::ApiScope;
use remote_api_core::Delegate;
use remote_api_core::Environment;
use remote_api_core::LogLevel;
use remote_api_core::LogRecord;
use remote_api_core::RemoteApiError;
use remote_api_core::RemoteApiInstaller;
use remote_api_core::RemoteApiOptions;
use remote_api_core::Result;
use remote_api_protocol::Request;
use remote_api_protocol::Response;
use remote_api_protocol::decode;
use remote_api_protocol::encode;
use remote_api_protocol::urlfetch::FETCH_METHOD;
use remote_api_protocol::urlfetch::FetchMethod;
use remote_api_protocol::urlfetch::FetchRequest;
use remote_api_protocol::urlfetch::FetchResponse;
use remote_api_protocol::urlfetch::URLFETCH_SERVICE;
use remote_api_test_support::ECHO_SERVICE;
use remote_api_test_support::TEST_APP_ID;
use remote_api_test_support::TEST_EMAIL;
use remote_api_test_support::TestServer;

#[test]
fn calls_from_another_user_are_refused_before_any_traffic() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    let installed_env = scope.set_environment(Some(Arc::new(Environment::for_tool(
        TEST_APP_ID,
        "intruder@example.com",
    ))));

    let err = scope
        .make_sync_call(ECHO_SERVICE, "Say", b"hi")
        .expect_err("wrong user");
    assert!(matches!(err, RemoteApiError::SecurityViolation(_)));
    assert_eq!(
        err.to_string(),
        format!(
            "remote API call: user 'intruder@example.com' can't use client that's logged in as '{TEST_EMAIL}'"
        )
    );
    assert!(server.fake.calls().is_empty());
    assert_eq!(installer.rpc_count()?, 0);

    scope.set_environment(installed_env);
    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn remote_application_errors_keep_their_code() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;

    let err = scope
        .make_sync_call("memcache", "Get", b"{}")
        .expect_err("unknown to the fake server");
    assert_eq!(err.application_code(), Some(1));
    assert_eq!(server.fake.calls_to("memcache", "Get"), 1);

    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn async_calls_run_on_the_pool() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(
        &server.options(TEST_EMAIL).max_concurrent_requests(2),
        &mut scope,
    )?;

    let pending: Vec<_> = (0..4)
        .map(|i| scope.make_async_call(ECHO_SERVICE, "Say", format!("msg-{i}").as_bytes()))
        .collect::<Result<_>>()?;
    let replies = pending
        .into_iter()
        .map(|mut call| call.get_timeout(Duration::from_secs(10)))
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(
        replies,
        (0..4)
            .map(|i| format!("msg-{i}").into_bytes())
            .collect::<Vec<_>>()
    );
    assert_eq!(installer.rpc_count()?, 4);

    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn application_logs_are_accepted() -> anyhow::Result<()> {
    let server = TestServer::start()?;
    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&server.options(TEST_EMAIL), &mut scope)?;
    scope.log(&LogRecord::new(LogLevel::Warn, 1_700_000_000_000_000, "disk almost full"))?;
    assert!(server.fake.calls().is_empty());
    installer.uninstall(&mut scope)?;
    Ok(())
}

/// Platform services of a host container: its `urlfetch` answers the
/// remote API handler itself, recording what it was asked to fetch.
#[derive(Default)]
struct HostServices {
    fetches: Mutex<Vec<FetchRequest>>,
}

impl HostServices {
    fn serve(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        let content = match request.method {
            FetchMethod::Get => b"{app_id: hosted-app, rtok: 0}".to_vec(),
            FetchMethod::Post => {
                let envelope: Request = decode(request.payload.as_deref().unwrap_or_default())?;
                encode(&Response::ok(envelope.request))?
            }
        };
        Ok(FetchResponse {
            status_code: 200,
            headers: Vec::new(),
            content,
            content_was_truncated: false,
        })
    }
}

impl Delegate for HostServices {
    fn make_sync_call(
        &self,
        _env: &Environment,
        service: &str,
        method: &str,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        if service != URLFETCH_SERVICE || method != FETCH_METHOD {
            return Err(RemoteApiError::InvalidArgument(format!(
                "host has no {service}.{method}"
            )));
        }
        let request: FetchRequest = decode(request)?;
        let response = self
            .serve(&request)
            .map_err(|err| RemoteApiError::Protocol(err.to_string()))?;
        self.fetches.lock().expect("fetch log").push(request);
        Ok(encode(&response)?)
    }
}

#[test]
fn host_container_fetches_through_the_platform() -> anyhow::Result<()> {
    let host = Arc::new(HostServices::default());
    let host_delegate: Arc<dyn Delegate> = host.clone();
    let mut scope = ApiScope::new(
        Some(host_delegate),
        Some(Arc::new(Environment::for_tool("hosting-app", TEST_EMAIL))),
    );
    let serialized = format!("host=other-app.example.com\nemail={TEST_EMAIL}\ncookie=SACSID=abc\n");
    let options = RemoteApiOptions::new()
        .server("other-app.example.com", 443)
        .reuse_credentials(TEST_EMAIL, serialized)
        .host_container(true);

    let mut installer = RemoteApiInstaller::new();
    installer.install(&options, &mut scope)?;
    assert_eq!(installer.app_id(), Some("hosted-app"));

    // No pool in a host container: the async call has already completed.
    let mut pending = scope.make_async_call(ECHO_SERVICE, "Say", b"inline")?;
    assert_eq!(pending.get_timeout(Duration::ZERO)??, b"inline".to_vec());

    let fetches = host.fetches.lock().expect("fetch log").clone();
    assert_eq!(fetches.len(), 2);
    assert_eq!(fetches[0].method, FetchMethod::Get);
    assert_eq!(fetches[0].url, "https://other-app.example.com:443/remote_api");
    assert!(!fetches[1].follow_redirects);
    assert!(
        fetches[1]
            .headers
            .iter()
            .any(|header| header.key == "Cookie" && header.value == "SACSID=abc")
    );

    installer.uninstall(&mut scope)?;
    Ok(())
}

#[test]
fn host_container_without_platform_services_is_rejected() {
    let mut scope = ApiScope::default();
    let options = RemoteApiOptions::new()
        .server("other-app.example.com", 443)
        .reuse_credentials(
            TEST_EMAIL,
            format!("host=other-app.example.com\nemail={TEST_EMAIL}\n"),
        )
        .host_container(true);
    let err = RemoteApiInstaller::new()
        .install(&options, &mut scope)
        .expect_err("no platform");
    assert!(matches!(err, RemoteApiError::InvalidArgument(_)));
}
