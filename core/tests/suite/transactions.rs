use pretty_assertions::assert_eq;
use remote_api_core::ApiScope;
use remote_api_core::HashConvention;
use remote_api_core::RemoteApiError;
use remote_api_core::RemoteApiInstaller;
use remote_api_protocol::datastore::DATASTORE_SERVICE;
use remote_api_protocol::datastore::Entity;
use remote_api_protocol::datastore::ErrorCode;
use remote_api_protocol::datastore::Key;
use remote_api_protocol::datastore::PropertyValue;
use remote_api_protocol::datastore::Query;
use remote_api_protocol::datastore::method;
use remote_api_protocol::remote_datastore;
use remote_api_protocol::remote_datastore::REMOTE_DATASTORE_SERVICE;
use remote_api_test_support::DatastoreClient;
use remote_api_test_support::FakeRemoteApi;
use remote_api_test_support::TEST_APP_ID;
use remote_api_test_support::TEST_EMAIL;
use remote_api_test_support::TestServer;

fn key(name: &str) -> Key {
    Key::with_name(TEST_APP_ID, "Counter", name)
}

fn counter(name: &str, value: i64) -> Entity {
    Entity::new(key(name)).with_property("value", PropertyValue::Int(value))
}

struct Session {
    server: TestServer,
    scope: ApiScope,
    installer: RemoteApiInstaller,
}

impl Session {
    fn start() -> anyhow::Result<Self> {
        Self::start_with(FakeRemoteApi::new(), HashConvention::FullBytes)
    }

    fn start_with(fake: FakeRemoteApi, convention: HashConvention) -> anyhow::Result<Self> {
        let server = TestServer::start_with(fake)?;
        let mut scope = ApiScope::default();
        let mut installer = RemoteApiInstaller::new();
        installer.install(
            &server.options(TEST_EMAIL).hash_convention(convention),
            &mut scope,
        )?;
        Ok(Self {
            server,
            scope,
            installer,
        })
    }

    fn datastore(&self) -> DatastoreClient<'_> {
        DatastoreClient::new(&self.scope)
    }

    fn finish(mut self) -> anyhow::Result<()> {
        self.installer.uninstall(&mut self.scope)?;
        Ok(())
    }
}

#[test]
fn read_modify_write_commits_atomically() -> anyhow::Result<()> {
    let session = Session::start()?;
    session.server.fake.store(counter("hits", 41));
    let ds = session.datastore();

    let txn = ds.begin()?;
    let current = ds.get(&[key("hits")], Some(&txn))?;
    assert_eq!(current, vec![Some(counter("hits", 41))]);
    ds.put(vec![counter("hits", 42)], Some(&txn))?;
    // Writes stay local until commit.
    assert_eq!(session.server.fake.entity(&key("hits")), Some(counter("hits", 41)));
    ds.commit(&txn)?;

    assert_eq!(session.server.fake.entity(&key("hits")), Some(counter("hits", 42)));
    let commits = session.server.fake.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].preconditions.len(), 1);
    assert!(commits[0].preconditions[0].hash.is_some());
    assert_eq!(commits[0].puts, vec![counter("hits", 42)]);
    // BeginTransaction never reaches the server.
    assert_eq!(session.server.fake.calls_to(DATASTORE_SERVICE, method::BEGIN_TRANSACTION), 0);
    session.finish()
}

#[test]
fn repeated_puts_commit_only_the_last_value() -> anyhow::Result<()> {
    let session = Session::start()?;
    let ds = session.datastore();

    let txn = ds.begin()?;
    ds.put(vec![counter("k", 1)], Some(&txn))?;
    ds.put(vec![counter("k", 2)], Some(&txn))?;
    ds.commit(&txn)?;

    let commits = session.server.fake.commits();
    assert_eq!(commits[0].puts, vec![counter("k", 2)]);
    assert!(commits[0].deletes.is_empty());
    assert_eq!(session.server.fake.entity(&key("k")), Some(counter("k", 2)));
    session.finish()
}

#[test]
fn second_read_in_a_transaction_is_an_illegal_state() -> anyhow::Result<()> {
    let session = Session::start()?;
    session.server.fake.store(counter("k", 1));
    let ds = session.datastore();

    let txn = ds.begin()?;
    ds.get(&[key("k")], Some(&txn))?;
    ds.put(vec![counter("k", 2)], Some(&txn))?;
    let err = ds
        .get(&[key("k")], Some(&txn))
        .expect_err("duplicate read");
    assert!(matches!(err, RemoteApiError::IllegalState(_)));
    assert_eq!(session.server.fake.calls_to(DATASTORE_SERVICE, method::GET), 1);

    ds.rollback(&txn)?;
    session.finish()
}

#[test]
fn absent_read_fails_commit_when_another_party_creates_the_key() -> anyhow::Result<()> {
    let session = Session::start()?;
    let ds = session.datastore();

    let txn = ds.begin()?;
    assert_eq!(ds.get(&[key("slot")], Some(&txn))?, vec![None]);
    ds.put(vec![counter("other", 1)], Some(&txn))?;
    session.server.fake.store(counter("slot", 99));

    let err = ds.commit(&txn).expect_err("precondition broken");
    match err {
        RemoteApiError::TransactionAborted { handle, .. } => assert_eq!(handle, txn.handle),
        other => panic!("expected an aborted transaction, got {other:?}"),
    }
    // Nothing from the transaction was applied.
    assert_eq!(session.server.fake.entity(&key("other")), None);
    assert!(session.server.fake.commits().is_empty());

    // The handle is closed whatever the outcome.
    let err = ds.commit(&txn).expect_err("closed handle");
    assert_eq!(err.application_code(), Some(ErrorCode::BadRequest.code()));
    session.finish()
}

#[test]
fn concurrent_update_aborts_the_commit() -> anyhow::Result<()> {
    let session = Session::start()?;
    session.server.fake.store(counter("k", 1));
    let ds = session.datastore();

    let txn = ds.begin()?;
    ds.get(&[key("k")], Some(&txn))?;
    session.server.fake.store(counter("k", 5));
    ds.put(vec![counter("k", 2)], Some(&txn))?;

    assert!(matches!(
        ds.commit(&txn),
        Err(RemoteApiError::TransactionAborted { .. })
    ));
    assert_eq!(session.server.fake.entity(&key("k")), Some(counter("k", 5)));
    session.finish()
}

#[test]
fn deletes_and_allocated_ids_are_applied_on_commit() -> anyhow::Result<()> {
    let session = Session::start()?;
    session.server.fake.store(counter("old", 1));
    let ds = session.datastore();

    let txn = ds.begin()?;
    let keys = ds.put(
        vec![Entity::new(Key::incomplete(TEST_APP_ID, "Counter"))
            .with_property("value", PropertyValue::Int(7))],
        Some(&txn),
    )?;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].is_complete());
    ds.delete(&[key("old")], Some(&txn))?;
    assert_eq!(
        session
            .server
            .fake
            .calls_to(REMOTE_DATASTORE_SERVICE, remote_datastore::method::GET_IDS),
        1
    );
    assert_eq!(session.server.fake.entity_count(), 1);

    ds.commit(&txn)?;
    assert_eq!(session.server.fake.entity(&key("old")), None);
    assert_eq!(
        session
            .server
            .fake
            .entity(&keys[0])
            .and_then(|entity| entity.property("value").cloned()),
        Some(PropertyValue::Int(7))
    );
    session.finish()
}

#[test]
fn rollback_discards_writes_without_traffic() -> anyhow::Result<()> {
    let session = Session::start()?;
    let ds = session.datastore();

    let txn = ds.begin()?;
    ds.put(vec![counter("k", 1)], Some(&txn))?;
    ds.rollback(&txn)?;

    assert!(session.server.fake.calls().is_empty());
    assert_eq!(session.server.fake.entity(&key("k")), None);
    assert!(matches!(
        ds.put(vec![counter("k", 1)], Some(&txn)),
        Err(RemoteApiError::Application { .. })
    ));
    session.finish()
}

#[test]
fn query_results_join_the_read_set() -> anyhow::Result<()> {
    let session = Session::start()?;
    session.server.fake.store(counter("a", 1));
    session.server.fake.store(counter("b", 2));
    let ds = session.datastore();

    let txn = ds.begin()?;
    let query = Query {
        app: TEST_APP_ID.to_string(),
        kind: Some("Counter".to_string()),
        ancestor: None,
        filters: Vec::new(),
        limit: None,
        transaction: Some(txn.clone()),
    };
    assert_eq!(ds.query(&query)?.len(), 2);
    let err = ds.get(&[key("a")], Some(&txn)).expect_err("already read");
    assert!(matches!(err, RemoteApiError::IllegalState(_)));

    ds.put(vec![counter("a", 10)], Some(&txn))?;
    ds.commit(&txn)?;
    assert_eq!(session.server.fake.commits()[0].preconditions.len(), 2);
    session.finish()
}

#[test]
fn non_transactional_calls_pass_straight_through() -> anyhow::Result<()> {
    let session = Session::start()?;
    let ds = session.datastore();

    let keys = ds.put(vec![counter("k", 3)], None)?;
    assert_eq!(keys, vec![key("k")]);
    assert_eq!(ds.get(&[key("k")], None)?, vec![Some(counter("k", 3))]);
    ds.delete(&[key("k")], None)?;
    assert_eq!(session.server.fake.entity_count(), 0);
    assert!(session.server.fake.commits().is_empty());
    session.finish()
}

#[test]
fn both_hash_conventions_verify_when_client_and_server_agree() -> anyhow::Result<()> {
    for convention in [HashConvention::FullBytes, HashConvention::OmitTrailingByte] {
        let session =
            Session::start_with(FakeRemoteApi::with_hash_convention(convention), convention)?;
        session.server.fake.store(counter("k", 1));
        let ds = session.datastore();

        let txn = ds.begin()?;
        ds.get(&[key("k")], Some(&txn))?;
        ds.put(vec![counter("k", 2)], Some(&txn))?;
        ds.commit(&txn)?;
        assert_eq!(session.server.fake.entity(&key("k")), Some(counter("k", 2)));
        session.finish()?;
    }
    Ok(())
}

#[test]
fn unchanged_reads_of_double_values_commit() -> anyhow::Result<()> {
    // Doubles whose decimal form does not survive a decode and re-encode.
    let measured = Entity::new(Key::with_name(TEST_APP_ID, "Reading", "d"))
        .with_property("value", PropertyValue::Double(1.0715660391465826e-75));
    let other = Entity::new(Key::with_name(TEST_APP_ID, "Reading", "e"))
        .with_property("value", PropertyValue::Double(-1.603964615428183e143));
    let session = Session::start()?;
    session.server.fake.store(measured.clone());
    session.server.fake.store(other.clone());
    let ds = session.datastore();

    let txn = ds.begin()?;
    ds.get(&[measured.key.clone()], Some(&txn))?;
    let query = Query {
        app: TEST_APP_ID.to_string(),
        kind: Some("Reading".to_string()),
        ancestor: Some(other.key.clone()),
        filters: Vec::new(),
        limit: None,
        transaction: Some(txn.clone()),
    };
    assert_eq!(ds.query(&query)?.len(), 1);
    ds.put(vec![counter("summary", 2)], Some(&txn))?;
    ds.commit(&txn)?;

    assert_eq!(session.server.fake.commits()[0].preconditions.len(), 2);
    assert_eq!(
        session.server.fake.entity(&key("summary")),
        Some(counter("summary", 2))
    );
    session.finish()
}

#[test]
fn get_results_that_do_not_match_the_request_are_rejected() -> anyhow::Result<()> {
    let session = Session::start_with(
        FakeRemoteApi::dropping_get_results(),
        HashConvention::FullBytes,
    )?;
    let ds = session.datastore();

    let txn = ds.begin()?;
    for _ in 0..2 {
        let err = ds
            .get(&[key("k")], Some(&txn))
            .expect_err("no result for the requested key");
        assert!(matches!(err, RemoteApiError::Protocol(_)), "{err}");
    }
    ds.put(vec![counter("k", 1)], Some(&txn))?;
    ds.rollback(&txn)?;
    assert!(session.server.fake.commits().is_empty());
    session.finish()
}
