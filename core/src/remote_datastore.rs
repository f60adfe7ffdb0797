use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use remote_api_client::RpcChannel;
use remote_api_client::RpcError;
use remote_api_protocol::datastore::BeginTransactionRequest;
use remote_api_protocol::datastore::DATASTORE_SERVICE;
use remote_api_protocol::datastore::DeleteRequest;
use remote_api_protocol::datastore::DeleteResponse;
use remote_api_protocol::datastore::Entity;
use remote_api_protocol::datastore::ErrorCode;
use remote_api_protocol::datastore::GetRequest;
use remote_api_protocol::datastore::Key;
use remote_api_protocol::datastore::PutRequest;
use remote_api_protocol::datastore::PutResponse;
use remote_api_protocol::datastore::Query;
use remote_api_protocol::datastore::RawGetResponse;
use remote_api_protocol::datastore::RawQueryResult;
use remote_api_protocol::datastore::Transaction;
use remote_api_protocol::datastore::VoidResponse;
use remote_api_protocol::datastore::method;
use remote_api_protocol::decode;
use remote_api_protocol::encode;
use remote_api_protocol::remote_datastore;
use remote_api_protocol::remote_datastore::HashConvention;
use remote_api_protocol::remote_datastore::REMOTE_DATASTORE_SERVICE;
use tracing::debug;
use tracing::warn;

use crate::RemoteApiError;
use crate::Result;
use crate::TransactionEmulator;
use crate::transaction::duplicate_read;

type SharedEmulator = Arc<Mutex<TransactionEmulator>>;

/// Serves `datastore_v3` calls against the remote application, emulating
/// transactions on the client since the remote API is stateless.
#[derive(Debug)]
pub(crate) struct RemoteDatastore {
    rpc: Arc<RpcChannel>,
    hash_convention: HashConvention,
    next_handle: AtomicU64,
    transactions: Mutex<HashMap<u64, SharedEmulator>>,
}

impl RemoteDatastore {
    pub(crate) fn new(rpc: Arc<RpcChannel>, hash_convention: HashConvention) -> Self {
        Self {
            rpc,
            hash_convention,
            next_handle: AtomicU64::new(1),
            transactions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn handle_call(&self, method: &str, request: &[u8]) -> Result<Vec<u8>> {
        match method {
            method::BEGIN_TRANSACTION => self.begin_transaction(request),
            method::COMMIT => self.commit(request),
            method::ROLLBACK => self.rollback(request),
            method::GET => self.get(request),
            method::PUT => self.put(request),
            method::DELETE => self.delete(request),
            method::RUN_QUERY => self.run_query(request),
            other => self.forward(other, request),
        }
    }

    pub(crate) fn open_transactions(&self) -> usize {
        self.table().len()
    }

    fn begin_transaction(&self, request: &[u8]) -> Result<Vec<u8>> {
        let request: BeginTransactionRequest = decode(request)?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let emulator = TransactionEmulator::new(handle, request.allow_multiple_eg);
        self.table().insert(handle, Arc::new(Mutex::new(emulator)));
        debug!("began transaction {handle}");
        Ok(encode(&Transaction {
            handle,
            app: request.app,
        })?)
    }

    fn get(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut request: GetRequest = decode(raw)?;
        let Some(txn) = request.transaction.take() else {
            return self.forward(method::GET, raw);
        };
        let emulator = self.emulator(&txn, method::GET)?;
        let mut emulator = lock(&emulator);
        ensure_first_reads(&emulator, &request.keys)?;

        let response_bytes = self.forward(method::GET, &encode(&request)?)?;
        let response: RawGetResponse = decode(&response_bytes)?;
        if response.entities.len() != request.keys.len() {
            return Err(RemoteApiError::Protocol(format!(
                "asked for {} entities, got {} results",
                request.keys.len(),
                response.entities.len()
            )));
        }
        // Results come back in request order; the requested key is the one
        // the commit has to guard.
        for (key, result) in request.keys.into_iter().zip(response.entities) {
            match result.entity {
                Some(entity) => emulator.cache_entity(key, entity.get().as_bytes().to_vec())?,
                None => emulator.cache_absence(key)?,
            }
        }
        Ok(response_bytes)
    }

    fn put(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut request: PutRequest = decode(raw)?;
        let Some(txn) = request.transaction.take() else {
            return self.forward(method::PUT, raw);
        };
        let emulator = self.emulator(&txn, method::PUT)?;

        let incomplete: Vec<usize> = request
            .entities
            .iter()
            .enumerate()
            .filter(|(_, entity)| !entity.key.is_complete())
            .map(|(index, _)| index)
            .collect();
        if !incomplete.is_empty() {
            let keys = self.allocate_ids(&request, &incomplete)?;
            for (index, key) in incomplete.into_iter().zip(keys) {
                request.entities[index].key = key;
            }
        }

        let mut emulator = lock(&emulator);
        let keys: Vec<Key> = request
            .entities
            .iter()
            .map(|entity| entity.key.clone())
            .collect();
        for entity in request.entities {
            emulator.put(entity);
        }
        Ok(encode(&PutResponse { keys })?)
    }

    /// Asks the server to complete the keys of the entities at `indexes`.
    fn allocate_ids(&self, request: &PutRequest, indexes: &[usize]) -> Result<Vec<Key>> {
        let id_request = PutRequest {
            entities: indexes
                .iter()
                .map(|&index| request.entities[index].clone())
                .collect(),
            transaction: None,
        };
        let bytes = self.rpc.call(
            REMOTE_DATASTORE_SERVICE,
            remote_datastore::method::GET_IDS,
            None,
            &encode(&id_request)?,
        )?;
        let response: PutResponse = decode(&bytes)?;
        if response.keys.len() != indexes.len() {
            return Err(RemoteApiError::Protocol(format!(
                "asked for {} ids, got {}",
                indexes.len(),
                response.keys.len()
            )));
        }
        Ok(response.keys)
    }

    fn delete(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let request: DeleteRequest = decode(raw)?;
        let Some(txn) = &request.transaction else {
            return self.forward(method::DELETE, raw);
        };
        let emulator = self.emulator(txn, method::DELETE)?;
        let mut emulator = lock(&emulator);
        for key in request.keys {
            emulator.delete(key);
        }
        Ok(encode(&DeleteResponse {})?)
    }

    fn run_query(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut query: Query = decode(raw)?;
        let Some(txn) = query.transaction.take() else {
            return self.forward(method::RUN_QUERY, raw);
        };
        let emulator = self.emulator(&txn, method::RUN_QUERY)?;
        let mut emulator = lock(&emulator);

        let response_bytes = self.forward(method::RUN_QUERY, &encode(&query)?)?;
        let result: RawQueryResult = decode(&response_bytes)?;
        for raw_entity in &result.results {
            let bytes = raw_entity.get().as_bytes();
            let entity: Entity = decode(bytes)?;
            if !emulator.is_cached(&entity.key) {
                emulator.cache_entity(entity.key, bytes.to_vec())?;
            }
        }
        Ok(response_bytes)
    }

    fn commit(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let txn: Transaction = decode(raw)?;
        let emulator = self.close(&txn, method::COMMIT)?;
        let emulator = lock(&emulator);
        let request = emulator.make_commit_request(self.hash_convention);
        debug!(
            "committing transaction {} with {} preconditions, {} puts and {} deletes",
            txn.handle,
            request.preconditions.len(),
            request.puts.len(),
            request.deletes.len()
        );

        match self.rpc.call(
            REMOTE_DATASTORE_SERVICE,
            remote_datastore::method::TRANSACTION,
            None,
            &encode(&request)?,
        ) {
            Ok(bytes) => Ok(bytes),
            Err(RpcError::Application { code, detail, .. })
                if code == ErrorCode::ConcurrentTransaction.code() =>
            {
                warn!("transaction {} aborted: {detail}", txn.handle);
                Err(RemoteApiError::TransactionAborted {
                    handle: txn.handle,
                    detail,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rollback(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let txn: Transaction = decode(raw)?;
        self.close(&txn, method::ROLLBACK)?;
        debug!("rolled back transaction {}", txn.handle);
        Ok(encode(&VoidResponse {})?)
    }

    fn forward(&self, method: &str, request: &[u8]) -> Result<Vec<u8>> {
        Ok(self.rpc.call(DATASTORE_SERVICE, method, None, request)?)
    }

    fn emulator(&self, txn: &Transaction, method: &str) -> Result<SharedEmulator> {
        self.table()
            .get(&txn.handle)
            .cloned()
            .ok_or_else(|| unknown_transaction(txn, method))
    }

    /// Removes the transaction from the table; it can't be used afterwards
    /// whatever the outcome of the call that closes it.
    fn close(&self, txn: &Transaction, method: &str) -> Result<SharedEmulator> {
        self.table()
            .remove(&txn.handle)
            .ok_or_else(|| unknown_transaction(txn, method))
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, SharedEmulator>> {
        match self.transactions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Rejects keys this transaction has read before, or that appear twice in
/// one request.
fn ensure_first_reads(emulator: &TransactionEmulator, keys: &[Key]) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if emulator.is_cached(key) || !seen.insert(key) {
            return Err(duplicate_read());
        }
    }
    Ok(())
}

fn lock(emulator: &SharedEmulator) -> MutexGuard<'_, TransactionEmulator> {
    match emulator.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn unknown_transaction(txn: &Transaction, method: &str) -> RemoteApiError {
    RemoteApiError::Application {
        service: DATASTORE_SERVICE.to_string(),
        method: method.to_string(),
        code: ErrorCode::BadRequest.code(),
        detail: format!("transaction {} is not open", txn.handle),
    }
}
