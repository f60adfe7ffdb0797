use std::collections::BTreeMap;

use remote_api_protocol::datastore::Entity;
use remote_api_protocol::datastore::Key;
use remote_api_protocol::remote_datastore::HashConvention;
use remote_api_protocol::remote_datastore::Precondition;
use remote_api_protocol::remote_datastore::TransactionRequest;
use remote_api_protocol::remote_datastore::precondition_hash;

use crate::RemoteApiError;
use crate::Result;

/// What a transaction saw the first time it read a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Canonical serialized entity.
    Present(Vec<u8>),
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    Put(Entity),
    Delete,
}

/// Client-side state of one open transaction.
///
/// Reads go to the server immediately and their results are remembered;
/// writes are only recorded. On commit everything is sent in a single
/// request whose preconditions assert that every remembered read is still
/// what the server holds, so the writes apply all together or not at all.
#[derive(Debug)]
pub struct TransactionEmulator {
    handle: u64,
    allow_multiple_eg: bool,
    reads: BTreeMap<Key, Snapshot>,
    writes: BTreeMap<Key, Mutation>,
}

impl TransactionEmulator {
    pub fn new(handle: u64, allow_multiple_eg: bool) -> Self {
        Self {
            handle,
            allow_multiple_eg,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn is_cached(&self, key: &Key) -> bool {
        self.reads.contains_key(key)
    }

    pub fn cache_entity(&mut self, key: Key, entity_bytes: Vec<u8>) -> Result<()> {
        self.cache(key, Snapshot::Present(entity_bytes))
    }

    pub fn cache_absence(&mut self, key: Key) -> Result<()> {
        self.cache(key, Snapshot::Absent)
    }

    fn cache(&mut self, key: Key, snapshot: Snapshot) -> Result<()> {
        if self.reads.contains_key(&key) {
            return Err(duplicate_read());
        }
        self.reads.insert(key, snapshot);
        Ok(())
    }

    pub fn cached(&self, key: &Key) -> Result<&Snapshot> {
        self.reads.get(key).ok_or_else(|| {
            RemoteApiError::IllegalState("entity's status unexpectedly not in cache".to_string())
        })
    }

    /// Records `entity` to be stored on commit, replacing any earlier write
    /// to the same key.
    pub fn put(&mut self, entity: Entity) {
        self.writes.insert(entity.key.clone(), Mutation::Put(entity));
    }

    /// Records `key` to be deleted on commit, replacing any earlier write to
    /// the same key.
    pub fn delete(&mut self, key: Key) {
        self.writes.insert(key, Mutation::Delete);
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn make_commit_request(&self, convention: HashConvention) -> TransactionRequest {
        let preconditions = self
            .reads
            .iter()
            .map(|(key, snapshot)| Precondition {
                key: key.clone(),
                hash: match snapshot {
                    Snapshot::Present(bytes) => Some(precondition_hash(bytes, convention)),
                    Snapshot::Absent => None,
                },
            })
            .collect();

        let mut puts = Vec::new();
        let mut deletes = Vec::new();
        for (key, mutation) in &self.writes {
            match mutation {
                Mutation::Put(entity) => puts.push(entity.clone()),
                Mutation::Delete => deletes.push(key.clone()),
            }
        }

        TransactionRequest {
            preconditions,
            puts,
            deletes,
            allow_multiple_eg: self.allow_multiple_eg,
        }
    }
}

pub(crate) fn duplicate_read() -> RemoteApiError {
    RemoteApiError::IllegalState(
        "shouldn't load the same entity twice within a transaction".to_string(),
    )
}
