//! Calls served by the remote API handler itself rather than by a stock
//! service: the precondition-checked commit and id allocation.

use serde::Deserialize;
use serde::Serialize;
use serde_with::base64::Base64;
use serde_with::serde_as;
use sha1::Digest;
use sha1::Sha1;

use crate::datastore::Entity;
use crate::datastore::Key;

pub const REMOTE_DATASTORE_SERVICE: &str = "remote_datastore";

pub mod method {
    /// Takes a [`super::TransactionRequest`], answers with a
    /// [`crate::datastore::CommitResponse`].
    pub const TRANSACTION: &str = "Transaction";
    /// Takes a [`crate::datastore::PutRequest`] of entities with incomplete
    /// keys and answers with a [`crate::datastore::PutResponse`] holding the
    /// allocated keys, in order. Nothing is stored.
    pub const GET_IDS: &str = "GetIDs";
}

/// Server-side assertion checked atomically before any mutation is applied.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub key: Key,
    /// SHA-1 of the stored entity. `None` asserts that `key` does not exist.
    #[serde_as(as = "Option<Base64>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub puts: Vec<Entity>,
    #[serde(default)]
    pub deletes: Vec<Key>,
    #[serde(default)]
    pub allow_multiple_eg: bool,
}

/// Which bytes of a serialized entity feed the precondition hash. Client and
/// server must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashConvention {
    /// Hash every byte of the canonical encoding.
    #[default]
    FullBytes,
    /// Drop the final byte first, for encodings that end in a terminator.
    OmitTrailingByte,
}

/// SHA-1 digest of a serialized entity under `convention`.
pub fn precondition_hash(entity_bytes: &[u8], convention: HashConvention) -> Vec<u8> {
    let hashed = match convention {
        HashConvention::FullBytes => entity_bytes,
        HashConvention::OmitTrailingByte => {
            &entity_bytes[..entity_bytes.len().saturating_sub(1)]
        }
    };
    Sha1::digest(hashed).to_vec()
}
