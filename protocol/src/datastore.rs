//! Payloads of the `datastore_v3` service, limited to what the client needs
//! to route calls and emulate transactions.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::value::RawValue;

pub const DATASTORE_SERVICE: &str = "datastore_v3";

pub mod method {
    pub const GET: &str = "Get";
    pub const PUT: &str = "Put";
    pub const DELETE: &str = "Delete";
    pub const RUN_QUERY: &str = "RunQuery";
    pub const BEGIN_TRANSACTION: &str = "BeginTransaction";
    pub const COMMIT: &str = "Commit";
    pub const ROLLBACK: &str = "Rollback";
}

/// Application error codes raised by the datastore service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    BadRequest = 1,
    ConcurrentTransaction = 2,
    InternalError = 3,
    NeedIndex = 4,
    Timeout = 5,
    PermissionDenied = 6,
    CapabilityDisabled = 9,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PathElement {
    pub fn is_complete(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub path: Vec<PathElement>,
}

impl Key {
    /// Root key with neither id nor name; the datastore assigns an id on put.
    pub fn incomplete(app: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            namespace: None,
            path: vec![PathElement {
                kind: kind.into(),
                id: None,
                name: None,
            }],
        }
    }

    pub fn with_name(
        app: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let mut key = Self::incomplete(app, kind);
        if let Some(last) = key.path.last_mut() {
            last.name = Some(name.into());
        }
        key
    }

    pub fn with_id(app: impl Into<String>, kind: impl Into<String>, id: i64) -> Self {
        let mut key = Self::incomplete(app, kind);
        if let Some(last) = key.path.last_mut() {
            last.id = Some(id);
        }
        key
    }

    /// Appends an incomplete child element of `kind` under this key.
    pub fn child(&self, kind: impl Into<String>) -> Self {
        let mut key = self.clone();
        key.path.push(PathElement {
            kind: kind.into(),
            id: None,
            name: None,
        });
        key
    }

    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|element| element.kind.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.path.last().is_some_and(PathElement::is_complete)
    }

    /// True when `self` is `ancestor` or lies beneath it.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.app == ancestor.app
            && self.namespace == ancestor.namespace
            && self.path.len() >= ancestor.path.len()
            && self.path[..ancestor.path.len()] == ancestor.path[..]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Key(Key),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: Key,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Entity {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub handle: u64,
    pub app: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginTransactionRequest {
    pub app: String,
    #[serde(default)]
    pub allow_multiple_eg: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub keys: Vec<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    pub key: Key,
    /// `None` when no entity is stored under `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetResponse {
    pub entities: Vec<GetResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutResponse {
    pub keys: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub keys: Vec<Key>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResponse {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub property: String,
    pub value: PropertyValue,
}

/// Equality-filtered query over one kind, optionally restricted to the
/// descendants of `ancestor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor: Option<Key>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

impl Query {
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.app != entity.key.app {
            return false;
        }
        if let Some(kind) = &self.kind
            && entity.key.kind() != Some(kind.as_str())
        {
            return false;
        }
        if let Some(ancestor) = &self.ancestor
            && !entity.key.has_ancestor(ancestor)
        {
            return false;
        }
        self.filters
            .iter()
            .all(|filter| entity.property(&filter.property) == Some(&filter.value))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub results: Vec<Entity>,
}

/// [`GetResponse`] with every entity left exactly as the server encoded it.
/// Precondition hashes are taken over these bytes, so decoding and encoding
/// again must not come in between.
#[derive(Debug, Deserialize)]
pub struct RawGetResponse {
    pub entities: Vec<RawGetResult>,
}

#[derive(Debug, Deserialize)]
pub struct RawGetResult {
    pub key: Key,
    #[serde(default)]
    pub entity: Option<Box<RawValue>>,
}

/// [`QueryResult`] with the entities left as the server encoded them.
#[derive(Debug, Deserialize)]
pub struct RawQueryResult {
    pub results: Vec<Box<RawValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitResponse {}

/// Empty answer, e.g. to `Rollback`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoidResponse {}
