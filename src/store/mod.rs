pub mod guarded;
pub mod memory;
pub mod seed;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Orders,
    Profiles,
    DeliveryStats,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Profiles => "profiles",
            Collection::DeliveryStats => "deliveryStats",
        }
    }
}

/// Location of one document: `{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: Collection,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }

    pub fn order(id: impl Into<String>) -> Self {
        Self::new(Collection::Orders, id)
    }

    pub fn profile(uid: impl Into<String>) -> Self {
        Self::new(Collection::Profiles, uid)
    }

    pub fn stats(uid: impl Into<String>) -> Self {
        Self::new(Collection::DeliveryStats, uid)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.as_str(), self.id)
    }
}

/// A document as read, together with the version it had at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub version: u64,
    pub data: Value,
}

impl Snapshot {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone())
            .map_err(|err| StoreError::Serialization(format!("document {}: {err}", self.id)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Replace the whole document.
    Set(Value),
    /// Overwrite the named top-level fields, leaving the rest alone.
    Merge(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOp {
    pub path: DocPath,
    /// Version the document must still have; `Some(0)` means it must not exist.
    pub expect_version: Option<u64>,
    pub write: Write,
}

/// Writes applied all together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: DocPath, expect_version: Option<u64>, value: Value) -> Self {
        self.ops.push(BatchOp {
            path,
            expect_version,
            write: Write::Set(value),
        });
        self
    }

    pub fn merge(
        mut self,
        path: DocPath,
        expect_version: Option<u64>,
        fields: Map<String, Value>,
    ) -> Self {
        self.ops.push(BatchOp {
            path,
            expect_version,
            write: Write::Merge(fields),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed,
    /// A precondition failed; nothing was written.
    Conflict { path: DocPath },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,

    #[error("malformed document: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}

/// Hierarchical document store holding the `orders`, `profiles` and
/// `deliveryStats` collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError>;

    /// Documents whose top-level `field` equals `value`, ordered by key.
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError>;

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when the document is absent.
    async fn merge(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_render_as_collection_and_key() {
        assert_eq!(DocPath::order("o-1").to_string(), "orders/o-1");
        assert_eq!(DocPath::stats("u-9").to_string(), "deliveryStats/u-9");
        assert_eq!(DocPath::profile("u-9").to_string(), "profiles/u-9");
    }

    #[test]
    fn only_transport_failures_are_transient() {
        assert!(StoreError::Timeout.is_transient());
        assert!(StoreError::Unavailable("reset".to_string()).is_transient());
        assert!(!StoreError::NotFound("orders/x".to_string()).is_transient());
        assert!(!StoreError::Serialization("bad".to_string()).is_transient());
    }
}
