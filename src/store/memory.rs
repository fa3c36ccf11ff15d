use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::store::{
    BatchOp, Collection, CommitOutcome, DocPath, DocumentStore, Snapshot, StoreError, Write,
    WriteBatch,
};

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    data: Value,
}

type Documents = HashMap<Collection, BTreeMap<String, Entry>>;

/// A thread-safe in-memory document store.
///
/// Every document carries a version that increments on each write, and
/// batches are applied under a single write lock so their preconditions and
/// writes are atomic with respect to every other call.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    documents: Arc<RwLock<Documents>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        let documents = self.documents.read().await;
        documents.get(&collection).map_or(0, BTreeMap::len)
    }
}

fn current_version(documents: &Documents, path: &DocPath) -> u64 {
    documents
        .get(&path.collection)
        .and_then(|docs| docs.get(&path.id))
        .map_or(0, |entry| entry.version)
}

fn write_entry(documents: &mut Documents, path: &DocPath, value: Value) {
    let docs = documents.entry(path.collection).or_default();
    let version = docs.get(&path.id).map_or(0, |entry| entry.version) + 1;
    docs.insert(path.id.clone(), Entry { version, data: value });
}

fn merged_value(
    documents: &Documents,
    path: &DocPath,
    fields: &Map<String, Value>,
) -> Result<Value, StoreError> {
    let entry = documents
        .get(&path.collection)
        .and_then(|docs| docs.get(&path.id))
        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

    let mut object = match &entry.data {
        Value::Object(object) => object.clone(),
        _ => {
            return Err(StoreError::Serialization(format!(
                "{path} is not an object and cannot be merged"
            )));
        }
    };

    for (key, value) in fields {
        object.insert(key.clone(), value.clone());
    }

    Ok(Value::Object(object))
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|entry| Snapshot {
                id: path.id.clone(),
                version: entry.version,
                data: entry.data.clone(),
            }))
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let documents = self.documents.read().await;
        let Some(docs) = documents.get(&collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, entry)| entry.data.get(field) == Some(value))
            .map(|(id, entry)| Snapshot {
                id: id.clone(),
                version: entry.version,
                data: entry.data.clone(),
            })
            .collect())
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        write_entry(&mut documents, path, value);
        Ok(())
    }

    async fn merge(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let value = merged_value(&documents, path, &fields)?;
        write_entry(&mut documents, path, value);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError> {
        let mut documents = self.documents.write().await;

        for BatchOp {
            path,
            expect_version,
            ..
        } in &batch.ops
        {
            if let Some(expected) = expect_version
                && current_version(&documents, path) != *expected
            {
                return Ok(CommitOutcome::Conflict { path: path.clone() });
            }
        }

        // Resolve every merge before touching anything so a missing document
        // leaves the whole batch unapplied.
        let mut resolved = Vec::with_capacity(batch.ops.len());
        for op in &batch.ops {
            let value = match &op.write {
                Write::Set(value) => value.clone(),
                Write::Merge(fields) => merged_value(&documents, &op.path, fields)?,
            };
            resolved.push((&op.path, value));
        }

        for (path, value) in resolved {
            write_entry(&mut documents, path, value);
        }

        Ok(CommitOutcome::Committed)
    }
}
