//! In-process document store.
//!
//! Mirrors CouchDB's revision rules closely enough for tests and dry runs:
//! revisions look like `{generation}-{counter}`, writes naming a stale
//! revision fail with [`StoreError::Conflict`], and deletes remove the
//! document outright.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::diff::values_equal;
use super::{Document, DocumentStore, ID_FIELD, REV_FIELD, Result, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    docs: BTreeMap<String, Map<String, Value>>,
    next_counter: u64,
    writes: usize,
    deletes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Physical writes (successful `put` calls) so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Successful deletes so far.
    pub fn delete_count(&self) -> usize {
        self.lock().deletes
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every stored document, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.lock().docs.keys().cloned().collect()
    }
}

fn generation(rev: &str) -> u64 {
    rev.split('-')
        .next()
        .and_then(|g| g.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.lock().docs.get(id).cloned().map(Document::new))
    }

    async fn put(&self, id: &str, rev: Option<&str>, mut body: Map<String, Value>) -> Result<Document> {
        let mut inner = self.lock();
        let current = inner
            .docs
            .get(id)
            .and_then(|doc| doc.get(REV_FIELD))
            .and_then(Value::as_str)
            .map(str::to_string);

        if current.as_deref() != rev {
            return Err(StoreError::Conflict { id: id.to_string() });
        }

        inner.next_counter += 1;
        let new_rev = format!(
            "{}-{:08x}",
            current.as_deref().map_or(0, generation) + 1,
            inner.next_counter
        );
        body.insert(ID_FIELD.to_string(), Value::from(id));
        body.insert(REV_FIELD.to_string(), Value::from(new_rev));
        inner.docs.insert(id.to_string(), body.clone());
        inner.writes += 1;

        Ok(Document::new(body))
    }

    async fn delete(&self, id: &str, rev: &str) -> Result<()> {
        let mut inner = self.lock();
        let current = inner
            .docs
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?
            .get(REV_FIELD)
            .and_then(Value::as_str);

        if current != Some(rev) {
            return Err(StoreError::Conflict { id: id.to_string() });
        }

        inner.docs.remove(id);
        inner.deletes += 1;
        Ok(())
    }

    async fn find(&self, field: &str, value: &Value) -> Result<Vec<Document>> {
        Ok(self
            .lock()
            .docs
            .values()
            .filter(|doc| doc.get(field).is_some_and(|v| values_equal(v, value)))
            .cloned()
            .map(Document::new)
            .collect())
    }

    async fn distinct(&self, field: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .lock()
            .docs
            .values()
            .filter_map(|doc| doc.get(field).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn ensure_index(&self, _field: &str) -> Result<()> {
        Ok(())
    }
}
