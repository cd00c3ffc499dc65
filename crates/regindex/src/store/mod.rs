//! Document store for image records.
//!
//! Records are JSON documents addressed by a percent-encoded key and guarded
//! by a revision token (`_rev`): every update and delete must name the
//! revision it replaces.
//!
//! # Module Structure
//!
//! - [`couchdb`] - CouchDB HTTP backend
//! - [`memory`] - In-process backend with the same revision semantics
//! - [`diff`] - Structural comparison of documents
//! - [`upsert`] - Diff-gated writes
//! - [`catalog`] - Queries by identity, hash and registry

pub mod catalog;
pub mod couchdb;
pub mod diff;
pub mod memory;
pub mod upsert;

use async_trait::async_trait;
use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

pub use couchdb::CouchStore;
pub use diff::{DiffPolicy, DocumentDiff, diff_documents};
pub use memory::MemoryStore;
pub use upsert::{StoredRecord, WriteOutcome, store};

/// Field holding the document id.
pub const ID_FIELD: &str = "_id";
/// Field holding the revision token.
pub const REV_FIELD: &str = "_rev";

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The revision named by a write is no longer current.
    #[error("Document update conflict: {id}")]
    Conflict { id: String },

    /// The document does not exist.
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// The store returned an unexpected status.
    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("Store HTTP error: {0}")]
    Http(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record did not serialise to a JSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored JSON document, including its `_id` and `_rev`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn rev(&self) -> Option<&str> {
        self.fields.get(REV_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Deserialize the document body into a record type. Store-internal
    /// fields are ignored by types that do not declare them.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Storage backend for JSON documents with optimistic concurrency.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Create (`rev = None`) or replace (`rev = Some(current)`) a document.
    ///
    /// Returns the stored document with its new `_id` and `_rev`.
    async fn put(&self, id: &str, rev: Option<&str>, body: Map<String, Value>) -> Result<Document>;

    /// Delete the given revision of a document.
    async fn delete(&self, id: &str, rev: &str) -> Result<()>;

    /// All documents whose top-level `field` equals `value`.
    async fn find(&self, field: &str, value: &Value) -> Result<Vec<Document>>;

    /// Every distinct string value of a top-level field across the store.
    async fn distinct(&self, field: &str) -> Result<BTreeSet<String>>;

    /// Make sure an index on a top-level field exists.
    async fn ensure_index(&self, field: &str) -> Result<()>;
}

/// Document id for a stable key: every byte outside `[A-Za-z0-9-_.~]` is
/// percent-encoded, so `/` never splits the id.
pub fn document_id(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}
