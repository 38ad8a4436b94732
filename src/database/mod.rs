//! Document store abstraction.
//!
//! Records are plain BSON documents keyed by a string `_id`. Services encode
//! their models with [`encode`] and read them back with [`decode`], so any
//! store that can hold documents satisfies the contract.

pub mod memory;
pub mod mongo;

pub use memory::{MemoryStore, Operation};
pub use mongo::MongoStore;

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: String, id: String },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Ordering for [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub descending: bool,
}

impl SortBy {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

/// Direction of a [`DocumentStore::change_counted_set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetChange {
    Add,
    Remove,
}

/// Primitives the engagement services need from a document store.
///
/// The counter and set operations are atomic per record. A negative
/// increment never takes a counter below zero; it is skipped instead.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Records whose top-level fields equal every field in `filter`.
    async fn query(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert a record, assigning an id when it carries none.
    async fn create(&self, collection: &str, record: Document) -> Result<String, StoreError>;

    /// Replace the record stored under `id`, creating it if missing.
    async fn upsert(&self, collection: &str, id: &str, record: Document)
    -> Result<(), StoreError>;

    async fn update(&self, collection: &str, id: &str, fields: Document)
    -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError>;

    /// Add `value` to (or remove it from) the set in `set_field` and move
    /// `counter_field` by one in the same direction, as one write.
    ///
    /// Returns `false` and leaves both fields untouched when the membership
    /// already matched, so the counter always tracks the set size.
    async fn change_counted_set(
        &self,
        collection: &str,
        id: &str,
        set_field: &str,
        counter_field: &str,
        value: Bson,
        change: SetChange,
    ) -> Result<bool, StoreError>;
}

pub fn encode<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    bson::to_document(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(record: Document) -> Result<T, StoreError> {
    bson::from_document(record).map_err(|e| StoreError::Malformed(e.to_string()))
}

/// Fresh record id in the same shape Mongo would assign.
pub fn new_record_id() -> String {
    bson::oid::ObjectId::new().to_hex()
}
