//! Document/content store contract and the in-memory implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::marker::PhantomData;
use thiserror::Error;

use crate::ids::RecordId;
use crate::records::{Query, Record};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} record not found: {id}")]
    NotFound { kind: &'static str, id: RecordId },

    #[error("content store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    Invalid(String),
}

/// One collection of the content store.
///
/// Reads are idempotent and may be retried; writes carry at-least-once intent.
/// No ordering is assumed between upserts of different ids.
#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError>;

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<T>, StoreError>;

    /// Insert or replace the record with the same id; returns the stored record.
    async fn upsert(&self, item: T) -> Result<T, StoreError>;

    /// Returns whether a record was removed.
    async fn remove(&self, id: &RecordId) -> Result<bool, StoreError>;

    /// Like `find_by_id`, but a missing record is an error.
    async fn get(&self, id: &RecordId) -> Result<T, StoreError> {
        self.find_by_id(id).await?.ok_or(StoreError::NotFound {
            kind: T::KIND,
            id: *id,
        })
    }

    /// First record matching `query`, if any.
    async fn find_one(&self, query: &Query) -> Result<Option<T>, StoreError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.find(&query).await?.into_iter().next())
    }
}

/// Process-local collection. Results are sorted by [`Record::sort_key`].
pub struct MemoryCollection<T: Record> {
    records: DashMap<RecordId, T>,
    _kind: PhantomData<T>,
}

impl<T: Record> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T: Record> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Collection<T> for MemoryCollection<T> {
    async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let mut found: Vec<T> = self
            .records
            .iter()
            .filter(|entry| entry.value().matches(query))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|record| record.sort_key());
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<T>, StoreError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, item: T) -> Result<T, StoreError> {
        self.records.insert(item.id(), item.clone());
        Ok(item)
    }

    async fn remove(&self, id: &RecordId) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }
}
