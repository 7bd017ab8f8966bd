//! Storage collaborators for primitives, provenance and declarations.
//!
//! The core never performs I/O itself; it talks to a [`Storage`]
//! implementation when one is attached to the engine:
//!
//! - [`MemStorage`](mem::MemStorage) keeps everything in concurrent hashmaps (DashMap)
//! - [`DurableStorage`](durable::DurableStorage) persists to ACID transactions (redb)
//!
//! Transitions are written through [`Storage::commit`] *before* the registry
//! applies them in memory, so a failed write leaves no trace anywhere.

pub mod durable;
pub mod mem;

use crate::declaration::Declaration;
use crate::error::StoreError;
use crate::primitive::PrimitiveRecord;
use crate::provenance::ProvenanceEntry;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence backend for the engine.
///
/// Implementations must be safe to share across threads. `commit` must be
/// atomic: either every record and entry is written, or none is.
pub trait Storage: Send + Sync {
    fn get_primitive(&self, id: &str) -> StoreResult<Option<PrimitiveRecord>>;

    /// Insert or replace a single record outside of a transition.
    fn put_primitive(&self, record: &PrimitiveRecord) -> StoreResult<()> {
        self.commit(std::slice::from_ref(record), &[])
    }

    /// Every stored record, in id order.
    fn list_primitives(&self) -> StoreResult<Vec<PrimitiveRecord>>;

    /// Records whose own scope is `scope_id` (nested scopes are not expanded).
    fn list_by_scope(&self, scope_id: &str) -> StoreResult<Vec<PrimitiveRecord>> {
        Ok(self
            .list_primitives()?
            .into_iter()
            .filter(|r| r.primitive.scope_id().is_some_and(|s| s.as_str() == scope_id))
            .collect())
    }

    /// Atomically write a batch of records together with their provenance.
    fn commit(&self, records: &[PrimitiveRecord], entries: &[ProvenanceEntry]) -> StoreResult<()>;

    /// Write one confirmation transition: the updated record and its entry.
    fn commit_transition(
        &self,
        record: &PrimitiveRecord,
        entry: &ProvenanceEntry,
    ) -> StoreResult<()> {
        self.commit(std::slice::from_ref(record), std::slice::from_ref(entry))
    }

    fn append_provenance(&self, entry: &ProvenanceEntry) -> StoreResult<()> {
        self.commit(&[], std::slice::from_ref(entry))
    }

    /// Every provenance entry, in append order.
    fn list_provenance(&self) -> StoreResult<Vec<ProvenanceEntry>>;

    /// Latest stored declaration for a scope.
    fn get_declaration(&self, scope_id: &str) -> StoreResult<Option<Declaration>> {
        Ok(self.list_declarations(scope_id)?.pop())
    }

    fn put_declaration(&self, declaration: &Declaration) -> StoreResult<()>;

    /// Every stored version for a scope, oldest first.
    fn list_declarations(&self, scope_id: &str) -> StoreResult<Vec<Declaration>>;
}

pub(crate) fn encode<T: serde::Serialize>(what: &str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize {what}: {e}"),
    })
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(what: &str, bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize {what}: {e}"),
    })
}
