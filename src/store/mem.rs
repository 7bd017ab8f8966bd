//! In-memory storage backed by DashMap.
//!
//! Mirrors what [`DurableStorage`](super::durable::DurableStorage) keeps, for
//! tests and short-lived sessions. All data is lost on process exit.

use dashmap::DashMap;

use crate::declaration::Declaration;
use crate::primitive::{PrimitiveId, PrimitiveRecord};
use crate::provenance::ProvenanceEntry;

use super::{Storage, StoreResult};

/// Concurrent in-memory storage using sharded hashmaps.
#[derive(Debug, Default)]
pub struct MemStorage {
    primitives: DashMap<PrimitiveId, PrimitiveRecord>,
    /// Keyed by entry id; ids are zero-padded so key order is append order.
    provenance: DashMap<String, ProvenanceEntry>,
    declarations: DashMap<PrimitiveId, Vec<Declaration>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl Storage for MemStorage {
    fn get_primitive(&self, id: &str) -> StoreResult<Option<PrimitiveRecord>> {
        Ok(self.primitives.get(id).map(|r| r.value().clone()))
    }

    fn list_primitives(&self) -> StoreResult<Vec<PrimitiveRecord>> {
        let mut records: Vec<_> = self.primitives.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }

    fn commit(&self, records: &[PrimitiveRecord], entries: &[ProvenanceEntry]) -> StoreResult<()> {
        for record in records {
            self.primitives.insert(record.id().clone(), record.clone());
        }
        for entry in entries {
            self.provenance.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    fn list_provenance(&self) -> StoreResult<Vec<ProvenanceEntry>> {
        let mut entries: Vec<_> = self.provenance.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    fn put_declaration(&self, declaration: &Declaration) -> StoreResult<()> {
        let mut versions = self
            .declarations
            .entry(declaration.scope.id.clone())
            .or_default();
        versions.retain(|d| d.version != declaration.version);
        versions.push(declaration.clone());
        versions.sort_by_key(|d| d.version);
        Ok(())
    }

    fn list_declarations(&self, scope_id: &str) -> StoreResult<Vec<Declaration>> {
        Ok(self
            .declarations
            .get(scope_id)
            .map(|v| v.value().clone())
            .unwrap_or_default())
    }
}
