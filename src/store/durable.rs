//! ACID-durable storage backed by redb.
//!
//! Three tables, all with string keys and JSON-encoded values:
//!
//! - `primitives`: primitive id → [`PrimitiveRecord`]
//! - `provenance`: entry id → [`ProvenanceEntry`]
//! - `declarations`: `scope \0 version` → [`Declaration`]
//!
//! A transition's record and provenance entry share one write transaction.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::declaration::Declaration;
use crate::error::StoreError;
use crate::primitive::PrimitiveRecord;
use crate::provenance::ProvenanceEntry;

use super::{Storage, StoreResult, decode, encode};

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const PRIMITIVES: JsonTable = TableDefinition::new("primitives");
const PROVENANCE: JsonTable = TableDefinition::new("provenance");
const DECLARATIONS: JsonTable = TableDefinition::new("declarations");

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "tml.redb";

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

fn declaration_key(scope_id: &str, version: u64) -> String {
    format!("{scope_id}\0{version:020}")
}

/// ACID-durable storage using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStorage {
    db: Arc<Database>,
}

impl DurableStorage {
    /// Open or create the database in `data_dir`, creating the directory
    /// and every table if missing.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        {
            txn.open_table(PRIMITIVES).map_err(redb_err("open_table"))?;
            txn.open_table(PROVENANCE).map_err(redb_err("open_table"))?;
            txn.open_table(DECLARATIONS).map_err(redb_err("open_table"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn scan<T: serde::de::DeserializeOwned>(
        &self,
        table: JsonTable,
        what: &str,
    ) -> StoreResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(table).map_err(redb_err("open_table"))?;
        let mut out = Vec::new();
        for item in table.iter().map_err(redb_err("iter"))? {
            let (_key, value) = item.map_err(redb_err("iter"))?;
            out.push(decode(what, value.value())?);
        }
        Ok(out)
    }
}

impl Storage for DurableStorage {
    fn get_primitive(&self, id: &str) -> StoreResult<Option<PrimitiveRecord>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(PRIMITIVES).map_err(redb_err("open_table"))?;
        let result = table.get(id).map_err(redb_err("get"))?;
        result
            .map(|guard| decode("primitive", guard.value()))
            .transpose()
    }

    fn list_primitives(&self) -> StoreResult<Vec<PrimitiveRecord>> {
        self.scan(PRIMITIVES, "primitive")
    }

    fn commit(&self, records: &[PrimitiveRecord], entries: &[ProvenanceEntry]) -> StoreResult<()> {
        // Encode everything up front so a serialization failure never opens a transaction.
        let records: Vec<(String, Vec<u8>)> = records
            .iter()
            .map(|r| Ok((r.id().to_string(), encode("primitive", r)?)))
            .collect::<StoreResult<_>>()?;
        let entries: Vec<(String, Vec<u8>)> = entries
            .iter()
            .map(|e| Ok((e.id.clone(), encode("provenance entry", e)?)))
            .collect::<StoreResult<_>>()?;

        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(PRIMITIVES).map_err(redb_err("open_table"))?;
            for (key, value) in &records {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(redb_err("insert"))?;
            }
        }
        {
            let mut table = txn.open_table(PROVENANCE).map_err(redb_err("open_table"))?;
            for (key, value) in &entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(redb_err("insert"))?;
            }
        }
        txn.commit().map_err(redb_err("commit"))?;
        Ok(())
    }

    fn list_provenance(&self) -> StoreResult<Vec<ProvenanceEntry>> {
        self.scan(PROVENANCE, "provenance entry")
    }

    fn put_declaration(&self, declaration: &Declaration) -> StoreResult<()> {
        let key = declaration_key(declaration.scope.id.as_str(), declaration.version);
        let value = encode("declaration", declaration)?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(DECLARATIONS).map_err(redb_err("open_table"))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;
        Ok(())
    }

    fn list_declarations(&self, scope_id: &str) -> StoreResult<Vec<Declaration>> {
        let start = format!("{scope_id}\0");
        let end = format!("{scope_id}\u{1}");
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(DECLARATIONS).map_err(redb_err("open_table"))?;
        let mut out = Vec::new();
        for item in table
            .range(start.as_str()..end.as_str())
            .map_err(redb_err("range"))?
        {
            let (_key, value) = item.map_err(redb_err("range"))?;
            out.push(decode("declaration", value.value())?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for DurableStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStorage").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Capability, HumanIdentity};
    use crate::provenance::{ProvenanceAction, ProvenanceLedger};
    use tempfile::TempDir;

    fn record(id: &str) -> PrimitiveRecord {
        PrimitiveRecord::new(Capability::new(id, "org", "dom", id).into(), 3)
    }

    #[test]
    fn commit_and_get() {
        let dir = TempDir::new().unwrap();
        let store = DurableStorage::open(dir.path()).unwrap();
        let rec = record("cap-1");
        let mut entry = ProvenanceEntry::about(
            &rec.primitive,
            ProvenanceAction::Confirmed,
            &HumanIdentity::new("a@example.com", "A"),
            9,
        );
        entry.id = ProvenanceLedger::id_at(0);

        store.commit_transition(&rec, &entry).unwrap();
        assert_eq!(store.get_primitive("cap-1").unwrap(), Some(rec));
        assert!(store.get_primitive("missing").unwrap().is_none());
        assert_eq!(store.list_provenance().unwrap(), vec![entry]);
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStorage::open(dir.path()).unwrap();
            store.put_primitive(&record("cap-b")).unwrap();
            store.put_primitive(&record("cap-a")).unwrap();
        }
        let store = DurableStorage::open(dir.path()).unwrap();
        let ids: Vec<_> = store
            .list_primitives()
            .unwrap()
            .into_iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["cap-a", "cap-b"]);
    }

    #[test]
    fn provenance_lists_in_append_order_past_eight_digits() {
        let dir = TempDir::new().unwrap();
        let store = DurableStorage::open(dir.path()).unwrap();
        let rec = record("cap-1");
        let actor = HumanIdentity::new("a@example.com", "A");
        let entries: Vec<ProvenanceEntry> = [99_999_999, 100_000_000, 7]
            .into_iter()
            .map(|position| {
                let mut entry =
                    ProvenanceEntry::about(&rec.primitive, ProvenanceAction::Flagged, &actor, 1);
                entry.id = ProvenanceLedger::id_at(position);
                entry
            })
            .collect();
        store.commit(&[rec.clone()], &entries).unwrap();

        let ids: Vec<String> = store
            .list_provenance()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        let expected: Vec<String> = [7, 99_999_999, 100_000_000]
            .into_iter()
            .map(ProvenanceLedger::id_at)
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn declaration_keys_sort_by_version() {
        assert!(declaration_key("org", 9) < declaration_key("org", 10));
        assert!(declaration_key("org", u64::MAX) < format!("org\u{1}"));
    }
}
