//! Persistence and recovery tests for the TML engine.
//!
//! These tests verify that primitives, provenance and declaration versions
//! survive engine restart, and that a failing storage backend never leaves
//! a half-applied transition behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tml_engine::declaration::Declaration;
use tml_engine::engine::{Engine, EngineConfig};
use tml_engine::error::{StoreError, TmlError};
use tml_engine::primitive::{
    Archetype, Capability, ConfirmationStatus, Domain, HumanIdentity, Primitive, PrimitiveRecord,
    Scope,
};
use tml_engine::provenance::{ProvenanceAction, ProvenanceEntry};
use tml_engine::store::mem::MemStorage;
use tml_engine::store::{Storage, StoreResult};

fn persistent_engine(dir: &std::path::Path) -> Engine {
    Engine::new(EngineConfig {
        data_dir: Some(dir.to_path_buf()),
        ..Default::default()
    })
    .unwrap()
}

fn ana() -> HumanIdentity {
    HumanIdentity::new("ana@acme.test", "Ana")
}

fn seed() -> Vec<Primitive> {
    vec![
        Scope::new("acme", "Acme", ana()).into(),
        Archetype::new("arch-cfo", "acme", ana(), "CFO").into(),
        Domain::new("dom-fin", "acme", "Finance", "arch-cfo").into(),
        Capability::new("cap-close", "acme", "dom-fin", "Month-end close").into(),
    ]
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    // First session: ingest, transition and assemble.
    {
        let engine = persistent_engine(dir.path());
        engine.ingest_candidates(seed(), &ana()).unwrap();
        engine
            .correct("cap-close", &ana(), "Closes the books by day 3")
            .unwrap();
        engine.confirm("cap-close", &ana()).unwrap();
        assert_eq!(engine.assemble("acme").unwrap().version, 1);
        assert_eq!(engine.assemble("acme").unwrap().version, 2);
    }

    // Second session: reopen and verify.
    {
        let engine = persistent_engine(dir.path());
        assert_eq!(engine.registry().len(), 4);

        let record = engine.primitive("cap-close").unwrap();
        assert_eq!(record.primitive.status(), Some(ConfirmationStatus::Confirmed));
        assert_eq!(record.primitive.principal_text(), "Closes the books by day 3");
        assert_eq!(record.revision, 3);

        let actions: Vec<_> = engine
            .provenance("cap-close")
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                ProvenanceAction::Structured,
                ProvenanceAction::Corrected,
                ProvenanceAction::Confirmed
            ]
        );

        assert_eq!(engine.latest_declaration("acme").unwrap().version, 2);
        let third = engine.assemble("acme").unwrap();
        assert_eq!(third.version, 3);
        assert!(third.same_content(&engine.latest_declaration("acme").unwrap()));
    }
}

#[test]
fn provenance_ids_continue_after_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let engine = persistent_engine(dir.path());
        engine.ingest_candidates(seed(), &ana()).unwrap();
    }
    let engine = persistent_engine(dir.path());
    engine.confirm("cap-close", &ana()).unwrap();

    let history = engine.provenance("cap-close");
    assert_eq!(history.len(), 2);
    assert!(history[0].id < history[1].id);
    let all_ids: Vec<String> = engine
        .registry()
        .read(|s| s.ledger.entries().iter().map(|e| e.id.clone()).collect());
    let mut deduped = all_ids.clone();
    deduped.dedup();
    assert_eq!(all_ids.len(), 5);
    assert_eq!(deduped, all_ids);
}

/// MemStorage that can be told to reject every write.
#[derive(Default)]
struct FlakyStorage {
    inner: MemStorage,
    failing: AtomicBool,
}

impl FlakyStorage {
    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Redb {
                message: "disk unavailable".into(),
            });
        }
        Ok(())
    }
}

impl Storage for FlakyStorage {
    fn get_primitive(&self, id: &str) -> StoreResult<Option<PrimitiveRecord>> {
        self.inner.get_primitive(id)
    }

    fn list_primitives(&self) -> StoreResult<Vec<PrimitiveRecord>> {
        self.inner.list_primitives()
    }

    fn commit(&self, records: &[PrimitiveRecord], entries: &[ProvenanceEntry]) -> StoreResult<()> {
        self.check()?;
        self.inner.commit(records, entries)
    }

    fn list_provenance(&self) -> StoreResult<Vec<ProvenanceEntry>> {
        self.inner.list_provenance()
    }

    fn put_declaration(&self, declaration: &Declaration) -> StoreResult<()> {
        self.check()?;
        self.inner.put_declaration(declaration)
    }

    fn list_declarations(&self, scope_id: &str) -> StoreResult<Vec<Declaration>> {
        self.inner.list_declarations(scope_id)
    }
}

#[test]
fn storage_failure_leaves_no_in_memory_change() {
    let storage = Arc::new(FlakyStorage::default());
    let engine = Engine::load_from_storage(EngineConfig::default(), storage.clone()).unwrap();
    engine.ingest_candidates(seed(), &ana()).unwrap();
    let before = engine.primitive("cap-close").unwrap();

    storage.failing.store(true, Ordering::SeqCst);
    let err = engine.confirm("cap-close", &ana()).unwrap_err();
    assert!(matches!(err, TmlError::Store(StoreError::Redb { .. })));
    assert_eq!(engine.primitive("cap-close").unwrap(), before);
    assert_eq!(engine.provenance("cap-close").len(), 1);

    // A rejected batch is not applied either.
    let extra = vec![Capability::new("cap-pay", "acme", "dom-fin", "Payables").into()];
    assert!(engine.insert(extra).is_err());
    assert!(engine.primitive("cap-pay").is_err());

    storage.failing.store(false, Ordering::SeqCst);
    let record = engine.confirm("cap-close", &ana()).unwrap();
    assert_eq!(record.revision, before.revision + 1);
    assert_eq!(storage.list_provenance().unwrap().len(), 5);
}

#[test]
fn stored_records_are_trusted_on_load() {
    let storage = Arc::new(MemStorage::new());
    // Domain without its archetype: invalid, but loading does not re-validate.
    storage
        .put_primitive(&PrimitiveRecord::new(
            Domain::new("dom-lost", "acme", "Lost", "arch-gone").into(),
            1,
        ))
        .unwrap();
    let engine = Engine::load_from_storage(EngineConfig::default(), storage).unwrap();
    assert!(engine.primitive("dom-lost").is_ok());
}
