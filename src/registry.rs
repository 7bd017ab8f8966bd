//! Primitive registry: the arena, its provenance ledger and every mutation.
//!
//! The [`Registry`] is the only place primitives change. Both halves of its
//! state sit behind one `RwLock` so that a status change and the provenance
//! entry describing it become visible together.
//!
//! A transition holds the write lock throughout:
//!
//! 1. **plan**: resolve the record, check the state machine, build the
//!    replacement and validate it, plus every primitive that depends on it,
//!    against the arena as if it were applied;
//! 2. **commit**: write to storage (if attached), then apply in memory.
//!
//! Validation and commit therefore see the same arena, and a storage failure
//! aborts before anything in memory changes.

use std::sync::{Arc, RwLock};

use crate::error::{ConflictError, NotFoundError, StoreError, TmlResult, ValidationError};
use crate::primitive::arena::{Arena, Overlay};
use crate::primitive::validate::{validate, validate_confirmable, validate_dependents};
use crate::primitive::{
    ConfirmationAction, ExtractionSource, HumanIdentity, Primitive, PrimitiveId, PrimitiveRecord,
};
use crate::provenance::{ProvenanceAction, ProvenanceEntry, ProvenanceLedger};
use crate::store::Storage;

/// Everything guarded by the registry lock.
#[derive(Debug, Clone, Default)]
pub struct RegistryState {
    pub arena: Arena,
    pub ledger: ProvenanceLedger,
}

/// A requested confirmation action on one primitive.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub primitive_id: PrimitiveId,
    pub actor: HumanIdentity,
    pub action: ConfirmationAction,
    /// Structurally revised primitive accompanying a correction.
    pub revised: Option<Primitive>,
    /// Fail with a conflict unless the record is still at this revision.
    pub expected_revision: Option<u64>,
}

impl TransitionRequest {
    pub fn new(
        primitive_id: impl Into<PrimitiveId>,
        actor: HumanIdentity,
        action: ConfirmationAction,
    ) -> Self {
        Self {
            primitive_id: primitive_id.into(),
            actor,
            action,
            revised: None,
            expected_revision: None,
        }
    }

    pub fn confirm(primitive_id: impl Into<PrimitiveId>, actor: HumanIdentity) -> Self {
        Self::new(primitive_id, actor, ConfirmationAction::Confirm)
    }

    pub fn correct(
        primitive_id: impl Into<PrimitiveId>,
        actor: HumanIdentity,
        corrected_text: impl Into<String>,
    ) -> Self {
        Self::new(
            primitive_id,
            actor,
            ConfirmationAction::Correct {
                corrected_text: corrected_text.into(),
            },
        )
    }

    pub fn flag(
        primitive_id: impl Into<PrimitiveId>,
        actor: HumanIdentity,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            primitive_id,
            actor,
            ConfirmationAction::Flag {
                reason: reason.into(),
            },
        )
    }

    pub fn expecting(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    pub fn with_revised(mut self, revised: Primitive) -> Self {
        self.revised = Some(revised);
        self
    }
}

/// Who and what a batch of candidates came from, for the audit trail.
#[derive(Debug, Clone)]
pub struct BatchOrigin<'a> {
    pub actor: &'a HumanIdentity,
    pub source: Option<&'a ExtractionSource>,
}

/// Planned but not yet committed transition.
struct Plan {
    record: PrimitiveRecord,
    entry: ProvenanceEntry,
}

/// Arena + ledger with optional storage.
pub struct Registry {
    state: RwLock<RegistryState>,
    storage: Option<Arc<dyn Storage>>,
}

impl Registry {
    /// An empty registry without storage.
    pub fn new() -> Self {
        Self::with_state(RegistryState::default(), None)
    }

    fn with_state(state: RegistryState, storage: Option<Arc<dyn Storage>>) -> Self {
        Self {
            state: RwLock::new(state),
            storage,
        }
    }

    /// Load every record and provenance entry from `storage`.
    ///
    /// Stored records are trusted as-is; invariants are enforced again on
    /// their next transition.
    pub fn restore(storage: Arc<dyn Storage>) -> TmlResult<Self> {
        let mut state = RegistryState::default();
        for record in storage.list_primitives()? {
            state.arena.insert(record);
        }
        state.ledger = ProvenanceLedger::from_entries(storage.list_provenance()?);
        tracing::info!(
            primitives = state.arena.len(),
            provenance = state.ledger.len(),
            "restored registry from storage"
        );
        Ok(Self::with_state(state, Some(storage)))
    }

    pub fn storage(&self) -> Option<&Arc<dyn Storage>> {
        self.storage.as_ref()
    }

    /// Run `f` against a consistent snapshot of the registry.
    pub fn read<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        let state = self.state.read().expect("registry lock poisoned");
        f(&state)
    }

    /// Current record for `id`, cloned out of the arena.
    pub fn get(&self, id: &str) -> Option<PrimitiveRecord> {
        self.read(|s| s.arena.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.read(|s| s.arena.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provenance history of one primitive, oldest first.
    pub fn provenance(&self, id: &str) -> Vec<ProvenanceEntry> {
        self.read(|s| s.ledger.for_primitive(id).into_iter().cloned().collect())
    }

    /// Insert a batch of candidates, all or nothing.
    ///
    /// Candidates always enter unconfirmed and may reference one another in
    /// any order. With an `origin`, each candidate also gets a `structured`
    /// provenance entry and inherits the batch source when it has none.
    pub fn insert_batch(
        &self,
        candidates: Vec<Primitive>,
        origin: Option<BatchOrigin<'_>>,
        now: u64,
    ) -> TmlResult<Vec<PrimitiveId>> {
        let mut candidates = candidates;
        for candidate in &mut candidates {
            candidate.reset_confirmation();
            if let Some(source) = origin.as_ref().and_then(|o| o.source) {
                candidate.stamp_source(source);
            }
        }

        let mut state = self.state.write().expect("registry lock poisoned");

        let mut staged = state.arena.clone();
        for candidate in &candidates {
            if candidate.id().is_blank() {
                return Err(ValidationError::EmptyId.into());
            }
            if staged.contains(candidate.id().as_str()) {
                return Err(ValidationError::DuplicateId {
                    id: candidate.id().to_string(),
                }
                .into());
            }
            staged.insert(PrimitiveRecord::new(candidate.clone(), now));
        }
        for candidate in &candidates {
            validate(candidate, &staged)?;
        }

        let records: Vec<PrimitiveRecord> = candidates
            .iter()
            .map(|c| PrimitiveRecord::new(c.clone(), now))
            .collect();
        let mut entries: Vec<ProvenanceEntry> = match &origin {
            Some(origin) => candidates
                .iter()
                .map(|c| structured_entry(c, origin, now))
                .collect(),
            None => Vec::new(),
        };
        state.ledger.assign_ids(&mut entries);

        if let Some(storage) = &self.storage {
            storage.commit(&records, &entries).inspect_err(|e| {
                tracing::warn!(error = %e, candidates = records.len(), "storage rejected batch");
            })?;
        }

        state.arena = staged;
        for entry in entries {
            state.ledger.push(entry);
        }
        let ids: Vec<PrimitiveId> = records.iter().map(|r| r.id().clone()).collect();
        tracing::info!(count = ids.len(), audited = origin.is_some(), "inserted primitives");
        Ok(ids)
    }

    /// Apply one confirmation action atomically with its provenance entry.
    pub fn transition(&self, request: TransitionRequest, now: u64) -> TmlResult<PrimitiveRecord> {
        let mut state = self.state.write().expect("registry lock poisoned");
        let Plan { record, mut entry } = plan_transition(&state.arena, &request, now)?;
        state.ledger.assign_ids(std::slice::from_mut(&mut entry));

        if let Some(storage) = &self.storage {
            storage.commit_transition(&record, &entry).inspect_err(|e| {
                tracing::warn!(
                    primitive = %record.id(),
                    action = request.action.name(),
                    error = %e,
                    "storage rejected transition"
                );
            })?;
        }

        state.arena.insert(record.clone());
        state.ledger.push(entry);
        tracing::info!(
            primitive = %record.id(),
            action = request.action.name(),
            status = ?record.primitive.status(),
            revision = record.revision,
            "committed transition"
        );
        Ok(record)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("primitives", &self.len())
            .field("durable", &self.storage.is_some())
            .finish()
    }
}

fn structured_entry(candidate: &Primitive, origin: &BatchOrigin<'_>, now: u64) -> ProvenanceEntry {
    let mut entry =
        ProvenanceEntry::about(candidate, ProvenanceAction::Structured, origin.actor, now);
    if let Some(source) = candidate.source() {
        entry = entry
            .with_detail("source_type", source.source_type.as_str())
            .with_detail("source_identifier", source.source_identifier.as_str());
    }
    entry
}

fn plan_transition(arena: &Arena, request: &TransitionRequest, now: u64) -> TmlResult<Plan> {
    let id = request.primitive_id.as_str();
    let current = arena.get(id).ok_or_else(|| NotFoundError::Primitive { id: id.to_string() })?;
    let old = &current.primitive;

    if let Some(expected) = request.expected_revision {
        if expected != current.revision {
            return Err(ConflictError::StaleRevision {
                primitive_id: id.to_string(),
                expected,
                actual: current.revision,
            }
            .into());
        }
    }

    let not_confirmable = || ValidationError::NotConfirmable {
        primitive_id: id.to_string(),
        kind: old.kind().to_string(),
    };
    let record = old.confirmation().ok_or_else(not_confirmable)?;
    let next = record
        .apply(&request.action, &request.actor, now, old.principal_text())
        .ok_or_else(|| ValidationError::InvalidTransition {
            primitive_id: id.to_string(),
            from: record.status.to_string(),
            action: request.action.name(),
        })?;

    let mut replacement = match (&request.action, &request.revised) {
        (ConfirmationAction::Correct { .. }, Some(revised)) => {
            if revised.id() != old.id() || revised.kind() != old.kind() {
                return Err(ValidationError::RevisionMismatch {
                    expected: format!("{} {}", old.kind(), old.id()),
                    actual: format!("{} {}", revised.kind(), revised.id()),
                }
                .into());
            }
            revised.clone()
        }
        _ => old.clone(),
    };
    if let ConfirmationAction::Correct { corrected_text } = &request.action {
        replacement.set_principal_text(corrected_text.as_str());
    }
    match replacement.confirmation_mut() {
        Some(slot) => *slot = next,
        None => return Err(not_confirmable().into()),
    }

    let overlay = Overlay::new(arena, &replacement);
    match &request.action {
        ConfirmationAction::Confirm => validate_confirmable(&replacement, &overlay)?,
        ConfirmationAction::Correct { .. } => {
            validate(&replacement, &overlay)?;
            validate_dependents(old, arena, &overlay)?;
        }
        // Flagging marks broken primitives; it must not require them to be valid.
        ConfirmationAction::Flag { .. } => {}
    }

    let mut entry = ProvenanceEntry::about(
        &replacement,
        request.action.provenance_action(),
        &request.actor,
        now,
    )
    .with_detail("previous_status", record.status.to_string());
    match &request.action {
        ConfirmationAction::Confirm => {}
        ConfirmationAction::Correct { corrected_text } => {
            let snapshot = serde_json::to_value(old).map_err(|e| StoreError::Serialization {
                message: format!("failed to snapshot {id}: {e}"),
            })?;
            entry = entry
                .with_detail("original_text", old.principal_text())
                .with_detail("corrected_text", corrected_text.as_str())
                .with_detail("structural", request.revised.is_some())
                .with_previous_state(snapshot);
        }
        ConfirmationAction::Flag { reason } => {
            entry = entry.with_detail("reason", reason.as_str());
        }
    }

    Ok(Plan {
        record: PrimitiveRecord {
            primitive: replacement,
            revision: current.revision + 1,
            updated_at: now,
        },
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmlError;
    use crate::primitive::arena::PrimitiveLookup;
    use crate::primitive::{
        Archetype, Capability, ConfirmationStatus, Domain, Scope, View,
    };

    fn human() -> HumanIdentity {
        HumanIdentity::new("lead@example.com", "Lead")
    }

    fn seeded() -> Registry {
        let registry = Registry::new();
        registry
            .insert_batch(
                vec![
                    Capability::new("cap", "org", "dom", "Pricing").into(),
                    Domain::new("dom", "org", "Revenue", "arch").into(),
                    Archetype::new("arch", "org", human(), "Lead").into(),
                    Scope::new("org", "Org", human()).into(),
                    View::new("view", "org", "Summary", vec!["cap".into()]).into(),
                ],
                None,
                1,
            )
            .unwrap();
        registry
    }

    #[test]
    fn batch_accepts_forward_references() {
        let registry = seeded();
        assert_eq!(registry.len(), 5);
        assert!(registry.provenance("cap").is_empty());
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let registry = seeded();
        let err = registry
            .insert_batch(
                vec![
                    Capability::new("cap-2", "org", "dom", "Ok").into(),
                    Capability::new("cap-3", "org", "ghost", "Bad").into(),
                ],
                None,
                2,
            )
            .unwrap_err();
        assert!(matches!(err, TmlError::Validation(_)));
        assert!(registry.get("cap-2").is_none());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let registry = seeded();
        let err = registry
            .insert_batch(vec![Scope::new("org", "Again", human()).into()], None, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn candidates_enter_unconfirmed() {
        let registry = Registry::new();
        let mut scope = Scope::new("org", "Org", human());
        scope.confirmation.status = ConfirmationStatus::Confirmed;
        registry.insert_batch(vec![scope.into()], None, 1).unwrap();
        let status = registry.get("org").unwrap().primitive.status();
        assert_eq!(status, Some(ConfirmationStatus::Unconfirmed));
    }

    #[test]
    fn audited_batch_writes_structured_entries() {
        let registry = Registry::new();
        let source = ExtractionSource {
            source_type: "interview".into(),
            source_identifier: "lead@example.com".into(),
            extracted_at: 5,
        };
        let actor = human();
        registry
            .insert_batch(
                vec![Scope::new("org", "Org", human()).into()],
                Some(BatchOrigin {
                    actor: &actor,
                    source: Some(&source),
                }),
                6,
            )
            .unwrap();
        let history = registry.provenance("org");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, ProvenanceAction::Structured);
        assert_eq!(history[0].details["source_type"], "interview");
        assert_eq!(
            registry.get("org").unwrap().primitive.source(),
            Some(&source)
        );
    }

    #[test]
    fn confirm_bumps_revision_and_logs() {
        let registry = seeded();
        let record = registry
            .transition(TransitionRequest::confirm("cap", human()), 10)
            .unwrap();
        assert_eq!(record.revision, 2);
        assert_eq!(record.primitive.status(), Some(ConfirmationStatus::Confirmed));
        let history = registry.provenance("cap");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, ProvenanceAction::Confirmed);
        assert_eq!(history[0].scope_id.as_str(), "org");
    }

    #[test]
    fn double_confirm_is_invalid() {
        let registry = seeded();
        registry
            .transition(TransitionRequest::confirm("cap", human()), 10)
            .unwrap();
        let err = registry
            .transition(TransitionRequest::confirm("cap", human()), 11)
            .unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::InvalidTransition { .. })
        ));
        assert_eq!(registry.provenance("cap").len(), 1);
    }

    #[test]
    fn correction_snapshots_previous_state() {
        let registry = seeded();
        let record = registry
            .transition(
                TransitionRequest::correct("cap", human(), "Sets list prices"),
                10,
            )
            .unwrap();
        assert_eq!(record.primitive.principal_text(), "Sets list prices");
        let conf = record.primitive.confirmation().unwrap();
        assert_eq!(conf.original_text.as_deref(), Some(""));
        let entry = &registry.provenance("cap")[0];
        assert_eq!(entry.action, ProvenanceAction::Corrected);
        let previous = entry.previous_state.as_ref().unwrap();
        assert_eq!(previous["description"], "");
    }

    #[test]
    fn structural_correction_must_keep_identity() {
        let registry = seeded();
        let revised: Primitive = Capability::new("other", "org", "dom", "Pricing").into();
        let err = registry
            .transition(
                TransitionRequest::correct("cap", human(), "x").with_revised(revised),
                10,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::RevisionMismatch { .. })
        ));
    }

    #[test]
    fn structural_correction_is_validated() {
        let registry = seeded();
        let revised: Primitive = Capability::new("cap", "org", "ghost", "Pricing").into();
        let err = registry
            .transition(
                TransitionRequest::correct("cap", human(), "x").with_revised(revised),
                10,
            )
            .unwrap_err();
        assert!(matches!(err, TmlError::Validation(_)));
        assert!(registry.provenance("cap").is_empty());
    }

    #[test]
    fn stale_expected_revision_conflicts() {
        let registry = seeded();
        let err = registry
            .transition(TransitionRequest::flag("cap", human(), "unclear").expecting(7), 10)
            .unwrap_err();
        assert!(matches!(err, TmlError::Conflict(_)));
        registry
            .transition(TransitionRequest::flag("cap", human(), "unclear").expecting(1), 10)
            .unwrap();
    }

    #[test]
    fn views_and_unknown_ids() {
        let registry = seeded();
        let err = registry
            .transition(TransitionRequest::confirm("view", human()), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::NotConfirmable { .. })
        ));
        let err = registry
            .transition(TransitionRequest::confirm("nope", human()), 10)
            .unwrap_err();
        assert!(matches!(err, TmlError::NotFound(_)));
    }

    #[test]
    fn concurrent_transitions_on_distinct_ids() {
        let registry = Arc::new(Registry::new());
        let mut batch: Vec<Primitive> = vec![Scope::new("org", "Org", human()).into()];
        for i in 0..16 {
            batch.push(Archetype::new(format!("arch-{i}"), "org", human(), "Role").into());
        }
        registry.insert_batch(batch, None, 1).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .transition(TransitionRequest::confirm(format!("arch-{i}"), human()), 2)
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ids: std::collections::BTreeSet<String> = registry
            .read(|s| s.ledger.entries().iter().map(|e| e.id.clone()).collect());
        assert_eq!(ids.len(), 16);
    }

    #[test]
    fn correction_cannot_strand_confirmed_domain() {
        let registry = seeded();
        registry
            .insert_batch(vec![Domain::new("dom2", "org", "Support", "arch").into()], None, 2)
            .unwrap();
        registry
            .transition(TransitionRequest::confirm("dom", human()), 3)
            .unwrap();

        let moved: Primitive = Capability::new("cap", "org", "dom2", "Pricing").into();
        let err = registry
            .transition(
                TransitionRequest::correct("cap", human(), "Pricing").with_revised(moved),
                4,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::BreaksDependent { .. })
        ));
        let cap = registry.get("cap").unwrap();
        assert_eq!(cap.primitive.as_capability().unwrap().domain_id.as_str(), "dom");
        assert!(registry.provenance("cap").is_empty());
    }

    #[test]
    fn concurrent_confirm_and_move_never_strand_domain() {
        for _ in 0..32 {
            let registry = Arc::new(seeded());
            registry
                .insert_batch(vec![Domain::new("dom2", "org", "Support", "arch").into()], None, 2)
                .unwrap();

            let confirm = {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let _ = registry.transition(TransitionRequest::confirm("dom", human()), 3);
                })
            };
            let relocate = {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let moved: Primitive = Capability::new("cap", "org", "dom2", "Pricing").into();
                    let _ = registry.transition(
                        TransitionRequest::correct("cap", human(), "Pricing").with_revised(moved),
                        3,
                    );
                })
            };
            confirm.join().unwrap();
            relocate.join().unwrap();

            let stranded = registry.read(|s| {
                s.arena.get("dom").unwrap().primitive.status() == Some(ConfirmationStatus::Confirmed)
                    && s.arena.capability_count("dom") == 0
            });
            assert!(!stranded);
        }
    }
}
