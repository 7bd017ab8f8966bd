//! Declarations: versioned, self-contained snapshots of one scope.
//!
//! A [`Declaration`] is the unit of trust. It carries copies of every
//! primitive in its scope (and, by default, nested scopes) together with
//! their provenance, so a later correction produces a new version and never
//! rewrites an old one.

use std::collections::BTreeSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::NotFoundError;
use crate::primitive::arena::{Arena, PrimitiveLookup};
use crate::primitive::{
    Archetype, Binding, Capability, ConfirmationRecord, ConfirmationStatus, Connector, Domain,
    Policy, Primitive, PrimitiveId, Scope, View,
};
use crate::provenance::{ProvenanceEntry, ProvenanceLedger};

/// Complete, versioned declaration of a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Stable per scope: `decl-<scope id>`.
    pub id: String,
    /// Increases by one on every assembly of the scope, starting at 1.
    pub version: u64,
    pub scope: Scope,
    #[serde(default)]
    pub child_scopes: Vec<Scope>,
    #[serde(default)]
    pub archetypes: Vec<Archetype>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub connectors: Vec<Connector>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
    /// Seconds since UNIX epoch.
    pub created_at: u64,
    #[serde(default)]
    pub last_confirmed_at: Option<u64>,
    pub confirmed_count: usize,
    pub unconfirmed_count: usize,
    /// `confirmed / (confirmed + unconfirmed)`, in [0, 1].
    pub completion_percentage: f64,
}

impl Declaration {
    /// Stable declaration id for a scope.
    pub fn id_for(scope_id: &str) -> String {
        format!("decl-{scope_id}")
    }

    /// An empty version-0 declaration of `scope`, filled in by the assembler.
    pub fn empty(scope: Scope, created_at: u64) -> Self {
        Self {
            id: Self::id_for(scope.id.as_str()),
            version: 0,
            scope,
            child_scopes: Vec::new(),
            archetypes: Vec::new(),
            domains: Vec::new(),
            capabilities: Vec::new(),
            views: Vec::new(),
            policies: Vec::new(),
            connectors: Vec::new(),
            bindings: Vec::new(),
            provenance: Vec::new(),
            created_at,
            last_confirmed_at: None,
            confirmed_count: 0,
            unconfirmed_count: 0,
            completion_percentage: 0.0,
        }
    }

    /// Confirmation records of every confirmable primitive. Views carry none.
    fn confirmations(&self) -> impl Iterator<Item = &ConfirmationRecord> {
        std::iter::once(&self.scope.confirmation)
            .chain(self.child_scopes.iter().map(|s| &s.confirmation))
            .chain(self.archetypes.iter().map(|a| &a.confirmation))
            .chain(self.domains.iter().map(|d| &d.confirmation))
            .chain(self.capabilities.iter().map(|c| &c.confirmation))
            .chain(self.policies.iter().map(|p| &p.confirmation))
            .chain(self.connectors.iter().map(|c| &c.confirmation))
            .chain(self.bindings.iter().map(|b| &b.confirmation))
    }

    /// Number of primitives that carry a confirmation record.
    pub fn total_confirmable(&self) -> usize {
        self.confirmations().count()
    }

    /// Recount confirmed/unconfirmed primitives and the completion fraction.
    pub fn recompute_completion(&mut self) -> f64 {
        let (mut confirmed, mut unconfirmed) = (0, 0);
        let mut last = None;
        for record in self.confirmations() {
            if record.status.counts_as_confirmed() {
                confirmed += 1;
                last = last.max(record.confirmed_at);
            } else {
                unconfirmed += 1;
            }
        }
        let total = confirmed + unconfirmed;
        self.confirmed_count = confirmed;
        self.unconfirmed_count = unconfirmed;
        self.last_confirmed_at = last;
        self.completion_percentage = if total == 0 {
            0.0
        } else {
            confirmed as f64 / total as f64
        };
        self.completion_percentage
    }

    /// Equal in every field except `version` and `created_at`.
    pub fn same_content(&self, other: &Self) -> bool {
        let mut a = self.clone();
        a.version = other.version;
        a.created_at = other.created_at;
        a == *other
    }

    /// Every primitive carried, scope first, then by kind in field order.
    pub fn primitives(&self) -> impl Iterator<Item = Primitive> + '_ {
        std::iter::once(Primitive::Scope(self.scope.clone()))
            .chain(self.child_scopes.iter().cloned().map(Primitive::Scope))
            .chain(self.archetypes.iter().cloned().map(Primitive::Archetype))
            .chain(self.domains.iter().cloned().map(Primitive::Domain))
            .chain(self.capabilities.iter().cloned().map(Primitive::Capability))
            .chain(self.views.iter().cloned().map(Primitive::View))
            .chain(self.policies.iter().cloned().map(Primitive::Policy))
            .chain(self.connectors.iter().cloned().map(Primitive::Connector))
            .chain(self.bindings.iter().cloned().map(Primitive::Binding))
    }

    /// Number of primitives with a given status, Views excluded.
    pub fn count_status(&self, status: ConfirmationStatus) -> usize {
        self.confirmations().filter(|c| c.status == status).count()
    }
}

/// Builds declarations from a registry snapshot and hands out versions.
#[derive(Debug, Default)]
pub struct DeclarationAssembler {
    include_nested_scopes: bool,
    versions: DashMap<PrimitiveId, u64>,
}

impl DeclarationAssembler {
    pub fn new(include_nested_scopes: bool) -> Self {
        Self {
            include_nested_scopes,
            versions: DashMap::new(),
        }
    }

    /// Make sure the next version for `scope_id` is above `version`.
    pub fn seed(&self, scope_id: &PrimitiveId, version: u64) {
        let mut current = self.versions.entry(scope_id.clone()).or_insert(0);
        *current = (*current).max(version);
    }

    /// Latest version handed out for `scope_id`, 0 if never assembled.
    pub fn current_version(&self, scope_id: &str) -> u64 {
        self.versions.get(scope_id).map(|v| *v).unwrap_or(0)
    }

    fn next_version(&self, scope_id: &PrimitiveId) -> u64 {
        let mut current = self.versions.entry(scope_id.clone()).or_insert(0);
        *current += 1;
        *current
    }

    /// Assemble the declaration of `scope_id` from a consistent snapshot.
    ///
    /// Never touches confirmation state; only the version counter advances.
    pub fn assemble(
        &self,
        arena: &Arena,
        ledger: &ProvenanceLedger,
        scope_id: &str,
        now: u64,
    ) -> Result<Declaration, NotFoundError> {
        let scope = arena.scope(scope_id).cloned().ok_or_else(|| NotFoundError::Scope {
            id: scope_id.to_string(),
        })?;

        let scopes: BTreeSet<PrimitiveId> = if self.include_nested_scopes {
            arena.descendants_or_self(scope_id)
        } else {
            BTreeSet::from([scope.id.clone()])
        };

        let root_id = scope.id.clone();
        let mut decl = Declaration::empty(scope, now);
        let mut carried: BTreeSet<&PrimitiveId> = BTreeSet::new();

        // Arena iteration is in id order, so every bucket comes out sorted.
        for record in arena.records() {
            let primitive = &record.primitive;
            if let Primitive::Scope(s) = primitive {
                if scopes.contains(&s.id) {
                    carried.insert(&s.id);
                    if s.id != root_id {
                        decl.child_scopes.push(s.clone());
                    }
                }
                continue;
            }
            let Some(owner) = primitive.scope_id() else {
                continue;
            };
            if !scopes.contains(owner) {
                continue;
            }
            carried.insert(primitive.id());
            match primitive {
                Primitive::Scope(_) => {}
                Primitive::Archetype(a) => decl.archetypes.push(a.clone()),
                Primitive::Domain(d) => decl.domains.push(d.clone()),
                Primitive::Capability(c) => decl.capabilities.push(c.clone()),
                Primitive::View(v) => decl.views.push(v.clone()),
                Primitive::Policy(p) => decl.policies.push(p.clone()),
                Primitive::Connector(c) => decl.connectors.push(c.clone()),
                Primitive::Binding(b) => decl.bindings.push(b.clone()),
            }
        }

        decl.provenance = ledger
            .for_primitives(|id| carried.contains(id))
            .cloned()
            .collect();
        decl.recompute_completion();
        decl.version = self.next_version(&root_id);
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{HumanIdentity, PrimitiveRecord};

    fn owner() -> HumanIdentity {
        HumanIdentity::new("owner@example.com", "Owner")
    }

    fn arena() -> Arena {
        let mut arena = Arena::new();
        let primitives: Vec<Primitive> = vec![
            Scope::new("org", "Org", owner()).into(),
            Scope::new("eng", "Eng", owner()).with_parent("org").into(),
            Archetype::new("arch", "org", owner(), "Lead").into(),
            Domain::new("dom", "org", "Delivery", "arch").into(),
            Capability::new("cap-b", "eng", "dom", "B").into(),
            Capability::new("cap-a", "org", "dom", "A").into(),
            View::new("view", "org", "Summary", vec!["cap-a".into()]).into(),
        ];
        for p in primitives {
            arena.insert(PrimitiveRecord::new(p, 0));
        }
        arena
    }

    #[test]
    fn nested_scopes_are_included_and_sorted() {
        let assembler = DeclarationAssembler::new(true);
        let decl = assembler
            .assemble(&arena(), &ProvenanceLedger::new(), "org", 100)
            .unwrap();
        assert_eq!(decl.id, "decl-org");
        assert_eq!(decl.child_scopes.len(), 1);
        let caps: Vec<_> = decl.capabilities.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(caps, vec!["cap-a", "cap-b"]);
        assert_eq!(decl.views.len(), 1);
    }

    #[test]
    fn flat_assembly_skips_nested_scopes() {
        let assembler = DeclarationAssembler::new(false);
        let decl = assembler
            .assemble(&arena(), &ProvenanceLedger::new(), "org", 100)
            .unwrap();
        assert!(decl.child_scopes.is_empty());
        assert_eq!(decl.capabilities.len(), 1);
    }

    #[test]
    fn counts_cover_every_confirmable_primitive() {
        let assembler = DeclarationAssembler::new(true);
        let mut arena = arena();
        let mut cap = arena.get("cap-a").unwrap().clone();
        if let Primitive::Capability(c) = &mut cap.primitive {
            c.confirmation.status = ConfirmationStatus::Corrected;
            c.confirmation.confirmed_at = Some(42);
        }
        arena.insert(cap);
        let decl = assembler
            .assemble(&arena, &ProvenanceLedger::new(), "org", 100)
            .unwrap();
        // org, eng, arch, dom, cap-a, cap-b; the view is not confirmable.
        assert_eq!(decl.total_confirmable(), 6);
        assert_eq!(decl.confirmed_count + decl.unconfirmed_count, 6);
        assert_eq!(decl.confirmed_count, 1);
        assert_eq!(decl.last_confirmed_at, Some(42));
        assert!((decl.completion_percentage - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn versions_increase_and_content_is_stable() {
        let assembler = DeclarationAssembler::new(true);
        let arena = arena();
        let ledger = ProvenanceLedger::new();
        let first = assembler.assemble(&arena, &ledger, "org", 100).unwrap();
        let second = assembler.assemble(&arena, &ledger, "org", 200).unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(first.same_content(&second));
        assert_ne!(first, second);
    }

    #[test]
    fn seeding_continues_from_stored_version() {
        let assembler = DeclarationAssembler::new(true);
        assembler.seed(&"org".into(), 7);
        let decl = assembler
            .assemble(&arena(), &ProvenanceLedger::new(), "org", 0)
            .unwrap();
        assert_eq!(decl.version, 8);
        assert_eq!(assembler.current_version("org"), 8);
    }

    #[test]
    fn unknown_scope_is_not_found() {
        let assembler = DeclarationAssembler::new(true);
        let err = assembler
            .assemble(&arena(), &ProvenanceLedger::new(), "cap-a", 0)
            .unwrap_err();
        assert!(matches!(err, NotFoundError::Scope { .. }));
    }

    #[test]
    fn lone_unconfirmed_scope_has_zero_completion() {
        let mut decl = Declaration::empty(Scope::new("org", "Org", owner()), 0);
        decl.recompute_completion();
        assert_eq!(decl.unconfirmed_count, 1);
        assert_eq!(decl.confirmed_count, 0);
        assert_eq!(decl.completion_percentage, 0.0);
    }
}
