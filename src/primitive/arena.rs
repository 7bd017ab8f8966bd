//! Identifier-indexed storage for primitives.
//!
//! All cross-references between primitives are resolved here by id, so
//! cycles and dangling references are ordinary lookups that return `None`
//! rather than broken pointers.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{Primitive, PrimitiveId, PrimitiveRecord, Scope};

/// Read access to a set of primitives by id.
///
/// Implemented by [`Arena`] and by [`Overlay`], which lets a pending mutation
/// be validated against the arena as if it had already been applied.
pub trait PrimitiveLookup {
    fn primitive(&self, id: &str) -> Option<&Primitive>;

    fn primitives(&self) -> Box<dyn Iterator<Item = &Primitive> + '_>;

    fn scope(&self, id: &str) -> Option<&Scope> {
        self.primitive(id).and_then(Primitive::as_scope)
    }

    /// Scope ids from `scope_id` up to its root, starting with `scope_id`.
    ///
    /// Stops early at a dangling parent or a cycle; use
    /// [`has_scope_cycle`](Self::has_scope_cycle) to tell the two apart.
    fn ancestors_or_self(&self, scope_id: &str) -> Vec<PrimitiveId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.scope(scope_id);
        while let Some(scope) = cursor {
            if !seen.insert(scope.id.clone()) {
                break;
            }
            chain.push(scope.id.clone());
            cursor = scope
                .parent_scope_id
                .as_ref()
                .and_then(|parent| self.scope(parent.as_str()));
        }
        chain
    }

    /// Whether walking parents from `scope_id` revisits a scope.
    fn has_scope_cycle(&self, scope_id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = self.scope(scope_id);
        while let Some(scope) = cursor {
            if !seen.insert(scope.id.as_str()) {
                return true;
            }
            cursor = scope
                .parent_scope_id
                .as_ref()
                .and_then(|parent| self.scope(parent.as_str()));
        }
        false
    }

    fn is_ancestor_or_self(&self, ancestor: &str, scope_id: &str) -> bool {
        self.ancestors_or_self(scope_id)
            .iter()
            .any(|id| id.as_str() == ancestor)
    }

    /// Number of capabilities whose `domain_id` is `domain_id`.
    fn capability_count(&self, domain_id: &str) -> usize {
        self.primitives()
            .filter_map(Primitive::as_capability)
            .filter(|c| c.domain_id.as_str() == domain_id)
            .count()
    }
}

/// Arena of primitive records keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    records: BTreeMap<PrimitiveId, PrimitiveRecord>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&PrimitiveRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Insert or replace a record, returning the previous one.
    pub fn insert(&mut self, record: PrimitiveRecord) -> Option<PrimitiveRecord> {
        self.records.insert(record.id().clone(), record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PrimitiveRecord> {
        self.records.values()
    }

    /// `scope_id` and every scope nested below it.
    pub fn descendants_or_self(&self, scope_id: &str) -> BTreeSet<PrimitiveId> {
        let mut found = BTreeSet::new();
        let Some(root) = self.scope(scope_id) else {
            return found;
        };
        found.insert(root.id.clone());
        // Scopes are few; a fixed-point pass keeps this independent of insertion order.
        loop {
            let before = found.len();
            for scope in self.records.values().filter_map(|r| r.primitive.as_scope()) {
                if let Some(parent) = &scope.parent_scope_id {
                    if found.contains(parent) {
                        found.insert(scope.id.clone());
                    }
                }
            }
            if found.len() == before {
                break;
            }
        }
        found
    }
}

impl PrimitiveLookup for Arena {
    fn primitive(&self, id: &str) -> Option<&Primitive> {
        self.records.get(id).map(|r| &r.primitive)
    }

    fn primitives(&self) -> Box<dyn Iterator<Item = &Primitive> + '_> {
        Box::new(self.records.values().map(|r| &r.primitive))
    }
}

/// An arena with one primitive replaced (or added), without copying the arena.
pub struct Overlay<'a> {
    base: &'a Arena,
    replacement: &'a Primitive,
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a Arena, replacement: &'a Primitive) -> Self {
        Self { base, replacement }
    }
}

impl PrimitiveLookup for Overlay<'_> {
    fn primitive(&self, id: &str) -> Option<&Primitive> {
        if self.replacement.id().as_str() == id {
            Some(self.replacement)
        } else {
            self.base.primitive(id)
        }
    }

    fn primitives(&self) -> Box<dyn Iterator<Item = &Primitive> + '_> {
        let replaced = self.replacement.id().as_str();
        let base = self
            .base
            .records
            .values()
            .map(|r| &r.primitive)
            .filter(move |p| p.id().as_str() != replaced);
        Box::new(base.chain(std::iter::once(self.replacement)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Capability, HumanIdentity};

    fn owner() -> HumanIdentity {
        HumanIdentity::new("owner@example.com", "Owner")
    }

    fn arena_with(primitives: Vec<Primitive>) -> Arena {
        let mut arena = Arena::new();
        for p in primitives {
            arena.insert(PrimitiveRecord::new(p, 0));
        }
        arena
    }

    #[test]
    fn ancestry_walks_to_root() {
        let arena = arena_with(vec![
            Scope::new("org", "Org", owner()).into(),
            Scope::new("eng", "Eng", owner()).with_parent("org").into(),
            Scope::new("infra", "Infra", owner()).with_parent("eng").into(),
        ]);
        let chain: Vec<_> = arena
            .ancestors_or_self("infra")
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(chain, vec!["infra", "eng", "org"]);
        assert!(arena.is_ancestor_or_self("org", "infra"));
        assert!(!arena.is_ancestor_or_self("infra", "org"));
    }

    #[test]
    fn descendants_include_nested_scopes() {
        let arena = arena_with(vec![
            Scope::new("infra", "Infra", owner()).with_parent("eng").into(),
            Scope::new("org", "Org", owner()).into(),
            Scope::new("eng", "Eng", owner()).with_parent("org").into(),
            Scope::new("sales", "Sales", owner()).with_parent("org").into(),
        ]);
        let eng = arena.descendants_or_self("eng");
        assert_eq!(eng.len(), 2);
        assert!(eng.contains("infra"));
        assert!(!eng.contains("sales"));
        assert!(arena.descendants_or_self("missing").is_empty());
    }

    #[test]
    fn cycle_detection() {
        let arena = arena_with(vec![
            Scope::new("a", "A", owner()).with_parent("b").into(),
            Scope::new("b", "B", owner()).with_parent("a").into(),
        ]);
        assert!(arena.has_scope_cycle("a"));
        assert_eq!(arena.ancestors_or_self("a").len(), 2);
    }

    #[test]
    fn overlay_shadows_base() {
        let arena = arena_with(vec![
            Capability::new("cap", "org", "dom-a", "Pricing").into(),
        ]);
        let moved: Primitive = Capability::new("cap", "org", "dom-b", "Pricing").into();
        let overlay = Overlay::new(&arena, &moved);
        assert_eq!(overlay.capability_count("dom-b"), 1);
        assert_eq!(overlay.capability_count("dom-a"), 0);
        assert_eq!(overlay.primitives().count(), 1);
    }
}
