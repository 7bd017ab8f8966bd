//! Id index over a set of declarations.
//!
//! Declarations overlap (a parent scope's declaration usually carries its
//! children's primitives too), so each id is indexed once: the first copy in
//! input order wins. Later copies whose content differs are reported.

use std::collections::{BTreeMap, HashSet};

use crate::declaration::Declaration;
use crate::primitive::{Archetype, Binding, Capability, Connector, Domain, Scope};

use super::GraphDiagnostic;

/// Borrowed lookups over every primitive carried by the input declarations.
#[derive(Debug, Default)]
pub struct GraphIndex<'a> {
    pub scopes: BTreeMap<&'a str, &'a Scope>,
    pub archetypes: BTreeMap<&'a str, &'a Archetype>,
    pub domains: BTreeMap<&'a str, &'a Domain>,
    pub capabilities: BTreeMap<&'a str, &'a Capability>,
    /// Capabilities in first-seen order.
    pub capability_order: Vec<&'a Capability>,
    /// Edges with the index of the declaration they were first seen in.
    pub connectors: Vec<(&'a Connector, usize)>,
    pub bindings: Vec<(&'a Binding, usize)>,
    pub diagnostics: Vec<GraphDiagnostic>,
}

fn index_into<'a, T: PartialEq>(
    map: &mut BTreeMap<&'a str, &'a T>,
    id: &'a str,
    item: &'a T,
    declaration: &Declaration,
    diagnostics: &mut Vec<GraphDiagnostic>,
) -> bool {
    match map.get(id) {
        None => {
            map.insert(id, item);
            true
        }
        Some(existing) => {
            if *existing != item {
                diagnostics.push(GraphDiagnostic::DivergentCopy {
                    primitive_id: id.into(),
                    declaration_id: declaration.id.clone(),
                });
            }
            false
        }
    }
}

impl<'a> GraphIndex<'a> {
    pub fn build(declarations: &'a [Declaration]) -> Self {
        let mut index = Self::default();
        let mut connector_ids: BTreeMap<&'a str, &'a Connector> = BTreeMap::new();
        let mut binding_ids: BTreeMap<&'a str, &'a Binding> = BTreeMap::new();
        let diags = &mut index.diagnostics;

        for (position, decl) in declarations.iter().enumerate() {
            for scope in std::iter::once(&decl.scope).chain(&decl.child_scopes) {
                index_into(&mut index.scopes, scope.id.as_str(), scope, decl, diags);
            }
            for archetype in &decl.archetypes {
                index_into(&mut index.archetypes, archetype.id.as_str(), archetype, decl, diags);
            }
            for domain in &decl.domains {
                index_into(&mut index.domains, domain.id.as_str(), domain, decl, diags);
            }
            for cap in &decl.capabilities {
                if index_into(&mut index.capabilities, cap.id.as_str(), cap, decl, diags) {
                    index.capability_order.push(cap);
                }
            }
            for connector in &decl.connectors {
                if index_into(&mut connector_ids, connector.id.as_str(), connector, decl, diags) {
                    index.connectors.push((connector, position));
                }
            }
            for binding in &decl.bindings {
                if index_into(&mut binding_ids, binding.id.as_str(), binding, decl, diags) {
                    index.bindings.push((binding, position));
                }
            }
        }

        index.connectors.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        index.bindings.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        index
    }

    /// Scope ids from `scope_id` up through known parents, starting with itself.
    pub fn scope_chain(&self, scope_id: &'a str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(scope_id);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }
            chain.push(id);
            cursor = self
                .scopes
                .get(id)
                .and_then(|s| s.parent_scope_id.as_ref())
                .map(|p| p.as_str());
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{HumanIdentity, Scope};

    fn owner() -> HumanIdentity {
        HumanIdentity::new("o@example.com", "O")
    }

    #[test]
    fn first_copy_wins_and_divergence_is_reported() {
        let mut a = Declaration::empty(Scope::new("org", "Org", owner()), 0);
        a.capabilities.push(Capability::new("cap", "org", "dom", "Original"));
        let mut b = Declaration::empty(Scope::new("org", "Org", owner()), 0);
        b.capabilities.push(Capability::new("cap", "org", "dom", "Renamed"));
        let c = a.clone();

        let decls = vec![a, b, c];
        let index = GraphIndex::build(&decls);
        assert_eq!(index.capability_order.len(), 1);
        assert_eq!(index.capabilities["cap"].name, "Original");
        assert_eq!(index.diagnostics.len(), 1);
    }

    #[test]
    fn scope_chain_stops_at_unknown_parent() {
        let mut decl = Declaration::empty(Scope::new("eng", "Eng", owner()).with_parent("org"), 0);
        decl.child_scopes
            .push(Scope::new("infra", "Infra", owner()).with_parent("eng"));
        let decls = vec![decl];
        let index = GraphIndex::build(&decls);
        assert_eq!(index.scope_chain("infra"), vec!["infra", "eng", "org"]);
    }
}
