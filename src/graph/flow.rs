//! Decision-flow tracing.
//!
//! A Binding that writes to exactly the target a Connector reads from (same
//! string, same target type) carries a decision from the Binding's owner to
//! the Connector's owner. Matching is exact; no fuzzy or normalised
//! comparison is attempted.
//!
//! Ownership of an edge is resolved through
//! `owner_capability_id → Capability → Domain → accountable_archetype_id`.
//! An edge without an owner capability is owned by its declaration's
//! Archetype when the declaration has exactly one.

use std::collections::{BTreeSet, HashMap};

use crate::declaration::Declaration;
use crate::primitive::{Binding, Connector, EdgeTargetType, PrimitiveId};

use super::index::GraphIndex;
use super::{DecisionFlow, GraphDiagnostic};

/// Resolved owner of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeOwner {
    pub archetype_id: PrimitiveId,
    pub capability_id: Option<PrimitiveId>,
}

/// Resolve who owns an edge.
pub fn resolve_owner(
    index: &GraphIndex<'_>,
    edge_id: &PrimitiveId,
    owner_capability_id: Option<&PrimitiveId>,
    declaration: &Declaration,
) -> Result<EdgeOwner, GraphDiagnostic> {
    let Some(cap_id) = owner_capability_id else {
        return match declaration.archetypes.as_slice() {
            [only] => Ok(EdgeOwner {
                archetype_id: only.id.clone(),
                capability_id: None,
            }),
            others => Err(GraphDiagnostic::UnresolvedOwner {
                edge_id: edge_id.clone(),
                archetypes_in_declaration: others.len(),
            }),
        };
    };
    let cap = index
        .capabilities
        .get(cap_id.as_str())
        .ok_or_else(|| GraphDiagnostic::missing(edge_id, "owner_capability_id", cap_id))?;
    let domain = index
        .domains
        .get(cap.domain_id.as_str())
        .ok_or_else(|| GraphDiagnostic::missing(&cap.id, "domain_id", &cap.domain_id))?;
    if !index
        .archetypes
        .contains_key(domain.accountable_archetype_id.as_str())
    {
        return Err(GraphDiagnostic::missing(
            &domain.id,
            "accountable_archetype_id",
            &domain.accountable_archetype_id,
        ));
    }
    Ok(EdgeOwner {
        archetype_id: domain.accountable_archetype_id.clone(),
        capability_id: Some(cap.id.clone()),
    })
}

/// Human-readable trace of a flow: `binding → connector: binding description`.
pub fn describe_flow(binding: &Binding, connector: &Connector) -> String {
    let route = format!("{} → {}", binding.name, connector.name);
    match binding.description.trim() {
        "" => route,
        description => format!("{route}: {description}"),
    }
}

/// Trace every decision flow, sorted by `(via_binding_id, via_connector_id)`.
///
/// Owner problems are reported once per edge, and only for edges that
/// matched a counterpart.
pub fn trace_flows(
    index: &GraphIndex<'_>,
    declarations: &[Declaration],
) -> (Vec<DecisionFlow>, Vec<GraphDiagnostic>) {
    let mut readers: HashMap<(&str, EdgeTargetType), Vec<usize>> = HashMap::new();
    for (i, (connector, _)) in index.connectors.iter().enumerate() {
        readers
            .entry((connector.reads_from.as_str(), connector.reads_from_type))
            .or_default()
            .push(i);
    }

    let mut owners: HashMap<&PrimitiveId, Result<EdgeOwner, GraphDiagnostic>> = HashMap::new();
    let mut reported: BTreeSet<&PrimitiveId> = BTreeSet::new();
    let mut flows = Vec::new();
    let mut diagnostics = Vec::new();

    // Bindings are sorted by id and each reader list is in connector-id order.
    for (binding, b_decl) in &index.bindings {
        let Some(matches) = readers.get(&(binding.writes_to.as_str(), binding.writes_to_type)) else {
            continue;
        };
        let writer = owners
            .entry(&binding.id)
            .or_insert_with(|| {
                resolve_owner(
                    index,
                    &binding.id,
                    binding.owner_capability_id.as_ref(),
                    &declarations[*b_decl],
                )
            })
            .clone();

        for &ci in matches {
            let (connector, c_decl) = index.connectors[ci];
            let reader = owners
                .entry(&connector.id)
                .or_insert_with(|| {
                    resolve_owner(
                        index,
                        &connector.id,
                        connector.owner_capability_id.as_ref(),
                        &declarations[c_decl],
                    )
                })
                .clone();

            match (&writer, reader) {
                (Ok(from), Ok(to)) => {
                    if from.archetype_id == to.archetype_id {
                        continue;
                    }
                    flows.push(DecisionFlow {
                        from_archetype_id: from.archetype_id.clone(),
                        from_capability_id: from.capability_id.clone(),
                        to_archetype_id: to.archetype_id,
                        to_capability_id: to.capability_id,
                        via_binding_id: binding.id.clone(),
                        via_connector_id: connector.id.clone(),
                        target: binding.writes_to.clone(),
                        target_type: binding.writes_to_type,
                        description: describe_flow(binding, connector),
                    });
                }
                (writer, reader) => {
                    if let Err(diag) = writer {
                        if reported.insert(&binding.id) {
                            diagnostics.push(diag.clone());
                        }
                    }
                    if let Err(diag) = reader {
                        if reported.insert(&connector.id) {
                            diagnostics.push(diag);
                        }
                    }
                }
            }
        }
    }

    (flows, diagnostics)
}
