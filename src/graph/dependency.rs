//! Capability dependency mapping.
//!
//! Dependencies are declared on the upstream Capability. Each declared
//! relation whose downstream Capability exists becomes one [`Dependency`];
//! cycles are detected with Tarjan's SCC over a petgraph projection and
//! reported without dropping the entries involved.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::primitive::PrimitiveId;

use super::index::GraphIndex;
use super::{Dependency, GraphDiagnostic};

/// Build the dependency map in Capability order.
pub fn map_dependencies(index: &GraphIndex<'_>) -> (Vec<Dependency>, Vec<GraphDiagnostic>) {
    let mut dependencies = Vec::new();
    let mut diagnostics = Vec::new();

    for cap in &index.capability_order {
        for dep in &cap.dependencies {
            if !index
                .capabilities
                .contains_key(dep.downstream_capability_id.as_str())
            {
                diagnostics.push(GraphDiagnostic::missing(
                    &cap.id,
                    "dependencies",
                    &dep.downstream_capability_id,
                ));
                continue;
            }
            dependencies.push(Dependency {
                upstream_capability_id: cap.id.clone(),
                downstream_capability_id: dep.downstream_capability_id.clone(),
                dependency_type: dep.dependency_type.clone(),
                description: dep.description.clone(),
            });
        }
    }

    diagnostics.extend(find_cycles(&dependencies));
    (dependencies, diagnostics)
}

/// Every strongly connected group of two or more Capabilities, plus self-loops.
pub fn find_cycles(dependencies: &[Dependency]) -> Vec<GraphDiagnostic> {
    let mut graph: DiGraph<&PrimitiveId, ()> = DiGraph::new();
    let mut nodes: HashMap<&PrimitiveId, NodeIndex> = HashMap::new();
    for dep in dependencies {
        let (up, down) = (&dep.upstream_capability_id, &dep.downstream_capability_id);
        let from = *nodes.entry(up).or_insert_with(|| graph.add_node(up));
        let to = *nodes.entry(down).or_insert_with(|| graph.add_node(down));
        graph.add_edge(from, to, ());
    }

    let mut cycles: Vec<Vec<PrimitiveId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut ids: Vec<PrimitiveId> = component.iter().map(|&n| graph[n].clone()).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();

    cycles
        .into_iter()
        .map(|capability_ids| GraphDiagnostic::DependencyCycle { capability_ids })
        .collect()
}
