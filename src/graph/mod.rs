//! Organizational graph: how decisions and dependencies flow between people.
//!
//! An [`OrganizationalGraph`] is derived from a set of [`Declaration`]s and is
//! never persisted. It carries three views over the same primitives:
//!
//! - **decision flows** ([`flow`]): a Binding writing exactly what a Connector
//!   reads, owned by different Archetypes
//! - **dependencies** ([`dependency`]): declared upstream → downstream
//!   relations between Capabilities
//! - **automation candidates** ([`readiness`]): how well-documented each
//!   Capability is for automation
//!
//! Problems found along the way never abort the computation; they are
//! returned as [`GraphDiagnostic`]s next to the result.

pub mod compute;
pub mod dependency;
pub mod flow;
pub mod index;
pub mod readiness;

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use crate::declaration::Declaration;
use crate::primitive::{EdgeTargetType, PrimitiveId, Scope};

pub use compute::compute_graph;
pub use readiness::{ReadinessConfig, ReadinessSignal, ReadinessSignals, ReadinessWeights};

/// A decision made under one Archetype reaching another through a shared target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFlow {
    pub from_archetype_id: PrimitiveId,
    #[serde(default)]
    pub from_capability_id: Option<PrimitiveId>,
    pub to_archetype_id: PrimitiveId,
    #[serde(default)]
    pub to_capability_id: Option<PrimitiveId>,
    pub via_binding_id: PrimitiveId,
    pub via_connector_id: PrimitiveId,
    /// The `writes_to` / `reads_from` value both edges share.
    pub target: String,
    pub target_type: EdgeTargetType,
    /// `binding → connector`, followed by the binding's description if any.
    #[serde(default)]
    pub description: String,
}

/// Declared upstream → downstream relation between two Capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub upstream_capability_id: PrimitiveId,
    pub downstream_capability_id: PrimitiveId,
    pub dependency_type: String,
    #[serde(default)]
    pub description: String,
}

/// Automation readiness of one Capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationCandidate {
    pub capability_id: PrimitiveId,
    pub capability_name: String,
    pub archetype_id: PrimitiveId,
    /// Weighted mean of `signals`, in [0, 1].
    pub automation_readiness: f64,
    pub signals: ReadinessSignals,
    /// What the score rests on, e.g. `2 decision factors; 1 heuristic`.
    #[serde(default)]
    pub rationale: String,
    /// Signals scoring below the configured threshold.
    pub missing_elements: Vec<ReadinessSignal>,
    pub recommended_skill_type: String,
}

/// A problem found while computing the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphDiagnostic {
    /// `primitive_id.field` points at something absent from every declaration.
    MissingReference {
        primitive_id: PrimitiveId,
        field: String,
        target_id: PrimitiveId,
    },
    /// An edge matched another but its owning Archetype cannot be determined.
    UnresolvedOwner {
        edge_id: PrimitiveId,
        /// Archetypes in the edge's declaration; ownership is only implied when exactly one.
        archetypes_in_declaration: usize,
    },
    /// Capabilities that (transitively) depend on themselves.
    DependencyCycle { capability_ids: Vec<PrimitiveId> },
    /// The same id carries different content in two declarations; the first was used.
    DivergentCopy {
        primitive_id: PrimitiveId,
        declaration_id: String,
    },
}

impl GraphDiagnostic {
    pub fn missing(
        primitive_id: &PrimitiveId,
        field: &str,
        target_id: &PrimitiveId,
    ) -> Self {
        Self::MissingReference {
            primitive_id: primitive_id.clone(),
            field: field.to_string(),
            target_id: target_id.clone(),
        }
    }
}

impl std::fmt::Display for GraphDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReference {
                primitive_id,
                field,
                target_id,
            } => write!(f, "{primitive_id}.{field} references unknown {target_id}"),
            Self::UnresolvedOwner {
                edge_id,
                archetypes_in_declaration,
            } => write!(
                f,
                "owner of {edge_id} is unresolved ({archetypes_in_declaration} archetypes in declaration)"
            ),
            Self::DependencyCycle { capability_ids } => {
                let ids: Vec<&str> = capability_ids.iter().map(PrimitiveId::as_str).collect();
                write!(f, "dependency cycle: {}", ids.join(" -> "))
            }
            Self::DivergentCopy {
                primitive_id,
                declaration_id,
            } => write!(f, "{primitive_id} differs in {declaration_id}; earlier copy kept"),
        }
    }
}

/// Derived view of how a set of declarations interlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationalGraph {
    pub root_scope: Scope,
    pub declarations: Vec<Declaration>,
    pub decision_flows: Vec<DecisionFlow>,
    pub dependency_map: Vec<Dependency>,
    pub automation_candidates: Vec<AutomationCandidate>,
    pub diagnostics: Vec<GraphDiagnostic>,
}

impl OrganizationalGraph {
    /// Archetype-to-archetype projection of the decision flows.
    ///
    /// Nodes are archetype ids; each flow becomes one edge.
    pub fn flow_graph(&self) -> (DiGraph<PrimitiveId, DecisionFlow>, HashMap<PrimitiveId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<PrimitiveId, NodeIndex> = HashMap::new();
        for flow in &self.decision_flows {
            let from = *nodes
                .entry(flow.from_archetype_id.clone())
                .or_insert_with(|| graph.add_node(flow.from_archetype_id.clone()));
            let to = *nodes
                .entry(flow.to_archetype_id.clone())
                .or_insert_with(|| graph.add_node(flow.to_archetype_id.clone()));
            graph.add_edge(from, to, flow.clone());
        }
        (graph, nodes)
    }

    /// Every archetype a decision by `archetype_id` eventually reaches.
    pub fn downstream_archetypes(&self, archetype_id: &str) -> BTreeSet<PrimitiveId> {
        let (graph, nodes) = self.flow_graph();
        let Some(&start) = nodes.get(archetype_id) else {
            return BTreeSet::new();
        };
        let mut reached = BTreeSet::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            if node != start {
                reached.insert(graph[node].clone());
            }
        }
        reached
    }

    /// Candidates sorted by readiness, most ready first.
    pub fn ranked_candidates(&self) -> Vec<&AutomationCandidate> {
        let mut ranked: Vec<_> = self.automation_candidates.iter().collect();
        ranked.sort_by(|a, b| {
            b.automation_readiness
                .total_cmp(&a.automation_readiness)
                .then_with(|| a.capability_id.cmp(&b.capability_id))
        });
        ranked
    }
}
