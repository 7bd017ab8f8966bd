//! Organizational graph computation.

use rayon::prelude::*;

use crate::declaration::Declaration;
use crate::error::{NotFoundError, TmlResult, ValidationError};
use crate::primitive::Capability;

use super::dependency::map_dependencies;
use super::flow::trace_flows;
use super::index::GraphIndex;
use super::readiness::{ReadinessConfig, ReadinessSignals, rationale, recommended_skill_type};
use super::{AutomationCandidate, GraphDiagnostic, OrganizationalGraph};

/// Compute the organizational graph of `declarations`.
///
/// With `root` unset, the root is the deepest Scope carried by the input
/// that is an ancestor-or-self of every declaration's scope. Reference
/// problems become diagnostics; only an empty input or a missing common root
/// fail.
pub fn compute_graph(
    declarations: Vec<Declaration>,
    root: Option<&str>,
    readiness: &ReadinessConfig,
) -> TmlResult<OrganizationalGraph> {
    if declarations.is_empty() {
        return Err(ValidationError::EmptyGraphInput.into());
    }

    let index = GraphIndex::build(&declarations);
    let root_scope = match root {
        Some(id) => {
            let scope = index
                .scopes
                .get(id)
                .ok_or_else(|| NotFoundError::Scope { id: id.to_string() })?;
            let covers_all = declarations
                .iter()
                .all(|d| index.scope_chain(d.scope.id.as_str()).contains(&id));
            if !covers_all {
                return Err(ValidationError::NoCommonRoot.into());
            }
            (*scope).clone()
        }
        None => common_root(&index, &declarations)
            .ok_or(ValidationError::NoCommonRoot)?,
    };

    let mut diagnostics = index.diagnostics.clone();
    let (decision_flows, flow_diags) = trace_flows(&index, &declarations);
    let (dependency_map, dep_diags) = map_dependencies(&index);
    diagnostics.extend(flow_diags);
    diagnostics.extend(dep_diags);

    let scored: Vec<Result<AutomationCandidate, GraphDiagnostic>> = index
        .capability_order
        .par_iter()
        .map(|cap| score_capability(&index, cap, readiness))
        .collect();
    let mut automation_candidates = Vec::with_capacity(scored.len());
    for result in scored {
        match result {
            Ok(candidate) => automation_candidates.push(candidate),
            Err(diag) => diagnostics.push(diag),
        }
    }

    for diag in &diagnostics {
        tracing::warn!(diagnostic = %diag, "graph diagnostic");
    }
    tracing::info!(
        root = %root_scope.id,
        declarations = declarations.len(),
        flows = decision_flows.len(),
        dependencies = dependency_map.len(),
        candidates = automation_candidates.len(),
        diagnostics = diagnostics.len(),
        "computed organizational graph"
    );

    Ok(OrganizationalGraph {
        root_scope,
        declarations,
        decision_flows,
        dependency_map,
        automation_candidates,
        diagnostics,
    })
}

/// Deepest indexed scope on every declaration's ancestor chain.
fn common_root(
    index: &GraphIndex<'_>,
    declarations: &[Declaration],
) -> Option<crate::primitive::Scope> {
    let chains: Vec<Vec<&str>> = declarations
        .iter()
        .map(|d| index.scope_chain(d.scope.id.as_str()))
        .collect();
    let (first, rest) = chains.split_first()?;
    // Chains run from the scope itself up to the root, so the first hit is the deepest.
    first
        .iter()
        .filter(|id| index.scopes.contains_key(*id))
        .find(|id| rest.iter().all(|chain| chain.contains(id)))
        .and_then(|id| index.scopes.get(id))
        .map(|scope| (*scope).clone())
}

fn score_capability(
    index: &GraphIndex<'_>,
    cap: &Capability,
    readiness: &ReadinessConfig,
) -> Result<AutomationCandidate, GraphDiagnostic> {
    let domain = index
        .domains
        .get(cap.domain_id.as_str())
        .ok_or_else(|| GraphDiagnostic::missing(&cap.id, "domain_id", &cap.domain_id))?;
    let signals = ReadinessSignals::measure(cap, readiness);
    Ok(AutomationCandidate {
        capability_id: cap.id.clone(),
        capability_name: cap.name.clone(),
        archetype_id: domain.accountable_archetype_id.clone(),
        automation_readiness: readiness.score(&signals),
        missing_elements: readiness.missing(&signals),
        signals,
        rationale: rationale(cap),
        recommended_skill_type: recommended_skill_type(cap),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmlError;
    use crate::primitive::{Archetype, Domain, HumanIdentity, Scope};

    fn owner() -> HumanIdentity {
        HumanIdentity::new("o@example.com", "O")
    }

    fn decl(scope: Scope) -> Declaration {
        Declaration::empty(scope, 0)
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = compute_graph(vec![], None, &ReadinessConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            TmlError::Validation(ValidationError::EmptyGraphInput)
        ));
    }

    #[test]
    fn root_is_deepest_common_ancestor() {
        let mut org = decl(Scope::new("org", "Org", owner()));
        org.child_scopes = vec![
            Scope::new("eng", "Eng", owner()).with_parent("org"),
            Scope::new("infra", "Infra", owner()).with_parent("eng"),
            Scope::new("web", "Web", owner()).with_parent("eng"),
        ];
        let infra = decl(Scope::new("infra", "Infra", owner()).with_parent("eng"));
        let web = decl(Scope::new("web", "Web", owner()).with_parent("eng"));

        let graph = compute_graph(
            vec![infra.clone(), web.clone(), org.clone()],
            None,
            &ReadinessConfig::default(),
        )
        .unwrap();
        assert_eq!(graph.root_scope.id.as_str(), "org");

        // Without the org declaration, eng is only known as a parent id.
        let mut eng = decl(Scope::new("eng", "Eng", owner()).with_parent("org"));
        eng.child_scopes = org.child_scopes[1..].to_vec();
        let graph = compute_graph(vec![infra, web, eng], None, &ReadinessConfig::default()).unwrap();
        assert_eq!(graph.root_scope.id.as_str(), "eng");
    }

    #[test]
    fn unrelated_scopes_have_no_root() {
        let a = decl(Scope::new("a", "A", owner()));
        let b = decl(Scope::new("b", "B", owner()));
        let err = compute_graph(vec![a, b], None, &ReadinessConfig::default()).unwrap_err();
        assert!(matches!(err, TmlError::Validation(ValidationError::NoCommonRoot)));
    }

    #[test]
    fn explicit_root_must_cover_every_declaration() {
        let mut org = decl(Scope::new("org", "Org", owner()));
        org.child_scopes = vec![Scope::new("eng", "Eng", owner()).with_parent("org")];
        let eng = decl(Scope::new("eng", "Eng", owner()).with_parent("org"));
        let config = ReadinessConfig::default();

        let graph = compute_graph(vec![org.clone(), eng.clone()], Some("org"), &config).unwrap();
        assert_eq!(graph.root_scope.id.as_str(), "org");
        let err = compute_graph(vec![org.clone(), eng], Some("eng"), &config).unwrap_err();
        assert!(matches!(err, TmlError::Validation(ValidationError::NoCommonRoot)));
        let err = compute_graph(vec![org], Some("nowhere"), &config).unwrap_err();
        assert!(matches!(err, TmlError::NotFound(_)));
    }

    #[test]
    fn candidates_keep_capability_order_and_drop_dangling_domains() {
        let mut d = decl(Scope::new("org", "Org", owner()));
        d.archetypes = vec![Archetype::new("arch", "org", owner(), "Lead")];
        d.domains = vec![Domain::new("dom", "org", "Ops", "arch")];
        d.capabilities = vec![
            Capability::new("z-cap", "org", "dom", "Z"),
            Capability::new("a-cap", "org", "dom", "A"),
            Capability::new("lost", "org", "gone", "Lost"),
        ];
        let graph = compute_graph(vec![d], None, &ReadinessConfig::default()).unwrap();
        let ids: Vec<_> = graph
            .automation_candidates
            .iter()
            .map(|c| c.capability_id.as_str())
            .collect();
        assert_eq!(ids, vec!["z-cap", "a-cap"]);
        assert_eq!(graph.automation_candidates[0].archetype_id.as_str(), "arch");
        assert_eq!(graph.automation_candidates[0].recommended_skill_type, "manual");
        assert_eq!(graph.diagnostics.len(), 1);
    }
}
