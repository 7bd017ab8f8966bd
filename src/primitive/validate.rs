//! Structural invariants checked before any primitive is accepted.
//!
//! Validation is synchronous and side-effect free: it either returns `Ok(())`
//! or the first violated invariant. Callers apply nothing on error.

use crate::error::ValidationError;

use super::arena::PrimitiveLookup;
use super::{ConfirmationStatus, PrimitiveId, Primitive, PrimitiveKind};

/// Check every structural invariant of `primitive` against `lookup`.
///
/// `lookup` must already contain `primitive` itself (or its pending
/// replacement) so that self-referential checks such as scope cycles see the
/// state being committed.
pub fn validate(primitive: &Primitive, lookup: &impl PrimitiveLookup) -> Result<(), ValidationError> {
    if primitive.id().is_blank() {
        return Err(ValidationError::EmptyId);
    }
    validate_scope(primitive, lookup)?;

    match primitive {
        Primitive::Scope(_) => Ok(()),
        Primitive::Domain(domain) => {
            if domain.accountable_archetype_id.is_blank() {
                return Err(ValidationError::MissingAccountableArchetype {
                    domain_id: domain.id.to_string(),
                });
            }
            resolve(
                lookup,
                &domain.id,
                "accountable_archetype_id",
                &domain.accountable_archetype_id,
                PrimitiveKind::Archetype,
            )
        }
        Primitive::Capability(cap) => {
            resolve(lookup, &cap.id, "domain_id", &cap.domain_id, PrimitiveKind::Domain)?;
            let domain_scope = lookup
                .primitive(cap.domain_id.as_str())
                .and_then(Primitive::scope_id)
                .map(PrimitiveId::as_str)
                .unwrap_or_default();
            let related = lookup.is_ancestor_or_self(domain_scope, cap.scope_id.as_str())
                || lookup.is_ancestor_or_self(cap.scope_id.as_str(), domain_scope);
            if !related {
                return Err(ValidationError::DomainOutsideScopeSubtree {
                    capability_id: cap.id.to_string(),
                    domain_id: cap.domain_id.to_string(),
                });
            }
            for skill in &cap.skills {
                if !(0.0..=1.0).contains(&skill.confidence) {
                    return Err(ValidationError::InvalidSkillConfidence {
                        capability_id: cap.id.to_string(),
                        skill_id: skill.id.clone(),
                        confidence: skill.confidence,
                    });
                }
            }
            Ok(())
        }
        Primitive::View(view) => {
            if view.capability_ids.is_empty() {
                return Err(ValidationError::EmptyView {
                    view_id: view.id.to_string(),
                });
            }
            for cap_id in &view.capability_ids {
                resolve(lookup, &view.id, "capability_ids", cap_id, PrimitiveKind::Capability)?;
            }
            Ok(())
        }
        Primitive::Archetype(archetype) => {
            if archetype.identity.email.trim().is_empty() {
                return Err(ValidationError::MissingIdentity {
                    archetype_id: archetype.id.to_string(),
                });
            }
            Ok(())
        }
        Primitive::Policy(policy) => {
            for target in &policy.attaches_to {
                if lookup.primitive(target.as_str()).is_none() {
                    return Err(ValidationError::DanglingReference {
                        primitive_id: policy.id.to_string(),
                        field: "attaches_to",
                        target_id: target.to_string(),
                        expected: "primitive",
                    });
                }
            }
            Ok(())
        }
        Primitive::Connector(connector) => validate_governance(
            lookup,
            &connector.id,
            &connector.scope_id,
            &connector.governed_by_policy_ids,
        ),
        Primitive::Binding(binding) => validate_governance(
            lookup,
            &binding.id,
            &binding.scope_id,
            &binding.governed_by_policy_ids,
        ),
    }
}

/// Extra invariants that only hold once a primitive is confirmed.
pub fn validate_confirmable(
    primitive: &Primitive,
    lookup: &impl PrimitiveLookup,
) -> Result<(), ValidationError> {
    validate(primitive, lookup)?;
    if let Primitive::Domain(domain) = primitive {
        if lookup.capability_count(domain.id.as_str()) == 0 {
            return Err(ValidationError::DomainWithoutCapability {
                domain_id: domain.id.to_string(),
            });
        }
    }
    Ok(())
}

/// Re-check the primitives whose invariants read `previous`, now that
/// `after` holds its replacement.
///
/// Dependents are everything that references `previous` by id, everything
/// scoped under it when it is a Scope, and the Domain a Capability used to
/// belong to. Only dependents that were valid in `before` can fail here, so
/// records loaded in an invalid state do not block unrelated corrections.
pub fn validate_dependents(
    previous: &Primitive,
    before: &impl PrimitiveLookup,
    after: &impl PrimitiveLookup,
) -> Result<(), ValidationError> {
    let id = previous.id().as_str();
    let former_domain = previous.as_capability().map(|c| c.domain_id.as_str());
    let is_scope = matches!(previous, Primitive::Scope(_));

    for dependent in before.primitives() {
        if dependent.id().as_str() == id {
            continue;
        }
        let depends = dependent.references().iter().any(|r| r.as_str() == id)
            || former_domain == Some(dependent.id().as_str())
            || (is_scope
                && dependent
                    .scope_id()
                    .is_some_and(|scope| before.is_ancestor_or_self(id, scope.as_str())));
        if !depends || check_settled(dependent, before).is_err() {
            continue;
        }
        let Some(current) = after.primitive(dependent.id().as_str()) else {
            continue;
        };
        check_settled(current, after).map_err(|cause| ValidationError::BreaksDependent {
            primitive_id: id.to_string(),
            dependent_id: dependent.id().to_string(),
            cause: Box::new(cause),
        })?;
    }
    Ok(())
}

/// Validate as confirmable when the primitive is confirmed, plainly otherwise.
fn check_settled(primitive: &Primitive, lookup: &impl PrimitiveLookup) -> Result<(), ValidationError> {
    if primitive.status() == Some(ConfirmationStatus::Confirmed) {
        validate_confirmable(primitive, lookup)
    } else {
        validate(primitive, lookup)
    }
}

fn validate_scope(primitive: &Primitive, lookup: &impl PrimitiveLookup) -> Result<(), ValidationError> {
    let id = primitive.id();
    let Some(scope_id) = primitive.scope_id() else {
        // Only a Scope may omit its scope, which makes it a root.
        return match primitive {
            Primitive::Scope(_) => Ok(()),
            _ => Err(ValidationError::MissingScope {
                primitive_id: id.to_string(),
            }),
        };
    };
    if scope_id.is_blank() {
        return Err(ValidationError::MissingScope {
            primitive_id: id.to_string(),
        });
    }
    if lookup.scope(scope_id.as_str()).is_none() {
        return Err(ValidationError::UnknownScope {
            primitive_id: id.to_string(),
            scope_id: scope_id.to_string(),
        });
    }
    if matches!(primitive, Primitive::Scope(_)) && lookup.has_scope_cycle(id.as_str()) {
        return Err(ValidationError::ScopeCycle {
            scope_id: id.to_string(),
        });
    }
    Ok(())
}

fn validate_governance(
    lookup: &impl PrimitiveLookup,
    edge_id: &PrimitiveId,
    edge_scope: &PrimitiveId,
    policy_ids: &[PrimitiveId],
) -> Result<(), ValidationError> {
    for policy_id in policy_ids {
        resolve(lookup, edge_id, "governed_by_policy_ids", policy_id, PrimitiveKind::Policy)?;
        let policy_scope = lookup
            .primitive(policy_id.as_str())
            .and_then(Primitive::scope_id)
            .map(PrimitiveId::as_str)
            .unwrap_or_default();
        if !lookup.is_ancestor_or_self(policy_scope, edge_scope.as_str()) {
            return Err(ValidationError::PolicyScopeMismatch {
                primitive_id: edge_id.to_string(),
                policy_id: policy_id.to_string(),
            });
        }
    }
    Ok(())
}

fn resolve(
    lookup: &impl PrimitiveLookup,
    from: &PrimitiveId,
    field: &'static str,
    target: &PrimitiveId,
    expected: PrimitiveKind,
) -> Result<(), ValidationError> {
    match lookup.primitive(target.as_str()) {
        Some(p) if p.kind() == expected => Ok(()),
        _ => Err(ValidationError::DanglingReference {
            primitive_id: from.to_string(),
            field,
            target_id: target.to_string(),
            expected: expected.as_str(),
        }),
    }
}
