//! Context primitives: where things live.
//!
//! [`Scope`] bounds ownership, [`Domain`] bounds accountability and
//! [`Capability`] is the atomic unit of expertise. A Capability embeds its
//! decision logic as value objects ([`DecisionFactor`], [`ExceptionRule`],
//! [`SkillReference`], [`CapabilityDependency`]) which are not primitives
//! and have no identity of their own in the arena.

use serde::{Deserialize, Serialize};

use super::{ConfirmationRecord, ExtractionSource, HumanIdentity, PrimitiveId};

/// Bounded organizational or ownership context. Scopes nest into a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `None` marks a root scope.
    #[serde(default)]
    pub parent_scope_id: Option<PrimitiveId>,
    pub owner_identity: HumanIdentity,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Scope {
    pub fn new(id: impl Into<PrimitiveId>, name: impl Into<String>, owner: HumanIdentity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            parent_scope_id: None,
            owner_identity: owner,
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<PrimitiveId>) -> Self {
        self.parent_scope_id = Some(parent.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_scope_id.is_none()
    }
}

/// Outcome-based accountability boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub outcome_definition: String,
    pub accountable_archetype_id: PrimitiveId,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Domain {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        name: impl Into<String>,
        accountable_archetype_id: impl Into<PrimitiveId>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: name.into(),
            description: String::new(),
            outcome_definition: String::new(),
            accountable_archetype_id: accountable_archetype_id.into(),
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome_definition = outcome.into();
        self
    }
}

/// Relative importance of a decision factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightTier {
    Primary,
    Secondary,
    Tiebreaker,
}

/// A factor within a Capability's decision logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFactor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<WeightTier>,
}

impl DecisionFactor {
    pub fn new(name: impl Into<String>, weight: Option<WeightTier>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            weight,
        }
    }
}

/// An edge case that overrides the normal decision logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRule {
    /// Condition that activates the exception.
    pub trigger: String,
    /// What happens instead. Blank means the override is still unknown.
    #[serde(default)]
    pub override_description: String,
    #[serde(default)]
    pub reason: String,
}

impl ExceptionRule {
    pub fn new(trigger: impl Into<String>, override_description: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            override_description: override_description.into(),
            reason: String::new(),
        }
    }

    /// Whether the override has been described.
    pub fn is_resolved(&self) -> bool {
        !self.override_description.trim().is_empty()
    }
}

fn default_skill_confidence() -> f32 {
    1.0
}

/// Pointer to an executable skill that operationalizes a Capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReference {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// "agent_skill", "workflow", "tool", "process", "manual", ...
    pub skill_type: String,
    #[serde(default)]
    pub execution_surface: Option<String>,
    #[serde(default)]
    pub skill_uri: Option<String>,
    /// How sure the structuring step is that this skill fits, in [0, 1].
    #[serde(default = "default_skill_confidence")]
    pub confidence: f32,
}

impl SkillReference {
    pub fn new(id: impl Into<String>, name: impl Into<String>, skill_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            skill_type: skill_type.into(),
            execution_surface: None,
            skill_uri: None,
            confidence: default_skill_confidence(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.skill_uri = Some(uri.into());
        self
    }
}

/// Explicit upstream → downstream relation declared on the upstream Capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDependency {
    pub downstream_capability_id: PrimitiveId,
    /// "blocking", "informing", "gating", ... carried through untouched.
    pub dependency_type: String,
    #[serde(default)]
    pub description: String,
}

impl CapabilityDependency {
    pub fn new(downstream: impl Into<PrimitiveId>, dependency_type: impl Into<String>) -> Self {
        Self {
            downstream_capability_id: downstream.into(),
            dependency_type: dependency_type.into(),
            description: String::new(),
        }
    }
}

/// The atomic unit of expertise. Belongs to exactly one Domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub domain_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub decision_factors: Vec<DecisionFactor>,
    #[serde(default)]
    pub heuristics: Vec<String>,
    #[serde(default)]
    pub anti_patterns: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<ExceptionRule>,
    #[serde(default)]
    pub skills: Vec<SkillReference>,
    #[serde(default)]
    pub dependencies: Vec<CapabilityDependency>,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Capability {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        domain_id: impl Into<PrimitiveId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            domain_id: domain_id.into(),
            name: name.into(),
            description: String::new(),
            outcome: String::new(),
            decision_factors: Vec::new(),
            heuristics: Vec::new(),
            anti_patterns: Vec::new(),
            exceptions: Vec::new(),
            skills: Vec::new(),
            dependencies: Vec::new(),
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_factor(mut self, factor: DecisionFactor) -> Self {
        self.decision_factors.push(factor);
        self
    }

    pub fn with_heuristic(mut self, heuristic: impl Into<String>) -> Self {
        self.heuristics.push(heuristic.into());
        self
    }

    pub fn with_exception(mut self, exception: ExceptionRule) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn with_skill(mut self, skill: SkillReference) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn with_dependency(mut self, dependency: CapabilityDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_resolution_ignores_whitespace() {
        assert!(ExceptionRule::new("vip customer", "skip approval").is_resolved());
        assert!(!ExceptionRule::new("vip customer", "   ").is_resolved());
    }

    #[test]
    fn skill_confidence_defaults_when_missing() {
        let json = r#"{"id":"s1","name":"Triage","skill_type":"workflow"}"#;
        let skill: SkillReference = serde_json::from_str(json).unwrap();
        assert!((skill.confidence - 1.0).abs() < f32::EPSILON);
        assert!(skill.skill_uri.is_none());
    }

    #[test]
    fn skill_confidence_is_clamped() {
        let skill = SkillReference::new("s", "S", "tool").with_confidence(3.0);
        assert!((skill.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn capability_builder_accumulates_logic() {
        let cap = Capability::new("cap", "org", "dom", "Pricing")
            .with_factor(DecisionFactor::new("margin", Some(WeightTier::Primary)))
            .with_heuristic("round to nearest 5")
            .with_exception(ExceptionRule::new("strategic account", ""))
            .with_dependency(CapabilityDependency::new("cap-2", "informing"));
        assert_eq!(cap.decision_factors.len(), 1);
        assert_eq!(cap.heuristics.len(), 1);
        assert_eq!(cap.exceptions.len(), 1);
        assert_eq!(cap.dependencies[0].dependency_type, "informing");
    }
}
