//! Control primitives: how expertise is constrained.

use serde::{Deserialize, Serialize};

use super::{ConfirmationRecord, ExtractionSource, HumanIdentity, PrimitiveId};

/// Filtered projection of Capabilities for a specific caller.
///
/// Views point at Capabilities, never the other way round. They carry no
/// confirmation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub capability_ids: Vec<PrimitiveId>,
    #[serde(default)]
    pub target_archetype_id: Option<PrimitiveId>,
    /// "confirmation", "summary", "operational", "export".
    #[serde(default)]
    pub projection_format: String,
}

impl View {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        name: impl Into<String>,
        capability_ids: Vec<PrimitiveId>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: name.into(),
            description: String::new(),
            capability_ids,
            target_archetype_id: None,
            projection_format: "summary".into(),
        }
    }
}

/// A role bound to one human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub identity: HumanIdentity,
    pub role_name: String,
    #[serde(default)]
    pub role_description: String,
    #[serde(default)]
    pub primary_responsibilities: Vec<String>,
    #[serde(default)]
    pub decision_authority: Vec<String>,
    #[serde(default)]
    pub accountability_boundaries: Vec<String>,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Archetype {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        identity: HumanIdentity,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            identity,
            role_name: role_name.into(),
            role_description: String::new(),
            primary_responsibilities: Vec::new(),
            decision_authority: Vec::new(),
            accountability_boundaries: Vec::new(),
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }
}

/// How strictly a policy is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    /// Never violated.
    Hard,
    /// Overridable with a recorded reason.
    Soft,
}

/// Enforced rule attached to other primitives by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rule: String,
    #[serde(default)]
    pub attaches_to: Vec<PrimitiveId>,
    pub enforcement_level: EnforcementLevel,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Policy {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        name: impl Into<String>,
        rule: impl Into<String>,
        enforcement_level: EnforcementLevel,
    ) -> Self {
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: name.into(),
            description: String::new(),
            rule: rule.into(),
            attaches_to: Vec::new(),
            enforcement_level,
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn attached_to(mut self, id: impl Into<PrimitiveId>) -> Self {
        self.attaches_to.push(id.into());
        self
    }
}
