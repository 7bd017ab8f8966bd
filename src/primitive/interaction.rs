//! Interaction primitives: how expertise crosses boundaries.
//!
//! A [`Connector`] is a governed read edge (expertise flowing in), a
//! [`Binding`] a governed write edge (effects flowing out). When a Binding
//! writes to exactly what a Connector reads from, a decision made by one
//! Archetype reaches another; see [`crate::graph::flow`].

use serde::{Deserialize, Serialize};

use super::{ConfirmationRecord, ExtractionSource, PrimitiveId};

/// What an edge reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTargetType {
    Capability,
    Domain,
    ExternalSystem,
}

impl std::fmt::Display for EdgeTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capability => write!(f, "capability"),
            Self::Domain => write!(f, "domain"),
            Self::ExternalSystem => write!(f, "external_system"),
        }
    }
}

/// Governed read access pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub reads_from: String,
    pub reads_from_type: EdgeTargetType,
    #[serde(default)]
    pub governed_by_policy_ids: Vec<PrimitiveId>,
    /// Capability on whose behalf the read happens.
    #[serde(default)]
    pub owner_capability_id: Option<PrimitiveId>,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Connector {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        reads_from: impl Into<String>,
        reads_from_type: EdgeTargetType,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            scope_id: scope_id.into(),
            description: String::new(),
            reads_from: reads_from.into(),
            reads_from_type,
            governed_by_policy_ids: Vec::new(),
            owner_capability_id: None,
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn owned_by(mut self, capability_id: impl Into<PrimitiveId>) -> Self {
        self.owner_capability_id = Some(capability_id.into());
        self
    }

    pub fn governed_by(mut self, policy_id: impl Into<PrimitiveId>) -> Self {
        self.governed_by_policy_ids.push(policy_id.into());
        self
    }
}

/// Governed write access link that commits effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: PrimitiveId,
    pub scope_id: PrimitiveId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub writes_to: String,
    pub writes_to_type: EdgeTargetType,
    #[serde(default)]
    pub governed_by_policy_ids: Vec<PrimitiveId>,
    /// Capability whose decision the write commits.
    #[serde(default)]
    pub owner_capability_id: Option<PrimitiveId>,
    #[serde(default)]
    pub confirmation: ConfirmationRecord,
    #[serde(default)]
    pub source: Option<ExtractionSource>,
}

impl Binding {
    pub fn new(
        id: impl Into<PrimitiveId>,
        scope_id: impl Into<PrimitiveId>,
        writes_to: impl Into<String>,
        writes_to_type: EdgeTargetType,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            scope_id: scope_id.into(),
            description: String::new(),
            writes_to: writes_to.into(),
            writes_to_type,
            governed_by_policy_ids: Vec::new(),
            owner_capability_id: None,
            confirmation: ConfirmationRecord::default(),
            source: None,
        }
    }

    pub fn owned_by(mut self, capability_id: impl Into<PrimitiveId>) -> Self {
        self.owner_capability_id = Some(capability_id.into());
        self
    }

    pub fn governed_by(mut self, policy_id: impl Into<PrimitiveId>) -> Self {
        self.governed_by_policy_ids.push(policy_id.into());
        self
    }
}
