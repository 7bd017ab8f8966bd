//! The nine TML primitives.
//!
//! The primitive set is closed and forms a 3x3 grid:
//!
//! ```text
//!               Context        Control        Interaction
//!     Boundary  Scope          View           Connector
//!     Commit    Domain         Archetype      Binding
//!     Truth     Capability     Policy         Provenance
//! ```
//!
//! Every primitive except a root [`Scope`] declares the scope it lives in.
//! Cross-references are plain [`PrimitiveId`]s resolved through an
//! [`Arena`](arena::Arena); no primitive ever holds a live reference to another.
//! Provenance entries live in the append-only
//! [`ProvenanceLedger`](crate::provenance::ProvenanceLedger), not the arena.

pub mod arena;
pub mod confirmation;
pub mod context;
pub mod control;
pub mod interaction;
pub mod validate;

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

pub use confirmation::{ConfirmationAction, ConfirmationRecord, ConfirmationStatus};
pub use context::{
    Capability, CapabilityDependency, DecisionFactor, Domain, ExceptionRule, Scope,
    SkillReference, WeightTier,
};
pub use control::{Archetype, EnforcementLevel, Policy, View};
pub use interaction::{Binding, Connector, EdgeTargetType};

/// Opaque identifier of a primitive.
///
/// Identifiers are assigned by the structuring collaborator and are unique
/// across all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimitiveId(String);

impl PrimitiveId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrimitiveId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PrimitiveId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PrimitiveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PrimitiveId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A real person, anchored to an identity provider.
///
/// Not a primitive: Archetypes and confirmation records point at it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HumanIdentity {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

impl HumanIdentity {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            title: None,
            department: None,
            workspace_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Where a primitive was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSource {
    /// Source family, e.g. "confluence", "web", "interview".
    pub source_type: String,
    /// URL, space key, interviewee email, ...
    pub source_identifier: String,
    /// Seconds since UNIX epoch.
    pub extracted_at: u64,
}

/// The closed set of primitive kinds. No tenth kind exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Scope,
    Domain,
    Capability,
    View,
    Archetype,
    Policy,
    Connector,
    Binding,
    Provenance,
}

impl PrimitiveKind {
    /// Lowercase name used in errors, provenance entries and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scope => "scope",
            Self::Domain => "domain",
            Self::Capability => "capability",
            Self::View => "view",
            Self::Archetype => "archetype",
            Self::Policy => "policy",
            Self::Connector => "connector",
            Self::Binding => "binding",
            Self::Provenance => "provenance",
        }
    }

    /// Whether primitives of this kind carry a [`ConfirmationRecord`].
    pub fn is_confirmable(self) -> bool {
        !matches!(self, Self::View | Self::Provenance)
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any arena-resident primitive.
///
/// Provenance is the ninth kind but is never stored here; see
/// [`crate::provenance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Scope(Scope),
    Domain(Domain),
    Capability(Capability),
    View(View),
    Archetype(Archetype),
    Policy(Policy),
    Connector(Connector),
    Binding(Binding),
}

impl Primitive {
    pub fn id(&self) -> &PrimitiveId {
        match self {
            Self::Scope(p) => &p.id,
            Self::Domain(p) => &p.id,
            Self::Capability(p) => &p.id,
            Self::View(p) => &p.id,
            Self::Archetype(p) => &p.id,
            Self::Policy(p) => &p.id,
            Self::Connector(p) => &p.id,
            Self::Binding(p) => &p.id,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Scope(_) => PrimitiveKind::Scope,
            Self::Domain(_) => PrimitiveKind::Domain,
            Self::Capability(_) => PrimitiveKind::Capability,
            Self::View(_) => PrimitiveKind::View,
            Self::Archetype(_) => PrimitiveKind::Archetype,
            Self::Policy(_) => PrimitiveKind::Policy,
            Self::Connector(_) => PrimitiveKind::Connector,
            Self::Binding(_) => PrimitiveKind::Binding,
        }
    }

    /// The scope this primitive lives in.
    ///
    /// For a Scope this is its parent; `None` only for a root Scope.
    pub fn scope_id(&self) -> Option<&PrimitiveId> {
        match self {
            Self::Scope(p) => p.parent_scope_id.as_ref(),
            Self::Domain(p) => Some(&p.scope_id),
            Self::Capability(p) => Some(&p.scope_id),
            Self::View(p) => Some(&p.scope_id),
            Self::Archetype(p) => Some(&p.scope_id),
            Self::Policy(p) => Some(&p.scope_id),
            Self::Connector(p) => Some(&p.scope_id),
            Self::Binding(p) => Some(&p.scope_id),
        }
    }

    pub fn confirmation(&self) -> Option<&ConfirmationRecord> {
        match self {
            Self::Scope(p) => Some(&p.confirmation),
            Self::Domain(p) => Some(&p.confirmation),
            Self::Capability(p) => Some(&p.confirmation),
            Self::View(_) => None,
            Self::Archetype(p) => Some(&p.confirmation),
            Self::Policy(p) => Some(&p.confirmation),
            Self::Connector(p) => Some(&p.confirmation),
            Self::Binding(p) => Some(&p.confirmation),
        }
    }

    pub fn confirmation_mut(&mut self) -> Option<&mut ConfirmationRecord> {
        match self {
            Self::Scope(p) => Some(&mut p.confirmation),
            Self::Domain(p) => Some(&mut p.confirmation),
            Self::Capability(p) => Some(&mut p.confirmation),
            Self::View(_) => None,
            Self::Archetype(p) => Some(&mut p.confirmation),
            Self::Policy(p) => Some(&mut p.confirmation),
            Self::Connector(p) => Some(&mut p.confirmation),
            Self::Binding(p) => Some(&mut p.confirmation),
        }
    }

    /// Current confirmation status; `None` for Views.
    pub fn status(&self) -> Option<ConfirmationStatus> {
        self.confirmation().map(|c| c.status)
    }

    /// The natural-language field a human correction rewrites.
    pub fn principal_text(&self) -> &str {
        match self {
            Self::Scope(p) => &p.description,
            Self::Domain(p) => &p.description,
            Self::Capability(p) => &p.description,
            Self::View(p) => &p.description,
            Self::Archetype(p) => &p.role_description,
            Self::Policy(p) => &p.rule,
            Self::Connector(p) => &p.description,
            Self::Binding(p) => &p.description,
        }
    }

    pub fn set_principal_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self {
            Self::Scope(p) => p.description = text,
            Self::Domain(p) => p.description = text,
            Self::Capability(p) => p.description = text,
            Self::View(p) => p.description = text,
            Self::Archetype(p) => p.role_description = text,
            Self::Policy(p) => p.rule = text,
            Self::Connector(p) => p.description = text,
            Self::Binding(p) => p.description = text,
        }
    }

    /// Where the primitive was extracted from, if recorded.
    pub fn source(&self) -> Option<&ExtractionSource> {
        match self {
            Self::Scope(p) => p.source.as_ref(),
            Self::Domain(p) => p.source.as_ref(),
            Self::Capability(p) => p.source.as_ref(),
            Self::View(_) => None,
            Self::Archetype(p) => p.source.as_ref(),
            Self::Policy(p) => p.source.as_ref(),
            Self::Connector(p) => p.source.as_ref(),
            Self::Binding(p) => p.source.as_ref(),
        }
    }

    /// Fill in the extraction source when the structurer left it blank.
    pub fn stamp_source(&mut self, source: &ExtractionSource) {
        let slot = match self {
            Self::Scope(p) => &mut p.source,
            Self::Domain(p) => &mut p.source,
            Self::Capability(p) => &mut p.source,
            Self::View(_) => return,
            Self::Archetype(p) => &mut p.source,
            Self::Policy(p) => &mut p.source,
            Self::Connector(p) => &mut p.source,
            Self::Binding(p) => &mut p.source,
        };
        if slot.is_none() {
            *slot = Some(source.clone());
        }
    }

    /// Drop any confirmation state. Candidates always enter unconfirmed.
    pub fn reset_confirmation(&mut self) {
        if let Some(record) = self.confirmation_mut() {
            *record = ConfirmationRecord::default();
        }
    }

    pub fn as_scope(&self) -> Option<&Scope> {
        match self {
            Self::Scope(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_domain(&self) -> Option<&Domain> {
        match self {
            Self::Domain(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_capability(&self) -> Option<&Capability> {
        match self {
            Self::Capability(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_archetype(&self) -> Option<&Archetype> {
        match self {
            Self::Archetype(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_policy(&self) -> Option<&Policy> {
        match self {
            Self::Policy(p) => Some(p),
            _ => None,
        }
    }

    /// Ids this primitive points at, including its scope.
    pub fn references(&self) -> Vec<&PrimitiveId> {
        let mut refs: Vec<&PrimitiveId> = self.scope_id().into_iter().collect();
        match self {
            Self::Scope(_) | Self::Archetype(_) => {}
            Self::Domain(p) => refs.push(&p.accountable_archetype_id),
            Self::Capability(p) => {
                refs.push(&p.domain_id);
                refs.extend(p.dependencies.iter().map(|d| &d.downstream_capability_id));
            }
            Self::View(p) => {
                refs.extend(&p.capability_ids);
                refs.extend(p.target_archetype_id.as_ref());
            }
            Self::Policy(p) => refs.extend(&p.attaches_to),
            Self::Connector(p) => {
                refs.extend(&p.governed_by_policy_ids);
                refs.extend(p.owner_capability_id.as_ref());
            }
            Self::Binding(p) => {
                refs.extend(&p.governed_by_policy_ids);
                refs.extend(p.owner_capability_id.as_ref());
            }
        }
        refs
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Primitive {
                fn from(p: $variant) -> Self {
                    Primitive::$variant(p)
                }
            }
        )*
    };
}

impl_from_kind!(Scope, Domain, Capability, View, Archetype, Policy, Connector, Binding);

/// Arena slot: a primitive plus its optimistic-concurrency revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveRecord {
    pub primitive: Primitive,
    /// Bumped on every committed mutation, starting at 1.
    pub revision: u64,
    /// Seconds since UNIX epoch of the last committed mutation.
    pub updated_at: u64,
}

impl PrimitiveRecord {
    pub fn new(primitive: Primitive, updated_at: u64) -> Self {
        Self {
            primitive,
            revision: 1,
            updated_at,
        }
    }

    pub fn id(&self) -> &PrimitiveId {
        self.primitive.id()
    }
}
