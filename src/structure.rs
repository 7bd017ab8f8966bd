//! Structuring collaborator seam.
//!
//! Turning raw elicited content into typed primitives is done outside the
//! core (usually by a language model). The engine only sees the resulting
//! [`CandidateSet`], which it validates as one all-or-nothing batch.

use serde::{Deserialize, Serialize};

use crate::error::StructureError;
use crate::primitive::{ExtractionSource, Primitive, PrimitiveId};

/// Raw content awaiting structuring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContentBatch {
    pub source: ExtractionSource,
    pub content: String,
}

impl RawContentBatch {
    pub fn new(source: ExtractionSource, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
        }
    }
}

/// Candidate primitives produced by a structurer, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub primitives: Vec<Primitive>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

/// Produces candidate primitives for `scope_id` from raw content.
pub trait Structurer: Send + Sync {
    fn structure(
        &self,
        batch: &RawContentBatch,
        scope_id: &PrimitiveId,
    ) -> Result<CandidateSet, StructureError>;
}

/// Accepts content that is already a JSON candidate set.
///
/// Both `{"primitives": [...]}` and a bare array of primitives are accepted.
/// Invariants are left to the registry; the only check made here is that
/// every non-Scope candidate sits in the requested scope or in a Scope
/// declared by the same batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStructurer;

#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateDocument {
    Set(CandidateSet),
    List(Vec<Primitive>),
}

impl Structurer for JsonStructurer {
    fn structure(
        &self,
        batch: &RawContentBatch,
        scope_id: &PrimitiveId,
    ) -> Result<CandidateSet, StructureError> {
        let malformed = |message: String| StructureError::Malformed {
            source_identifier: batch.source.source_identifier.clone(),
            message,
        };
        let document: CandidateDocument =
            serde_json::from_str(&batch.content).map_err(|e| malformed(e.to_string()))?;
        let set = match document {
            CandidateDocument::Set(set) => set,
            CandidateDocument::List(primitives) => CandidateSet { primitives },
        };

        let declared_scopes: Vec<&PrimitiveId> = set
            .primitives
            .iter()
            .filter_map(Primitive::as_scope)
            .map(|s| &s.id)
            .collect();
        for candidate in &set.primitives {
            if candidate.as_scope().is_some() {
                continue;
            }
            let Some(owner) = candidate.scope_id() else {
                continue;
            };
            if owner != scope_id && !declared_scopes.contains(&owner) {
                return Err(malformed(format!(
                    "candidate {} belongs to scope {owner}, outside {scope_id}",
                    candidate.id()
                )));
            }
        }

        tracing::debug!(
            source = %batch.source.source_identifier,
            scope = %scope_id,
            candidates = set.len(),
            "structured candidate batch"
        );
        Ok(set)
    }
}
