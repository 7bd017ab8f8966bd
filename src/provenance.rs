//! Provenance ledger: who did what to which primitive, and when.
//!
//! Every significant action on a primitive appends one [`ProvenanceEntry`].
//! Entries are never mutated or removed; the ledger is indexed by primitive
//! id so a declaration can pull the history of exactly the primitives it
//! carries, in append order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::primitive::{HumanIdentity, Primitive, PrimitiveId, PrimitiveKind};

/// What happened to a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceAction {
    /// Raw content was acquired from a source.
    Extracted,
    /// A structuring step turned content into a candidate primitive.
    Structured,
    /// A human confirmed the primitive as accurate.
    Confirmed,
    /// A human rewrote the primitive.
    Corrected,
    /// A human marked the primitive as wrong or incomplete.
    Flagged,
}

impl std::fmt::Display for ProvenanceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Extracted => "extracted",
            Self::Structured => "structured",
            Self::Confirmed => "confirmed",
            Self::Corrected => "corrected",
            Self::Flagged => "flagged",
        };
        f.write_str(name)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Assigned by the ledger when the entry is committed.
    pub id: String,
    pub scope_id: PrimitiveId,
    pub primitive_id: PrimitiveId,
    pub primitive_type: PrimitiveKind,
    pub action: ProvenanceAction,
    pub actor: HumanIdentity,
    /// Seconds since UNIX epoch.
    pub timestamp: u64,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// Snapshot of the primitive before the action, when it changed content.
    #[serde(default)]
    pub previous_state: Option<serde_json::Value>,
}

impl ProvenanceEntry {
    /// A pending entry about `primitive`. The id stays empty until commit.
    ///
    /// A root Scope is recorded against its own id as `scope_id`.
    pub fn about(
        primitive: &Primitive,
        action: ProvenanceAction,
        actor: &HumanIdentity,
        timestamp: u64,
    ) -> Self {
        let scope_id = primitive.scope_id().unwrap_or(primitive.id()).clone();
        Self {
            id: String::new(),
            scope_id,
            primitive_id: primitive.id().clone(),
            primitive_type: primitive.kind(),
            action,
            actor: actor.clone(),
            timestamp,
            details: serde_json::Map::new(),
            previous_state: None,
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_previous_state(mut self, state: serde_json::Value) -> Self {
        self.previous_state = Some(state);
        self
    }
}

/// Append-only sequence of provenance entries with a per-primitive index.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceLedger {
    entries: Vec<ProvenanceEntry>,
    by_primitive: HashMap<PrimitiveId, Vec<usize>>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from entries previously read back from storage.
    pub fn from_entries(entries: impl IntoIterator<Item = ProvenanceEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            ledger.push(entry);
        }
        ledger
    }

    /// Identifier for the entry that would land at `position`.
    ///
    /// Zero-padded to the width of `u64::MAX` so that ids sort like positions;
    /// storage backends list entries in key order.
    pub fn id_at(position: usize) -> String {
        format!("prov-{:020}", position as u64 + 1)
    }

    /// Stamp ids onto pending entries as if appended after the current tail.
    pub fn assign_ids(&self, pending: &mut [ProvenanceEntry]) {
        let base = self.entries.len();
        for (offset, entry) in pending.iter_mut().enumerate() {
            entry.id = Self::id_at(base + offset);
        }
    }

    /// Append an entry whose id was assigned by [`assign_ids`](Self::assign_ids).
    pub fn push(&mut self, entry: ProvenanceEntry) {
        let position = self.entries.len();
        self.by_primitive
            .entry(entry.primitive_id.clone())
            .or_default()
            .push(position);
        self.entries.push(entry);
    }

    /// Entries for one primitive, oldest first.
    pub fn for_primitive(&self, id: &str) -> Vec<&ProvenanceEntry> {
        self.by_primitive
            .get(id)
            .map(|positions| positions.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Entries touching any of `ids`, in append order.
    pub fn for_primitives<'a>(
        &'a self,
        ids: impl Fn(&PrimitiveId) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ProvenanceEntry> + 'a {
        self.entries.iter().filter(move |e| ids(&e.primitive_id))
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
