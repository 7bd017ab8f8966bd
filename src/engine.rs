//! Engine facade: top-level API for the TML engine.
//!
//! The `Engine` owns the primitive registry, the declaration assembler and
//! the configuration, and is the single entry point for ingesting,
//! confirming, assembling and graph computation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::declaration::{Declaration, DeclarationAssembler};
use crate::error::{EngineError, NotFoundError, TmlResult};
use crate::graph::{self, OrganizationalGraph, ReadinessConfig};
use crate::primitive::{HumanIdentity, Primitive, PrimitiveId, PrimitiveKind, PrimitiveRecord};
use crate::provenance::ProvenanceEntry;
use crate::registry::{BatchOrigin, Registry, TransitionRequest};
use crate::store::Storage;
use crate::store::durable::DurableStorage;
use crate::structure::{RawContentBatch, Structurer};

/// Configuration for the TML engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether a declaration also carries every descendant scope (default: true).
    pub include_nested_scopes: bool,
    /// Automation-readiness scoring parameters.
    pub readiness: ReadinessConfig,
    /// Data directory for persistence. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_nested_scopes: true,
            readiness: ReadinessConfig::default(),
            data_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.readiness.validate()
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(input: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(input).map_err(|e| EngineError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, EngineError> {
        let file_err = |message: String| EngineError::ConfigFile {
            path: path.display().to_string(),
            message,
        };
        let input = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
        let config: Self = toml::from_str(&input).map_err(|e| file_err(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// A correction proposed by the structuring collaborator.
///
/// `revised` must keep the id and kind of the primitive it replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub corrected_text: String,
    pub revised: Primitive,
}

/// The TML engine.
pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    assembler: DeclarationAssembler,
}

impl Engine {
    /// Create an engine. With a `data_dir`, state is loaded from and written
    /// to a redb database in that directory.
    pub fn new(config: EngineConfig) -> TmlResult<Self> {
        config.validate()?;
        match config.data_dir.clone() {
            Some(dir) => {
                let storage = DurableStorage::open(&dir)?;
                Self::load_from_storage(config, Arc::new(storage))
            }
            None => {
                tracing::info!("initializing memory-only tml engine");
                Ok(Self {
                    assembler: DeclarationAssembler::new(config.include_nested_scopes),
                    registry: Registry::new(),
                    config,
                })
            }
        }
    }

    /// Create an engine on top of `storage`, restoring every stored
    /// primitive and provenance entry and continuing declaration versions.
    pub fn load_from_storage(config: EngineConfig, storage: Arc<dyn Storage>) -> TmlResult<Self> {
        config.validate()?;
        let registry = Registry::restore(storage)?;
        let assembler = DeclarationAssembler::new(config.include_nested_scopes);

        let scopes: Vec<PrimitiveId> = registry.read(|s| {
            s.arena
                .records()
                .filter(|r| r.primitive.kind() == PrimitiveKind::Scope)
                .map(|r| r.id().clone())
                .collect()
        });
        if let Some(storage) = registry.storage() {
            for scope in &scopes {
                if let Some(latest) = storage.get_declaration(scope.as_str())? {
                    assembler.seed(scope, latest.version);
                }
            }
        }

        tracing::info!(
            primitives = registry.len(),
            scopes = scopes.len(),
            persistent = config.data_dir.is_some(),
            "initializing tml engine from storage"
        );
        Ok(Self {
            config,
            registry,
            assembler,
        })
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Insert candidates directly, all or nothing, without provenance.
    pub fn insert(&self, candidates: Vec<Primitive>) -> TmlResult<Vec<PrimitiveId>> {
        self.registry.insert_batch(candidates, None, crate::unix_now())
    }

    /// Structure raw content for `scope_id` and ingest the result as one batch.
    pub fn ingest(
        &self,
        structurer: &dyn Structurer,
        batch: &RawContentBatch,
        scope_id: &PrimitiveId,
        actor: &HumanIdentity,
    ) -> TmlResult<Vec<PrimitiveId>> {
        let candidates = structurer.structure(batch, scope_id)?;
        tracing::info!(
            scope = %scope_id,
            source = %batch.source.source_identifier,
            candidates = candidates.len(),
            "ingesting structured candidates"
        );
        self.registry.insert_batch(
            candidates.primitives,
            Some(BatchOrigin {
                actor,
                source: Some(&batch.source),
            }),
            crate::unix_now(),
        )
    }

    /// Ingest already-structured candidates with a `structured` audit entry each.
    pub fn ingest_candidates(
        &self,
        candidates: Vec<Primitive>,
        actor: &HumanIdentity,
    ) -> TmlResult<Vec<PrimitiveId>> {
        self.registry.insert_batch(
            candidates,
            Some(BatchOrigin {
                actor,
                source: None,
            }),
            crate::unix_now(),
        )
    }

    // -----------------------------------------------------------------------
    // Confirmation
    // -----------------------------------------------------------------------

    pub fn confirm(&self, id: &str, actor: &HumanIdentity) -> TmlResult<PrimitiveRecord> {
        self.transition(TransitionRequest::confirm(id, actor.clone()))
    }

    /// Replace the primitive's principal text and mark it corrected.
    pub fn correct(
        &self,
        id: &str,
        actor: &HumanIdentity,
        corrected_text: &str,
    ) -> TmlResult<PrimitiveRecord> {
        self.transition(TransitionRequest::correct(id, actor.clone(), corrected_text))
    }

    /// Correct with a structurally revised primitive.
    pub fn correct_with(
        &self,
        id: &str,
        actor: &HumanIdentity,
        correction: Correction,
    ) -> TmlResult<PrimitiveRecord> {
        self.transition(
            TransitionRequest::correct(id, actor.clone(), correction.corrected_text)
                .with_revised(correction.revised),
        )
    }

    pub fn flag(&self, id: &str, actor: &HumanIdentity, reason: &str) -> TmlResult<PrimitiveRecord> {
        self.transition(TransitionRequest::flag(id, actor.clone(), reason))
    }

    /// Apply any confirmation action, optionally guarded by an expected revision.
    pub fn transition(&self, request: TransitionRequest) -> TmlResult<PrimitiveRecord> {
        self.registry.transition(request, crate::unix_now())
    }

    // -----------------------------------------------------------------------
    // Declarations and graphs
    // -----------------------------------------------------------------------

    /// Assemble the next declaration version of `scope_id`.
    pub fn assemble(&self, scope_id: &str) -> TmlResult<Declaration> {
        let now = crate::unix_now();
        let declaration = self.registry.read(|state| {
            self.assembler
                .assemble(&state.arena, &state.ledger, scope_id, now)
        })?;
        if let Some(storage) = self.registry.storage() {
            storage.put_declaration(&declaration).inspect_err(|e| {
                tracing::warn!(scope = %scope_id, error = %e, "storage rejected declaration");
            })?;
        }
        tracing::info!(
            scope = %scope_id,
            version = declaration.version,
            confirmed = declaration.confirmed_count,
            unconfirmed = declaration.unconfirmed_count,
            completion = declaration.completion_percentage,
            "assembled declaration"
        );
        Ok(declaration)
    }

    /// Latest stored declaration of `scope_id`.
    pub fn latest_declaration(&self, scope_id: &str) -> TmlResult<Declaration> {
        let stored = match self.registry.storage() {
            Some(storage) => storage.get_declaration(scope_id)?,
            None => None,
        };
        stored.ok_or_else(|| {
            NotFoundError::Declaration {
                scope_id: scope_id.to_string(),
            }
            .into()
        })
    }

    pub fn compute_graph(&self, declarations: Vec<Declaration>) -> TmlResult<OrganizationalGraph> {
        graph::compute_graph(declarations, None, &self.config.readiness)
    }

    pub fn compute_graph_with_root(
        &self,
        declarations: Vec<Declaration>,
        root_scope_id: &str,
    ) -> TmlResult<OrganizationalGraph> {
        graph::compute_graph(declarations, Some(root_scope_id), &self.config.readiness)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn primitive(&self, id: &str) -> TmlResult<PrimitiveRecord> {
        self.registry.get(id).ok_or_else(|| {
            NotFoundError::Primitive { id: id.to_string() }.into()
        })
    }

    /// Provenance history of one primitive, oldest first.
    pub fn provenance(&self, id: &str) -> Vec<ProvenanceEntry> {
        self.registry.provenance(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
