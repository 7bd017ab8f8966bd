//! Rich diagnostic error types for the TML engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know whether to fix their
//! input, re-read and retry, or look at the storage backend.
//!
//! There is deliberately no graph-consistency error: dangling references found
//! while computing an organizational graph are reported as
//! [`GraphDiagnostic`](crate::graph::GraphDiagnostic)s alongside the result.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the TML engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum TmlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("primitive id must not be empty")]
    #[diagnostic(
        code(tml::validation::empty_id),
        help("Every primitive needs a non-empty, unique identifier.")
    )]
    EmptyId,

    #[error("primitive {id} already exists")]
    #[diagnostic(
        code(tml::validation::duplicate_id),
        help(
            "Candidates are inserted once. Use `correct` to change an existing \
             primitive instead of inserting it again."
        )
    )]
    DuplicateId { id: String },

    #[error("{primitive_id} does not declare a scope")]
    #[diagnostic(
        code(tml::validation::missing_scope),
        help("Every primitive except a root Scope must carry a non-empty `scope_id`.")
    )]
    MissingScope { primitive_id: String },

    #[error("{primitive_id} declares unknown scope {scope_id}")]
    #[diagnostic(
        code(tml::validation::unknown_scope),
        help(
            "The scope \"{scope_id}\" is not registered. Insert the Scope first, \
             or ingest it in the same batch."
        )
    )]
    UnknownScope {
        primitive_id: String,
        scope_id: String,
    },

    #[error("scope {scope_id} is its own ancestor")]
    #[diagnostic(
        code(tml::validation::scope_cycle),
        help("Scopes form a tree. Point `parent_scope_id` at a scope outside this chain.")
    )]
    ScopeCycle { scope_id: String },

    #[error("{primitive_id}.{field} references {target_id}, which is not a known {expected}")]
    #[diagnostic(
        code(tml::validation::dangling_reference),
        help(
            "Cross-references are resolved by identifier. Make sure \"{target_id}\" \
             exists and is a {expected}."
        )
    )]
    DanglingReference {
        primitive_id: String,
        field: &'static str,
        target_id: String,
        expected: &'static str,
    },

    #[error("capability {capability_id} belongs to domain {domain_id} outside its scope subtree")]
    #[diagnostic(
        code(tml::validation::domain_scope),
        help(
            "A Capability's Domain must live in the same scope subtree: one of the two \
             scopes has to be an ancestor of (or equal to) the other."
        )
    )]
    DomainOutsideScopeSubtree {
        capability_id: String,
        domain_id: String,
    },

    #[error("domain {domain_id} has no accountable archetype")]
    #[diagnostic(
        code(tml::validation::missing_archetype),
        help("A Domain references exactly one `accountable_archetype_id`.")
    )]
    MissingAccountableArchetype { domain_id: String },

    #[error("archetype {archetype_id} is not bound to a human identity")]
    #[diagnostic(
        code(tml::validation::missing_identity),
        help("An Archetype's identity needs a non-empty email address.")
    )]
    MissingIdentity { archetype_id: String },

    #[error("view {view_id} projects no capabilities")]
    #[diagnostic(
        code(tml::validation::empty_view),
        help("A View must reference at least one Capability id.")
    )]
    EmptyView { view_id: String },

    #[error("{primitive_id} is governed by policy {policy_id} from an unrelated scope")]
    #[diagnostic(
        code(tml::validation::policy_scope),
        help(
            "Governing policies must be declared in the edge's own scope or one of \
             its ancestors."
        )
    )]
    PolicyScopeMismatch {
        primitive_id: String,
        policy_id: String,
    },

    #[error("domain {domain_id} owns no capabilities")]
    #[diagnostic(
        code(tml::validation::empty_domain),
        help("A Domain can only be confirmed once at least one Capability belongs to it.")
    )]
    DomainWithoutCapability { domain_id: String },

    #[error("cannot {action} {primitive_id}: status is already {from}")]
    #[diagnostic(
        code(tml::validation::invalid_transition),
        help("Confirmed primitives must be corrected or flagged before they can be confirmed again.")
    )]
    InvalidTransition {
        primitive_id: String,
        from: String,
        action: &'static str,
    },

    #[error("{primitive_id} is a {kind}, which carries no confirmation record")]
    #[diagnostic(
        code(tml::validation::not_confirmable),
        help("Views are projections and are never confirmed individually.")
    )]
    NotConfirmable { primitive_id: String, kind: String },

    #[error("correcting {primitive_id} would invalidate {dependent_id}: {cause}")]
    #[diagnostic(
        code(tml::validation::breaks_dependent),
        help(
            "\"{dependent_id}\" relies on the current shape of \"{primitive_id}\". \
             Correct or flag the dependent first, or keep the reference intact."
        )
    )]
    BreaksDependent {
        primitive_id: String,
        dependent_id: String,
        #[source]
        cause: Box<ValidationError>,
    },

    #[error("skill {skill_id} on {capability_id} has confidence {confidence} outside [0, 1]")]
    #[diagnostic(
        code(tml::validation::skill_confidence),
        help("Skill confidence is a finite fraction between 0 and 1.")
    )]
    InvalidSkillConfidence {
        capability_id: String,
        skill_id: String,
        confidence: f32,
    },

    #[error("revised primitive {actual} does not match {expected}")]
    #[diagnostic(
        code(tml::validation::revision_mismatch),
        help("A structural correction must keep the primitive's id and kind.")
    )]
    RevisionMismatch { expected: String, actual: String },

    #[error("organizational graph needs at least one declaration")]
    #[diagnostic(
        code(tml::validation::empty_graph_input),
        help("Assemble one or more scopes and pass their declarations.")
    )]
    EmptyGraphInput,

    #[error("declarations do not share a root scope")]
    #[diagnostic(
        code(tml::validation::no_common_root),
        help(
            "Every declaration must sit under one common scope. Include the ancestor \
             scope's declaration, or pass the root explicitly."
        )
    )]
    NoCommonRoot,
}

// ---------------------------------------------------------------------------
// Lookup errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NotFoundError {
    #[error("primitive not found: {id}")]
    #[diagnostic(
        code(tml::not_found::primitive),
        help("No primitive with id \"{id}\" is registered. Check the id or ingest it first.")
    )]
    Primitive { id: String },

    #[error("scope not found: {id}")]
    #[diagnostic(
        code(tml::not_found::scope),
        help("\"{id}\" is not a registered Scope.")
    )]
    Scope { id: String },

    #[error("declaration not found for scope {scope_id}")]
    #[diagnostic(
        code(tml::not_found::declaration),
        help("Run `assemble` for the scope before reading its declaration.")
    )]
    Declaration { scope_id: String },
}

// ---------------------------------------------------------------------------
// Concurrency errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConflictError {
    #[error("{primitive_id} changed underneath the transition: expected revision {expected}, found {actual}")]
    #[diagnostic(
        code(tml::conflict::stale_revision),
        help("Re-read the primitive and retry the action against its current revision.")
    )]
    StaleRevision {
        primitive_id: String,
        expected: u64,
        actual: u64,
    },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(tml::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(tml::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption. Try again with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(tml::store::serde),
        help(
            "Failed to serialize or deserialize stored data. \
             This usually means the stored format has changed between versions."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("failed to encode declaration as {format}: {message}")]
    #[diagnostic(code(tml::export::encode))]
    Encode {
        format: &'static str,
        message: String,
    },

    #[error("failed to decode {format} declaration: {message}")]
    #[diagnostic(
        code(tml::export::decode),
        help("The input does not match the declaration schema. Check field names and nesting.")
    )]
    Decode {
        format: &'static str,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Structuring errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StructureError {
    #[error("malformed candidate batch from {source_identifier}: {message}")]
    #[diagnostic(
        code(tml::structure::malformed),
        help("The structuring step produced output that is not a valid candidate set.")
    )]
    Malformed {
        source_identifier: String,
        message: String,
    },

    #[error("structuring collaborator failed: {message}")]
    #[diagnostic(
        code(tml::structure::collaborator),
        help("The external structuring call failed. Retries are the collaborator's concern.")
    )]
    Collaborator { message: String },
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IdentityError {
    #[error("invalid identity email: {email:?}")]
    #[diagnostic(
        code(tml::identity::invalid_email),
        help("Identities are anchored to an email address of the form local@domain.")
    )]
    InvalidEmail { email: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(tml::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("could not read configuration file {path}: {message}")]
    #[diagnostic(
        code(tml::engine::config_file),
        help("The configuration file must be valid TOML matching EngineConfig.")
    )]
    ConfigFile { path: String, message: String },
}

/// Convenience alias for functions returning TML results.
pub type TmlResult<T> = std::result::Result<T, TmlError>;
