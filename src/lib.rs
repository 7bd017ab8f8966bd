// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # tml-engine
//!
//! Turns elicited human expertise into typed, human-confirmed organizational
//! knowledge and computes how decisions flow between the people who own it.
//!
//! ## Architecture
//!
//! - **Primitives** (`primitive`): the nine kinds, their invariants and the
//!   confirmation state machine
//! - **Registry** (`registry`, `provenance`): atomic confirm / correct / flag
//!   transitions with an append-only audit ledger
//! - **Declarations** (`declaration`): versioned snapshots of a scope with
//!   completion tracking
//! - **Organizational graph** (`graph`): decision flows, dependencies and
//!   automation readiness across declarations
//! - **Storage** (`store`): in-memory (DashMap) or durable (redb)
//!
//! ## Library usage
//!
//! ```no_run
//! use tml_engine::engine::{Engine, EngineConfig};
//! use tml_engine::primitive::{Archetype, Capability, Domain, HumanIdentity, Scope};
//!
//! let ana = HumanIdentity::new("ana@example.com", "Ana");
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .insert(vec![
//!         Scope::new("org", "Acme", ana.clone()).into(),
//!         Archetype::new("arch-cfo", "org", ana.clone(), "CFO").into(),
//!         Domain::new("dom-fin", "org", "Finance", "arch-cfo").into(),
//!         Capability::new("cap-pricing", "org", "dom-fin", "Pricing").into(),
//!     ])
//!     .unwrap();
//! engine.confirm("cap-pricing", &ana).unwrap();
//! let declaration = engine.assemble("org").unwrap();
//! let graph = engine.compute_graph(vec![declaration]).unwrap();
//! println!("{} candidates", graph.automation_candidates.len());
//! ```

pub mod declaration;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod identity;
pub mod primitive;
pub mod provenance;
pub mod registry;
pub mod store;
pub mod structure;

/// Seconds since the UNIX epoch.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
