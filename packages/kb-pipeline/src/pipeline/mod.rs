//! The pipeline proper.
//!
//! - `claims` - extractor output → claims with deterministic ids
//! - `orchestrator` - seeds → map → prioritize → fetch → extract → KB
//! - `guides` - claim ids aggregated into per-service guides
//! - `publish` - guides → reader-facing JSON with resolved citations
//! - `validate` - structural, contract and semantic checks on published JSON

pub mod claims;
pub mod guides;
pub mod orchestrator;
pub mod publish;
pub mod validate;

pub use claims::{build_claims, format_amount, ClaimSource};
pub use guides::{assemble_guide, guide_id_for, refresh_guides};
pub use orchestrator::Orchestrator;
pub use publish::{
    build_public_guides, public_guides_schema, resolve_generated_at, PublishedOutputs,
    PUBLIC_GUIDES_FILE, PUBLIC_GUIDES_INDEX_FILE, PUBLIC_GUIDES_SCHEMA_FILE,
};
pub use validate::{validate_contract, validate_outputs, validate_semantics, validate_structure};
