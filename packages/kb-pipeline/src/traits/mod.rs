//! Capability traits the pipeline depends on.
//!
//! Fetch backends and plain HTTP are external collaborators; the
//! orchestrator only sees these interfaces.

pub mod fetcher;
pub mod http;
