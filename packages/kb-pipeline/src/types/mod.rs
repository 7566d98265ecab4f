//! Serde records that make up the KB document and its satellites.

pub mod claim;
pub mod config;
pub mod extracted;
pub mod guide;
pub mod kb;
pub mod page;
pub mod report;
pub mod seeds;
