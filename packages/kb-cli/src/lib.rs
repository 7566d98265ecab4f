//! Shared plumbing for the KB binaries.
//!
//! - `crawl_kb` - seeds → crawl → KB, writes a run report
//! - `build_public_guides` - KB → validated public guide JSON

pub mod config;
pub mod logging;
pub mod summary;

pub use config::Config;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const FATAL: u8 = 1;
    pub const VALIDATION_FAILED: u8 = 2;
}
