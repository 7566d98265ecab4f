//! URL discovery helpers used by the orchestrator.
//!
//! - `RobotsTxt` - robots.txt parsing for respectful crawling
//! - `collect_sitemap_urls` - sitemap and sitemap-index expansion
//! - `prioritize` / `CandidateFilter` - candidate filtering, scoring and capping

pub mod prioritize;
pub mod robots;
pub mod sitemap;

pub use prioritize::{path_depth, prioritize, score_url, CandidateFilter, Prioritized, Rejection, ScoredUrl, EXCLUDE_SCORE};
pub use robots::{fetch_robots, RobotsTxt};
pub use sitemap::{collect_sitemap_urls, MAX_INDEX_CHILDREN};
