//! Robots.txt parser and checker.

use std::collections::HashMap;
use std::time::Duration;

use crate::fetchers::FetchAdapter;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    /// Rules per user-agent (lowercase)
    rules: HashMap<String, AgentRules>,

    /// Default rules (for *)
    default_rules: AgentRules,

    /// Sitemaps listed
    sitemaps: Vec<String>,
}

/// Rules for a specific user-agent.
#[derive(Debug, Clone, Default)]
pub struct AgentRules {
    /// Disallowed path patterns
    disallow: Vec<String>,

    /// Allowed path patterns (override disallow)
    allow: Vec<String>,

    /// Crawl delay for this agent
    crawl_delay: Option<f64>,
}

impl AgentRules {
    fn merge(&mut self, other: &AgentRules) {
        self.disallow.extend(other.disallow.iter().cloned());
        self.allow.extend(other.allow.iter().cloned());
        if self.crawl_delay.is_none() {
            self.crawl_delay = other.crawl_delay;
        }
    }
}

/// Match a robots path pattern: prefix match, `*` wildcard, `$` end anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;

    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            if !path.starts_with(part) {
                return false;
            }
            pos = part.len();
            continue;
        }
        if i == last && anchored {
            return path.len() >= pos + part.len() && path.ends_with(part);
        }
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }
    !anchored || pos == path.len()
}

impl RobotsTxt {
    /// Parse robots.txt content.
    ///
    /// Consecutive `User-agent` lines share one group; a group repeated
    /// later in the file is merged into the first.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if in_rules {
                        robots.store(&current_agents, &current_rules);
                        current_rules = AgentRules::default();
                        current_agents.clear();
                        in_rules = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rules = true;
                    // An empty Disallow imposes nothing.
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        current_rules.crawl_delay = Some(delay);
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        robots.sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        robots.store(&current_agents, &current_rules);
        robots
    }

    fn store(&mut self, agents: &[String], rules: &AgentRules) {
        for agent in agents {
            if agent == "*" {
                self.default_rules.merge(rules);
            } else {
                self.rules.entry(agent.clone()).or_default().merge(rules);
            }
        }
    }

    fn rules_for(&self, user_agent: &str) -> &AgentRules {
        let agent_lower = user_agent.to_lowercase();
        self.rules
            .get(&agent_lower)
            .or_else(|| {
                // Product token match, e.g. "bd-services-kb" for "bd-services-kb/1.0"
                self.rules
                    .iter()
                    .filter(|(k, _)| !k.is_empty() && agent_lower.contains(k.as_str()))
                    .max_by_key(|(k, _)| k.len())
                    .map(|(_, v)| v)
            })
            .unwrap_or(&self.default_rules)
    }

    /// Check if a path is allowed for a user-agent.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let rules = self.rules_for(user_agent);
        let path = if path.is_empty() { "/" } else { path };

        if rules.allow.iter().any(|p| pattern_matches(p, path)) {
            return true;
        }
        !rules.disallow.iter().any(|p| pattern_matches(p, path))
    }

    /// Get crawl delay for a user-agent.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent)
            .crawl_delay
            .or(self.default_rules.crawl_delay)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Get listed sitemaps.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Check if robots.txt disallows all crawling.
    pub fn disallows_all(&self, user_agent: &str) -> bool {
        !self.is_allowed(user_agent, "/")
    }
}

/// Fetch and parse robots.txt for an origin. Any failure allows everything.
pub async fn fetch_robots(adapter: &FetchAdapter, origin: &str) -> RobotsTxt {
    let url = format!("{}/robots.txt", origin.trim_end_matches('/'));
    match adapter.get_text(&url).await {
        Ok(Some(content)) => RobotsTxt::parse(&content),
        Ok(None) => RobotsTxt::default(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "robots.txt fetch failed, allowing all");
            RobotsTxt::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "bd-services-kb/1.0";

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/
Crawl-delay: 2

Sitemap: https://www.epassport.gov.bd/sitemap.xml
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(robots.is_allowed(UA, "/public/page"));
        assert!(!robots.is_allowed(UA, "/private/page"));
        assert!(!robots.is_allowed(UA, "/admin/"));
        assert!(robots.is_allowed(UA, "/other/page"));

        assert_eq!(robots.crawl_delay(UA), Some(Duration::from_secs(2)));
        assert_eq!(
            robots.sitemaps(),
            &["https://www.epassport.gov.bd/sitemap.xml".to_string()]
        );
    }

    #[test]
    fn test_specific_user_agent() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: bd-services-kb
Disallow:
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BadBot", "/page"));
        assert!(robots.is_allowed(UA, "/page"));
    }

    #[test]
    fn test_consecutive_agents_share_group() {
        let content = r#"
User-agent: googlebot
User-agent: bd-services-kb
Disallow: /tmp/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed(UA, "/tmp/x"));
        assert!(!robots.is_allowed("Googlebot", "/tmp/x"));
        assert!(robots.is_allowed("other", "/tmp/x"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed(UA, "/private/secret"));
        assert!(robots.is_allowed(UA, "/private/public/page"));
    }

    #[test]
    fn test_empty_disallow_imposes_nothing() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow:\n");
        assert!(robots.is_allowed(UA, "/anything"));
        assert!(!robots.disallows_all(UA));
    }

    #[test]
    fn test_wildcards() {
        let content = r#"
User-agent: *
Disallow: /*.pdf$
Disallow: /search*q=
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed(UA, "/files/form.pdf"));
        assert!(robots.is_allowed(UA, "/files/form.pdf.html"));
        assert!(!robots.is_allowed(UA, "/search?q=passport"));
        assert!(robots.is_allowed(UA, "/search"));
    }

    #[test]
    fn test_empty_robots() {
        let robots = RobotsTxt::parse("");

        assert!(robots.is_allowed(UA, "/any/path"));
        assert!(robots.crawl_delay(UA).is_none());
    }

    #[test]
    fn test_disallow_all() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /\n");

        assert!(robots.disallows_all(UA));
        assert!(!robots.is_allowed(UA, "/anything"));
    }

    #[tokio::test]
    async fn test_fetch_robots_missing_allows_all() {
        let adapter = FetchAdapter::new(None)
            .with_http(std::sync::Arc::new(crate::testing::MockHttp::new()));
        let robots = fetch_robots(&adapter, "https://www.epassport.gov.bd").await;
        assert!(robots.is_allowed(UA, "/"));
    }
}
