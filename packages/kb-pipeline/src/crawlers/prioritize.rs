//! Candidate filtering and URL prioritization.
//!
//! Scores come from keyword classes over the decoded path and query.
//! Anything scoring below zero is excluded; the rest is ordered by score
//! (descending), URL length (ascending), then the URL itself, and capped.

use indexmap::IndexSet;
use url::Url;

use super::robots::RobotsTxt;
use crate::identity::registrable_domain;

/// Score given to URLs that must never be fetched.
pub const EXCLUDE_SCORE: i32 = -999;

const VERY_HIGH: &[&str] = &[
    "apply",
    "application",
    "procedure",
    "instruction",
    "guide",
    "requirements",
    "fee",
    "eligibility",
    "faq",
    "help",
    "how-to",
    "আবেদন",
    "পদ্ধতি",
    "নির্দেশনা",
    "নির্দেশিকা",
    "প্রয়োজনীয়",
    "ফি",
    "যোগ্যতা",
    "প্রশ্ন",
    "সহায়তা",
];

const HIGH: &[&str] = &[
    "download", "form", "tutorial", "steps", "portal", "online", "service", "ফরম", "ডাউনলোড",
    "সেবা",
];

const MEDIUM: &[&str] = &[
    "about", "contact", "office", "notice", "circular", "যোগাযোগ", "অফিস", "নোটিশ", "বিজ্ঞপ্তি",
];

const LOW: &[&str] = &["archive", "history", "past", "old"];

const EXCLUDE: &[&str] = &[
    "press", "news", "tender", "job", "career", "event", "gallery", "blog", "login", "signup",
    "logout", "social", "rss", "api/",
];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "css", "js", "mjs",
    "map", "woff", "woff2", "ttf", "eot", "mp3", "mp4", "avi", "mov", "webm", "zip", "rar", "7z",
];

/// Lowercase, percent-decoded path plus query.
fn scoring_text(url: &Url) -> String {
    let raw = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
        .to_lowercase()
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// ASCII words match a token prefix ("fees" for "fee"); anything with
/// punctuation or Bengali script matches as a substring.
fn keyword_hits(keywords: &[&str], text: &str, tokens: &[&str]) -> i32 {
    keywords
        .iter()
        .filter(|kw| {
            if kw.chars().all(|c| c.is_ascii_alphanumeric()) {
                tokens.iter().any(|t| t.starts_with(*kw))
            } else {
                text.contains(*kw)
            }
        })
        .count() as i32
}

/// Number of non-empty path segments.
pub fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

fn depth_bonus(depth: usize) -> i32 {
    match depth {
        1 => 3,
        0 | 2 => 2,
        _ => 0,
    }
}

fn has_excluded_extension(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .is_some_and(|(_, ext)| EXCLUDED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Integer priority of a URL; [`EXCLUDE_SCORE`] for excluded or unparseable URLs.
pub fn score_url(url: &str) -> i32 {
    let Ok(parsed) = Url::parse(url) else {
        return EXCLUDE_SCORE;
    };
    if has_excluded_extension(&parsed) {
        return EXCLUDE_SCORE;
    }

    let text = scoring_text(&parsed);
    let tokens = tokens(&text);
    if keyword_hits(EXCLUDE, &text, &tokens) > 0 {
        return EXCLUDE_SCORE;
    }

    15 * keyword_hits(VERY_HIGH, &text, &tokens)
        + 10 * keyword_hits(HIGH, &text, &tokens)
        + 5 * keyword_hits(MEDIUM, &text, &tokens)
        - 3 * keyword_hits(LOW, &text, &tokens)
        + depth_bonus(path_depth(&parsed))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredUrl {
    pub url: String,
    pub score: i32,
}

/// Result of prioritization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prioritized {
    /// Kept URLs in fetch order
    pub urls: Vec<ScoredUrl>,
    /// Dropped for a negative score
    pub excluded: usize,
    /// Dropped by the page cap
    pub capped: usize,
}

/// Score, drop negatives, order and cap at `max_pages`.
pub fn prioritize<I, S>(urls: I, max_pages: usize) -> Prioritized
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: IndexSet<String> = urls.into_iter().map(|u| u.as_ref().to_string()).collect();
    let mut result = Prioritized::default();

    let mut scored: Vec<ScoredUrl> = Vec::with_capacity(unique.len());
    for url in unique {
        let score = score_url(&url);
        if score < 0 {
            result.excluded += 1;
        } else {
            scored.push(ScoredUrl { url, score });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.url.len().cmp(&b.url.len()))
            .then_with(|| a.url.cmp(&b.url))
    });
    if scored.len() > max_pages {
        result.capped = scored.len() - max_pages;
        scored.truncate(max_pages);
    }
    result.urls = scored;
    result
}

/// Why a candidate was rejected before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unparseable,
    OtherDomain,
    Robots,
    TooDeep,
}

/// Same registrable domain, robots-allowed, within depth.
pub struct CandidateFilter<'a> {
    registrable: String,
    robots: &'a RobotsTxt,
    user_agent: &'a str,
    max_depth: usize,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(domain: &str, robots: &'a RobotsTxt, user_agent: &'a str, max_depth: usize) -> Self {
        Self {
            registrable: registrable_domain(domain),
            robots,
            user_agent,
            max_depth,
        }
    }

    pub fn check(&self, url: &str) -> Result<(), Rejection> {
        let parsed = Url::parse(url).map_err(|_| Rejection::Unparseable)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Rejection::Unparseable);
        }
        let host = parsed.host_str().ok_or(Rejection::Unparseable)?;
        if registrable_domain(host) != self.registrable {
            return Err(Rejection::OtherDomain);
        }

        let path = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        if !self.robots.is_allowed(self.user_agent, &path) {
            return Err(Rejection::Robots);
        }
        if path_depth(&parsed) > self.max_depth {
            return Err(Rejection::TooDeep);
        }
        Ok(())
    }

    pub fn accepts(&self, url: &str) -> bool {
        self.check(url).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_classes() {
        // fee (+15) + depth 2 (+2)
        assert_eq!(score_url("https://www.epassport.gov.bd/instructions/passport-fees"), 15 + 15 + 2);
        assert_eq!(score_url("https://www.epassport.gov.bd/"), 2);
        assert_eq!(score_url("https://www.epassport.gov.bd/contact"), 5 + 3);
        assert_eq!(score_url("https://www.epassport.gov.bd/news/2024"), EXCLUDE_SCORE);
        assert_eq!(score_url("https://www.epassport.gov.bd/logo.png"), EXCLUDE_SCORE);
        assert_eq!(score_url("https://x.gov.bd/a/b/archive"), -3);
    }

    #[test]
    fn test_bengali_keywords_decoded() {
        let url = format!("https://x.gov.bd/{}", urlencoding::encode("আবেদন-ফরম"));
        assert_eq!(score_url(&url), 15 + 10 + 3);
    }

    #[test]
    fn test_depth_bonus() {
        assert_eq!(depth_bonus(0), 2);
        assert_eq!(depth_bonus(1), 3);
        assert_eq!(depth_bonus(2), 2);
        assert_eq!(depth_bonus(3), 0);
    }

    #[test]
    fn test_prioritize_order_and_cap() {
        let urls = [
            "https://x.gov.bd/about",
            "https://x.gov.bd/apply",
            "https://x.gov.bd/news",
            "https://x.gov.bd/help",
            "https://x.gov.bd/apply",
            "https://x.gov.bd/",
        ];
        let result = prioritize(urls, 3);
        let order: Vec<&str> = result.urls.iter().map(|s| s.url.as_str()).collect();
        // apply and help tie at 18; shorter first, then lexicographic.
        assert_eq!(
            order,
            vec!["https://x.gov.bd/help", "https://x.gov.bd/apply", "https://x.gov.bd/about"]
        );
        assert_eq!(result.excluded, 1);
        assert_eq!(result.capped, 1);
    }

    #[test]
    fn test_prioritize_is_deterministic() {
        let a = ["https://x.gov.bd/b", "https://x.gov.bd/a", "https://x.gov.bd/c"];
        let mut b = a;
        b.reverse();
        assert_eq!(prioritize(a, 10), prioritize(b, 10));
    }

    #[test]
    fn test_candidate_filter() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /admin\n");
        let filter = CandidateFilter::new("www.epassport.gov.bd", &robots, "bd-services-kb/1.0", 2);

        assert!(filter.accepts("https://www.epassport.gov.bd/instructions/fees"));
        assert!(filter.accepts("https://portal.epassport.gov.bd/apply"));
        assert_eq!(
            filter.check("https://www.nidw.gov.bd/apply"),
            Err(Rejection::OtherDomain)
        );
        assert_eq!(
            filter.check("https://www.epassport.gov.bd/admin/x"),
            Err(Rejection::Robots)
        );
        assert_eq!(
            filter.check("https://www.epassport.gov.bd/a/b/c"),
            Err(Rejection::TooDeep)
        );
        assert_eq!(filter.check("mailto:x@y"), Err(Rejection::Unparseable));
    }
}
