//! Procedural step detection.
//!
//! Rules are tried in order and the first match wins:
//!
//! 1. `1. text`, `1) text`, `1: text`
//! 2. Bengali-numeral lists: `১) text`, `১। text`
//! 3. Bengali step markers `ধাপ|পর্যায়|পদ্ধতি`, optionally numbered
//! 4. Bengali ordinal openers `প্রথমে|এরপর|অতঃপর|শেষে`
//! 5. Bullets carrying an imperative verb (English or Bengali)
//! 6. Plain Bengali lines ending in an imperative or holding an imperative phrase

use regex::Regex;
use std::sync::LazyLock;

use super::bengali::{contains_bengali, parse_order};
use super::headings::LineContext;
use super::{clamp_chars, clean_inline, RE_BULLET};
use crate::types::extracted::ExtractedStep;

const MAX_TITLE: usize = 150;
const MAX_DESCRIPTION: usize = 500;
const MIN_BODY: usize = 5;

static RE_ASCII_ORDERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)[.):]\s+(.+)$").unwrap());
static RE_BENGALI_ORDERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([০-৯]+)[.)।:]\s+(.+)$").unwrap());
static RE_STEP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ধাপ|পর্যা\x{09DF}|পদ্ধতি)(?:\s*([০-৯0-9]+))?\s*[:：.)।\-–]?\s+(.+)$").unwrap()
});
static RE_ORDINAL_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:প্রথমে|এরপর|অতঃপর|শেষে)[\s,]+(.+)$").unwrap());
static RE_EN_IMPERATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:apply|submit|visit|collect|pay|fill|upload|click|download|select|enter|verify|check|go to|log in|sign in|register|create|complete|provide|attach)\b",
    )
    .unwrap()
});
static RE_BN_IMPERATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:করুন|যান|দিন|নিন)(?:$|[\s।,.!?;:)])").unwrap()
});

const BN_IMPERATIVE_ENDINGS: &[&str] = &["করুন", "যান", "দিন", "নিন"];

const BN_IMPERATIVE_PHRASES: &[&str] = &[
    "আবেদন করুন",
    "পূরণ করুন",
    "জমা দিন",
    "সংগ্রহ করুন",
    "প্রদান করুন",
    "যাচাই করুন",
    "ক্লিক করুন",
    "নির্বাচন করুন",
    "আপলোড করুন",
    "ডাউনলোড করুন",
];

/// A detected step before renumbering.
struct RawStep {
    order: Option<u32>,
    body: String,
    ctx_index: usize,
}

fn bengali_clause_is_imperative(text: &str) -> bool {
    if BN_IMPERATIVE_PHRASES.iter().any(|p| text.contains(p)) {
        return true;
    }
    text.split(['।', ';', ','])
        .map(|clause| clause.trim().trim_end_matches(['.', '!', '?']).trim_end())
        .any(|clause| BN_IMPERATIVE_ENDINGS.iter().any(|e| clause.ends_with(e)))
}

/// Apply the rules to one line, returning `(order, marker-stripped body)`.
fn match_step(text: &str) -> Option<(Option<u32>, String)> {
    if let Some(c) = RE_ASCII_ORDERED.captures(text) {
        return Some((parse_order(&c[1]), c[2].to_string()));
    }
    if let Some(c) = RE_BENGALI_ORDERED.captures(text) {
        return Some((parse_order(&c[1]), c[2].to_string()));
    }
    if let Some(c) = RE_STEP_MARKER.captures(text) {
        let order = c.get(1).and_then(|m| parse_order(m.as_str()));
        return Some((order, c[2].to_string()));
    }
    if let Some(c) = RE_ORDINAL_OPENER.captures(text) {
        return Some((None, c[1].to_string()));
    }
    if let Some(c) = RE_BULLET.captures(text) {
        let content = &c[1];
        if RE_EN_IMPERATIVE.is_match(content) || RE_BN_IMPERATIVE.is_match(content) {
            return Some((None, content.to_string()));
        }
        return None;
    }
    if contains_bengali(text) && bengali_clause_is_imperative(text) {
        return Some((None, text.to_string()));
    }
    None
}

/// First sentence as title, remainder as description.
fn split_title(body: &str) -> (String, Option<String>) {
    let cut = body
        .char_indices()
        .find(|(_, c)| matches!(c, '।' | '.' | '!' | '?'))
        .map(|(i, c)| (i, i + c.len_utf8()));

    let (title, rest) = match cut {
        Some((end, next)) if !body[..end].trim().is_empty() => (&body[..end], &body[next..]),
        _ => (body, ""),
    };

    let title = clamp_chars(title.trim(), MAX_TITLE);
    let rest = rest.trim();
    let description = (!rest.is_empty()).then(|| clamp_chars(rest, MAX_DESCRIPTION));
    (title, description)
}

/// Extract steps, sorted by extracted order and renumbered densely from 1.
pub fn extract_steps(lines: &[LineContext]) -> Vec<ExtractedStep> {
    let mut raw: Vec<RawStep> = Vec::new();

    for (ctx_index, ctx) in lines.iter().enumerate() {
        if ctx.is_blank() || ctx.is_heading() || ctx.text.starts_with('|') {
            continue;
        }
        let Some((order, body)) = match_step(&ctx.text) else {
            continue;
        };
        let body = clean_inline(&body);
        if body.chars().count() < MIN_BODY {
            continue;
        }
        raw.push(RawStep {
            order,
            body,
            ctx_index,
        });
    }

    // Stable: equal keys keep document order.
    let mut keyed: Vec<(u32, RawStep)> = raw
        .into_iter()
        .enumerate()
        .map(|(i, step)| (step.order.unwrap_or(i as u32 + 1), step))
        .collect();
    keyed.sort_by_key(|(key, _)| *key);

    keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, step))| {
            let ctx = &lines[step.ctx_index];
            let (title, description) = split_title(&step.body);
            ExtractedStep {
                order: i as u32 + 1,
                title,
                description,
                heading_path: ctx.heading_path.clone(),
                line: ctx.index,
                source_text: ctx.text.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::headings::scan;

    fn steps(md: &str) -> Vec<ExtractedStep> {
        let (lines, _) = scan(md);
        extract_steps(&lines)
    }

    #[test]
    fn test_english_ordered_list() {
        let s = steps("1. Visit the portal\n2. Click on Register\n3. Fill the form\n4. Submit application");
        assert_eq!(s.len(), 4);
        assert_eq!(
            s.iter().map(|x| x.order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(s[0].title, "Visit the portal");
        assert_eq!(s[3].title, "Submit application");
    }

    #[test]
    fn test_bengali_numerals() {
        let s = steps("১) পোর্টালে যান\n২) নিবন্ধন করুন\n৩) ফরম পূরণ করুন");
        assert_eq!(s.len(), 3);
        assert_eq!(s[0].order, 1);
        assert_eq!(s[2].order, 3);
        assert_eq!(s[1].title, "নিবন্ধন করুন");
    }

    #[test]
    fn test_gaps_are_renumbered() {
        let s = steps("3. Pay the fee online\n1. Visit the portal\n7. Collect your passport");
        assert_eq!(s[0].title, "Visit the portal");
        assert_eq!(s.iter().map(|x| x.order).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_markers_and_openers() {
        let s = steps("ধাপ ২: ফি জমা দিন\nপ্রথমে অনলাইনে আবেদন করুন");
        // Both sort under key 2; document order breaks the tie.
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].title, "ফি জমা দিন");
        assert_eq!(s[1].title, "অনলাইনে আবেদন করুন");
    }

    #[test]
    fn test_imperative_bullets() {
        let s = steps("- Upload a recent photograph\n- Office hours are 9 to 5\n- ছবি আপলোড করুন");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].title, "Upload a recent photograph");
    }

    #[test]
    fn test_title_and_description_split() {
        let s = steps("1. Visit the portal. Use Chrome or Firefox for best results.");
        assert_eq!(s[0].title, "Visit the portal");
        assert_eq!(
            s[0].description.as_deref(),
            Some("Use Chrome or Firefox for best results.")
        );
    }

    #[test]
    fn test_short_bodies_discarded() {
        assert!(steps("1. Go\n2) Pay").is_empty());
    }

    #[test]
    fn test_heading_path_recorded() {
        let s = steps("## How to apply\n1. Visit the portal");
        assert_eq!(s[0].heading_path, vec!["How to apply"]);
        assert_eq!(s[0].line, 1);
    }
}
