//! Heading path and rolling fee-variant state.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::extracted::{FeeVariant, Heading};

static RE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)(?:\s+#+)?\s*$").unwrap());

static RE_SUPER_EXPRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)super[\s_-]*express|সুপার\s*এক্সপ্রেস").unwrap()
});
static RE_EMERGENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)emergency|urgent|জরুরি|জরুরী|তাৎক্ষণিক").unwrap()
});
static RE_EXPRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)express|এক্সপ্রেস").unwrap());
static RE_REGULAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)regular|নি\x{09DF}মিত|সাধারণ").unwrap());

/// Variant named by `text`, most specific pattern first.
pub fn detect_variant(text: &str) -> Option<FeeVariant> {
    if RE_SUPER_EXPRESS.is_match(text) {
        Some(FeeVariant::SuperExpress)
    } else if RE_EMERGENCY.is_match(text) {
        Some(FeeVariant::Emergency)
    } else if RE_EXPRESS.is_match(text) {
        Some(FeeVariant::Express)
    } else if RE_REGULAR.is_match(text) {
        Some(FeeVariant::Regular)
    } else {
        None
    }
}

/// `(level, text)` if the line is an ATX heading. Emphasis is stripped.
pub fn parse_heading(line: &str) -> Option<(u8, String)> {
    let caps = RE_HEADING.captures(line)?;
    let level = caps[1].len() as u8;
    let text = caps[2].replace("**", "").replace("__", "");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((level, text.to_string()))
}

/// One line of the document with the heading context in force at that line.
#[derive(Debug, Clone)]
pub struct LineContext {
    pub index: usize,
    /// Trimmed line text
    pub text: String,
    /// Set when the line itself is a heading
    pub heading: Option<(u8, String)>,
    /// Heading path in force, including the line's own heading
    pub heading_path: Vec<String>,
    /// Variant inherited from the innermost heading that names one
    pub variant: Option<FeeVariant>,
}

impl LineContext {
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_heading(&self) -> bool {
        self.heading.is_some()
    }

    /// Innermost heading text, if any.
    pub fn last_heading(&self) -> Option<&str> {
        self.heading_path.last().map(String::as_str)
    }
}

#[derive(Debug)]
struct StackEntry {
    level: u8,
    text: String,
    variant: Option<FeeVariant>,
}

/// Open headings, strictly increasing in level from bottom to top.
#[derive(Debug, Default)]
struct HeadingStack {
    entries: Vec<StackEntry>,
}

impl HeadingStack {
    fn push(&mut self, level: u8, text: String) {
        while self.entries.last().is_some_and(|top| top.level >= level) {
            self.entries.pop();
        }
        let variant = detect_variant(&text);
        self.entries.push(StackEntry { level, text, variant });
    }

    fn path(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text.clone()).collect()
    }

    fn variant(&self) -> Option<FeeVariant> {
        self.entries.iter().rev().find_map(|e| e.variant)
    }
}

/// Walk the document once, attaching heading context to every line.
pub fn scan(markdown: &str) -> (Vec<LineContext>, Vec<Heading>) {
    let mut stack = HeadingStack::default();
    let mut lines = Vec::new();
    let mut headings = Vec::new();

    for (index, raw) in markdown.lines().enumerate() {
        let text = raw.trim();
        let heading = parse_heading(text);
        if let Some((level, heading_text)) = &heading {
            stack.push(*level, heading_text.clone());
            headings.push(Heading {
                level: *level,
                text: heading_text.clone(),
                line: index,
            });
        }
        lines.push(LineContext {
            index,
            text: text.to_string(),
            heading,
            heading_path: stack.path(),
            variant: stack.variant(),
        });
    }

    (lines, headings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heading_strips_emphasis() {
        assert_eq!(
            parse_heading("## **Passport Fees**"),
            Some((2, "Passport Fees".to_string()))
        );
        assert_eq!(parse_heading("### Closing hashes ###"), Some((3, "Closing hashes".to_string())));
        assert_eq!(parse_heading("#NoSpace"), None);
        assert_eq!(parse_heading("####### too deep"), None);
    }

    #[test]
    fn test_path_truncates_to_level() {
        let md = "# A\n## B\n### C\n## D\ntext";
        let (lines, headings) = scan(md);
        assert_eq!(headings.len(), 4);
        assert_eq!(lines[2].heading_path, vec!["A", "B", "C"]);
        assert_eq!(lines[4].heading_path, vec!["A", "D"]);
    }

    #[test]
    fn test_siblings_replace_each_other() {
        let (lines, _) = scan("## A\ntext\n## B\ntext");
        assert_eq!(lines[1].heading_path, vec!["A"]);
        assert_eq!(lines[3].heading_path, vec!["B"]);

        let (lines, _) = scan("### X\n### Y\ntext");
        assert_eq!(lines[2].heading_path, vec!["Y"]);
    }

    #[test]
    fn test_skipped_levels_keep_parent() {
        let (lines, _) = scan("## Fees\n#### Express\n### Regular\ntext\n# Top\ntext");
        assert_eq!(lines[1].heading_path, vec!["Fees", "Express"]);
        assert_eq!(lines[3].heading_path, vec!["Fees", "Regular"]);
        assert_eq!(lines[5].heading_path, vec!["Top"]);
    }

    #[test]
    fn test_variant_order_of_specificity() {
        assert_eq!(detect_variant("Super Express"), Some(FeeVariant::SuperExpress));
        assert_eq!(detect_variant("super_express delivery"), Some(FeeVariant::SuperExpress));
        assert_eq!(detect_variant("Urgent express"), Some(FeeVariant::Emergency));
        assert_eq!(detect_variant("Express Service"), Some(FeeVariant::Express));
        assert_eq!(detect_variant("Regular delivery"), Some(FeeVariant::Regular));
        assert_eq!(detect_variant("জরুরি ফি"), Some(FeeVariant::Emergency));
        assert_eq!(detect_variant("Documents"), None);
    }

    #[test]
    fn test_variant_scoped_to_heading_section() {
        let md = "## Express Service\n- a\n### Details\n- b\n## Documents\n- c";
        let (lines, _) = scan(md);
        assert_eq!(lines[1].variant, Some(FeeVariant::Express));
        assert_eq!(lines[3].variant, Some(FeeVariant::Express));
        assert_eq!(lines[5].variant, None);
    }
}
