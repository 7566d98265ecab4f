//! FAQ detection: question headings, Q:/A: pairs and linked question bullets.

use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use super::headings::LineContext;
use super::{clamp_chars, clean_inline, RE_BULLET, RE_MD_LINK};
use crate::identity::normalize_for_fingerprint;
use crate::types::extracted::ExtractedFaq;

const ANSWER_WINDOW: usize = 20;
const ANSWER_SETTLED: usize = 50;
const MAX_ANSWER: usize = 1000;
const MIN_SIDE: usize = 10;

static RE_QUESTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:q|question|প্রশ্ন)\s*[:：]\s*(.+)$").unwrap()
});
static RE_ANSWER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:a|answer|উত্তর)\s*[:：]\s*(.+)$").unwrap()
});

fn is_question(text: &str) -> bool {
    let t = text.trim_end();
    t.ends_with('?') || t.ends_with('？')
}

/// Rule 1: a question heading followed by answer lines.
fn from_heading(lines: &[LineContext], at: usize) -> Option<ExtractedFaq> {
    let ctx = &lines[at];
    let (_, question) = ctx.heading.as_ref()?;
    if !is_question(question) {
        return None;
    }

    let mut answer = String::new();
    for next in lines.iter().skip(at + 1).take(ANSWER_WINDOW) {
        if next.is_heading() {
            break;
        }
        if next.is_blank() {
            if answer.chars().count() >= ANSWER_SETTLED {
                break;
            }
            continue;
        }
        let body = RE_BULLET
            .captures(&next.text)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| next.text.clone());
        if !answer.is_empty() {
            answer.push(' ');
        }
        answer.push_str(&clean_inline(&body));
    }

    let question = clean_inline(question);
    let answer = clamp_chars(answer.trim(), MAX_ANSWER);
    if question.chars().count() <= MIN_SIDE || answer.chars().count() <= MIN_SIDE {
        return None;
    }

    Some(ExtractedFaq {
        question,
        answer: Some(answer),
        link: None,
        heading_path: ctx.heading_path.clone(),
        line: ctx.index,
    })
}

/// Rule 2: `Q:` line, answer on the next non-blank line.
fn from_prefixed_pair(lines: &[LineContext], at: usize) -> Option<ExtractedFaq> {
    let ctx = &lines[at];
    let stripped = clean_inline(&ctx.text);
    let question = RE_QUESTION_PREFIX.captures(&stripped)?[1].trim().to_string();

    let next = lines.iter().skip(at + 1).find(|l| !l.is_blank())?;
    let next_text = clean_inline(&next.text);
    let answer = RE_ANSWER_PREFIX.captures(&next_text)?[1].trim().to_string();

    if question.is_empty() || answer.is_empty() {
        return None;
    }
    Some(ExtractedFaq {
        question,
        answer: Some(clamp_chars(&answer, MAX_ANSWER)),
        link: None,
        heading_path: ctx.heading_path.clone(),
        line: ctx.index,
    })
}

/// Rule 3: a bullet whose text asks a question and links to the answer.
fn from_linked_bullet(ctx: &LineContext, base: Option<&Url>) -> Option<ExtractedFaq> {
    let content = &RE_BULLET.captures(&ctx.text)?[1];
    let link = RE_MD_LINK.captures(content)?;
    let question = clean_inline(content);
    if !question.contains('?') && !question.contains('？') {
        return None;
    }

    let href = link[2].trim();
    let resolved = match base {
        Some(base) => base.join(href).ok()?.to_string(),
        None => Url::parse(href).ok()?.to_string(),
    };

    Some(ExtractedFaq {
        question,
        answer: None,
        link: Some(resolved),
        heading_path: ctx.heading_path.clone(),
        line: ctx.index,
    })
}

pub fn extract_faqs(lines: &[LineContext], page_url: &str) -> Vec<ExtractedFaq> {
    let base = Url::parse(page_url).ok();
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut faqs = Vec::new();

    for (at, ctx) in lines.iter().enumerate() {
        if ctx.is_blank() {
            continue;
        }
        let found = if ctx.is_heading() {
            from_heading(lines, at)
        } else {
            from_prefixed_pair(lines, at).or_else(|| from_linked_bullet(ctx, base.as_ref()))
        };
        let Some(faq) = found else { continue };

        let key = format!(
            "{}\n{}",
            normalize_for_fingerprint(&faq.question),
            normalize_for_fingerprint(faq.answer.as_deref().or(faq.link.as_deref()).unwrap_or(""))
        );
        if seen.insert(key) {
            faqs.push(faq);
        }
    }

    faqs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::headings::scan;

    fn faqs(md: &str) -> Vec<ExtractedFaq> {
        let (lines, _) = scan(md);
        extract_faqs(&lines, "https://www.epassport.gov.bd/faq")
    }

    #[test]
    fn test_question_heading() {
        let f = faqs("### How long does it take?\nIt takes 15 working days.");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "How long does it take?");
        assert_eq!(f[0].answer.as_deref(), Some("It takes 15 working days."));
    }

    #[test]
    fn test_answer_stops_at_any_heading() {
        let f = faqs("## Can I apply online?\nYes, through the portal.\n#### Note\nUnrelated text here.");
        assert_eq!(f[0].answer.as_deref(), Some("Yes, through the portal."));
    }

    #[test]
    fn test_blank_line_ends_answer_after_enough_text() {
        let md = "### What documents are needed?\nShort intro.\n\nYou need your NID card, birth certificate and photo.\n\nTrailing paragraph is not part of it.";
        let f = faqs(md);
        assert_eq!(
            f[0].answer.as_deref(),
            Some("Short intro. You need your NID card, birth certificate and photo.")
        );
    }

    #[test]
    fn test_short_sides_rejected() {
        assert!(faqs("### Fees?\nSee the fee table below for all.").is_empty());
        assert!(faqs("### How do I pay the fee?\nOnline.").is_empty());
    }

    #[test]
    fn test_prefixed_pairs() {
        let f = faqs("**Q:** Is the NID required?\n**A:** Yes, for all adults.\n\nপ্রশ্ন: ফি কত?\n\nউত্তর: ৪,০২৫ টাকা।");
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].question, "Is the NID required?");
        assert_eq!(f[0].answer.as_deref(), Some("Yes, for all adults."));
        assert_eq!(f[1].answer.as_deref(), Some("৪,০২৫ টাকা।"));
    }

    #[test]
    fn test_linked_question_bullet() {
        let f = faqs("- [How do I reset my password?](/faq/reset)");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "How do I reset my password?");
        assert_eq!(f[0].answer, None);
        assert_eq!(
            f[0].link.as_deref(),
            Some("https://www.epassport.gov.bd/faq/reset")
        );
    }
}
