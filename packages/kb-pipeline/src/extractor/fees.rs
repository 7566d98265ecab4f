//! Fee detection.
//!
//! All five patterns run over a line and their hits are deduplicated by
//! `(line, amount)`. The `currency amount` order is only consulted when no
//! `amount currency` hit was found on the same line.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::bengali::parse_amount;
use super::headings::{detect_variant, LineContext};
use super::{clamp_chars, clean_inline, RE_BULLET};
use crate::types::extracted::ExtractedFee;

pub const CURRENCY: &str = "BDT";
const MAX_AMOUNT: f64 = 10_000_000.0;
const MAX_LABEL: usize = 100;
const MIN_LABEL: usize = 3;

// 1. <digits> (BDT|Taka|টাকা|TK)
static RE_AMOUNT_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:/-\s*)?(?:(?:bdt|taka|tk)\b|টাকা)").unwrap()
});
// 2. ৳ <digits>
static RE_TAKA_SIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"৳\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());
// 3. (BDT|Taka|টাকা|TK) <digits>
static RE_CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:bdt|taka|tk)\.?|টাকা)\s*:?\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
});
// 4. ৳ <bengali digits>
static RE_TAKA_SIGN_BN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"৳\s*([০-৯][০-৯,]*)").unwrap());
// 5. <bengali digits> টাকা
static RE_BN_AMOUNT_TAKA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([০-৯][০-৯,]*)\s*(?:/-\s*)?টাকা").unwrap());

static RE_LABEL_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:bdt|taka|tk)\b\.?|টাকা|৳|/-|[0-9০-৯][0-9০-৯,.]*").unwrap()
});
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn amounts_in(text: &str) -> Vec<f64> {
    let captured = |re: &Regex| -> Vec<String> {
        re.captures_iter(text).map(|c| c[1].to_string()).collect()
    };

    let mut raw = captured(&RE_AMOUNT_CURRENCY);
    let rule1_hit = !raw.is_empty();
    raw.extend(captured(&RE_TAKA_SIGN));
    if !rule1_hit {
        raw.extend(captured(&RE_CURRENCY_AMOUNT));
    }
    raw.extend(captured(&RE_TAKA_SIGN_BN));
    raw.extend(captured(&RE_BN_AMOUNT_TAKA));

    raw.iter()
        .filter_map(|r| parse_amount(r))
        .filter(|a| *a > 0.0 && *a <= MAX_AMOUNT)
        .collect()
}

/// Line text minus currency tokens and numbers, or the fallback.
fn derive_label(text: &str, ctx: &LineContext) -> String {
    let body = RE_BULLET
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| text.to_string());
    let body = clean_inline(&body).replace('|', " ");
    let stripped = RE_LABEL_NOISE.replace_all(&body, " ");
    let compressed = RE_WHITESPACE.replace_all(&stripped, " ");
    let label = compressed
        .trim()
        .trim_matches(|c: char| matches!(c, ':' | '-' | '–' | ',' | '(' | ')' | '=' | '।'))
        .trim();
    let label = clamp_chars(label, MAX_LABEL);

    if label.chars().count() < MIN_LABEL {
        ctx.last_heading().unwrap_or("Fee").to_string()
    } else {
        label
    }
}

pub fn extract_fees(lines: &[LineContext]) -> Vec<ExtractedFee> {
    let mut seen: HashSet<(usize, u64)> = HashSet::new();
    let mut fees = Vec::new();

    for ctx in lines {
        if ctx.is_blank() || ctx.is_heading() {
            continue;
        }
        let amounts = amounts_in(&ctx.text);
        if amounts.is_empty() {
            continue;
        }

        let variant = detect_variant(&ctx.text).or(ctx.variant);
        let label = derive_label(&ctx.text, ctx);

        for amount in amounts {
            if !seen.insert((ctx.index, amount.to_bits())) {
                continue;
            }
            fees.push(ExtractedFee {
                label: label.clone(),
                amount,
                currency: CURRENCY.to_string(),
                variant,
                heading_path: ctx.heading_path.clone(),
                line: ctx.index,
                source_text: ctx.text.clone(),
            });
        }
    }

    fees
}
