//! Bengali script helpers: digits, nukta folding, script detection.

/// Bengali block, U+0980..=U+09FF.
pub fn is_bengali_char(c: char) -> bool {
    ('\u{0980}'..='\u{09FF}').contains(&c)
}

pub fn contains_bengali(text: &str) -> bool {
    text.chars().any(is_bengali_char)
}

/// Map Bengali digits U+09E6..U+09EF to ASCII `0..9`; other characters pass through.
pub fn to_ascii_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{09E6}'..='\u{09EF}' => {
                char::from(b'0' + (c as u32 - 0x09E6) as u8)
            }
            other => other,
        })
        .collect()
}

/// Fold decomposed nukta sequences into their precomposed code points.
///
/// য+় → য়, ড+় → ড়, ঢ+় → ঢ়. Pages mix both encodings; patterns are
/// written against the precomposed form.
pub fn fold_nukta(text: &str) -> String {
    if !text.contains('\u{09BC}') {
        return text.to_string();
    }
    text.replace("\u{09AF}\u{09BC}", "\u{09DF}")
        .replace("\u{09A1}\u{09BC}", "\u{09DC}")
        .replace("\u{09A2}\u{09BC}", "\u{09DD}")
}

/// Parse an amount written with ASCII or Bengali digits and thousands commas.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let ascii: String = to_ascii_digits(raw)
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let trimmed = ascii.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a step number written with ASCII or Bengali digits.
pub fn parse_order(raw: &str) -> Option<u32> {
    to_ascii_digits(raw).trim().parse().ok()
}

/// (Bengali letters, ASCII letters) in `text`.
pub fn script_counts(text: &str) -> (usize, usize) {
    text.chars().fold((0, 0), |(bn, latin), c| {
        if is_bengali_char(c) && !('\u{09E6}'..='\u{09EF}').contains(&c) {
            (bn + 1, latin)
        } else if c.is_ascii_alphabetic() {
            (bn, latin + 1)
        } else {
            (bn, latin)
        }
    })
}
