const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', '₩', '₽', '¢'];

const STOPWORDS: &[&str] = &["and", "of", "the", "for", "in", "from", "to"];

/// Coerces a textual amount into a number.
///
/// Accepts currency symbols, thousands separators, surrounding whitespace, a leading or
/// trailing ISO currency code (`USD 1,200`), a leading minus sign (ASCII or U+2212) and the
/// accounting convention of wrapping negatives in parentheses: `(123)` is `-123`.
/// Returns `None` for anything that does not reduce to a finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') && text.len() >= 2 {
        negative = true;
        text = text[1..text.len() - 1].trim();
    }

    let text = strip_currency_code(text);

    let mut cleaned = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ',' | '_' | '\'' => {}
            c if c.is_whitespace() => {}
            c if CURRENCY_SYMBOLS.contains(&c) => {}
            '\u{2212}' => cleaned.push('-'),
            c => cleaned.push(c),
        }
    }

    if cleaned.is_empty() {
        return None;
    }

    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if negative { -value.abs() } else { value })
}

fn strip_currency_code(text: &str) -> &str {
    let is_code = |s: &str| s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase());

    if let Some((head, tail)) = text.split_once(char::is_whitespace) {
        if is_code(head) {
            return tail.trim();
        }
    }
    if let Some((head, tail)) = text.rsplit_once(char::is_whitespace) {
        if is_code(tail) {
            return head.trim();
        }
    }
    text
}

/// Renders a numeric header or label cell. Whole numbers drop the fractional part.
pub fn format_number_label(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Lowercases, maps every non-alphanumeric run to a single space and trims.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch == '&' {
            pending_space = true;
            if !out.is_empty() {
                out.push_str(" and");
            }
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// Normalizes a column header for alias lookup: `"Line Item"` and `"line-item"` both
/// become `"line_item"`.
pub fn normalize_header(raw: &str) -> String {
    normalize_label(raw).replace(' ', "_")
}

/// Significant tokens of a normalized label, stopwords removed.
pub fn label_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|t| !STOPWORDS.contains(t))
        .collect()
}

/// Jaccard similarity of two token sets.
pub fn token_overlap(a: &[&str], b: &[&str]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut left: Vec<&str> = a.to_vec();
    left.sort_unstable();
    left.dedup();
    let mut right: Vec<&str> = b.to_vec();
    right.sort_unstable();
    right.dedup();

    let shared = left.iter().filter(|t| right.contains(t)).count();
    let union = left.len() + right.len() - shared;

    shared as f64 / union as f64
}

/// Whether `needle` occurs in `haystack` on token boundaries.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `Some(value)` only when the value is neither infinite nor NaN.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
