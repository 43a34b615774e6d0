//! Price, discount, and pack-size parsing from listing text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|\brs\.?|\binr)\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("valid regex")
});
static BADGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*%").expect("valid regex"));
static WEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:\d+\s*x\s*)?\d+(?:\.\d+)?\s?(?:kg|g|gm|gms|grams?|mg|l|ltr|litres?|liters?|ml|pcs?|pieces?|units?|pack)\b",
    )
    .expect("valid regex")
});

/// Parses the first currency-marked amount in `text`.
///
/// Thousands separators are stripped before parsing. Text without a
/// currency marker returns `None`, so bare numbers (ratings, counts, pack
/// sizes) are never mistaken for prices.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(text)?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    digits.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Reads a price from a state-blob value: JSON numbers as-is, strings via
/// [`parse_price`] or as plain decimals.
#[must_use]
pub fn parse_state_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|p| p.is_finite() && *p >= 0.0),
        Value::String(s) => parse_price(s).or_else(|| {
            s.trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|p| p.is_finite() && *p >= 0.0)
        }),
        _ => None,
    }
}

/// Whole-number discount from the two prices.
///
/// Returns `Some` only when `original > current` and the rounded result
/// lies strictly between 0 and 100.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // bounded to 1..=99 below
pub fn compute_discount_percent(current: Option<f64>, original: Option<f64>) -> Option<u8> {
    let (current, original) = (current?, original?);
    if !(original > current && original > 0.0 && current >= 0.0) {
        return None;
    }
    let pct = ((original - current) / original * 100.0).round();
    if pct > 0.0 && pct < 100.0 {
        Some(pct as u8)
    } else {
        None
    }
}

/// Percentage shown on a discount badge such as `"12% OFF"`.
#[must_use]
pub fn parse_badge_percent(text: &str) -> Option<u8> {
    BADGE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
}

/// First pack-size phrase in `text`, e.g. `"500 g"` or `"2 x 1 L"`.
#[must_use]
pub fn find_weight(text: &str) -> Option<String> {
    WEIGHT_RE.find(text).map(|m| m.as_str().trim().to_string())
}
