use std::str::FromStr;

use models::text::fold_width;
use rust_decimal::Decimal;

/// Cell content that is neither empty nor a number once currency marks and
/// separators are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNumber(pub String);

/// Parses a quantity or money cell.
///
/// Full-width digits are folded; `¥`, `$`, `円`, thousands separators and
/// spaces are dropped. `(1,200)`, `-1200`, `△1200` and `▲1200` are all
/// negative. An empty cell is `Ok(None)`, distinct from an explicit zero.
pub fn parse_decimal(raw: &str) -> Result<Option<Decimal>, InvalidNumber> {
    let cleaned: String = fold_width(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '¥' | '$' | '円'))
        .collect();

    if cleaned.is_empty() {
        return Ok(None);
    }

    let mut negative = false;
    let mut digits = cleaned.as_str();

    // Accounting notation: (1200)
    if let Some(inner) = digits.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        negative = true;
        digits = inner;
    }

    // Japanese negative markers: △1200, ▲1200
    if let Some(rest) = digits.strip_prefix(|c: char| c == '△' || c == '▲') {
        negative = !negative;
        digits = rest;
    }

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return Err(InvalidNumber(raw.to_string()));
    }

    let value = Decimal::from_str(digits).map_err(|_| InvalidNumber(raw.to_string()))?;
    Ok(Some(if negative { -value } else { value }))
}

/// Sum of the values that are present, absent when none is.
pub fn sum_present<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, value| Some(acc.unwrap_or(Decimal::ZERO) + value))
}
