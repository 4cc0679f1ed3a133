use chrono::NaiveDate;
use models::text::fold_width;

use crate::error::RowError;

/// Japanese eras: (kanji name, roman initial, first Gregorian year).
const ERAS: [(&str, char, i32); 5] = [
    ("明治", 'M', 1868),
    ("大正", 'T', 1912),
    ("昭和", 'S', 1926),
    ("平成", 'H', 1989),
    ("令和", 'R', 2019),
];

/// Parses the date spellings found in the ledger exports.
///
/// Accepted after full-width folding: `YYYY/MM/DD`, `YYYY-MM-DD`,
/// `YYYY.MM.DD`, `YYYYMMDD`, `YYYY年M月D日`, era dates such as
/// `令和6年4月1日`, `平成元年5月1日`, `R6.4.1` or `H31/04/30`. A trailing
/// time part (`2024-04-01 10:30:00`) is ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate, RowError> {
    let folded = fold_width(raw);
    let token = folded
        .split_whitespace()
        .next()
        .ok_or_else(|| RowError::DateParse(raw.to_string()))?;

    parse_era_date(token)
        .or_else(|| parse_gregorian(token))
        .ok_or_else(|| RowError::DateParse(raw.to_string()))
}

/// Builds a date from separate year, month and day cells, the layout where
/// the ledger report prints the date over three columns.
pub fn date_from_parts(year: &str, month: &str, day: &str) -> Result<NaiveDate, RowError> {
    let number = |s: &str| fold_width(s).trim().parse::<u32>().ok();
    let date = match (number(year), number(month), number(day)) {
        // Four-digit years only
        (Some(y), Some(m), Some(d)) if y >= 100 => {
            i32::try_from(y).ok().and_then(|y| NaiveDate::from_ymd_opt(y, m, d))
        }
        _ => None,
    };
    date.ok_or_else(|| {
        RowError::DateParse(format!("{}/{}/{}", year.trim(), month.trim(), day.trim()))
    })
}

fn parse_gregorian(token: &str) -> Option<NaiveDate> {
    // YYYYMMDD
    if token.len() == 8 && token.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(token, "%Y%m%d").ok();
    }

    let (year, month, day) = split_ymd(token)?;
    if year.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_era_date(token: &str) -> Option<NaiveDate> {
    let (base_year, rest) = ERAS.iter().find_map(|(name, initial, base)| {
        token
            .strip_prefix(name)
            .or_else(|| token.strip_prefix(*initial))
            .or_else(|| token.strip_prefix(initial.to_ascii_lowercase()))
            .map(|rest| (*base, rest))
    })?;

    let rest = rest.replacen('元', "1", 1);
    let (year, month, day) = split_ymd(&rest)?;
    let era_year: i32 = year.parse().ok()?;
    if era_year < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(base_year + era_year - 1, month.parse().ok()?, day.parse().ok()?)
}

/// Splits `Y/M/D`, `Y-M-D`, `Y.M.D` or `Y年M月D日` into three digit runs.
fn split_ymd(token: &str) -> Option<(String, String, String)> {
    let unified: String = token
        .trim_end_matches('日')
        .chars()
        .map(|c| match c {
            '年' | '月' | '-' | '.' => '/',
            _ => c,
        })
        .collect();

    let parts: Vec<&str> = unified.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    Some((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()))
}
