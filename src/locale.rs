// Brazilian-Portuguese number and period handling.
//
// Feed cells arrive as numbers, strings with `.` thousands and `,` decimal
// separators, or nothing at all. Everything here is pure: no I/O, no state.
use crate::util::format_number;
use chrono::{Datelike, NaiveDate};
use num_format::ToFormattedString;

const MONTH_ABBR: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// A single cell of unknown shape, as handed over by the tabular feed.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Number(f64),
    Integer(i64),
    Text(String),
}

impl From<Option<&str>> for CellValue {
    fn from(s: Option<&str>) -> Self {
        match s {
            Some(s) => CellValue::Text(s.to_string()),
            None => CellValue::Missing,
        }
    }
}

/// Map a cell to a canonical `f64`, or `None` when it cannot be read.
///
/// String rules, applied in order:
/// - all whitespace is removed, including inside the value;
/// - both `.` and `,` present: `.` is a thousands separator, `,` the decimal one;
/// - only `.` present: every `.` is a thousands separator;
/// - only `,` present: `,` is the decimal separator;
/// - any other character except digits, `.` and `-` is dropped.
///
/// A lone `.` is never read as a decimal point, so `"40.9"` becomes `409.0`.
/// That matches the feed's integer counts (`"40.917"` is forty thousand) but
/// would misread a genuinely fractional value written with a dot.
///
/// `None` is the missing marker. It is never turned into zero.
pub fn parse_br_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Missing => None,
        CellValue::Number(v) if v.is_finite() => Some(*v),
        CellValue::Number(_) => None,
        CellValue::Integer(v) => Some(*v as f64),
        CellValue::Text(s) => parse_br_text(s),
    }
}

/// Convenience for optional CSV fields.
pub fn parse_br_str(s: Option<&str>) -> Option<f64> {
    parse_br_text(s?)
}

fn parse_br_text(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let has_dot = compact.contains('.');
    let has_comma = compact.contains(',');

    let normalized = match (has_dot, has_comma) {
        (true, true) => compact.replace('.', "").replace(',', "."),
        (true, false) => compact.replace('.', ""),
        (false, true) => compact.replace(',', "."),
        (false, false) => compact,
    };

    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `1234567` -> `"1.234.567"`.
pub fn format_br_thousands(n: u64) -> String {
    n.to_formatted_string(&num_format::Locale::en).replace(',', ".")
}

/// `1234.5, 2` -> `"1.234,50"`.
pub fn format_br_number(n: f64, decimals: usize) -> String {
    format_number(n, decimals)
        .chars()
        .map(|c| match c {
            ',' => '.',
            '.' => ',',
            other => other,
        })
        .collect()
}

/// Parse a period cell into the first day of its month.
///
/// Accepted encodings: `2025-03-01`, `2025-03-01 00:00:00`, `2025-03`,
/// `01/03/2025`, `03/2025`, `2025/03`, `mar/2025`, `mar/25`, `março/2025`.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // Drop a time component, if any.
    let s = s.split_whitespace().next().unwrap_or(s);
    let s = match s.find('T') {
        Some(i) if s.starts_with(|c: char| c.is_ascii_digit()) => &s[..i],
        _ => s,
    };

    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return first_of_month(d.year(), d.month());
        }
    }

    let mut parts = s.split(|c| c == '-' || c == '/');
    let (a, b) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    if is_digits(a) && is_digits(b) {
        if a.len() == 4 {
            return first_of_month(a.parse().ok()?, b.parse().ok()?);
        }
        if b.len() == 4 {
            return first_of_month(b.parse().ok()?, a.parse().ok()?);
        }
        return None;
    }

    let month = month_from_name(a)?;
    if !is_digits(b) {
        return None;
    }
    let year: i32 = match b.len() {
        4 => b.parse().ok()?,
        2 => 2000 + b.parse::<i32>().ok()?,
        _ => return None,
    };
    first_of_month(year, month)
}

/// Human-readable `jan/2025` label for a month.
pub fn month_label(month: NaiveDate) -> String {
    format!("{}/{}", MONTH_ABBR[month.month0() as usize], month.year())
}

/// Truncate any date to the first day of its month.
pub fn truncate_to_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    MONTH_ABBR
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}
