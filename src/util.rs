// Utility helpers for parsing, text decoding and key normalization.
//
// This module centralizes all the "dirty" CSV/number/date/name handling so
// the rest of the code can assume clean, typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Largest case count or population accepted from a source cell.
pub const MAX_COUNT: f64 = 1e12;

/// Case counts and populations: non-negative, at most `MAX_COUNT`, rounded
/// to the nearest unit.
pub fn parse_count_safe(s: Option<&str>) -> Option<u64> {
    let v = parse_f64_safe(s)?;
    if !(0.0..=MAX_COUNT).contains(&v) {
        return None;
    }
    Some(v.round() as u64)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %I:%M:%S %p",
];

/// Dates appear both as plain days and as timestamps depending on the
/// export; anything unrecognised becomes `None` instead of an error.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Decode raw file bytes. UTF-8 (with or without BOM) is tried first; any
/// byte sequence that is not valid UTF-8 is read as Latin-1, which maps
/// every byte to the code point of the same value and so never fails.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => (s.to_string(), TextEncoding::Utf8),
        Err(_) => (
            body.iter().map(|&b| b as char).collect(),
            TextEncoding::Latin1,
        ),
    }
}

/// Join key for department names: trimmed, upper-cased, diacritics
/// stripped and inner whitespace collapsed to single spaces. Total and
/// idempotent; the empty string maps to itself.
///
/// Both the case aggregates and the boundary records must go through this
/// function, otherwise the join silently loses matches.
pub fn normalize_key(s: &str) -> String {
    let upper: String = s
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .collect();
    upper.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Incidence and pooled rates are shown with one decimal.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Cases per 100,000 inhabitants, `None` when the population is unknown
/// or zero.
pub fn incidence(cases: u64, population: Option<u64>) -> Option<f64> {
    match population {
        Some(p) if p > 0 => Some(round1(cases as f64 / p as f64 * 100_000.0)),
        _ => None,
    }
}

pub fn mean_or_zero(total: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators
    // (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_accent_and_case_insensitive() {
        assert_eq!(normalize_key("Bogotá"), "BOGOTA");
        assert_eq!(normalize_key("BOGOTA"), "BOGOTA");
        assert_eq!(normalize_key(" bogota "), "BOGOTA");
        assert_eq!(normalize_key("Nariño"), "NARINO");
        assert_eq!(normalize_key("  Valle   del Cauca "), "VALLE DEL CAUCA");
        assert_eq!(normalize_key("San Andrés y Providencia"), "SAN ANDRES Y PROVIDENCIA");
    }

    #[test]
    fn normalize_is_idempotent_and_total() {
        for s in ["Quindío", "  San Andrés ", "", "Córdoba", "Bogota\u{0301}"] {
            let once = normalize_key(s);
            assert_eq!(normalize_key(&once), once);
        }
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("Bogota\u{0301}"), "BOGOTA");
    }

    #[test]
    fn decode_falls_back_to_latin1() {
        let (s, enc) = decode_text("Bogotá".as_bytes());
        assert_eq!((s.as_str(), enc), ("Bogotá", TextEncoding::Utf8));

        let (s, enc) = decode_text(b"Bogot\xE1");
        assert_eq!((s.as_str(), enc), ("Bogotá", TextEncoding::Latin1));

        let (s, _) = decode_text(b"\xEF\xBB\xBFa,b");
        assert_eq!(s, "a,b");

        let (s, enc) = decode_text(b"\xEF\xBB\xBFdepartamento\nBogot\xE1");
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(s, "departamento\nBogotá");
    }

    #[test]
    fn dates_parse_or_become_missing() {
        let d = NaiveDate::from_ymd_opt(2020, 3, 6);
        assert_eq!(parse_date_safe(Some("2020-03-06")), d);
        assert_eq!(parse_date_safe(Some("06/03/2020")), d);
        assert_eq!(parse_date_safe(Some("2020-03-06 00:00:00")), d);
        assert_eq!(parse_date_safe(Some("06/03/2020 12:00:00 AM")), d);
        assert_eq!(parse_date_safe(Some("not a date")), None);
        assert_eq!(parse_date_safe(None), None);
    }

    #[test]
    fn counts_reject_negative_and_text() {
        assert_eq!(parse_count_safe(Some("1,234")), Some(1234));
        assert_eq!(parse_count_safe(Some(" 7 ")), Some(7));
        assert_eq!(parse_count_safe(Some("-3")), None);
        assert_eq!(parse_count_safe(Some("n/a")), None);
        assert_eq!(parse_count_safe(Some("99999999999999999999")), None);
        assert_eq!(parse_count_safe(Some("1000000000000")), Some(1_000_000_000_000));
    }

    #[test]
    fn incidence_is_rounded_and_unknown_without_population() {
        assert_eq!(incidence(39941, Some(6_400_000)), Some(624.1));
        assert_eq!(incidence(10, None), None);
        assert_eq!(incidence(10, Some(0)), None);
        assert_eq!(mean_or_zero(0, 0), 0.0);
        assert_eq!(mean_or_zero(9, 3), 3.0);
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_int(65908u64), "65,908");
    }
}
