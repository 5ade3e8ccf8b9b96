//! Date normalization shared by every ingestion path.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").unwrap());
static MDY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());

/// Parse a pasted or imported date: ISO `YYYY-MM-DD`, `M/D/YYYY`
/// (zero-padded), legacy `YYYY/M/D`, or the date part of an ISO timestamp.
/// Returns None for anything else, including calendar-invalid dates.
pub fn parse_date_loose(input: &str) -> Option<NaiveDate> {
    let mut t = input.trim();
    if t.is_empty() {
        return None;
    }

    // "2026-01-16T09:30:00Z" → "2026-01-16"
    if let Some(idx) = t.find('T') {
        if idx == 10 {
            t = &t[..idx];
        }
    }

    if let Some(caps) = YMD_RE.captures(t) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = MDY_RE.captures(t) {
        return ymd(&caps[3], &caps[1], &caps[2]);
    }
    None
}

/// Same as [`parse_date_loose`] but rendered back to `YYYY-MM-DD`.
pub fn normalize_date_iso(input: &str) -> Option<String> {
    parse_date_loose(input).map(|d| d.to_string())
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    let year = y.parse().ok()?;
    let month = m.parse().ok()?;
    let day = d.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
